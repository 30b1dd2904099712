//! ocrtsv: OCR layout to token tables, entity recognition and disambiguation.
//! Entry point for the command line tool.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use ocrtsv_layout::Purpose;

#[derive(Parser)]
#[command(name = "ocrtsv", about = "Convert OCR layout into token tables and annotate named entities", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Append the words or lines of a PAGE-XML page to a TSV file
    Page2tsv(LayoutArgs),
    /// Append the words or lines of an ALTO-XML page to a TSV file
    Alto2tsv(LayoutArgs),
    /// Write corrected line texts of an OCR table back into PAGE-XML
    Tsv2page {
        /// Output file (default: <page stem>.corrected.xml)
        #[arg(short, long)]
        output_filename: Option<PathBuf>,
        /// Keep the Word elements of corrected pages
        #[arg(short, long)]
        keep_words: bool,
        page_file: PathBuf,
        tsv_file: PathBuf,
    },
    /// Tag and/or disambiguate the entities of a token table
    FindEntities {
        tsv_file: PathBuf,
        tsv_out_file: PathBuf,
        #[command(flatten)]
        services: ServiceArgs,
        /// Read NED candidates from this file if it exists, store them there otherwise
        #[arg(long)]
        ned_json_file: Option<PathBuf>,
    },
    /// Print statistics of a token table, optionally re-tag and rewrite it
    Tsv2tsv(Tsv2tsvArgs),
    /// Split a multi-document TSV at its URL comments and write the URLs to a file
    ExtractDocLinks { tsv_file: PathBuf, url_file: PathBuf },
    /// Flatten a multi-document TSV into one table with a url_id column
    AnnotateTsv { tsv_file: PathBuf, annotated_tsv_file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum PurposeArg {
    #[value(name = "NERD", alias = "nerd")]
    Nerd,
    #[value(name = "OCR", alias = "ocr")]
    Ocr,
}

impl From<PurposeArg> for Purpose {
    fn from(p: PurposeArg) -> Self {
        match p {
            PurposeArg::Nerd => Purpose::Nerd,
            PurposeArg::Ocr => Purpose::Ocr,
        }
    }
}

/// Endpoints and settings of the entity services.
#[derive(Args, Clone, Default)]
struct ServiceArgs {
    /// NER service, e.g. http://localhost:5000/ner/1
    #[arg(long)]
    ner_rest_endpoint: Option<String>,
    /// NED service, e.g. http://localhost:5001
    #[arg(long)]
    ned_rest_endpoint: Option<String>,
    /// Bypass any configured HTTP proxy
    #[arg(long)]
    noproxy: bool,
    /// Minimum probability of a NED candidate
    #[arg(long)]
    ned_threshold: Option<f64>,
    /// Priority forwarded to the NED service (page2tsv/alto2tsv fall back to 1)
    #[arg(long)]
    ned_priority: Option<u32>,
}

#[derive(Args)]
struct LayoutArgs {
    xml_file: PathBuf,
    tsv_out_file: PathBuf,
    #[arg(long, value_enum, default_value = "NERD")]
    purpose: PurposeArg,
    #[arg(long, default_value = "http://empty")]
    image_url: String,
    #[command(flatten)]
    services: ServiceArgs,
    /// Multiply all coordinates by this factor
    #[arg(long)]
    scale_factor: Option<f64>,
    /// Lower bound of the OCR confidence colour scale (OCR purpose)
    #[arg(long)]
    min_confidence: Option<f64>,
    /// Upper bound of the OCR confidence colour scale (OCR purpose)
    #[arg(long)]
    max_confidence: Option<f64>,
    /// Character substitution table (TSV with unicode and base columns)
    #[arg(long)]
    normalization_file: Option<PathBuf>,
}

#[derive(Args)]
struct Tsv2tsvArgs {
    tsv_in_file: PathBuf,
    #[arg(long)]
    tsv_out_file: Option<PathBuf>,
    #[arg(long)]
    ner_rest_endpoint: Option<String>,
    #[arg(long)]
    noproxy: bool,
    /// Print the number of tokens
    #[arg(long)]
    num_tokens: bool,
    /// Print the number of sentences
    #[arg(long)]
    sentence_count: bool,
    /// Print the largest sentence position
    #[arg(long)]
    max_sentence_len: bool,
    /// Fail if re-tagging changes any token
    #[arg(long)]
    keep_tokenization: bool,
    /// Only take over the sentence positions of the re-tagged table
    #[arg(long)]
    sentence_split_only: bool,
    #[arg(long)]
    show_urls: bool,
    /// Skip tables that already carry sentence positions
    #[arg(long)]
    just_zero: bool,
    #[arg(long)]
    sanitize_sentence_numbers: bool,
    #[arg(long)]
    show_columns: bool,
    /// Leave this column out of the output (repeatable)
    #[arg(long)]
    drop_column: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ocrtsv=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::Config::load()?;

    match cli.command {
        Command::Page2tsv(args) => commands::layout_to_tsv(&config, args, commands::Format::Page).await,
        Command::Alto2tsv(args) => commands::layout_to_tsv(&config, args, commands::Format::Alto).await,
        Command::Tsv2page { output_filename, keep_words, page_file, tsv_file } => {
            commands::tsv_to_page(&page_file, &tsv_file, output_filename, keep_words)
        }
        Command::FindEntities { tsv_file, tsv_out_file, services, ned_json_file } => {
            commands::find_entities(&config, &tsv_file, &tsv_out_file, &services, ned_json_file).await
        }
        Command::Tsv2tsv(args) => commands::tsv_to_tsv(&config, args).await,
        Command::ExtractDocLinks { tsv_file, url_file } => commands::extract_doc_links(&tsv_file, &url_file),
        Command::AnnotateTsv { tsv_file, annotated_tsv_file } => {
            commands::annotate_tsv(&tsv_file, &annotated_tsv_file)
        }
    }
}
