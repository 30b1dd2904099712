//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing::{info, warn};

use ocrtsv_common::{TokenRow, UnicodeNormalizer};
use ocrtsv_layout::tsv::{annotate_parts, format_row, read_line_corrections, write_url_file};
use ocrtsv_layout::writeback::default_output_path;
use ocrtsv_layout::{read_alto, read_page, read_tsv, write_back, write_tsv, PageAppender, Purpose, TsvDocument};
use ocrtsv_ner::sentences::{
    max_sentence_position, positions_from_breaks, renumber_sentence_positions, sentence_count,
};
use ocrtsv_ner::{EntityPipeline, NedClient, NedOptions, NedService, NerClient, NerRealigner, NerService};

use crate::config::Config;
use crate::{LayoutArgs, ServiceArgs, Tsv2tsvArgs};

#[derive(Debug, Clone, Copy)]
pub enum Format {
    Page,
    Alto,
}

/// NED priority of page2tsv/alto2tsv when neither flag nor config sets one.
const LAYOUT_NED_PRIORITY: u32 = 1;

fn http_client(noproxy: bool) -> anyhow::Result<reqwest::Client> {
    let builder = reqwest::Client::builder();
    let builder = if noproxy { builder.no_proxy() } else { builder };
    builder.build().context("Failed to build HTTP client")
}

/// NED settings from CLI flags, then the config file, then `default_priority`.
fn ned_options(
    config: &Config,
    args: &ServiceArgs,
    default_priority: Option<u32>,
    cache_path: Option<PathBuf>,
) -> NedOptions {
    NedOptions {
        threshold: args.ned_threshold.or(config.ned.threshold),
        priority: args.ned_priority.or(config.ned.priority).or(default_priority),
        cache_path,
    }
}

/// Assemble the entity pipeline from CLI flags, falling back to the config file.
fn build_pipeline(
    config: &Config,
    args: &ServiceArgs,
    options: NedOptions,
) -> anyhow::Result<EntityPipeline> {
    let client = http_client(args.noproxy || config.http.noproxy)?;

    let ner = args
        .ner_rest_endpoint
        .clone()
        .or_else(|| config.ner.endpoint.clone())
        .map(|endpoint| {
            info!(%endpoint, "Using NER service");
            Box::new(NerClient::new(endpoint, client.clone())) as Box<dyn NerService>
        });
    let ned = args
        .ned_rest_endpoint
        .clone()
        .or_else(|| config.ned.endpoint.clone())
        .map(|endpoint| {
            info!(%endpoint, "Using NED service");
            Box::new(NedClient::new(endpoint, client.clone())) as Box<dyn NedService>
        });

    Ok(EntityPipeline::new(ner, ned, options))
}

fn confidence_range(min: Option<f64>, max: Option<f64>) -> anyhow::Result<Option<(f64, f64)>> {
    match (min, max) {
        (Some(min), Some(max)) if min <= max => Ok(Some((min, max))),
        (Some(min), Some(max)) => bail!("--min-confidence {min} is above --max-confidence {max}"),
        (None, None) => Ok(None),
        _ => bail!("--min-confidence and --max-confidence must be given together"),
    }
}

/// page2tsv / alto2tsv: append one page to a table.
pub async fn layout_to_tsv(config: &Config, args: LayoutArgs, format: Format) -> anyhow::Result<()> {
    let purpose = Purpose::from(args.purpose);
    let scale_factor = args.scale_factor.unwrap_or(config.layout.scale_factor);
    let conf_range = confidence_range(args.min_confidence, args.max_confidence)?;
    let normalization_file = args.normalization_file.as_ref().or(config.layout.normalization_file.as_ref());

    let page = match format {
        Format::Page => {
            let normalizer = match normalization_file {
                Some(path) => UnicodeNormalizer::from_file(path)
                    .with_context(|| format!("Failed to load normalization table {}", path.display()))?,
                None => UnicodeNormalizer::new(),
            };
            read_page(&args.xml_file, scale_factor, &normalizer)
        }
        Format::Alto => {
            if args.normalization_file.is_some() {
                warn!("ALTO input is NFC-normalized only; ignoring --normalization-file");
            }
            read_alto(&args.xml_file, scale_factor)
        }
    }
    .with_context(|| format!("Failed to read {}", args.xml_file.display()))?;

    let with_color = purpose == Purpose::Ocr && conf_range.is_some();
    let appender = PageAppender::open(&args.tsv_out_file, &purpose.columns(with_color))
        .with_context(|| format!("Failed to open {}", args.tsv_out_file.display()))?;

    match purpose {
        Purpose::Nerd => {
            let options = ned_options(config, &args.services, Some(LAYOUT_NED_PRIORITY), None);
            let pipeline = build_pipeline(config, &args.services, options)?;
            if pipeline.has_ned() && !pipeline.has_ner() {
                warn!("Disambiguating a new page requires a NER endpoint; skipping NED");
            }
            let rows = match pipeline.tag_page(page.token_rows(appender.url_id())).await {
                Ok(rows) => rows,
                Err(e) => {
                    // Keep the document numbering of the file consistent with its URL lines.
                    appender.append(&args.image_url, std::iter::empty())?;
                    return Err(e).context("Entity annotation of the page failed");
                }
            };
            let columns = purpose.columns(false);
            appender.append(&args.image_url, rows.iter().map(|r| format_row(r, &columns)))?;
        }
        Purpose::Ocr => {
            if args.services.ner_rest_endpoint.is_some() || args.services.ned_rest_endpoint.is_some() {
                warn!("Entity services are ignored for OCR tables");
            }
            let rows = page.ocr_rows(appender.url_id(), conf_range);
            appender.append(&args.image_url, rows.iter().map(|r| r.to_tsv_line(with_color)))?;
        }
    }
    Ok(())
}

pub fn tsv_to_page(
    page_file: &Path,
    tsv_file: &Path,
    output: Option<PathBuf>,
    keep_words: bool,
) -> anyhow::Result<()> {
    let corrections = read_line_corrections(tsv_file)
        .with_context(|| format!("Failed to read corrections from {}", tsv_file.display()))?;
    let output = output.unwrap_or_else(|| default_output_path(page_file));
    write_back(page_file, &corrections, &output, keep_words)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}

pub async fn find_entities(
    config: &Config,
    tsv_file: &Path,
    tsv_out_file: &Path,
    services: &ServiceArgs,
    ned_json_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let doc = read_tsv(tsv_file).with_context(|| format!("Failed to read {}", tsv_file.display()))?;

    let cache_path = match ned_json_file {
        Some(path) => Some(path),
        None => match config.ned_cache_path(tsv_file) {
            Some(path) => {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
                }
                Some(path)
            }
            None => None,
        },
    };
    let pipeline = build_pipeline(config, services, ned_options(config, services, None, cache_path))?;

    let has_tags = doc.has_tags();
    let TsvDocument { rows, urls, mut columns } = doc;
    let output = pipeline.find_entities(rows, has_tags).await?;

    if output.candidates.is_some() && !columns.iter().any(|c| c == "conf") {
        columns.push("conf".to_string());
    }
    let out_doc = TsvDocument { rows: output.rows, urls, columns };
    write_tsv(&out_doc, tsv_out_file, &[])
        .with_context(|| format!("Failed to write {}", tsv_out_file.display()))?;
    Ok(())
}

fn print_stats(rows: &[TokenRow], args: &Tsv2tsvArgs) {
    if args.num_tokens {
        println!("Number of tokens: {}", rows.len());
    }
    if args.sentence_count {
        println!("Number of sentences: {}", sentence_count(rows));
    }
    if args.max_sentence_len {
        println!("Maximum sentence length: {}", max_sentence_position(rows));
    }
}

/// Tokens that differ between a table and its re-tagged version, ignoring boundary rows.
fn token_differences(input: &[TokenRow], realigned: &[TokenRow]) -> usize {
    let before: Vec<&str> = input.iter().filter(|r| !r.token.is_empty()).map(|r| r.token.as_str()).collect();
    let after: Vec<&str> = realigned.iter().filter(|r| !r.token.is_empty()).map(|r| r.token.as_str()).collect();
    let changed = before.iter().zip(&after).filter(|(a, b)| a != b).count();
    changed + before.len().abs_diff(after.len())
}

/// The input rows with the sentence positions of the re-tagged table.
fn copy_positions(input: &[TokenRow], realigned: &[TokenRow]) -> Vec<TokenRow> {
    let mut positions = positions_from_breaks(realigned).into_iter();
    input
        .iter()
        .map(|row| {
            let mut row = row.clone();
            row.position = if row.token.is_empty() { 0 } else { positions.next().unwrap_or(0) };
            row
        })
        .collect()
}

pub async fn tsv_to_tsv(config: &Config, args: Tsv2tsvArgs) -> anyhow::Result<()> {
    let doc = read_tsv(&args.tsv_in_file)
        .with_context(|| format!("Failed to read {}", args.tsv_in_file.display()))?;

    println!("Input file: {}", args.tsv_in_file.display());
    if args.show_urls {
        for url in &doc.urls {
            println!("{url}");
        }
    }
    if args.show_columns {
        println!("Columns: {}", doc.columns.join(", "));
    }
    if args.just_zero && max_sentence_position(&doc.rows) > 0 {
        info!("Table already carries sentence positions, skipping");
        return Ok(());
    }
    print_stats(&doc.rows, &args);

    let mut rows = doc.rows.clone();
    if let Some(endpoint) = args.ner_rest_endpoint.clone().or_else(|| config.ner.endpoint.clone()) {
        let client = http_client(args.noproxy || config.http.noproxy)?;
        let realigner = NerRealigner::new(NerClient::new(endpoint, client));
        let (realigned, _) = realigner.realign(&doc.rows).await?;

        if args.keep_tokenization || args.sentence_split_only {
            let changed = token_differences(&doc.rows, &realigned);
            if changed > 0 {
                bail!("Tokenization changed: number of token differences: {changed}");
            }
        }
        rows = if args.sentence_split_only { copy_positions(&doc.rows, &realigned) } else { realigned };
    }

    let Some(out_file) = &args.tsv_out_file else {
        return Ok(());
    };
    if args.sanitize_sentence_numbers {
        renumber_sentence_positions(&mut rows);
    }
    println!("Output file: {}", out_file.display());
    print_stats(&rows, &args);

    let out_doc = TsvDocument { rows, urls: doc.urls, columns: doc.columns };
    write_tsv(&out_doc, out_file, &args.drop_column)
        .with_context(|| format!("Failed to write {}", out_file.display()))?;
    Ok(())
}

pub fn extract_doc_links(tsv_file: &Path, url_file: &Path) -> anyhow::Result<()> {
    let parts = ocrtsv_layout::extract_doc_links(tsv_file)
        .with_context(|| format!("Failed to read {}", tsv_file.display()))?;
    let urls: Vec<String> = parts.into_iter().map(|p| p.url).collect();
    write_url_file(&urls, url_file)?;
    info!(documents = urls.len(), path = %url_file.display(), "Wrote document URLs");
    Ok(())
}

pub fn annotate_tsv(tsv_file: &Path, annotated_tsv_file: &Path) -> anyhow::Result<()> {
    let parts = ocrtsv_layout::extract_doc_links(tsv_file)
        .with_context(|| format!("Failed to read {}", tsv_file.display()))?;
    let table = annotate_parts(&parts);
    std::fs::write(annotated_tsv_file, table.to_tsv())
        .with_context(|| format!("Failed to write {}", annotated_tsv_file.display()))?;
    info!(documents = parts.len(), rows = table.rows.len(), "Wrote annotated TSV");
    Ok(())
}
