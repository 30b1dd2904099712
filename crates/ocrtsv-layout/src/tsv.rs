//! Reading and writing of the tab-separated token tables.
//!
//! A table starts with a header line. Comment lines (`# <image-url>`) separate the documents of a
//! multi-document file; every row belongs to the document whose URL comment precedes it, or carries
//! the document index explicitly in its `url_id` column.
//!
//! Usage:
//! ```ignore
//! let mut doc = read_tsv(Path::new("page.tsv"))?;
//! renumber_sentence_positions(&mut doc.rows);
//! write_tsv(&doc, Path::new("page.fixed.tsv"), &[])?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info, warn};

use ocrtsv_common::token::{OUTSIDE, UNSET};
use ocrtsv_common::{BoundingBox, OcrTsvError, Result, TokenRow};

use crate::extract::NERD_COLUMNS;

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"http[s]?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\(\),]|(?:%[0-9a-fA-F][0-9a-fA-F]))+").unwrap()
    })
}

/// Last URL on `line`, if any.
pub fn last_url(line: &str) -> Option<&str> {
    url_regex().find_iter(line).last().map(|m| m.as_str())
}

// ── Document links ───────────────────────────────────────────────────────────

/// One document of a multi-document TSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPart {
    pub url: String,
    pub header: Vec<String>,
    /// Data rows, already split into fields.
    pub rows: Vec<Vec<String>>,
}

/// Split TSV content into documents at lines that contain a URL.
///
/// Rows are whitespace-tokenized; a row of three fields gets a leading empty field, rows with fewer
/// fields are dropped. Rows before the first URL belong to no document and are ignored.
pub fn split_doc_links(content: &str) -> Vec<DocPart> {
    let mut lines = content.lines();
    let header: Vec<String> = match lines.next() {
        Some(h) => h.split_whitespace().map(str::to_string).collect(),
        None => return Vec::new(),
    };

    let mut parts = Vec::new();
    let mut url: Option<String> = None;
    let mut rows: Vec<Vec<String>> = Vec::new();

    for line in lines {
        if let Some(found) = last_url(line) {
            if let Some(prev) = url.replace(found.to_string()) {
                parts.push(DocPart { url: prev, header: header.clone(), rows: std::mem::take(&mut rows) });
            }
            continue;
        }
        if url.is_none() {
            continue;
        }

        let mut fields: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if fields.len() == 3 {
            fields.insert(0, String::new());
        }
        if fields.len() >= 4 {
            rows.push(fields);
        } else if !fields.is_empty() && !line.trim_start().starts_with('#') {
            warn!(line, fields = fields.len(), "Dropping malformed line");
        }
    }

    if let Some(url) = url {
        parts.push(DocPart { url, header, rows });
    }
    parts
}

pub fn extract_doc_links(path: &Path) -> Result<Vec<DocPart>> {
    let content = std::fs::read_to_string(path)?;
    Ok(split_doc_links(&content))
}

/// Write the document URLs as a one-column table with header `url`.
pub fn write_url_file(urls: &[String], path: &Path) -> Result<()> {
    let mut out = BufWriter::new(std::fs::File::create(path)?);
    writeln!(out, "url")?;
    for url in urls {
        writeln!(out, "{url}")?;
    }
    out.flush()?;
    Ok(())
}

/// A column-preserving table of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn to_tsv(&self) -> String {
        let mut out = self.columns.join("\t");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join("\t"));
            out.push('\n');
        }
        out
    }
}

/// Concatenate the documents into one table, storing each document's index in `url_id`.
pub fn annotate_parts(parts: &[DocPart]) -> RawTable {
    let mut columns: Vec<String> = Vec::new();
    for part in parts {
        for column in &part.header {
            if !columns.contains(column) {
                columns.push(column.clone());
            }
        }
    }
    if !columns.iter().any(|c| c == "url_id") {
        columns.push("url_id".to_string());
    }

    let mut rows = Vec::new();
    for (url_id, part) in parts.iter().enumerate() {
        for fields in &part.rows {
            let row = columns
                .iter()
                .map(|column| {
                    if column == "url_id" {
                        return url_id.to_string();
                    }
                    part.header
                        .iter()
                        .position(|h| h == column)
                        .and_then(|idx| fields.get(idx).cloned())
                        .unwrap_or_default()
                })
                .collect();
            rows.push(row);
        }
    }
    RawTable { columns, rows }
}

// ── Token tables ─────────────────────────────────────────────────────────────

/// A NERD token table with the URLs of its documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TsvDocument {
    pub rows: Vec<TokenRow>,
    pub urls: Vec<String>,
    /// Header columns as read (after renaming `GND-ID` to `ID`).
    pub columns: Vec<String>,
}

impl TsvDocument {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn has_conf(&self) -> bool {
        self.has_column("conf")
    }

    pub fn has_tags(&self) -> bool {
        self.has_column("NE-TAG")
    }
}

fn parse_int(value: &str, column: &str, line: usize) -> Result<i64> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse::<i64>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        .ok_or_else(|| OcrTsvError::Tsv { line, message: format!("invalid {column} value {value:?}") })
}

fn or_default(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// Parse a NERD token table.
pub fn parse_tsv(content: &str) -> Result<TsvDocument> {
    let mut doc = TsvDocument::default();
    let mut header: Option<HashMap<String, usize>> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if line.starts_with('#') {
            if let Some(url) = last_url(line) {
                doc.urls.push(url.to_string());
            }
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        let Some(columns) = &header else {
            doc.columns = line
                .split('\t')
                .map(|c| if c.trim() == "GND-ID" { "ID".to_string() } else { c.trim().to_string() })
                .collect();
            header = Some(doc.columns.iter().enumerate().map(|(i, c)| (c.clone(), i)).collect());
            continue;
        };

        let fields: Vec<&str> = line.split('\t').collect();
        let get = |name: &str| columns.get(name).and_then(|&i| fields.get(i).copied());

        let position = parse_int(get("No.").unwrap_or(""), "No.", line_no)?;
        let url_id = match get("url_id") {
            Some(v) => parse_int(v, "url_id", line_no)?,
            None => doc.urls.len().saturating_sub(1) as i64,
        };

        doc.rows.push(TokenRow {
            position: u32::try_from(position).map_err(|_| OcrTsvError::Tsv {
                line: line_no,
                message: format!("negative sentence position {position}"),
            })?,
            token: get("TOKEN").unwrap_or("").to_string(),
            ne_tag: or_default(get("NE-TAG"), OUTSIDE),
            ne_emb: or_default(get("NE-EMB"), OUTSIDE),
            id: or_default(get("ID"), UNSET),
            url_id: usize::try_from(url_id).map_err(|_| OcrTsvError::Tsv {
                line: line_no,
                message: format!("negative url_id {url_id}"),
            })?,
            bbox: BoundingBox::new(
                parse_int(get("left").unwrap_or(""), "left", line_no)?,
                parse_int(get("right").unwrap_or(""), "right", line_no)?,
                parse_int(get("top").unwrap_or(""), "top", line_no)?,
                parse_int(get("bottom").unwrap_or(""), "bottom", line_no)?,
            ),
            conf: or_default(get("conf"), UNSET),
        });
    }

    if header.is_none() {
        return Err(OcrTsvError::Tsv { line: 1, message: "missing header".to_string() });
    }
    Ok(doc)
}

pub fn read_tsv(path: &Path) -> Result<TsvDocument> {
    let content = std::fs::read_to_string(path)?;
    let doc = parse_tsv(&content)?;
    info!(path = %path.display(), rows = doc.rows.len(), urls = doc.urls.len(), "Read TSV");
    Ok(doc)
}

/// Value of `column` for `row`.
pub fn row_field(row: &TokenRow, column: &str) -> String {
    match column {
        "No." => row.position.to_string(),
        "TOKEN" => row.token.clone(),
        "NE-TAG" => row.ne_tag.clone(),
        "NE-EMB" => row.ne_emb.clone(),
        "ID" => row.id.clone(),
        "url_id" => row.url_id.to_string(),
        "left" => row.bbox.left.to_string(),
        "right" => row.bbox.right.to_string(),
        "top" => row.bbox.top.to_string(),
        "bottom" => row.bbox.bottom.to_string(),
        "conf" => row.conf.clone(),
        _ => String::new(),
    }
}

pub fn format_row(row: &TokenRow, columns: &[&str]) -> String {
    columns.iter().map(|c| row_field(row, c)).collect::<Vec<_>>().join("\t")
}

/// Output columns for `doc`: the NERD columns (`conf` only when read), minus `dropped`.
pub fn output_columns(doc: &TsvDocument, dropped: &[String]) -> Vec<&'static str> {
    NERD_COLUMNS
        .iter()
        .copied()
        .filter(|c| *c != "conf" || doc.has_conf())
        .filter(|c| !dropped.iter().any(|d| d == c))
        .collect()
}

/// Render `doc` as TSV text.
///
/// Without URLs the rows follow the header directly. Otherwise rows are grouped by `url_id` in
/// ascending order and every group is preceded by its `# <url>` line.
pub fn render_tsv(doc: &TsvDocument, dropped: &[String]) -> Result<String> {
    let columns = output_columns(doc, dropped);
    let mut out = columns.join("\t");
    out.push('\n');

    if doc.urls.is_empty() {
        for row in &doc.rows {
            out.push_str(&format_row(row, &columns));
            out.push('\n');
        }
        return Ok(out);
    }

    let mut groups: BTreeMap<usize, Vec<&TokenRow>> = BTreeMap::new();
    for row in &doc.rows {
        groups.entry(row.url_id).or_default().push(row);
    }
    for (url_id, rows) in groups {
        let url = doc.urls.get(url_id).ok_or_else(|| OcrTsvError::Tsv {
            line: 0,
            message: format!("url_id {url_id} has no document URL ({} known)", doc.urls.len()),
        })?;
        out.push_str("# ");
        out.push_str(url);
        out.push('\n');
        for row in rows {
            out.push_str(&format_row(row, &columns));
            out.push('\n');
        }
    }
    Ok(out)
}

pub fn write_tsv(doc: &TsvDocument, path: &Path, dropped: &[String]) -> Result<()> {
    let content = render_tsv(doc, dropped)?;
    std::fs::write(path, content)?;
    info!(path = %path.display(), rows = doc.rows.len(), "Wrote TSV");
    Ok(())
}

// ── Appending pages ──────────────────────────────────────────────────────────

/// Appends pages to a (possibly multi-document) table.
///
/// The document index of the next page is the number of documents already in the file. A new file
/// gets the header first.
#[derive(Debug)]
pub struct PageAppender {
    path: PathBuf,
    url_id: usize,
}

impl PageAppender {
    pub fn open(path: &Path, columns: &[&str]) -> Result<Self> {
        let url_id = if path.exists() {
            extract_doc_links(path)?.len()
        } else {
            std::fs::write(path, format!("{}\n", columns.join("\t")))?;
            0
        };
        debug!(path = %path.display(), url_id, "Opened TSV for appending");
        Ok(Self { path: path.to_path_buf(), url_id })
    }

    pub fn url_id(&self) -> usize {
        self.url_id
    }

    /// Append the `# <image_url>` line followed by `lines`. Returns the number of rows written.
    pub fn append<I>(&self, image_url: &str, lines: I) -> Result<usize>
    where
        I: IntoIterator<Item = String>,
    {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut out = BufWriter::new(file);
        writeln!(out, "# {image_url}")?;
        let mut written = 0;
        for line in lines {
            writeln!(out, "{line}")?;
            written += 1;
        }
        out.flush()?;
        info!(path = %self.path.display(), url_id = self.url_id, rows = written, "Appended page");
        Ok(written)
    }
}

// ── OCR line tables ──────────────────────────────────────────────────────────

/// Corrected line texts of an OCR table, keyed by `line_id`. Blank texts are left out.
pub fn parse_line_corrections(content: &str) -> Result<HashMap<String, String>> {
    let mut corrections = HashMap::new();
    let mut header: Option<(usize, usize)> = None;

    for (idx, line) in content.lines().enumerate() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();

        let Some((text_col, id_col)) = header else {
            let find = |name: &str| {
                fields.iter().position(|f| f.trim() == name).ok_or_else(|| OcrTsvError::Tsv {
                    line: idx + 1,
                    message: format!("OCR table lacks column {name}"),
                })
            };
            header = Some((find("TEXT")?, find("line_id")?));
            continue;
        };

        let text = fields.get(text_col).copied().unwrap_or("");
        let line_id = fields.get(id_col).copied().unwrap_or("").trim();
        if text.trim().is_empty() || line_id.is_empty() {
            continue;
        }
        corrections.insert(line_id.to_string(), text.to_string());
    }
    Ok(corrections)
}

pub fn read_line_corrections(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)?;
    parse_line_corrections(&content)
}
