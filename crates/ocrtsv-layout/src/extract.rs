//! Layout-independent view of an OCR page and its conversion into table rows.

use std::collections::BTreeMap;

use ocrtsv_common::{format_float, BoundingBox, TokenRow};

use crate::confidence::conf_color;
use crate::order::sort_reading_order;

/// Columns of a NERD token table.
pub const NERD_COLUMNS: [&str; 11] = [
    "No.", "TOKEN", "NE-TAG", "NE-EMB", "ID", "url_id", "left", "right", "top", "bottom", "conf",
];

/// Columns of an OCR line table, without the optional `ocrconf` colour.
pub const OCR_COLUMNS: [&str; 8] = ["TEXT", "url_id", "left", "right", "top", "bottom", "conf", "line_id"];

/// What the produced table is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// One token per row, for entity annotation.
    Nerd,
    /// One line per row, for OCR correction.
    Ocr,
}

impl Purpose {
    pub fn columns(&self, with_color: bool) -> Vec<&'static str> {
        match self {
            Purpose::Nerd => NERD_COLUMNS.to_vec(),
            Purpose::Ocr => {
                let mut columns = OCR_COLUMNS.to_vec();
                if with_color {
                    columns.push("ocrconf");
                }
                columns
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutWord {
    /// Index of the region in reading order.
    pub region: usize,
    /// Index into [`LayoutPage::lines`].
    pub line: usize,
    pub text: String,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub id: String,
    pub bbox: BoundingBox,
    /// Highest confidence among the line's text variants.
    pub conf: Option<f64>,
}

/// Words and lines of one page, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutPage {
    pub lines: Vec<LayoutLine>,
    pub words: Vec<LayoutWord>,
}

/// One row of an OCR line table.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrLineRow {
    pub text: String,
    pub url_id: usize,
    pub bbox: BoundingBox,
    pub conf: Option<f64>,
    pub line_id: String,
    pub ocrconf: Option<String>,
}

impl OcrLineRow {
    pub fn to_tsv_line(&self, with_color: bool) -> String {
        let mut fields = vec![
            self.text.clone(),
            self.url_id.to_string(),
            self.bbox.left.to_string(),
            self.bbox.right.to_string(),
            self.bbox.top.to_string(),
            self.bbox.bottom.to_string(),
            self.conf.map(format_float).unwrap_or_default(),
            self.line_id.clone(),
        ];
        if with_color {
            fields.push(self.ocrconf.clone().unwrap_or_default());
        }
        fields.join("\t")
    }
}

impl LayoutPage {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn sorted_words(&self) -> Vec<LayoutWord> {
        let mut words = self.words.clone();
        sort_reading_order(&mut words);
        words
    }

    /// Untagged token rows in reading order.
    pub fn token_rows(&self, url_id: usize) -> Vec<TokenRow> {
        self.sorted_words()
            .into_iter()
            .map(|w| TokenRow::new(w.text, url_id, w.bbox))
            .collect()
    }

    /// One row per line that has words, in line order; words joined by single spaces.
    ///
    /// Confidences (and their colour) are only reported when `conf_range` is given.
    pub fn ocr_rows(&self, url_id: usize, conf_range: Option<(f64, f64)>) -> Vec<OcrLineRow> {
        let mut texts: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for word in self.sorted_words() {
            texts.entry(word.line).or_default().push(word.text);
        }

        texts
            .into_iter()
            .filter_map(|(line_idx, parts)| {
                let line = self.lines.get(line_idx)?;
                let conf = conf_range.and(line.conf);
                let ocrconf = match (conf, conf_range) {
                    (Some(c), Some((min, max))) => Some(conf_color(c, min, max)),
                    _ => None,
                };
                Some(OcrLineRow {
                    text: parts.join(" "),
                    url_id,
                    bbox: line.bbox,
                    conf,
                    line_id: line.id.clone(),
                    ocrconf,
                })
            })
            .collect()
    }
}
