//! Unicode canonicalization of token text.
//!
//! OCR engines emit historical glyphs as private-use code points. Before any comparison the text is
//! scrubbed of those and put into NFC, so that visually identical sequences compare equal.
//!
//! Usage:
//! ```
//! use ocrtsv_common::unicode::normalize;
//!
//! assert_eq!(normalize("Cafe\u{301}"), "Café");
//! assert_eq!(normalize("a\u{E000}b"), "ab");
//! ```

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use crate::error::{OcrTsvError, Result};

/// True for code points of general category `Co` (private use).
pub fn is_private_use(c: char) -> bool {
    matches!(c as u32, 0xE000..=0xF8FF | 0xF_0000..=0xF_FFFD | 0x10_0000..=0x10_FFFD)
}

/// Remove private-use characters, then compose to NFC.
pub fn normalize(text: &str) -> String {
    scrub_private_use(text).nfc().collect()
}

fn scrub_private_use(text: &str) -> String {
    text.chars().filter(|c| !is_private_use(*c)).collect()
}

/// Replacement for one private-use code point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub base: String,
    pub combining: Option<char>,
}

/// Normalizer with an optional private-use substitution table.
///
/// Without a table this is [`normalize`]. With a table, private-use characters that have an entry are
/// replaced by their base (and combining mark) before the remaining ones are dropped.
#[derive(Debug, Clone, Default)]
pub struct UnicodeNormalizer {
    table: Option<HashMap<u32, Substitution>>,
    use_combining_characters: bool,
}

impl UnicodeNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a substitution table from a TSV file with the columns `decimal`, `base`, `combining_character`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_tsv(&content)
    }

    /// Build from TSV content. `combining_character` is a hex code point or empty.
    pub fn from_tsv(tsv: &str) -> Result<Self> {
        let mut lines = tsv.lines().enumerate();
        let header: Vec<&str> = match lines.next() {
            Some((_, h)) => h.split('\t').map(str::trim).collect(),
            None => {
                return Err(OcrTsvError::Tsv {
                    line: 1,
                    message: "normalization table is empty".to_string(),
                })
            }
        };

        let column = |name: &str| {
            header.iter().position(|h| *h == name).ok_or_else(|| OcrTsvError::Tsv {
                line: 1,
                message: format!("normalization table lacks column {name}"),
            })
        };
        let decimal_col = column("decimal")?;
        let base_col = column("base")?;
        let combining_col = header.iter().position(|h| *h == "combining_character");

        let mut table = HashMap::new();
        for (idx, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let field = |col: usize| fields.get(col).copied().unwrap_or("");

            let decimal: u32 = field(decimal_col).trim().parse().map_err(|_| OcrTsvError::Tsv {
                line: idx + 1,
                message: format!("invalid code point {:?}", field(decimal_col)),
            })?;

            let combining = match combining_col.map(|col| field(col).trim()) {
                None | Some("") => None,
                Some(hex) => {
                    let cp = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
                    Some(cp.ok_or_else(|| OcrTsvError::Tsv {
                        line: idx + 1,
                        message: format!("invalid combining character {hex:?}"),
                    })?)
                }
            };

            table.insert(decimal, Substitution { base: field(base_col).to_string(), combining });
        }

        Ok(Self { table: Some(table), use_combining_characters: true })
    }

    /// Whether combining marks from the table are appended after the base.
    pub fn with_combining_characters(mut self, enabled: bool) -> Self {
        self.use_combining_characters = enabled;
        self
    }

    pub fn normalize(&self, text: &str) -> String {
        let substituted = match &self.table {
            None => scrub_private_use(text),
            Some(table) => {
                let mut out = String::with_capacity(text.len());
                for c in text.chars() {
                    if !is_private_use(c) {
                        out.push(c);
                        continue;
                    }
                    if let Some(sub) = table.get(&(c as u32)) {
                        out.push_str(&sub.base);
                        if self.use_combining_characters {
                            if let Some(mark) = sub.combining {
                                out.push(mark);
                            }
                        }
                    }
                }
                // the table itself may map onto private-use characters
                scrub_private_use(&out)
            }
        };

        if substituted != text {
            warn!(
                original = text,
                normalized = %substituted,
                "Unicode normalization lost information"
            );
        }

        substituted.nfc().collect()
    }
}
