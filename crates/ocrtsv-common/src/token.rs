//! The token row: one line of a NERD TSV file.

use serde::{Deserialize, Serialize};

/// Placeholder written into `ID` and `conf` when nothing is known.
pub const UNSET: &str = "-";

/// Tag for tokens outside of any entity.
pub const OUTSIDE: &str = "O";

/// Format a float the way it appears in TSV cells: shortest round-trip form, always with a fractional
/// part (`1.0`, `0.25`). Magnitudes below `1e-4` or from `1e16` up use exponent form with a signed,
/// two-digit exponent (`1e-05`, `2.5e+16`).
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v != 0.0 && !(1e-4..1e16).contains(&v.abs()) {
        let sci = format!("{v:e}");
        if let Some((mantissa, exp)) = sci.split_once('e') {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            return format!("{mantissa}e{sign}{digits:0>2}");
        }
    }

    let s = v.to_string();
    if v.is_finite() && !s.contains('.') && !s.contains('e') {
        format!("{s}.0")
    } else {
        s
    }
}

/// Pixel bounding box of a word or line, already scaled for the presentation image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i64,
    pub right: i64,
    pub top: i64,
    pub bottom: i64,
}

impl BoundingBox {
    pub fn new(left: i64, right: i64, top: i64, bottom: i64) -> Self {
        Self { left, right, top, bottom }
    }

    /// Horizontal centre, used for left-to-right ordering inside a line.
    pub fn hcenter(&self) -> f64 {
        self.left as f64 + (self.right - self.left) as f64 / 2.0
    }
}

/// A single token of the flat token table.
///
/// Columns: `No.`, `TOKEN`, `NE-TAG`, `NE-EMB`, `ID`, `url_id`, `left`, `right`, `top`, `bottom`, `conf`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRow {
    /// Position inside the sentence; 0 starts a sentence.
    pub position: u32,
    pub token: String,
    pub ne_tag: String,
    pub ne_emb: String,
    /// `-` or `|`-joined entity identifiers.
    pub id: String,
    pub url_id: usize,
    pub bbox: BoundingBox,
    /// `-` or `,`-joined probabilities aligned with `id`.
    pub conf: String,
}

impl TokenRow {
    /// A fresh, untagged token as produced by layout extraction.
    pub fn new(token: impl Into<String>, url_id: usize, bbox: BoundingBox) -> Self {
        Self {
            position: 0,
            token: token.into(),
            ne_tag: OUTSIDE.to_string(),
            ne_emb: OUTSIDE.to_string(),
            id: UNSET.to_string(),
            url_id,
            bbox,
            conf: UNSET.to_string(),
        }
    }

    /// A synthetic sentence boundary carrying the geometry of `origin`.
    pub fn sentence_break(origin: &TokenRow) -> Self {
        Self::new(String::new(), origin.url_id, origin.bbox)
    }

    /// Boundary rows have empty text and position 0.
    pub fn is_sentence_break(&self) -> bool {
        self.token.is_empty() && self.position == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_row_defaults() {
        let row = TokenRow::new("Berlin", 2, BoundingBox::new(10, 30, 5, 15));
        assert_eq!(row.ne_tag, "O");
        assert_eq!(row.ne_emb, "O");
        assert_eq!(row.id, "-");
        assert_eq!(row.conf, "-");
        assert_eq!(row.url_id, 2);
        assert!(!row.is_sentence_break());
    }

    #[test]
    fn test_sentence_break_copies_geometry() {
        let row = TokenRow::new("Berlin", 1, BoundingBox::new(10, 30, 5, 15));
        let brk = TokenRow::sentence_break(&row);
        assert!(brk.is_sentence_break());
        assert_eq!(brk.bbox, row.bbox);
        assert_eq!(brk.url_id, 1);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.0), "0.0");
        assert_eq!(format_float(0.25), "0.25");
        assert_eq!(format_float(0.123456789), "0.123456789");
    }

    #[test]
    fn test_format_float_exponent_range() {
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(0.000015), "1.5e-05");
        assert_eq!(format_float(1e-100), "1e-100");
        assert_eq!(format_float(1e15), "1000000000000000.0");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(-2.5e16), "-2.5e+16");
    }

    #[test]
    fn test_hcenter() {
        assert_eq!(BoundingBox::new(10, 30, 0, 0).hcenter(), 20.0);
    }
}
