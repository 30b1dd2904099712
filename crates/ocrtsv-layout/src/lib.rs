//! ocrtsv-layout — OCR layout extraction (PAGE-XML, ALTO) into token and line tables, TSV I/O and
//! write-back of corrected lines.

pub mod alto;
pub mod confidence;
pub mod extract;
pub mod geometry;
pub mod order;
pub mod page;
pub mod tsv;
pub mod writeback;

pub use alto::{parse_alto, read_alto};
pub use extract::{LayoutLine, LayoutPage, LayoutWord, OcrLineRow, Purpose, NERD_COLUMNS, OCR_COLUMNS};
pub use page::{parse_page, read_page, PageDocument};
pub use tsv::{
    extract_doc_links, read_tsv, render_tsv, write_tsv, DocPart, PageAppender, RawTable, TsvDocument,
};
pub use writeback::{apply_corrections, write_back, WriteBackStats};
