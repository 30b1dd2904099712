//! Export a PAGE-XML page to an OCR line table, correct it, and import the correction back.
//!
//! Run with: cargo test --package ocrtsv-layout --test test_page_roundtrip

use ocrtsv_common::UnicodeNormalizer;
use ocrtsv_layout::tsv::{read_line_corrections, read_tsv};
use ocrtsv_layout::writeback::default_output_path;
use ocrtsv_layout::{parse_page, read_page, write_back, PageAppender, Purpose};

const IMAGE_URL: &str =
    "https://content.staatsbibliothek-berlin.de/dc/PPN680203753-0005/left,top,width,height/full/0/default.jpg";

const PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<pc:PcGts xmlns:pc="http://schema.primaresearch.org/PAGE/gts/pagecontent/2019-07-15">
  <pc:Page imageFilename="FILE_0005.tif" imageWidth="2400" imageHeight="3600">
    <pc:ReadingOrder>
      <pc:OrderedGroup id="ro0">
        <pc:RegionRefIndexed index="0" regionRef="region0000"/>
      </pc:OrderedGroup>
    </pc:ReadingOrder>
    <pc:TextRegion id="region0000">
      <pc:Coords points="170,100 1120,100 1120,400 170,400"/>
      <pc:TextLine id="region0000_line0000">
        <pc:Coords points="300,100 900,100 900,160 300,160"/>
        <pc:Word id="w0">
          <pc:Coords points="300,100 900,100 900,160 300,160"/>
          <pc:TextEquiv><pc:Unicode>Deutschland</pc:Unicode></pc:TextEquiv>
        </pc:Word>
        <pc:TextEquiv><pc:Unicode>Deutschland</pc:Unicode></pc:TextEquiv>
      </pc:TextLine>
      <pc:TextLine id="region0000_line0001">
        <pc:Coords points="174,169 1116,169 1116,280 174,280"/>
        <pc:Word id="w1">
          <pc:Coords points="174,170 300,170 300,280 174,280"/>
          <pc:TextEquiv><pc:Unicode>Ein</pc:Unicode></pc:TextEquiv>
        </pc:Word>
        <pc:Word id="w2">
          <pc:Coords points="320,169 1116,169 1116,279 320,279"/>
          <pc:TextEquiv><pc:Unicode>Welt-Stantenbund</pc:Unicode></pc:TextEquiv>
        </pc:Word>
        <pc:TextEquiv><pc:Unicode>Ein Welt-Stantenbund</pc:Unicode></pc:TextEquiv>
      </pc:TextLine>
    </pc:TextRegion>
  </pc:Page>
</pc:PcGts>"#;

#[test]
fn test_export_correct_import() {
    let dir = tempfile::tempdir().unwrap();
    let page_file = dir.path().join("FILE_0005_TESS.xml");
    let tsv_file = dir.path().join("FILE_0005_OUT.tsv");
    std::fs::write(&page_file, PAGE).unwrap();

    // Export.
    let page = read_page(&page_file, 1.0, &UnicodeNormalizer::new()).unwrap();
    let appender = PageAppender::open(&tsv_file, &Purpose::Ocr.columns(false)).unwrap();
    let rows = page.ocr_rows(appender.url_id(), None);
    appender.append(IMAGE_URL, rows.iter().map(|r| r.to_tsv_line(false))).unwrap();

    let exported = std::fs::read_to_string(&tsv_file).unwrap();
    assert!(exported.contains("Ein Welt-Stantenbund\t0\t174\t1116\t169\t280\t\tregion0000_line0001"));
    assert_eq!(exported.lines().nth(1), Some(format!("# {IMAGE_URL}").as_str()));

    // Correct.
    std::fs::write(&tsv_file, exported.replace("Stantenbund", "Staatenbund")).unwrap();

    // Import.
    let corrections = read_line_corrections(&tsv_file).unwrap();
    let output = dir.path().join("FILE_0005_TESS-CORRECTED.xml");
    let stats = write_back(&page_file, &corrections, &output, false).unwrap();
    assert_eq!(stats.lines_corrected, 2);

    let original = parse_page(&std::fs::read_to_string(&page_file).unwrap()).unwrap();
    let corrected = parse_page(&std::fs::read_to_string(&output).unwrap()).unwrap();

    let orig_line = &original.regions[0].lines[1].texts[0];
    let corr_line = &corrected.regions[0].lines[1].texts[0];
    assert!(orig_line.contains("Stantenbund"));
    assert!(!corr_line.contains("Stantenbund"));
    assert!(!orig_line.contains("Staatenbund"));
    assert!(corr_line.contains("Staatenbund"));

    assert_eq!(default_output_path(&page_file).to_string_lossy(), "FILE_0005_TESS.corrected.xml");
}

#[test]
fn test_nerd_export_appends_documents() {
    let dir = tempfile::tempdir().unwrap();
    let page_file = dir.path().join("page.xml");
    let tsv_file = dir.path().join("doc.tsv");
    std::fs::write(&page_file, PAGE).unwrap();
    let page = read_page(&page_file, 1.0, &UnicodeNormalizer::new()).unwrap();

    for url in ["http://img/1", "http://img/2"] {
        let appender = PageAppender::open(&tsv_file, &Purpose::Nerd.columns(false)).unwrap();
        let rows = page.token_rows(appender.url_id());
        let lines = rows.iter().map(|r| ocrtsv_layout::tsv::format_row(r, &Purpose::Nerd.columns(false)));
        appender.append(url, lines).unwrap();
    }

    let doc = read_tsv(&tsv_file).unwrap();
    assert_eq!(doc.urls, vec!["http://img/1", "http://img/2"]);
    assert_eq!(doc.rows.len(), 6);
    let tokens: Vec<_> = doc.rows[..3].iter().map(|r| r.token.as_str()).collect();
    assert_eq!(tokens, vec!["Deutschland", "Ein", "Welt-Stantenbund"]);
    assert_eq!(doc.rows[3].url_id, 1);
    assert!(doc.rows.iter().all(|r| r.position == 0 && r.id == "-" && r.conf == "-"));
}
