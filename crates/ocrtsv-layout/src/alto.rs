//! ALTO-XML reader: `TextBlock` → `TextLine` → `String`.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, instrument, warn};
use unicode_normalization::UnicodeNormalization;

use ocrtsv_common::{BoundingBox, OcrTsvError, Result};

use crate::extract::{LayoutLine, LayoutPage, LayoutWord};
use crate::geometry::bbox_from_alto;
use crate::page::{attribute, xml_err};

fn int_attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<i64>> {
    match attribute(e, name)? {
        Some(v) => {
            let v = v.trim();
            // Some producers write float coordinates.
            let parsed = v
                .parse::<i64>()
                .ok()
                .or_else(|| v.parse::<f64>().ok().map(|f| f as i64))
                .ok_or_else(|| OcrTsvError::Xml(format!("invalid {name} {v:?}")))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn alto_box(e: &BytesStart<'_>, scale_factor: f64) -> Result<BoundingBox> {
    Ok(bbox_from_alto(
        int_attribute(e, "HPOS")?,
        int_attribute(e, "VPOS")?,
        int_attribute(e, "WIDTH")?,
        int_attribute(e, "HEIGHT")?,
        scale_factor,
    ))
}

fn alto_word(e: &BytesStart<'_>, region: usize, line: usize, scale_factor: f64) -> Result<Option<LayoutWord>> {
    let content: String = attribute(e, "CONTENT")?.unwrap_or_default().nfc().collect();
    let word = content.trim();
    if word.is_empty() {
        return Ok(None);
    }
    if word.split_whitespace().count() > 1 {
        warn!(word, "Skipping word that contains whitespace");
        return Ok(None);
    }
    Ok(Some(LayoutWord {
        region,
        line,
        text: word.to_string(),
        bbox: alto_box(e, scale_factor)?,
    }))
}

/// Parse ALTO content into a page layout.
///
/// Line ids are running numbers. Words are NFC-normalized and trimmed; empty words are skipped, and
/// so are words that still contain whitespace.
pub fn parse_alto(xml: &str, scale_factor: f64) -> Result<LayoutPage> {
    let mut reader = Reader::from_str(xml);
    let mut page = LayoutPage::default();

    let mut block: Option<usize> = None;
    let mut blocks_seen = 0usize;
    let mut line: Option<usize> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_err)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"TextBlock" => {
                        if !empty {
                            block = Some(blocks_seen);
                        }
                        blocks_seen += 1;
                    }
                    b"TextLine" if block.is_some() => {
                        page.lines.push(LayoutLine {
                            id: page.lines.len().to_string(),
                            bbox: alto_box(e, scale_factor)?,
                            conf: None,
                        });
                        if !empty {
                            line = Some(page.lines.len() - 1);
                        }
                    }
                    b"String" => {
                        if let (Some(region), Some(line_idx)) = (block, line) {
                            if let Some(word) = alto_word(e, region, line_idx, scale_factor)? {
                                page.words.push(word);
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"TextBlock" => {
                    block = None;
                    line = None;
                }
                b"TextLine" => line = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    debug!(lines = page.lines.len(), words = page.words.len(), "Parsed ALTO");
    Ok(page)
}

#[instrument(skip(path), fields(path = %path.display()))]
pub fn read_alto(path: &Path, scale_factor: f64) -> Result<LayoutPage> {
    let xml = std::fs::read_to_string(path)?;
    parse_alto(&xml, scale_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALTO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<alto xmlns="http://www.loc.gov/standards/alto/ns-v2#">
  <Layout><Page><PrintSpace>
    <TextBlock ID="b1">
      <TextLine HPOS="100" VPOS="200" WIDTH="500" HEIGHT="40">
        <String CONTENT="Welt" HPOS="220" VPOS="200" WIDTH="80" HEIGHT="40"/>
        <SP/>
        <String CONTENT="Ein" HPOS="100" VPOS="202" WIDTH="60" HEIGHT="38"/>
        <String CONTENT="  " HPOS="400" VPOS="200" WIDTH="10" HEIGHT="40"/>
        <String CONTENT="zwei Teile" HPOS="420" VPOS="200" WIDTH="80" HEIGHT="40"/>
        <String CONTENT="Cafe&#x301;" HPOS="520" VPOS="200" WIDTH="80" HEIGHT="40"/>
      </TextLine>
    </TextBlock>
    <TextBlock ID="b2">
      <TextLine VPOS="300">
        <String CONTENT="ohne" VPOS="300"/>
      </TextLine>
    </TextBlock>
  </PrintSpace></Page></Layout>
</alto>"#;

    #[test]
    fn test_words_and_lines() {
        let page = parse_alto(ALTO, 1.0).unwrap();
        assert_eq!(page.lines.len(), 2);
        assert_eq!(page.lines[0].id, "0");
        assert_eq!(page.lines[0].bbox, BoundingBox::new(100, 600, 200, 240));

        let texts: Vec<_> = page.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Welt", "Ein", "Café", "ohne"]);
        assert_eq!(page.words[3].region, 1);
        assert_eq!(page.words[3].bbox.left, -1);
    }

    #[test]
    fn test_reading_order_and_scaling() {
        let page = parse_alto(ALTO, 0.5).unwrap();
        let tokens: Vec<_> = page.token_rows(0).into_iter().map(|r| r.token).collect();
        assert_eq!(tokens, vec!["Ein", "Welt", "Café", "ohne"]);
        assert_eq!(page.words[1].bbox.left, 50);
    }

    #[test]
    fn test_ocr_rows_join_words() {
        let page = parse_alto(ALTO, 1.0).unwrap();
        let rows = page.ocr_rows(2, None);
        assert_eq!(rows[0].text, "Ein Welt Café");
        assert_eq!(rows[0].line_id, "0");
        assert_eq!(rows[1].url_id, 2);
    }
}
