//! PAGE-XML reader.
//!
//! Streams the document once and keeps only what the token tables need: text regions with their
//! lines, line and word polygons, text variants and confidences, and the reading order. Element names
//! are matched on their local part, so any PAGE schema version (or prefix) is accepted.

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, instrument, warn};

use ocrtsv_common::{OcrTsvError, Result, UnicodeNormalizer};

use crate::extract::{LayoutLine, LayoutPage, LayoutWord};
use crate::geometry::bbox_from_points;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageWord {
    pub points: String,
    /// Text of the first `TextEquiv`, if any.
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLine {
    pub id: String,
    pub points: String,
    /// `conf` attributes of the line's own `TextEquiv`s.
    pub confs: Vec<f64>,
    /// Texts of the line's own `TextEquiv`s.
    pub texts: Vec<String>,
    pub words: Vec<PageWord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRegion {
    pub id: String,
    pub lines: Vec<PageLine>,
}

/// Text regions of a page plus the region ids listed in its reading order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageDocument {
    pub regions: Vec<PageRegion>,
    pub reading_order: Vec<String>,
}

pub(crate) fn xml_err(e: impl std::fmt::Display) -> OcrTsvError {
    OcrTsvError::Xml(e.to_string())
}

pub(crate) fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name).map_err(xml_err)? {
        Some(attr) => Ok(Some(attr.unescape_value().map_err(xml_err)?.into_owned())),
        None => Ok(None),
    }
}

/// One open `OrderedGroup`/`UnorderedGroup` while collecting the reading order.
struct GroupFrame {
    index: i64,
    ordered: bool,
    own_ref: Option<String>,
    entries: Vec<(i64, Vec<String>)>,
}

impl GroupFrame {
    fn flatten(mut self) -> Vec<String> {
        if self.ordered {
            self.entries.sort_by_key(|(index, _)| *index);
        }
        let mut flat: Vec<String> = self.own_ref.into_iter().collect();
        for (_, refs) in self.entries {
            flat.extend(refs);
        }
        flat
    }
}

fn is_group(name: &[u8]) -> bool {
    matches!(
        name,
        b"OrderedGroup" | b"UnorderedGroup" | b"OrderedGroupIndexed" | b"UnorderedGroupIndexed"
    )
}

fn ref_index(e: &BytesStart<'_>, fallback: usize) -> Result<i64> {
    match attribute(e, "index")? {
        Some(v) => v.trim().parse().map_err(|_| OcrTsvError::Xml(format!("invalid index {v:?}"))),
        None => Ok(fallback as i64),
    }
}

/// Parse PAGE-XML content.
pub fn parse_page(xml: &str) -> Result<PageDocument> {
    let mut reader = Reader::from_str(xml);
    let mut doc = PageDocument::default();

    // Local names of the open elements.
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut open_regions: Vec<usize> = Vec::new();
    let mut groups: Vec<GroupFrame> = Vec::new();
    let mut unicode: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_err)?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let empty = matches!(event, Event::Empty(_));
                let name = e.local_name().as_ref().to_vec();
                let parent = stack.last().map(Vec::as_slice);

                match name.as_slice() {
                    b"TextRegion" => {
                        doc.regions.push(PageRegion {
                            id: attribute(e, "id")?.unwrap_or_default(),
                            lines: Vec::new(),
                        });
                        if !empty {
                            open_regions.push(doc.regions.len() - 1);
                        }
                    }
                    b"TextLine" => {
                        if let Some(&region) = open_regions.last() {
                            doc.regions[region].lines.push(PageLine {
                                id: attribute(e, "id")?.unwrap_or_default(),
                                ..Default::default()
                            });
                        }
                    }
                    b"Word" if matches!(parent, Some(b"TextLine")) => {
                        if let Some(line) = current_line(&mut doc, &open_regions) {
                            line.words.push(PageWord::default());
                        }
                    }
                    b"Coords" => {
                        let points = attribute(e, "points")?.unwrap_or_default();
                        match parent {
                            Some(b"TextLine") => {
                                if let Some(line) = current_line(&mut doc, &open_regions) {
                                    line.points = points;
                                }
                            }
                            Some(b"Word") => {
                                if let Some(word) = current_word(&mut doc, &open_regions) {
                                    word.points = points;
                                }
                            }
                            _ => {}
                        }
                    }
                    b"TextEquiv" if matches!(parent, Some(b"TextLine")) => {
                        if let Some(conf) = attribute(e, "conf")? {
                            let conf = conf
                                .trim()
                                .parse::<f64>()
                                .map_err(|_| OcrTsvError::Xml(format!("invalid conf {conf:?}")))?;
                            if let Some(line) = current_line(&mut doc, &open_regions) {
                                line.confs.push(conf);
                            }
                        }
                    }
                    b"Unicode" => {
                        if empty {
                            store_unicode(&mut doc, &open_regions, &stack, String::new());
                        } else {
                            unicode = Some(String::new());
                        }
                    }
                    n if is_group(n) => {
                        let frame = GroupFrame {
                            index: ref_index(e, groups.last().map_or(0, |g| g.entries.len()))?,
                            ordered: n.starts_with(b"Ordered"),
                            own_ref: attribute(e, "regionRef")?,
                            entries: Vec::new(),
                        };
                        if empty {
                            push_group(&mut groups, &mut doc, frame);
                        } else {
                            groups.push(frame);
                        }
                    }
                    b"RegionRefIndexed" | b"RegionRef" => {
                        if let Some(group) = groups.last_mut() {
                            let index = ref_index(e, group.entries.len())?;
                            if let Some(region_ref) = attribute(e, "regionRef")? {
                                group.entries.push((index, vec![region_ref]));
                            }
                        }
                    }
                    _ => {}
                }

                if !empty {
                    stack.push(name);
                }
            }
            Event::Text(ref e) => {
                if let Some(text) = unicode.as_mut() {
                    text.push_str(&e.unescape().map_err(xml_err)?);
                }
            }
            Event::End(ref e) => {
                stack.pop();
                match e.local_name().as_ref() {
                    b"TextRegion" => {
                        open_regions.pop();
                    }
                    b"Unicode" => {
                        if let Some(text) = unicode.take() {
                            store_unicode(&mut doc, &open_regions, &stack, text);
                        }
                    }
                    n if is_group(n) => {
                        if let Some(frame) = groups.pop() {
                            push_group(&mut groups, &mut doc, frame);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    debug!(regions = doc.regions.len(), reading_order = doc.reading_order.len(), "Parsed PAGE-XML");
    Ok(doc)
}

fn push_group(groups: &mut [GroupFrame], doc: &mut PageDocument, frame: GroupFrame) {
    let index = frame.index;
    let refs = frame.flatten();
    match groups.last_mut() {
        Some(parent) => parent.entries.push((index, refs)),
        None => doc.reading_order.extend(refs),
    }
}

fn current_line<'a>(doc: &'a mut PageDocument, open_regions: &[usize]) -> Option<&'a mut PageLine> {
    let region = *open_regions.last()?;
    doc.regions[region].lines.last_mut()
}

fn current_word<'a>(doc: &'a mut PageDocument, open_regions: &[usize]) -> Option<&'a mut PageWord> {
    current_line(doc, open_regions)?.words.last_mut()
}

/// `stack` ends with `.., owner, TextEquiv` when a `Unicode` element closes.
fn store_unicode(doc: &mut PageDocument, open_regions: &[usize], stack: &[Vec<u8>], text: String) {
    let n = stack.len();
    if n < 2 || stack[n - 1] != b"TextEquiv" {
        return;
    }
    match stack[n - 2].as_slice() {
        b"TextLine" => {
            if let Some(line) = current_line(doc, open_regions) {
                line.texts.push(text);
            }
        }
        b"Word" if n >= 3 && stack[n - 3] == b"TextLine" => {
            if let Some(word) = current_word(doc, open_regions) {
                if word.text.is_none() {
                    word.text = Some(text);
                }
            }
        }
        _ => {}
    }
}

impl PageDocument {
    /// Regions in reading order: referenced regions first, in order, then the remaining ones.
    pub fn ordered_regions(&self) -> Vec<&PageRegion> {
        let mut ordered: Vec<&PageRegion> = Vec::with_capacity(self.regions.len());
        for id in &self.reading_order {
            if let Some(region) = self.regions.iter().find(|r| &r.id == id) {
                if !ordered.iter().any(|r| std::ptr::eq(*r, region)) {
                    ordered.push(region);
                }
            }
        }
        for region in &self.regions {
            if !ordered.iter().any(|r| std::ptr::eq(*r, region)) {
                ordered.push(region);
            }
        }
        ordered
    }

    /// Flatten into words and lines, scaling coordinates by `scale_factor`.
    ///
    /// Lines without `Word`s are split at single spaces; every part gets the line's box.
    pub fn layout(&self, scale_factor: f64, normalizer: &UnicodeNormalizer) -> Result<LayoutPage> {
        let mut page = LayoutPage::default();

        for (region_idx, region) in self.ordered_regions().into_iter().enumerate() {
            for line in &region.lines {
                let line_bbox = bbox_from_points(&line.points, scale_factor)?;
                let conf = line.confs.iter().copied().reduce(f64::max);
                page.lines.push(LayoutLine { id: line.id.clone(), bbox: line_bbox, conf });
                let line_idx = page.lines.len() - 1;

                if line.words.is_empty() {
                    for text in &line.texts {
                        for part in text.split(' ').filter(|p| !p.is_empty()) {
                            page.words.push(LayoutWord {
                                region: region_idx,
                                line: line_idx,
                                text: normalizer.normalize(part),
                                bbox: line_bbox,
                            });
                        }
                    }
                    continue;
                }

                for word in &line.words {
                    let bbox = bbox_from_points(&word.points, scale_factor)?;
                    let text = word.text.as_deref().unwrap_or("");
                    if text.is_empty() {
                        warn!(line = %line.id, "Word without text");
                    }
                    page.words.push(LayoutWord {
                        region: region_idx,
                        line: line_idx,
                        text: normalizer.normalize(text),
                        bbox,
                    });
                }
            }
        }
        Ok(page)
    }
}

#[instrument(skip(path, normalizer), fields(path = %path.display()))]
pub fn read_page(path: &Path, scale_factor: f64, normalizer: &UnicodeNormalizer) -> Result<LayoutPage> {
    let xml = std::fs::read_to_string(path)?;
    let page = parse_page(&xml)?.layout(scale_factor, normalizer)?;
    debug!(lines = page.lines.len(), words = page.words.len(), "Extracted PAGE layout");
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<pc:PcGts xmlns:pc="http://schema.primaresearch.org/PAGE/gts/pagecontent/2019-07-15">
  <pc:Page imageFilename="page.tif" imageWidth="2000" imageHeight="3000">
    <pc:ReadingOrder>
      <pc:OrderedGroup id="ro">
        <pc:RegionRefIndexed index="1" regionRef="r1"/>
        <pc:RegionRefIndexed index="0" regionRef="r2"/>
      </pc:OrderedGroup>
    </pc:ReadingOrder>
    <pc:TextRegion id="r1">
      <pc:Coords points="0,0 100,0 100,100 0,100"/>
      <pc:TextLine id="r1_l1">
        <pc:Coords points="10,10 200,10 200,40 10,40"/>
        <pc:Word id="w1">
          <pc:Coords points="10,10 60,10 60,40 10,40"/>
          <pc:TextEquiv conf="0.8"><pc:Unicode>Zweiter</pc:Unicode></pc:TextEquiv>
          <pc:TextEquiv conf="0.1"><pc:Unicode>Zvveiter</pc:Unicode></pc:TextEquiv>
        </pc:Word>
        <pc:Word id="w2">
          <pc:Coords points="80,12 200,12 200,40 80,40"/>
          <pc:TextEquiv><pc:Unicode>Absatz&amp;Co</pc:Unicode></pc:TextEquiv>
        </pc:Word>
        <pc:TextEquiv conf="0.7"><pc:Unicode>Zweiter Absatz&amp;Co</pc:Unicode></pc:TextEquiv>
        <pc:TextEquiv conf="0.9"><pc:Unicode>Zweiter Absatz</pc:Unicode></pc:TextEquiv>
      </pc:TextLine>
    </pc:TextRegion>
    <pc:TextRegion id="r2">
      <pc:TextLine id="r2_l1">
        <pc:Coords points="10,300 400,300 400,340 10,340"/>
        <pc:TextEquiv><pc:Unicode>Erster Absatz</pc:Unicode></pc:TextEquiv>
      </pc:TextLine>
    </pc:TextRegion>
  </pc:Page>
</pc:PcGts>"#;

    #[test]
    fn test_parse_structure() {
        let doc = parse_page(PAGE).unwrap();
        assert_eq!(doc.regions.len(), 2);
        assert_eq!(doc.reading_order, vec!["r2", "r1"]);

        let line = &doc.regions[0].lines[0];
        assert_eq!(line.id, "r1_l1");
        assert_eq!(line.confs, vec![0.7, 0.9]);
        assert_eq!(line.texts.len(), 2);
        assert_eq!(line.words.len(), 2);
        assert_eq!(line.words[0].text.as_deref(), Some("Zweiter"));
        assert_eq!(line.words[1].text.as_deref(), Some("Absatz&Co"));
        assert_eq!(line.words[1].points, "80,12 200,12 200,40 80,40");
    }

    #[test]
    fn test_layout_follows_reading_order() {
        let page = parse_page(PAGE).unwrap().layout(1.0, &UnicodeNormalizer::new()).unwrap();
        let tokens: Vec<_> = page.token_rows(0).into_iter().map(|r| r.token).collect();
        assert_eq!(tokens, vec!["Erster", "Absatz", "Zweiter", "Absatz&Co"]);

        assert_eq!(page.lines[0].id, "r2_l1");
        assert_eq!(page.lines[1].conf, Some(0.9));
        // Split line text shares the line box.
        assert_eq!(page.words[0].bbox, page.lines[0].bbox);
    }

    #[test]
    fn test_scale_factor_applies_to_words_and_lines() {
        let page = parse_page(PAGE).unwrap().layout(0.5, &UnicodeNormalizer::new()).unwrap();
        let zweiter = page.words.iter().find(|w| w.text == "Zweiter").unwrap();
        assert_eq!(zweiter.bbox.left, 5);
        assert_eq!(zweiter.bbox.right, 30);
        assert_eq!(page.lines[1].bbox.right, 100);
    }

    #[test]
    fn test_document_order_without_reading_order() {
        let xml = r#"<PcGts><Page>
            <TextRegion id="a"><TextLine id="a1"><Coords points="0,0 10,10"/>
                <TextEquiv><Unicode>eins</Unicode></TextEquiv></TextLine></TextRegion>
            <TextRegion id="b"><TextLine id="b1"><Coords points="0,0 10,10"/>
                <TextEquiv><Unicode>zwei</Unicode></TextEquiv></TextLine></TextRegion>
        </Page></PcGts>"#;
        let doc = parse_page(xml).unwrap();
        let ids: Vec<_> = doc.ordered_regions().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_private_use_text_is_normalized() {
        let xml = "<PcGts><Page><TextRegion id=\"a\"><TextLine id=\"a1\"><Coords points=\"0,0 10,10\"/>\
                   <TextEquiv><Unicode>Ab\u{E000}c</Unicode></TextEquiv></TextLine></TextRegion></Page></PcGts>";
        let page = parse_page(xml).unwrap().layout(1.0, &UnicodeNormalizer::new()).unwrap();
        assert_eq!(page.words[0].text, "Abc");
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let xml = "<PcGts><Page><TextRegion id=\"a\"></Page>";
        assert!(matches!(parse_page(xml), Err(OcrTsvError::Xml(_))));
    }
}
