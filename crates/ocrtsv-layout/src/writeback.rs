//! Write corrected line texts back into PAGE-XML.
//!
//! The document is streamed through unchanged except for the `TextLine`s that have a correction: their
//! own `TextEquiv`s are replaced by a single one holding the corrected text. Unless words are kept,
//! every `Word` of every line is removed, since its text no longer matches the line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tracing::{info, instrument};

use ocrtsv_common::Result;

use crate::page::{attribute, xml_err};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteBackStats {
    pub lines_corrected: usize,
    pub words_removed: usize,
}

struct OpenLine {
    prefix: String,
    correction: Option<String>,
    replaced: bool,
}

fn write_text_equiv<W: std::io::Write>(writer: &mut Writer<W>, prefix: &str, text: &str) -> Result<()> {
    let equiv = format!("{prefix}TextEquiv");
    let unicode = format!("{prefix}Unicode");
    writer.write_event(Event::Start(BytesStart::new(equiv.as_str()))).map_err(xml_err)?;
    writer.write_event(Event::Start(BytesStart::new(unicode.as_str()))).map_err(xml_err)?;
    writer.write_event(Event::Text(BytesText::new(text))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new(unicode.as_str()))).map_err(xml_err)?;
    writer.write_event(Event::End(BytesEnd::new(equiv.as_str()))).map_err(xml_err)?;
    Ok(())
}

fn flush<W: std::io::Write>(writer: &mut Writer<W>, pending: &mut Option<Event<'static>>) -> Result<()> {
    if let Some(ws) = pending.take() {
        writer.write_event(ws).map_err(xml_err)?;
    }
    Ok(())
}

/// Apply `corrections` (line id → text) to PAGE-XML content.
pub fn apply_corrections(
    xml: &str,
    corrections: &HashMap<String, String>,
    keep_words: bool,
) -> Result<(String, WriteBackStats)> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());
    let mut stats = WriteBackStats::default();

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut line: Option<OpenLine> = None;
    // Depth inside a dropped element; 0 when not dropping.
    let mut skip_level = 0usize;
    // Indentation before the next element, dropped along with a removed element.
    let mut pending_ws: Option<Event<'static>> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(xml_err)?;

        if skip_level > 0 {
            match event {
                Event::Start(_) => skip_level += 1,
                Event::End(_) => skip_level -= 1,
                Event::Eof => return Err(xml_err("document ends inside an element")),
                _ => {}
            }
            continue;
        }

        let is_start = matches!(event, Event::Start(_));
        match &event {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.local_name().as_ref().to_vec();
                let in_line = stack.last().is_some_and(|parent| parent == b"TextLine");

                if name == b"TextLine" && is_start {
                    let qname = e.name();
                    let prefix = &qname.as_ref()[..qname.as_ref().len() - name.len()];
                    let id = attribute(e, "id")?.unwrap_or_default();
                    line = Some(OpenLine {
                        prefix: String::from_utf8_lossy(prefix).into_owned(),
                        correction: corrections.get(&id).cloned(),
                        replaced: false,
                    });
                }

                let mut dropped = false;
                if in_line && name == b"Word" && !keep_words {
                    stats.words_removed += 1;
                    pending_ws = None;
                    dropped = true;
                } else if in_line && name == b"TextEquiv" {
                    if let Some(open) = line.as_mut().filter(|l| l.correction.is_some()) {
                        if open.replaced {
                            pending_ws = None;
                        } else {
                            flush(&mut writer, &mut pending_ws)?;
                            let text = open.correction.as_deref().unwrap_or_default();
                            write_text_equiv(&mut writer, &open.prefix, text)?;
                            open.replaced = true;
                            stats.lines_corrected += 1;
                        }
                        dropped = true;
                    }
                }

                if dropped {
                    if is_start {
                        skip_level = 1;
                    }
                    continue;
                }
                if is_start {
                    stack.push(name);
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"TextLine" {
                    if let Some(open) = line.take() {
                        if let (Some(text), false) = (open.correction.as_deref(), open.replaced) {
                            write_text_equiv(&mut writer, &open.prefix, text)?;
                            stats.lines_corrected += 1;
                        }
                    }
                }
                stack.pop();
            }
            Event::Text(t) if t.iter().all(u8::is_ascii_whitespace) => {
                flush(&mut writer, &mut pending_ws)?;
                pending_ws = Some(event.clone().into_owned());
                continue;
            }
            Event::Eof => break,
            _ => {}
        }

        flush(&mut writer, &mut pending_ws)?;
        writer.write_event(event).map_err(xml_err)?;
    }
    flush(&mut writer, &mut pending_ws)?;

    let out = String::from_utf8(writer.into_inner()).map_err(xml_err)?;
    Ok((out, stats))
}

/// `<stem>.corrected.xml` in the working directory.
pub fn default_output_path(page_file: &Path) -> PathBuf {
    let stem = page_file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    PathBuf::from(format!("{stem}.corrected.xml"))
}

#[instrument(skip(corrections), fields(corrections = corrections.len()))]
pub fn write_back(
    page_file: &Path,
    corrections: &HashMap<String, String>,
    output: &Path,
    keep_words: bool,
) -> Result<WriteBackStats> {
    let xml = std::fs::read_to_string(page_file)?;
    let (corrected, stats) = apply_corrections(&xml, corrections, keep_words)?;
    std::fs::write(output, corrected)?;
    info!(
        output = %output.display(),
        lines = stats.lines_corrected,
        words_removed = stats.words_removed,
        "Wrote corrected PAGE-XML"
    );
    Ok(stats)
}
