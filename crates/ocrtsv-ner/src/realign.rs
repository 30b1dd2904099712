//! Realignment of a retokenized NER response onto the original OCR tokens.
//!
//! The classifier splits and merges tokens as it sees fit. Matching is therefore driven by characters,
//! not by token counts: for every original row subtokens are pulled from a [`SubtokenCursor`] and
//! concatenated until they spell the row's text. Each pulled subtoken becomes one output row.

use tracing::{debug, info};

use ocrtsv_common::token::{TokenRow, OUTSIDE, UNSET};
use ocrtsv_common::unicode::normalize;
use ocrtsv_common::{OcrTsvError, Result};

use crate::client::{NerService, TaggedSentence};

/// One element of the flattened classifier response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtoken {
    pub text: String,
    pub tag: String,
    pub sentence_break: bool,
}

/// Cursor over the classifier sentences, flattened into subtokens with a break after every sentence.
///
/// Subtokens that normalize to nothing (private-use glyphs only) are left out: an empty row would read
/// as a sentence boundary.
#[derive(Debug)]
pub struct SubtokenCursor {
    items: Vec<Subtoken>,
    index: usize,
}

impl SubtokenCursor {
    pub fn new(sentences: &[TaggedSentence]) -> Self {
        let mut items = Vec::new();
        for sentence in sentences {
            for word in sentence {
                let text = normalize(&word.word);
                if text.is_empty() {
                    continue;
                }
                items.push(Subtoken { text, tag: word.prediction.clone(), sentence_break: false });
            }
            items.push(Subtoken { text: String::new(), tag: String::new(), sentence_break: true });
        }
        Self { items, index: 0 }
    }

    /// Subtokens not yet pulled.
    pub fn remaining(&self) -> usize {
        self.items.len() - self.index
    }

    /// Pull the next subtoken. Running dry means the response covers less text than the page.
    pub fn pull(&mut self) -> Result<&Subtoken> {
        let item = self.items.get(self.index).ok_or_else(|| {
            OcrTsvError::Alignment(format!(
                "classifier output exhausted after {} subtokens",
                self.items.len()
            ))
        })?;
        self.index += 1;
        Ok(item)
    }
}

/// The text a row has to be spelled as: spaces removed, normalized.
fn alignment_target(token: &str) -> String {
    normalize(&token.replace(' ', ""))
}

fn aligned_row(sub: &Subtoken, origin: &TokenRow) -> TokenRow {
    if sub.sentence_break {
        return TokenRow::sentence_break(origin);
    }
    TokenRow {
        position: 0,
        token: sub.text.clone(),
        ne_tag: sub.tag.clone(),
        ne_emb: OUTSIDE.to_string(),
        id: UNSET.to_string(),
        url_id: origin.url_id,
        bbox: origin.bbox,
        conf: UNSET.to_string(),
    }
}

/// Map classifier sentences onto `rows`.
///
/// Every output row has position 0; sentence numbering is a separate pass
/// (see [`crate::sentences::renumber_sentence_positions`]).
pub fn realign(rows: &[TokenRow], sentences: &[TaggedSentence]) -> Result<Vec<TokenRow>> {
    let mut cursor = SubtokenCursor::new(sentences);
    let mut out = Vec::with_capacity(cursor.remaining());

    for (row_idx, row) in rows.iter().enumerate() {
        let target = alignment_target(&row.token);
        let target_len = target.chars().count();
        let mut acc = String::new();

        while acc != target {
            let sub = cursor.pull()?;
            acc.push_str(&sub.text);

            if acc.chars().count() > target_len || !target.starts_with(acc.as_str()) {
                return Err(OcrTsvError::Alignment(format!(
                    "row {row_idx}: classifier text {acc:?} does not match token {target:?}"
                )));
            }

            out.push(aligned_row(sub, row));
        }
    }

    // The break after the last sentence is only reached once every row is matched.
    if let Some(last) = rows.last() {
        while cursor.remaining() > 0 {
            let sub = cursor.pull()?;
            if !sub.text.is_empty() {
                return Err(OcrTsvError::Alignment(format!(
                    "classifier returned text {:?} beyond the end of the page",
                    sub.text
                )));
            }
            out.push(aligned_row(sub, last));
        }
    }

    debug!(input = rows.len(), output = out.len(), "Realigned tokens");
    Ok(out)
}

/// Tags a token table with an external classifier and realigns the answer.
pub struct NerRealigner<S> {
    service: S,
}

impl<S: NerService> NerRealigner<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Returns the realigned rows and the raw classifier sentences (needed for the NED parse call).
    pub async fn realign(&self, rows: &[TokenRow]) -> Result<(Vec<TokenRow>, Vec<TaggedSentence>)> {
        let text = rows.iter().map(|r| r.token.as_str()).collect::<Vec<_>>().join(" ");

        info!(rows = rows.len(), "Requesting NER tags");
        let sentences = self.service.tag(&text).await?;

        let realigned = realign(rows, &sentences)?;
        info!(sentences = sentences.len(), rows = realigned.len(), "NER tags aligned");
        Ok((realigned, sentences))
    }
}
