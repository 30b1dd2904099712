//! Sentence bookkeeping on token tables: numbering and reconstruction of tagged sentences.

use ocrtsv_common::TokenRow;

use crate::client::{TaggedSentence, TaggedWord};
use crate::entity_types::{is_inside, sanitize_tag};

/// Rebuild classifier-style sentences from tags already present in a table.
///
/// A sentence starts at every row with position 0. Tags are sanitized; empty tokens (boundary rows)
/// carry no text and are left out, as are sentences that end up empty.
pub fn sentences_from_tags(rows: &[TokenRow]) -> Vec<TaggedSentence> {
    let mut sentences: Vec<TaggedSentence> = Vec::new();
    let mut current: TaggedSentence = Vec::new();

    for row in rows {
        if row.position == 0 && !current.is_empty() {
            sentences.push(std::mem::take(&mut current));
        }
        if row.token.is_empty() {
            continue;
        }
        current.push(TaggedWord::new(row.token.clone(), sanitize_tag(&row.ne_tag)));
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Renumber `No.` so that positions count up inside each sentence.
///
/// A row restarts the count when its token is empty, or when it is marked 0 in the input, the previous
/// input row was not, and it does not continue an entity (`I-` tag). Realigned tables, which are 0
/// everywhere, are therefore split at their boundary rows only.
pub fn renumber_sentence_positions(rows: &mut [TokenRow]) {
    let mut word_pos: u32 = 0;
    let mut prev_input: u32 = 0;

    for row in rows.iter_mut() {
        let restart = (prev_input != 0 && !is_inside(&row.ne_tag) && row.position == 0)
            || row.token.is_empty();
        if restart {
            word_pos = 0;
        }
        prev_input = row.position;
        row.position = word_pos;
        word_pos += 1;
    }
}

/// Positions of the non-boundary rows of a realigned table, counting from 0 after every boundary.
pub fn positions_from_breaks(realigned: &[TokenRow]) -> Vec<u32> {
    let mut positions = Vec::with_capacity(realigned.len());
    let mut next = 0;
    for row in realigned {
        if row.token.is_empty() {
            next = 0;
            continue;
        }
        positions.push(next);
        next += 1;
    }
    positions
}

/// Number of sentences: rows with position 0.
pub fn sentence_count(rows: &[TokenRow]) -> usize {
    rows.iter().filter(|r| r.position == 0).count()
}

/// Largest sentence position, 0 for an empty table.
pub fn max_sentence_position(rows: &[TokenRow]) -> u32 {
    rows.iter().map(|r| r.position).max().unwrap_or(0)
}
