//! Merging of BIO-tagged token rows into entity spans.
//!
//! A single left-to-right scan. The scanner is either idle or inside a span of one type; an `O`, a
//! `B-` tag or a type change closes the open span before the current row is looked at again.

use ocrtsv_common::token::OUTSIDE;
use ocrtsv_common::TokenRow;

use crate::entity_types::{is_begin, sanitize_tag, tag_suffix, EntityType};

/// A maximal run of same-type entity rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySpan {
    pub entity_type: EntityType,
    /// Member tokens joined by single spaces.
    pub surface: String,
    /// Row indices of the members, ascending.
    pub members: Vec<usize>,
}

impl EntitySpan {
    /// Key of this span in the NED result map: `"{surface}-{type}"`.
    pub fn lookup_key(&self) -> String {
        format!("{}-{}", self.surface, self.entity_type.as_str())
    }
}

/// Accumulator of the span currently being built.
#[derive(Debug, Default)]
pub struct SpanState {
    open: bool,
    entity_type: Option<EntityType>,
    members: Vec<usize>,
    surface: String,
}

impl SpanState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Close the open span if `tag` cannot continue it. Returns the closed span.
    pub fn close_if_needed(&mut self, tag: &str) -> Option<EntitySpan> {
        if !self.open {
            return None;
        }
        let continues = tag != OUTSIDE
            && !is_begin(tag)
            && self.entity_type.map(|t| t.as_str()) == Some(tag_suffix(tag));
        if continues {
            return None;
        }

        let state = std::mem::take(self);
        state.entity_type.map(|entity_type| EntitySpan {
            entity_type,
            surface: state.surface,
            members: state.members,
        })
    }

    /// Open or extend the span with a non-`O` row.
    pub fn extend(&mut self, row: usize, tag: &str, token: &str) {
        let Some(entity_type) = EntityType::from_suffix(tag_suffix(tag)) else {
            return;
        };
        if self.open {
            self.surface.push(' ');
        }
        self.open = true;
        self.entity_type = Some(entity_type);
        self.surface.push_str(token);
        self.members.push(row);
    }

    /// Flush a span still open after the last row.
    pub fn finish(&mut self) -> Option<EntitySpan> {
        self.close_if_needed(OUTSIDE)
    }
}

/// Scan `rows` and return their entity spans in order.
///
/// Tags outside the vocabulary count as `O` here; the rows themselves are not changed.
pub fn merge_spans(rows: &[TokenRow]) -> Vec<EntitySpan> {
    let mut state = SpanState::new();
    let mut spans = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let tag = sanitize_tag(&row.ne_tag);

        if let Some(span) = state.close_if_needed(tag) {
            spans.push(span);
        }
        if tag != OUTSIDE {
            state.extend(idx, tag, &row.token);
        }
    }
    if let Some(span) = state.finish() {
        spans.push(span);
    }
    spans
}
