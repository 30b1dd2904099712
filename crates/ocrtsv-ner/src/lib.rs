//! NER realignment and entity disambiguation for OCR token tables.
//!
//! Talks to external NER and NED REST services and maps their answers back onto the original,
//! one-token-per-row OCR stream.

pub mod client;
pub mod entity_types;
pub mod ned;
pub mod pipeline;
pub mod realign;
pub mod resolve;
pub mod sentences;
pub mod span;

pub use client::{NerClient, NerService, TaggedSentence, TaggedWord};
pub use entity_types::{sanitize_tag, EntityType, TAG_VOCABULARY};
pub use ned::{CandidateMap, NedClient, NedService};
pub use pipeline::{EntityPipeline, PipelineOutput};
pub use realign::{realign, NerRealigner, SubtokenCursor};
pub use resolve::{NedOptions, NedResolver};
pub use span::{merge_spans, EntitySpan, SpanState};
