//! BIO tag vocabulary and entity type classification.

use ocrtsv_common::token::OUTSIDE;

/// Tags understood by the disambiguation stage. Anything else is read as `O`.
pub const TAG_VOCABULARY: [&str; 7] = ["O", "B-PER", "I-PER", "B-LOC", "I-LOC", "B-ORG", "I-ORG"];

/// Entity types the NED service can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EntityType {
    Person,
    Location,
    Organization,
}

impl EntityType {
    /// Suffix used in BIO tags and NED lookup keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Person => "PER",
            EntityType::Location => "LOC",
            EntityType::Organization => "ORG",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "PER" => Some(EntityType::Person),
            "LOC" => Some(EntityType::Location),
            "ORG" => Some(EntityType::Organization),
            _ => None,
        }
    }
}

/// Map a tag outside of [`TAG_VOCABULARY`] to `O`.
///
/// The service side vocabulary may grow (e.g. `B-TODO`, `I-MISC`); those are not errors.
pub fn sanitize_tag(tag: &str) -> &str {
    if TAG_VOCABULARY.contains(&tag) {
        tag
    } else {
        OUTSIDE
    }
}

/// Type suffix of a BIO tag: `B-PER` -> `PER`. Empty for `O` and malformed tags.
pub fn tag_suffix(tag: &str) -> &str {
    tag.get(2..).unwrap_or("")
}

pub fn is_begin(tag: &str) -> bool {
    tag.starts_with("B-")
}

pub fn is_inside(tag: &str) -> bool {
    tag.starts_with("I-")
}
