//! Client for the external NER service.
//!
//! The service receives the whole page as one string and answers with its own sentence splitting and
//! tokenization:
//!   POST {endpoint}  {"text": "..."}  ->  [[{"word": "...", "prediction": "B-PER"}, ...], ...]

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use ocrtsv_common::{OcrTsvError, Result};

/// One tagged subtoken of the classifier response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedWord {
    pub word: String,
    pub prediction: String,
}

impl TaggedWord {
    pub fn new(word: impl Into<String>, prediction: impl Into<String>) -> Self {
        Self { word: word.into(), prediction: prediction.into() }
    }
}

/// A sentence as returned by the classifier.
pub type TaggedSentence = Vec<TaggedWord>;

/// Anything that tags a text and returns classifier sentences.
#[async_trait]
pub trait NerService: Send + Sync {
    async fn tag(&self, text: &str) -> Result<Vec<TaggedSentence>>;
}

#[async_trait]
impl<T: NerService + ?Sized> NerService for Box<T> {
    async fn tag(&self, text: &str) -> Result<Vec<TaggedSentence>> {
        (**self).tag(text).await
    }
}

/// HTTP client for a sbb_ner style REST endpoint.
pub struct NerClient {
    endpoint: String,
    client: Client,
}

impl NerClient {
    pub fn new(endpoint: impl Into<String>, client: Client) -> Self {
        Self { endpoint: endpoint.into(), client }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl NerService for NerClient {
    #[instrument(skip(self, text), fields(endpoint = %self.endpoint, chars = text.len()))]
    async fn tag(&self, text: &str) -> Result<Vec<TaggedSentence>> {
        #[derive(Serialize)]
        struct NerRequest<'a> {
            text: &'a str,
        }

        let resp = self.client
            .post(&self.endpoint)
            .json(&NerRequest { text })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(OcrTsvError::from_response(&self.endpoint, resp).await);
        }

        let bytes = resp.bytes().await?;
        let sentences: Vec<TaggedSentence> = serde_json::from_slice(&bytes)?;
        debug!(sentences = sentences.len(), "NER service answered");
        Ok(sentences)
    }
}
