//! Client for the external NED (entity disambiguation) service and its on-disk cache.
//!
//! Endpoints used:
//!   parse: POST {endpoint}/parse   body = tagged sentences        -> opaque parsed structure
//!   ned:   POST {endpoint}/ned?return_full=..&priority=..  body = parsed structure
//!          -> {"{surface}-{type}": {"ranking": [[id, {"wikidata": "Q..", "proba_1": 0.9, ..}], ..]}, ..}

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument};

use ocrtsv_common::{OcrTsvError, Result};

use crate::client::TaggedSentence;

/// Disambiguation can take very long for large pages.
pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(3_600_000);

/// Raw resolve response, keyed by `"{surface}-{type}"`.
pub type CandidateMap = serde_json::Map<String, Value>;

/// Candidate details as sent by the service. Only the fields used here are typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateInfo {
    pub wikidata: String,
    pub proba_1: f64,
}

/// One ranking entry: `[identifier, details]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate(pub String, pub CandidateInfo);

/// Ranked candidates stored under `key`, best first. `None` when the key or its ranking is absent.
pub fn ranking(map: &CandidateMap, key: &str) -> Result<Option<Vec<RankedCandidate>>> {
    match map.get(key).and_then(|entry| entry.get("ranking")) {
        Some(ranking) => Ok(Some(serde_json::from_value(ranking.clone())?)),
        None => Ok(None),
    }
}

#[async_trait]
pub trait NedService: Send + Sync {
    /// Turn tagged sentences into the service's internal representation.
    async fn parse(&self, sentences: &[TaggedSentence]) -> Result<Value>;

    /// Disambiguate a parsed page.
    async fn resolve(&self, parsed: &Value, return_full: bool, priority: Option<u32>) -> Result<CandidateMap>;
}

#[async_trait]
impl<T: NedService + ?Sized> NedService for Box<T> {
    async fn parse(&self, sentences: &[TaggedSentence]) -> Result<Value> {
        (**self).parse(sentences).await
    }

    async fn resolve(&self, parsed: &Value, return_full: bool, priority: Option<u32>) -> Result<CandidateMap> {
        (**self).resolve(parsed, return_full, priority).await
    }
}

/// HTTP client for a sbb_ned style REST service.
pub struct NedClient {
    endpoint: String,
    client: Client,
}

impl NedClient {
    pub fn new(endpoint: impl Into<String>, client: Client) -> Self {
        let endpoint: String = endpoint.into();
        Self { endpoint: endpoint.trim_end_matches('/').to_string(), client }
    }
}

#[async_trait]
impl NedService for NedClient {
    #[instrument(skip(self, sentences), fields(endpoint = %self.endpoint))]
    async fn parse(&self, sentences: &[TaggedSentence]) -> Result<Value> {
        let url = format!("{}/parse", self.endpoint);
        let resp = self.client.post(&url).json(sentences).send().await?;

        if !resp.status().is_success() {
            return Err(OcrTsvError::from_response(&url, resp).await);
        }

        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[instrument(skip(self, parsed), fields(endpoint = %self.endpoint))]
    async fn resolve(&self, parsed: &Value, return_full: bool, priority: Option<u32>) -> Result<CandidateMap> {
        let url = format!("{}/ned", self.endpoint);

        let mut params = vec![("return_full", return_full.to_string())];
        if let Some(priority) = priority {
            params.push(("priority", priority.to_string()));
        }

        let resp = self.client
            .post(&url)
            .query(&params)
            .json(parsed)
            .timeout(RESOLVE_TIMEOUT)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(OcrTsvError::from_response(&url, resp).await);
        }

        let bytes = resp.bytes().await?;
        let candidates: CandidateMap = serde_json::from_slice(&bytes)?;
        debug!(entities = candidates.len(), "NED service answered");
        Ok(candidates)
    }
}

/// Read a cached resolve response.
pub fn load_cache(path: &Path) -> Result<CandidateMap> {
    info!(path = %path.display(), "Loading NED result from cache");
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Store a resolve response, pretty-printed with two-space indentation.
pub fn store_cache(path: &Path, candidates: &CandidateMap) -> Result<()> {
    info!(path = %path.display(), entities = candidates.len(), "Writing NED result to cache");
    let json = serde_json::to_string_pretty(candidates)?;
    std::fs::write(path, json)?;
    Ok(())
}
