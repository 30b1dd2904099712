//! Entity disambiguation: spans → NED candidates → `ID` / `conf` columns.

use std::path::PathBuf;

use tracing::{debug, info};

use ocrtsv_common::token::{format_float, UNSET};
use ocrtsv_common::{Result, TokenRow};

use crate::client::TaggedSentence;
use crate::ned::{load_cache, ranking, store_cache, CandidateMap, NedService, RankedCandidate};
use crate::span::{merge_spans, EntitySpan};

/// Per-document disambiguation settings.
#[derive(Debug, Clone, Default)]
pub struct NedOptions {
    /// Minimum `proba_1` of a candidate; `None` keeps all.
    pub threshold: Option<f64>,
    /// Forwarded to the service as `priority`.
    pub priority: Option<u32>,
    /// Cache file: read when it exists, written after a successful fetch otherwise.
    pub cache_path: Option<PathBuf>,
}

/// Keep the candidates at or above `threshold`, in ranking order.
///
/// Returns the `|`-joined identifiers and the `,`-joined probabilities, `-` for both when none pass.
pub fn select_candidates(ranking: &[RankedCandidate], threshold: Option<f64>) -> (String, String) {
    let kept: Vec<&RankedCandidate> = ranking
        .iter()
        .filter(|c| threshold.map_or(true, |t| c.1.proba_1 >= t))
        .collect();

    if kept.is_empty() {
        return (UNSET.to_string(), UNSET.to_string());
    }

    let ids = kept.iter().map(|c| c.1.wikidata.as_str()).collect::<Vec<_>>().join("|");
    let conf = kept.iter().map(|c| format_float(c.1.proba_1)).collect::<Vec<_>>().join(",");
    (ids, conf)
}

/// Write the selected candidates of every span onto all of its member rows.
///
/// Returns the number of spans that received identifiers.
pub fn annotate_spans(
    rows: &mut [TokenRow],
    spans: &[EntitySpan],
    candidates: &CandidateMap,
    threshold: Option<f64>,
) -> Result<usize> {
    let mut linked = 0;
    for span in spans {
        let key = span.lookup_key();
        let Some(ranking) = ranking(candidates, &key)? else {
            debug!(%key, "No candidates");
            continue;
        };

        let (ids, conf) = select_candidates(&ranking, threshold);
        if ids != UNSET {
            linked += 1;
        }
        for &member in &span.members {
            rows[member].id = ids.clone();
            rows[member].conf = conf.clone();
        }
    }
    Ok(linked)
}

/// Resolves entity spans of a token table against a NED service.
pub struct NedResolver<S> {
    service: S,
}

impl<S: NedService> NedResolver<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// Candidate map from the cache file, or from the service (parse, then resolve).
    pub async fn fetch_candidates(
        &self,
        sentences: &[TaggedSentence],
        options: &NedOptions,
    ) -> Result<CandidateMap> {
        if let Some(path) = options.cache_path.as_deref().filter(|p| p.exists()) {
            return load_cache(path);
        }

        info!(sentences = sentences.len(), "Requesting NED parse");
        let parsed = self.service.parse(sentences).await?;

        info!(priority = ?options.priority, "Requesting NED resolution");
        let candidates = self.service
            .resolve(&parsed, options.cache_path.is_some(), options.priority)
            .await?;

        if let Some(path) = options.cache_path.as_deref() {
            store_cache(path, &candidates)?;
        }
        Ok(candidates)
    }

    /// Annotate `rows` with NED identifiers. Every row starts out with `ID = -` and `conf = -`.
    pub async fn resolve(
        &self,
        mut rows: Vec<TokenRow>,
        sentences: &[TaggedSentence],
        options: &NedOptions,
    ) -> Result<(Vec<TokenRow>, CandidateMap)> {
        let candidates = self.fetch_candidates(sentences, options).await?;

        for row in rows.iter_mut() {
            row.id = UNSET.to_string();
            row.conf = UNSET.to_string();
        }

        let spans = merge_spans(&rows);
        let linked = annotate_spans(&mut rows, &spans, &candidates, options.threshold)?;
        info!(spans = spans.len(), linked, "NED annotation done");

        Ok((rows, candidates))
    }
}
