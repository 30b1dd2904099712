//! End-to-end runs of the entity pipeline against in-process NER/NED services.
//!
//! Run with: cargo test --package ocrtsv-ner --test test_entity_pipeline

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use ocrtsv_common::{BoundingBox, OcrTsvError, Result, TokenRow};
use ocrtsv_ner::sentences::{renumber_sentence_positions, sentence_count};
use ocrtsv_ner::{
    CandidateMap, EntityPipeline, NedOptions, NedService, NerService, TaggedSentence, TaggedWord,
};

struct FakeNer {
    answer: Vec<TaggedSentence>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl NerService for FakeNer {
    async fn tag(&self, _text: &str) -> Result<Vec<TaggedSentence>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}

/// `(return_full, priority)` of every resolve request.
type ResolveArgs = Arc<Mutex<Vec<(bool, Option<u32>)>>>;

struct FakeNed {
    answer: CandidateMap,
    calls: Arc<AtomicUsize>,
    fail: bool,
    resolve_args: ResolveArgs,
}

impl FakeNed {
    fn new(calls: &Arc<AtomicUsize>, fail: bool) -> Self {
        Self { answer: ned_answer(), calls: calls.clone(), fail, resolve_args: ResolveArgs::default() }
    }
}

#[async_trait]
impl NedService for FakeNed {
    async fn parse(&self, sentences: &[TaggedSentence]) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OcrTsvError::Service {
                endpoint: "http://ned/parse".to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(serde_json::to_value(sentences)?)
    }

    async fn resolve(&self, _parsed: &Value, return_full: bool, priority: Option<u32>) -> Result<CandidateMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.resolve_args.lock().unwrap().push((return_full, priority));
        Ok(self.answer.clone())
    }
}

fn page(tokens: &[&str]) -> Vec<TokenRow> {
    tokens
        .iter()
        .enumerate()
        .map(|(i, t)| TokenRow::new(*t, 0, BoundingBox::new(i as i64 * 50, i as i64 * 50 + 40, 100, 120)))
        .collect()
}

fn ner_answer() -> Vec<TaggedSentence> {
    let words = [
        ("Karl", "B-PER"),
        ("Marx", "I-PER"),
        ("lebte", "O"),
        ("in", "O"),
        ("Trier", "B-LOC"),
        (".", "O"),
    ];
    vec![words.iter().map(|(w, p)| TaggedWord::new(*w, *p)).collect()]
}

fn ned_answer() -> CandidateMap {
    match json!({
        "Karl Marx-PER": {"ranking": [
            ["Karl Marx", {"wikidata": "Q9061", "proba_1": 0.97}],
            ["Karl Marx (Komponist)", {"wikidata": "Q1733427", "proba_1": 0.12}]
        ]},
        "Trier-LOC": {"ranking": [["Trier", {"wikidata": "Q3138", "proba_1": 1.0}]]}
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn pipeline_with_args(
    ner_calls: &Arc<AtomicUsize>,
    ned_calls: &Arc<AtomicUsize>,
    options: NedOptions,
) -> (EntityPipeline, ResolveArgs) {
    let ner = FakeNer { answer: ner_answer(), calls: ner_calls.clone() };
    let ned = FakeNed::new(ned_calls, false);
    let resolve_args = ned.resolve_args.clone();
    (EntityPipeline::new(Some(Box::new(ner)), Some(Box::new(ned)), options), resolve_args)
}

fn pipeline(
    ner_calls: &Arc<AtomicUsize>,
    ned_calls: &Arc<AtomicUsize>,
    options: NedOptions,
) -> EntityPipeline {
    pipeline_with_args(ner_calls, ned_calls, options).0
}

#[tokio::test]
async fn test_tag_and_link_page() {
    let ner_calls = Arc::new(AtomicUsize::new(0));
    let ned_calls = Arc::new(AtomicUsize::new(0));
    let options = NedOptions { threshold: Some(0.5), ..Default::default() };
    let (pipeline, resolve_args) = pipeline_with_args(&ner_calls, &ned_calls, options);

    let input = page(&["Karl", "Marx", "lebte", "in", "Trier."]);
    let output = pipeline.find_entities(input.clone(), false).await.unwrap();
    let mut rows = output.rows;

    let tokens: Vec<_> = rows.iter().map(|r| r.token.as_str()).collect();
    assert_eq!(tokens, vec!["Karl", "Marx", "lebte", "in", "Trier", ".", ""]);

    // Both halves of "Trier." keep the geometry of the original token.
    assert_eq!(rows[4].bbox, input[4].bbox);
    assert_eq!(rows[5].bbox, input[4].bbox);

    assert_eq!(rows[0].id, "Q9061");
    assert_eq!(rows[1].id, "Q9061");
    assert_eq!(rows[1].conf, "0.97");
    assert_eq!(rows[4].id, "Q3138");
    assert_eq!(rows[4].conf, "1.0");
    assert_eq!(rows[2].id, "-");
    assert_eq!(rows[6].conf, "-");

    assert_eq!(ner_calls.load(Ordering::SeqCst), 1);
    assert_eq!(ned_calls.load(Ordering::SeqCst), 2);
    assert!(output.candidates.is_some());
    // No cache file: the full answer is not requested.
    assert_eq!(*resolve_args.lock().unwrap(), vec![(false, None)]);

    renumber_sentence_positions(&mut rows);
    let positions: Vec<_> = rows.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3, 4, 5, 0]);
    assert_eq!(sentence_count(&rows), output.sentences.len() + 1);
}

#[tokio::test]
async fn test_concatenated_tokens_reproduce_input() {
    let ner_calls = Arc::new(AtomicUsize::new(0));
    let ned_calls = Arc::new(AtomicUsize::new(0));
    let pipeline = pipeline(&ner_calls, &ned_calls, NedOptions::default());

    let input = page(&["Karl", "Marx", "lebte", "in", "Trier."]);
    let output = pipeline.find_entities(input.clone(), false).await.unwrap();

    let original: String = input.iter().map(|r| r.token.as_str()).collect();
    let realigned: String = output.rows.iter().map(|r| r.token.as_str()).collect();
    assert_eq!(original, realigned);

    let breaks = output.rows.iter().filter(|r| r.token.is_empty()).count();
    assert_eq!(breaks, output.sentences.len());
}

#[tokio::test]
async fn test_cache_short_circuits_service() {
    let dir = tempfile::tempdir().unwrap();
    let cache = dir.path().join("page.ned.json");

    let ner_calls = Arc::new(AtomicUsize::new(0));
    let ned_calls = Arc::new(AtomicUsize::new(0));
    let options = NedOptions { cache_path: Some(cache.clone()), ..Default::default() };
    let (pipeline, resolve_args) = pipeline_with_args(&ner_calls, &ned_calls, options);

    let input = page(&["Karl", "Marx", "lebte", "in", "Trier."]);
    let first = pipeline.find_entities(input.clone(), false).await.unwrap();
    assert!(cache.exists());
    assert_eq!(ned_calls.load(Ordering::SeqCst), 2);
    assert_eq!(*resolve_args.lock().unwrap(), vec![(true, None)]);

    let second = pipeline.find_entities(input, false).await.unwrap();
    assert_eq!(ned_calls.load(Ordering::SeqCst), 2, "cached result must not hit the service");
    assert_eq!(first.rows, second.rows);
}

#[tokio::test]
async fn test_priority_reaches_service() {
    let ner_calls = Arc::new(AtomicUsize::new(0));
    let ned_calls = Arc::new(AtomicUsize::new(0));
    let options = NedOptions { priority: Some(3), ..Default::default() };
    let (pipeline, resolve_args) = pipeline_with_args(&ner_calls, &ned_calls, options);

    pipeline.find_entities(page(&["Karl", "Marx", "lebte", "in", "Trier."]), false).await.unwrap();
    assert_eq!(*resolve_args.lock().unwrap(), vec![(false, Some(3))]);
}

#[tokio::test]
async fn test_existing_tags_without_classifier() {
    let ned_calls = Arc::new(AtomicUsize::new(0));
    let ned = FakeNed::new(&ned_calls, false);
    let pipeline = EntityPipeline::new(None, Some(Box::new(ned)), NedOptions::default());

    let mut rows = page(&["Trier", "liegt", "an", "der", "Mosel"]);
    for (i, row) in rows.iter_mut().enumerate() {
        row.position = i as u32;
    }
    rows[0].ne_tag = "B-LOC".to_string();
    rows[4].ne_tag = "B-LOC".to_string();

    let output = pipeline.find_entities(rows, true).await.unwrap();
    assert_eq!(output.rows.len(), 5);
    assert_eq!(output.sentences.len(), 1);
    assert_eq!(output.rows[0].id, "Q3138");
    assert_eq!(output.rows[4].id, "-");
}

#[tokio::test]
async fn test_missing_tags_and_classifier_is_config_error() {
    let ned_calls = Arc::new(AtomicUsize::new(0));
    let ned = FakeNed::new(&ned_calls, false);
    let pipeline = EntityPipeline::new(None, Some(Box::new(ned)), NedOptions::default());

    let result = pipeline.find_entities(page(&["Trier"]), false).await;
    assert!(matches!(result, Err(OcrTsvError::Config(_))));
    assert_eq!(ned_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_service_error_propagates() {
    let ner_calls = Arc::new(AtomicUsize::new(0));
    let ned_calls = Arc::new(AtomicUsize::new(0));
    let ner = FakeNer { answer: ner_answer(), calls: ner_calls.clone() };
    let ned = FakeNed::new(&ned_calls, true);
    let pipeline = EntityPipeline::new(Some(Box::new(ner)), Some(Box::new(ned)), NedOptions::default());

    let result = pipeline.find_entities(page(&["Karl", "Marx", "lebte", "in", "Trier."]), false).await;
    assert!(matches!(result, Err(OcrTsvError::Service { status: 500, .. })));
}

#[tokio::test]
async fn test_mismatched_classifier_output_fails() {
    let ner_calls = Arc::new(AtomicUsize::new(0));
    let ner = FakeNer { answer: ner_answer(), calls: ner_calls.clone() };
    let pipeline = EntityPipeline::new(Some(Box::new(ner)), None, NedOptions::default());

    let result = pipeline.tag_page(page(&["Karl", "Engels"])).await;
    assert!(matches!(result, Err(OcrTsvError::Alignment(_))));
}

#[tokio::test]
async fn test_tag_page_without_classifier_is_identity() {
    let pipeline = EntityPipeline::new(None, None, NedOptions::default());
    let input = page(&["Karl", "Marx"]);
    assert_eq!(pipeline.tag_page(input.clone()).await.unwrap(), input);
}
