//! NER + NED pipeline over one document's token table.
//!
//! Both stages are optional and run strictly one after the other.

use tracing::info;

use ocrtsv_common::{OcrTsvError, Result, TokenRow};

use crate::client::{NerService, TaggedSentence};
use crate::ned::{CandidateMap, NedService};
use crate::realign::NerRealigner;
use crate::resolve::{NedOptions, NedResolver};
use crate::sentences::sentences_from_tags;

/// Result of running the pipeline on one document.
#[derive(Debug)]
pub struct PipelineOutput {
    pub rows: Vec<TokenRow>,
    /// Tagged sentences, from the classifier or rebuilt from existing tags.
    pub sentences: Vec<TaggedSentence>,
    /// Raw NED answer when disambiguation ran.
    pub candidates: Option<CandidateMap>,
}

pub struct EntityPipeline {
    ner: Option<NerRealigner<Box<dyn NerService>>>,
    ned: Option<NedResolver<Box<dyn NedService>>>,
    options: NedOptions,
}

impl EntityPipeline {
    pub fn new(
        ner: Option<Box<dyn NerService>>,
        ned: Option<Box<dyn NedService>>,
        options: NedOptions,
    ) -> Self {
        Self {
            ner: ner.map(NerRealigner::new),
            ned: ned.map(NedResolver::new),
            options,
        }
    }

    pub fn has_ner(&self) -> bool {
        self.ner.is_some()
    }

    pub fn has_ned(&self) -> bool {
        self.ned.is_some()
    }

    /// Tag (or reuse tags) and disambiguate an existing token table.
    ///
    /// Without a NER service the table must carry tags (`has_tags`); this is checked before any request.
    pub async fn find_entities(&self, rows: Vec<TokenRow>, has_tags: bool) -> Result<PipelineOutput> {
        let (rows, sentences) = match &self.ner {
            Some(realigner) => realigner.realign(&rows).await?,
            None if has_tags => {
                info!("Using NER tags already contained in the table");
                let sentences = sentences_from_tags(&rows);
                (rows, sentences)
            }
            None => {
                return Err(OcrTsvError::Config(
                    "either a NER endpoint or NE-TAG information in the input is required".to_string(),
                ))
            }
        };

        match &self.ned {
            Some(resolver) => {
                let (rows, candidates) = resolver.resolve(rows, &sentences, &self.options).await?;
                Ok(PipelineOutput { rows, sentences, candidates: Some(candidates) })
            }
            None => Ok(PipelineOutput { rows, sentences, candidates: None }),
        }
    }

    /// Tag a freshly extracted page. Nothing happens without a NER service; NED only runs after NER.
    pub async fn tag_page(&self, rows: Vec<TokenRow>) -> Result<Vec<TokenRow>> {
        if self.ner.is_none() {
            return Ok(rows);
        }
        Ok(self.find_entities(rows, false).await?.rows)
    }
}
