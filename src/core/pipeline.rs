//! One extract → derive → write cycle

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::derive::derive;
use crate::core::extract::Extractor;
use crate::core::writer::Writer;
use crate::dom::{HostDocument, Selector};
use crate::error::{Field, PipelineError};
use crate::types::{CycleOutput, DerivedScore, FieldReading, ReasonCode, Trigger};

/// Extraction, derivation and write-back for one page
#[derive(Debug, Clone)]
pub struct Pipeline {
    extractor: Extractor,
    writer: Writer,
    modal: Option<Selector>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        let modal = match Selector::parse(&config.selectors.modal) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!(error = %e, "modal selector ignored; modal guard disabled");
                None
            }
        };
        Self {
            extractor: Extractor::new(&config.selectors),
            writer: Writer::new(&config.selectors, &config.timing),
            modal,
        }
    }

    /// Is a time-logging modal showing?
    pub fn modal_open<D: HostDocument + ?Sized>(&self, doc: &D) -> bool {
        self.modal.as_ref().map_or(false, |modal| {
            doc.query_all(modal)
                .into_iter()
                .any(|node| doc.is_displayed(node))
        })
    }

    pub fn read<D: HostDocument + ?Sized>(&self, doc: &D) -> FieldReading {
        self.extractor.read(doc)
    }

    /// Full cycle: modal guard, extraction, derivation, write-back
    pub async fn run<D>(&self, doc: &mut D, trigger: Trigger) -> CycleOutput
    where
        D: HostDocument + Send + ?Sized,
    {
        if self.modal_open(doc) {
            debug!(%trigger, "modal open, cycle skipped");
            return CycleOutput::gated(trigger, ReasonCode::R301_MODAL_OPEN);
        }
        let reading = self.read(doc);
        self.complete(doc, trigger, reading).await
    }

    /// Derive and write from an already taken reading
    pub async fn complete<D>(
        &self,
        doc: &mut D,
        trigger: Trigger,
        reading: FieldReading,
    ) -> CycleOutput
    where
        D: HostDocument + Send + ?Sized,
    {
        let score = match score_for(&reading) {
            Ok(score) => score,
            Err(e) => {
                debug!(%trigger, error = %e, "nothing to derive");
                return CycleOutput::new(trigger, reading, e.reason());
            }
        };
        match self.writer.write(doc, score).await {
            Ok(path) => {
                info!(%trigger, points = %score, %path, "cycle committed");
                CycleOutput::new(trigger, reading, ReasonCode::R100_SCORE_COMMITTED)
                    .with_score(score)
                    .with_write_path(path)
            }
            Err(e) => {
                warn!(%trigger, points = %score, error = %e, "score not written");
                CycleOutput::new(trigger, reading, e.reason()).with_score(score)
            }
        }
    }
}

/// Score for a reading, or why there is none
pub fn score_for(reading: &FieldReading) -> Result<DerivedScore, PipelineError> {
    let hours = reading.duration.ok_or(PipelineError::Unavailable(Field::Duration))?;
    let complexity = reading
        .complexity
        .ok_or(PipelineError::Unavailable(Field::Complexity))?;
    Ok(derive(hours, complexity, reading.priority.as_ref()))
}

/// Derive without a page, for explicit values
pub fn evaluate(trigger: Trigger, reading: FieldReading) -> CycleOutput {
    match score_for(&reading) {
        Ok(score) => {
            CycleOutput::new(trigger, reading, ReasonCode::R101_SCORE_DERIVED).with_score(score)
        }
        Err(e) => CycleOutput::new(trigger, reading, e.reason()),
    }
}
