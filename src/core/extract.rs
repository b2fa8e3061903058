//! Field extraction: locate, read and normalize the three operands
//!
//! Each field tries its candidate list first and falls back to looser text
//! scans of the page. A match is only trusted once its value normalizes.

use tracing::{debug, warn};

use crate::config::SelectorConfig;
use crate::core::locator::{raw_value, Locator};
use crate::core::normalizer::{
    combine_durations, leading_number, parse_complexity, parse_duration, parse_priority,
    parse_time_summary,
};
use crate::dom::{HostDocument, NodeId, Selector};
use crate::error::{Field, PipelineError};
use crate::types::{ComplexityRating, FieldReading, Hours, PriorityLabel};

const COMPLEXITY_HEADING: &str = "h3";
const COMPLEXITY_CONTAINER: &str = r#"[data-testid*="customfield"]"#;
const COMPLEXITY_READVIEW: &str = r#"[data-testid*="number-readview"]"#;
const NUMBER_LIKE: &str = r#"[data-testid*="number"], [data-testid*="Number"], .number, .value"#;
const NUMBER_TEST_ID: &str = r#"[data-testid*="number"], [data-testid*="Number"]"#;
const PRIORITY_NEARBY: &str = "span, div, button";

/// Nearby priority text must be shorter than this
const PRIORITY_MAX_CHARS: usize = 20;

/// Reads a [`FieldReading`] from a document
#[derive(Debug, Clone)]
pub struct Extractor {
    logged: Locator,
    remaining: Locator,
    duration: Locator,
    duration_display: Option<Selector>,
    complexity: Locator,
    priority: Locator,
    priority_display: Option<Selector>,
}

impl Extractor {
    pub fn new(selectors: &SelectorConfig) -> Self {
        Self {
            logged: Locator::new(selectors.logged_time.iter().cloned()),
            remaining: Locator::new(selectors.remaining_time.iter().cloned()),
            duration: Locator::new(selectors.duration.iter().cloned()),
            duration_display: display_selector(&selectors.duration_display),
            complexity: Locator::new(selectors.complexity.iter().cloned()),
            priority: Locator::new(selectors.priority.iter().cloned()),
            priority_display: display_selector(&selectors.priority_display),
        }
    }

    /// Read all three fields; missing ones stay `None`
    pub fn read<D: HostDocument + ?Sized>(&self, doc: &D) -> FieldReading {
        FieldReading {
            duration: self.duration(doc).ok(),
            complexity: self.complexity(doc).ok(),
            priority: self.priority(doc),
        }
    }

    /// Time tracking total in hours
    pub fn duration<D: HostDocument + ?Sized>(&self, doc: &D) -> Result<Hours, PipelineError> {
        let logged = self.read_duration(doc, &self.logged);
        let remaining = self.read_duration(doc, &self.remaining);
        if let Ok(total) = combine_durations(logged, remaining) {
            debug!(hours = total.value(), "duration from logged and remaining time");
            return Ok(total);
        }

        let display = self.duration_display.as_ref();
        if let Some((located, hours)) = self.duration.locate_map(doc, |node| {
            raw_value(doc, node, display).and_then(|raw| parse_duration(&raw).ok())
        }) {
            debug!(selector = %located.selector, hours = hours.value(), "duration located");
            return Ok(hours);
        }

        if let Some(hours) = page_text(doc).as_deref().and_then(parse_time_summary) {
            debug!(hours = hours.value(), "duration from time tracking summary");
            return Ok(hours);
        }

        if self.duration.locate(doc).is_some() {
            Err(PipelineError::Unavailable(Field::Duration))
        } else {
            Err(PipelineError::NotFound(Field::Duration))
        }
    }

    fn read_duration<D: HostDocument + ?Sized>(&self, doc: &D, locator: &Locator) -> Option<Hours> {
        let located = locator.locate(doc)?;
        let raw = raw_value(doc, located.node, None)?;
        parse_duration(&raw).ok()
    }

    /// Complexity rating, only ever one of the seven allowed values
    pub fn complexity<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
    ) -> Result<ComplexityRating, PipelineError> {
        if let Some((located, rating)) = self.complexity.locate_map(doc, |node| {
            raw_value(doc, node, None).and_then(|raw| parse_complexity(&raw).ok())
        }) {
            debug!(selector = %located.selector, rating = rating.value(), "complexity located");
            return Ok(rating);
        }

        let fallback = complexity_under_heading(doc)
            .or_else(|| complexity_near_label(doc))
            .or_else(|| complexity_by_number_id(doc));
        if let Some(rating) = fallback {
            debug!(rating = rating.value(), "complexity from page scan");
            return Ok(rating);
        }

        if self.complexity.locate(doc).is_some() {
            Err(PipelineError::Unavailable(Field::Complexity))
        } else {
            Err(PipelineError::NotFound(Field::Complexity))
        }
    }

    /// Priority label, if the page shows one
    pub fn priority<D: HostDocument + ?Sized>(&self, doc: &D) -> Option<PriorityLabel> {
        let display = self.priority_display.as_ref();
        if let Some((located, label)) = self.priority.locate_map(doc, |node| {
            raw_value(doc, node, display).and_then(|raw| parse_priority(&raw))
        }) {
            debug!(selector = %located.selector, priority = %label, "priority located");
            return Some(label);
        }
        priority_near_label(doc)
    }
}

fn display_selector(source: &str) -> Option<Selector> {
    match Selector::parse(source) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(selector = %source, error = %e, "display selector ignored");
            None
        }
    }
}

fn static_selector(source: &'static str) -> Option<Selector> {
    Selector::parse(source).ok()
}

fn page_text<D: HostDocument + ?Sized>(doc: &D) -> Option<String> {
    doc.elements().first().map(|root| doc.text_content(*root))
}

fn rating_in<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> Option<ComplexityRating> {
    leading_number(&doc.text_content(node)).and_then(ComplexityRating::new)
}

/// Innermost elements whose text mentions `word` (case-insensitive)
fn innermost_mentions<D: HostDocument + ?Sized>(doc: &D, word: &str) -> Vec<NodeId> {
    let mentions = |node: NodeId| doc.text_content(node).to_lowercase().contains(word);
    doc.elements()
        .into_iter()
        .filter(|node| mentions(*node) && !doc.children(*node).into_iter().any(mentions))
        .collect()
}

/// `h3` "Complexity" heading → its custom field container → number read view
fn complexity_under_heading<D: HostDocument + ?Sized>(doc: &D) -> Option<ComplexityRating> {
    let heading = static_selector(COMPLEXITY_HEADING)?;
    let container = static_selector(COMPLEXITY_CONTAINER)?;
    let readview = static_selector(COMPLEXITY_READVIEW)?;
    doc.query_all(&heading)
        .into_iter()
        .filter(|h| doc.text_content(*h).contains("Complexity"))
        .filter_map(|h| doc.closest(h, &container))
        .filter_map(|c| doc.query_within(c, &readview))
        .find_map(|value| rating_in(doc, value))
}

/// A rating next to text that mentions complexity
fn complexity_near_label<D: HostDocument + ?Sized>(doc: &D) -> Option<ComplexityRating> {
    let number_like = static_selector(NUMBER_LIKE)?;
    innermost_mentions(doc, "complexity")
        .into_iter()
        .find_map(|label| {
            let parent = doc.parent(label)?;
            doc.query_all_within(parent, &number_like)
                .into_iter()
                .find_map(|n| rating_in(doc, n))
                .or_else(|| {
                    doc.children(parent)
                        .into_iter()
                        .filter(|sibling| *sibling != label)
                        .find_map(|sibling| rating_in(doc, sibling))
                })
        })
}

/// Any number test id showing a valid rating
fn complexity_by_number_id<D: HostDocument + ?Sized>(doc: &D) -> Option<ComplexityRating> {
    let numbers = static_selector(NUMBER_TEST_ID)?;
    doc.query_all(&numbers)
        .into_iter()
        .find_map(|n| rating_in(doc, n))
}

/// Short text next to a priority label
fn priority_near_label<D: HostDocument + ?Sized>(doc: &D) -> Option<PriorityLabel> {
    let nearby = static_selector(PRIORITY_NEARBY)?;
    let usable = |node: NodeId| {
        let text = doc.text_content(node);
        let text = text.trim();
        (!text.is_empty()
            && !text.to_lowercase().contains("priority")
            && text.chars().count() < PRIORITY_MAX_CHARS)
            .then(|| PriorityLabel::new(text))
    };
    innermost_mentions(doc, "priority").into_iter().find_map(|label| {
        let parent = doc.parent(label)?;
        doc.query_all_within(parent, &nearby)
            .into_iter()
            .find_map(usable)
            .or_else(|| {
                doc.children(parent)
                    .into_iter()
                    .filter(|sibling| *sibling != label)
                    .find_map(usable)
            })
    })
}
