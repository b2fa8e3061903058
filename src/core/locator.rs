//! Locator: ranked candidate probing against a live document
//!
//! Candidates are re-parsed and re-queried on every call; the host may have
//! re-rendered since the last one.

use tracing::{debug, trace};

use crate::dom::{HostDocument, NodeId, Selector};

/// Element found by a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub node: NodeId,
    /// Position of the winning candidate in the list
    pub rank: usize,
    pub selector: String,
}

/// Ranked selector probe
#[derive(Debug, Clone, Default)]
pub struct Locator {
    candidates: Vec<String>,
}

impl Locator {
    pub fn new<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(candidate: impl Into<String>) -> Self {
        Self {
            candidates: vec![candidate.into()],
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// First element matched by the highest-ranked candidate
    pub fn locate<D: HostDocument + ?Sized>(&self, doc: &D) -> Option<Located> {
        self.locate_map(doc, |_| Some(())).map(|(located, _)| located)
    }

    /// Like [`locate`](Self::locate), but `accept` validates each candidate's
    /// first match and the search continues when it declines.
    pub fn locate_map<D, T, F>(&self, doc: &D, mut accept: F) -> Option<(Located, T)>
    where
        D: HostDocument + ?Sized,
        F: FnMut(NodeId) -> Option<T>,
    {
        for (rank, source) in self.candidates.iter().enumerate() {
            let selector = match Selector::parse(source) {
                Ok(selector) => selector,
                Err(e) => {
                    debug!(selector = %source, error = %e, "skipping malformed candidate");
                    continue;
                }
            };
            let Some(node) = doc.query(&selector) else {
                trace!(selector = %source, "no match");
                continue;
            };
            match accept(node) {
                Some(value) => {
                    trace!(selector = %source, rank, "candidate accepted");
                    let located = Located {
                        node,
                        rank,
                        selector: source.clone(),
                    };
                    return Some((located, value));
                }
                None => trace!(selector = %source, "match rejected"),
            }
        }
        None
    }
}

/// Raw value of a located element.
///
/// Form controls give their control state (a `select` falls back to the
/// selected option's text). Other elements prefer the text of a display child
/// matching `display`, then their own text.
pub fn raw_value<D: HostDocument + ?Sized>(
    doc: &D,
    node: NodeId,
    display: Option<&Selector>,
) -> Option<String> {
    let value = match doc.tag_name(node)? {
        "input" | "textarea" => doc.control_value(node),
        "select" => doc
            .control_value(node)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| selected_option_text(doc, node)),
        _ => {
            let source = display
                .and_then(|selector| doc.query_within(node, selector))
                .unwrap_or(node);
            Some(doc.text_content(source))
        }
    };
    value.map(|v| v.trim().to_string())
}

fn selected_option_text<D: HostDocument + ?Sized>(doc: &D, select: NodeId) -> Option<String> {
    let options: Vec<NodeId> = doc
        .descendants(select)
        .into_iter()
        .filter(|n| doc.tag_name(*n) == Some("option"))
        .collect();
    options
        .iter()
        .find(|n| doc.attribute(**n, "selected").is_some())
        .or_else(|| options.first())
        .map(|n| doc.text_content(*n))
}
