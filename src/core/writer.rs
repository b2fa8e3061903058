//! Field writer: puts the derived score into the story point field
//!
//! Avenues, tried in order:
//! 1. primary container, directly or through its edit button
//! 2. alternative selectors (placeholder → edit path, otherwise a direct input)
//! 3. any element showing the placeholder text, through the edit path
//!
//! The first avenue that commits or clicks an edit trigger decides the
//! outcome; a lost race is never retried through a later avenue.
//!
//! Clicking an edit button makes the host re-render, which invalidates every
//! handle. The writer therefore keeps an [`Anchor`] to re-find its scope and
//! polls for the control inside it until the edit timeout.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::{SelectorConfig, TimingConfig};
use crate::core::locator::Locator;
use crate::dom::{HostDocument, NodeId, Selector};
use crate::error::{Field, PipelineError};
use crate::types::{DerivedScore, HostEvent, WritePath};

const STORY_POINT_SCOPE: &str = r#"[data-testid*="story-point"]"#;
const CONTAINER_SCOPE: &str = r#"[data-testid*="container"]"#;
const PLAIN_INPUT: &str = "input";

/// How to find a scope again after the host re-rendered: the nearest
/// inclusive ancestor with a test id or id, then element-child steps down to
/// the scope.
#[derive(Debug, Clone)]
struct Anchor {
    /// `None` starts the walk at the document element
    base: Option<Selector>,
    /// Tag and element-child index of each step below `base`
    steps: Vec<(String, usize)>,
}

impl Anchor {
    fn selector(base: Selector) -> Self {
        Self {
            base: Some(base),
            steps: Vec::new(),
        }
    }

    /// Path to `node` from its nearest stably named ancestor
    fn of<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> Option<Self> {
        let mut steps = Vec::new();
        let mut current = node;
        let base = loop {
            if let Some(base) = stable_selector(doc, current) {
                break Some(base);
            }
            let Some(parent) = doc.parent(current) else {
                break None;
            };
            let index = doc.children(parent).iter().position(|child| *child == current)?;
            steps.push((doc.tag_name(current)?.to_string(), index));
            current = parent;
        };
        steps.reverse();
        Some(Self { base, steps })
    }

    /// The scope in the current render, if the path still leads to one
    fn resolve<D: HostDocument + ?Sized>(&self, doc: &D) -> Option<NodeId> {
        let mut node = match &self.base {
            Some(base) => doc.query(base)?,
            None => doc.elements().into_iter().find(|n| doc.parent(*n).is_none())?,
        };
        for (tag, index) in &self.steps {
            let child = doc.children(node).get(*index).copied()?;
            if doc.tag_name(child) != Some(tag.as_str()) {
                return None;
            }
            node = child;
        }
        Some(node)
    }
}

/// `[data-testid="…"]` or `[id="…"]` for a node that carries one
fn stable_selector<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> Option<Selector> {
    ["data-testid", "id"]
        .into_iter()
        .filter_map(|name| doc.attribute(node, name).map(|value| (name, value)))
        .filter(|(_, value)| !value.is_empty() && !value.contains('"'))
        .find_map(|(name, value)| Selector::parse(&format!(r#"[{}="{}"]"#, name, value)).ok())
}

/// Writes scores through the host's own form controls
#[derive(Debug, Clone)]
pub struct Writer {
    container: Option<Selector>,
    input: Option<Selector>,
    edit_button: Option<Selector>,
    generic_edit_button: Option<Selector>,
    alternatives: Locator,
    placeholder_text: String,
    edit_poll: Duration,
    edit_timeout: Duration,
}

/// Outcome of one avenue
enum Attempt {
    Committed(WritePath),
    /// Avenue does not apply to this page
    Skipped,
    RaceLost,
}

impl Writer {
    pub fn new(selectors: &SelectorConfig, timing: &TimingConfig) -> Self {
        Self {
            container: parse_or_warn(&selectors.target_container),
            input: parse_or_warn(&selectors.target_input),
            edit_button: parse_or_warn(&selectors.edit_button),
            generic_edit_button: parse_or_warn(&selectors.generic_edit_button),
            alternatives: Locator::new(selectors.alternative_targets.iter().cloned()),
            placeholder_text: selectors.placeholder_text.clone(),
            edit_poll: Duration::from_millis(timing.edit_poll_ms.max(1)),
            edit_timeout: Duration::from_millis(timing.edit_timeout_ms),
        }
    }

    /// Write `score` into the story point field
    pub async fn write<D>(
        &self,
        doc: &mut D,
        score: DerivedScore,
    ) -> Result<WritePath, PipelineError>
    where
        D: HostDocument + Send + ?Sized,
    {
        let value = score.to_string();

        for avenue in 0..3 {
            let attempt = match avenue {
                0 => self.write_primary(doc, &value).await,
                1 => self.write_alternative(doc, &value).await,
                _ => self.write_placeholder(doc, &value).await,
            };
            match attempt {
                Attempt::Committed(path) => {
                    info!(score = %value, path = %path, "story points written");
                    return Ok(path);
                }
                Attempt::RaceLost => {
                    let ms = self.edit_timeout.as_millis() as u64;
                    warn!(timeout_ms = ms, "edit view never appeared");
                    return Err(PipelineError::RaceLost(ms));
                }
                Attempt::Skipped => {}
            }
        }

        warn!("no story point field on the page");
        Err(PipelineError::NotFound(Field::StoryPoints))
    }

    async fn write_primary<D>(&self, doc: &mut D, value: &str) -> Attempt
    where
        D: HostDocument + Send + ?Sized,
    {
        let (Some(container_sel), Some(input_sel)) = (&self.container, &self.input) else {
            return Attempt::Skipped;
        };
        let Some(container) = doc.query(container_sel) else {
            debug!("primary container absent");
            return Attempt::Skipped;
        };
        if let Some(input) = doc.query_within(container, input_sel) {
            if commit(doc, input, value) {
                return Attempt::Committed(WritePath::Direct);
            }
            return Attempt::Skipped;
        }
        let button = self
            .edit_button
            .as_ref()
            .and_then(|selector| doc.query_within(container, selector));
        let Some(button) = button else {
            debug!("primary container has neither input nor edit button");
            return Attempt::Skipped;
        };
        let anchor = Anchor::selector(container_sel.clone());
        self.edit_then_set(doc, button, &anchor, value, WritePath::EditMode)
            .await
    }

    async fn write_alternative<D>(&self, doc: &mut D, value: &str) -> Attempt
    where
        D: HostDocument + Send + ?Sized,
    {
        for source in self.alternatives.candidates() {
            let Ok(selector) = Selector::parse(source) else {
                continue;
            };
            let Some(element) = doc.query(&selector) else {
                continue;
            };
            debug!(selector = %source, "alternative target matched");

            if doc.text_content(element).contains(&self.placeholder_text) {
                let scope =
                    self.placeholder_scope(doc, element, STORY_POINT_SCOPE, CONTAINER_SCOPE);
                let button = self.generic_button_in(doc, scope);
                if let (Some(button), Some(anchor)) = (button, Anchor::of(doc, scope)) {
                    let path = WritePath::AlternativeEditMode;
                    match self.edit_then_set(doc, button, &anchor, value, path).await {
                        Attempt::Skipped => {}
                        decided => return decided,
                    }
                }
            }

            if let Some(input) = direct_input(doc, element) {
                if commit(doc, input, value) {
                    return Attempt::Committed(WritePath::Alternative);
                }
            }
        }
        Attempt::Skipped
    }

    async fn write_placeholder<D>(&self, doc: &mut D, value: &str) -> Attempt
    where
        D: HostDocument + Send + ?Sized,
    {
        let Some(element) = innermost_with_text(doc, &self.placeholder_text) else {
            return Attempt::Skipped;
        };
        debug!("placeholder text found");
        let scope = self.placeholder_scope(doc, element, CONTAINER_SCOPE, STORY_POINT_SCOPE);
        let button = self.generic_button_in(doc, scope);
        let (Some(button), Some(anchor)) = (button, Anchor::of(doc, scope)) else {
            return Attempt::Skipped;
        };
        self.edit_then_set(doc, button, &anchor, value, WritePath::Placeholder)
            .await
    }

    /// Closest ancestor matching `first`, then `second`, then the parent
    fn placeholder_scope<D: HostDocument + ?Sized>(
        &self,
        doc: &D,
        element: NodeId,
        first: &str,
        second: &str,
    ) -> NodeId {
        [first, second]
            .into_iter()
            .filter_map(|source| Selector::parse(source).ok())
            .find_map(|selector| doc.closest(element, &selector))
            .or_else(|| doc.parent(element))
            .unwrap_or(element)
    }

    fn generic_button_in<D>(&self, doc: &D, scope: NodeId) -> Option<NodeId>
    where
        D: HostDocument + ?Sized,
    {
        self.generic_edit_button
            .as_ref()
            .and_then(|selector| doc.query_within(scope, selector))
    }

    /// Click the edit trigger, wait for the control under `anchor`, commit
    async fn edit_then_set<D>(
        &self,
        doc: &mut D,
        button: NodeId,
        anchor: &Anchor,
        value: &str,
        path: WritePath,
    ) -> Attempt
    where
        D: HostDocument + Send + ?Sized,
    {
        doc.click(button);
        debug!(path = %path, "edit trigger clicked");
        match self.await_control(doc, anchor).await {
            Some(input) if commit(doc, input, value) => Attempt::Committed(path),
            Some(_) => Attempt::Skipped,
            None => Attempt::RaceLost,
        }
    }

    /// Re-query until the control shows up or the timeout passes
    async fn await_control<D>(&self, doc: &mut D, anchor: &Anchor) -> Option<NodeId>
    where
        D: HostDocument + Send + ?Sized,
    {
        let input_sel = self.input.as_ref()?;
        let deadline = Instant::now() + self.edit_timeout;
        loop {
            doc.refresh();
            let found = anchor
                .resolve(doc)
                .and_then(|scope| doc.query_within(scope, input_sel));
            if found.is_some() {
                return found;
            }
            if Instant::now() >= deadline {
                return None;
            }
            sleep(self.edit_poll).await;
        }
    }
}

fn parse_or_warn(source: &str) -> Option<Selector> {
    match Selector::parse(source) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(selector = %source, error = %e, "writer selector ignored");
            None
        }
    }
}

/// The element itself when it is an input, else its first input
fn direct_input<D: HostDocument + ?Sized>(doc: &D, element: NodeId) -> Option<NodeId> {
    if doc.tag_name(element) == Some("input") {
        return Some(element);
    }
    let input = Selector::parse(PLAIN_INPUT).ok()?;
    doc.query_within(element, &input)
}

/// Deepest element whose text contains `text`, first in document order
fn innermost_with_text<D: HostDocument + ?Sized>(doc: &D, text: &str) -> Option<NodeId> {
    let contains = |node: NodeId| doc.text_content(node).contains(text);
    doc.elements()
        .into_iter()
        .find(|node| contains(*node) && !doc.children(*node).into_iter().any(contains))
}

/// Assign the value the way a user edit would, firing the bubbling
/// `input`, `change`, `blur` sequence
fn commit<D: HostDocument + ?Sized>(doc: &mut D, input: NodeId, value: &str) -> bool {
    if !doc.set_value(input, value) {
        return false;
    }
    for event in HostEvent::commit_sequence() {
        doc.dispatch_event(input, event);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{EditView, PageDocument};
    use crate::types::HostEventKind;

    const CONTAINER: &str = r#"data-testid="issue-field-number.ui.issue-field-story-point-estimate--container""#;

    fn writer(timeout_ms: u64) -> Writer {
        let timing = TimingConfig {
            edit_poll_ms: 10,
            edit_timeout_ms: timeout_ms,
            ..TimingConfig::default()
        };
        Writer::new(&SelectorConfig::default(), &timing)
    }

    fn score(v: f64) -> DerivedScore {
        DerivedScore::rounded(v)
    }

    fn input_value(doc: &PageDocument) -> Option<String> {
        let input = doc.query(&Selector::parse("input").unwrap())?;
        doc.control_value(input)
    }

    #[tokio::test]
    async fn test_direct_write() {
        let markup = format!(r#"<div {}><input type="number"></div>"#, CONTAINER);
        let mut doc = PageDocument::parse(&markup);
        let path = writer(100).write(&mut doc, score(0.63)).await.unwrap();
        assert_eq!(path, WritePath::Direct);
        assert_eq!(input_value(&doc).as_deref(), Some("0.63"));
        let kinds: Vec<_> = doc.events().iter().map(|e| e.event.kind).collect();
        assert_eq!(kinds, vec![HostEventKind::Input, HostEventKind::Change, HostEventKind::Blur]);
    }

    #[tokio::test]
    async fn test_edit_mode_within_timeout() {
        let view = format!(r#"<div {}><input type="text"></div>"#, CONTAINER);
        let mut doc = PageDocument::parse(&format!(
            r#"<div {}><span>Add story points</span><button aria-label="Edit Story Points">e</button></div>"#,
            CONTAINER
        ))
        .on_click_render(EditView {
            trigger: Selector::parse(r#"button[aria-label="Edit Story Points"]"#).unwrap(),
            markup: view,
            render_delay: Duration::from_millis(30),
        });
        let path = writer(500).write(&mut doc, score(2.0)).await.unwrap();
        assert_eq!(path, WritePath::EditMode);
        assert_eq!(doc.render_count(), 1);
        assert_eq!(input_value(&doc).as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_race_lost_when_render_is_late() {
        let mut doc = PageDocument::parse(&format!(
            r#"<div {}><button aria-label="Edit Story Points">e</button></div>"#,
            CONTAINER
        ))
        .on_click_render(EditView {
            trigger: Selector::parse("button").unwrap(),
            markup: format!(r#"<div {}><input type="number"></div>"#, CONTAINER),
            render_delay: Duration::from_secs(5),
        });
        let err = writer(40).write(&mut doc, score(1.0)).await.unwrap_err();
        assert_eq!(err, PipelineError::RaceLost(40));
        assert!(doc.events().is_empty());
    }

    #[tokio::test]
    async fn test_alternative_direct_input() {
        let mut doc =
            PageDocument::parse(r#"<div class="story-point-field"><input name="sp"></div>"#);
        let path = writer(100).write(&mut doc, score(1.41)).await.unwrap();
        assert_eq!(path, WritePath::Alternative);
        assert_eq!(input_value(&doc).as_deref(), Some("1.41"));
    }

    #[tokio::test]
    async fn test_alternative_placeholder_uses_edit_path() {
        let mut doc = PageDocument::parse(
            r#"<div data-testid="sp-story-point-wrapper">
                 <span data-testid="story-point-readview">Add story points</span>
                 <button aria-label="Edit field">e</button>
               </div>"#,
        )
        .on_click_render(EditView {
            trigger: Selector::parse(r#"button[aria-label*="Edit"]"#).unwrap(),
            markup: r#"<div data-testid="sp-story-point-wrapper"><input type="number"></div>"#
                .to_string(),
            render_delay: Duration::ZERO,
        });
        let path = writer(100).write(&mut doc, score(0.5)).await.unwrap();
        assert_eq!(path, WritePath::AlternativeEditMode);
        assert_eq!(input_value(&doc).as_deref(), Some("0.5"));
    }

    #[tokio::test]
    async fn test_placeholder_text_fallback() {
        let mut doc = PageDocument::parse(
            r#"<section data-testid="estimate-container">
                 <p>Add story points</p>
                 <button aria-label="Edit estimate">e</button>
               </section>"#,
        )
        .on_click_render(EditView {
            trigger: Selector::parse("button").unwrap(),
            markup: r#"<section data-testid="estimate-container"><input type="text"></section>"#
                .to_string(),
            render_delay: Duration::ZERO,
        });
        let path = writer(100).write(&mut doc, score(3.0)).await.unwrap();
        assert_eq!(path, WritePath::Placeholder);
        assert_eq!(input_value(&doc).as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_nothing_to_write_to() {
        let mut doc = PageDocument::parse("<p>Summary</p>");
        let err = writer(100).write(&mut doc, score(1.0)).await.unwrap_err();
        assert_eq!(err, PipelineError::NotFound(Field::StoryPoints));
    }

    #[tokio::test]
    async fn test_primary_race_lost_is_final() {
        // the container also matches the alternative and placeholder avenues
        let container = format!(
            r#"<div {}><span>Add story points</span><button aria-label="Edit Story Points">e</button></div>"#,
            CONTAINER
        );
        let mut doc = PageDocument::parse(&container).on_click_render(EditView {
            trigger: Selector::parse("button").unwrap(),
            markup: format!(r#"<div {}><input type="number"></div>"#, CONTAINER),
            render_delay: Duration::from_secs(5),
        });
        let err = writer(40).write(&mut doc, score(1.0)).await.unwrap_err();
        assert_eq!(err, PipelineError::RaceLost(40));
        assert_eq!(doc.click_count(), 1);
    }

    #[tokio::test]
    async fn test_primary_without_controls_falls_through() {
        let mut doc = PageDocument::parse(&format!(
            r#"<div {}><span>-</span></div><div class="story-point-field"><input name="sp"></div>"#,
            CONTAINER
        ));
        let path = writer(40).write(&mut doc, score(1.5)).await.unwrap();
        assert_eq!(path, WritePath::Alternative);
        assert_eq!(doc.click_count(), 0);
    }

    const UNANCHORED: &str = r#"
        <header><input name="search" type="text"></header>
        <main><div class="estimate">
          <span>Add story points</span><button aria-label="Edit estimate">e</button>
        </div></main>
    "#;

    fn named_value(doc: &PageDocument, source: &str) -> Option<String> {
        let node = doc.query(&Selector::parse(source).unwrap())?;
        doc.control_value(node)
    }

    #[tokio::test]
    async fn test_unanchored_scope_never_writes_elsewhere() {
        let mut doc = PageDocument::parse(UNANCHORED).on_click_render(EditView {
            trigger: Selector::parse("button").unwrap(),
            markup: r#"
                <header><input name="search" type="text"></header>
                <main><div class="estimate"><input type="number" name="estimate"></div></main>
            "#
            .to_string(),
            render_delay: Duration::ZERO,
        });
        let path = writer(100).write(&mut doc, score(2.23)).await.unwrap();
        assert_eq!(path, WritePath::Placeholder);
        assert_eq!(named_value(&doc, r#"input[name="estimate"]"#).as_deref(), Some("2.23"));
        assert_eq!(named_value(&doc, r#"input[name="search"]"#).as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_unanchored_scope_gone_is_race_lost() {
        let mut doc = PageDocument::parse(UNANCHORED).on_click_render(EditView {
            trigger: Selector::parse("button").unwrap(),
            markup: r#"
                <header><input name="search" type="text"></header>
                <main><p>Saving</p></main>
            "#
            .to_string(),
            render_delay: Duration::ZERO,
        });
        let err = writer(40).write(&mut doc, score(2.23)).await.unwrap_err();
        assert_eq!(err, PipelineError::RaceLost(40));
        assert!(doc.events().is_empty());
        assert_eq!(named_value(&doc, r#"input[name="search"]"#).as_deref(), Some(""));
    }

    #[test]
    fn test_anchor_prefers_test_id() {
        let doc = PageDocument::parse(r#"<div id="a" data-testid="b"><span></span></div><p></p>"#);
        let span = doc.query(&Selector::parse("span").unwrap()).unwrap();
        let anchor = Anchor::of(&doc, span).unwrap();
        assert_eq!(anchor.base.as_ref().map(|b| b.source()), Some(r#"[data-testid="b"]"#));
        assert_eq!(anchor.steps, vec![("span".to_string(), 0)]);
        assert_eq!(anchor.resolve(&doc), Some(span));
    }

    #[test]
    fn test_anchor_path_from_document_element() {
        let doc = PageDocument::parse("<div></div><p></p>");
        let p = doc.query(&Selector::parse("p").unwrap()).unwrap();
        let anchor = Anchor::of(&doc, p).unwrap();
        assert!(anchor.base.is_none());
        assert_eq!(anchor.steps, vec![("body".to_string(), 1), ("p".to_string(), 1)]);
        assert_eq!(anchor.resolve(&doc), Some(p));

        let reordered = PageDocument::parse("<div></div><div></div>");
        assert_eq!(anchor.resolve(&reordered), None);
    }
}
