//! Host document abstraction and the in-memory page implementation

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node};
use serde::Serialize;
use tracing::{debug, trace};

use crate::dom::Selector;
use crate::types::HostEvent;

/// Handle to an element of the current render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// Read/write access to the host page
///
/// Only element nodes are ever handed out. Handles are valid until the host
/// re-renders; callers re-query after anything that may trigger a render.
pub trait HostDocument {
    /// Element nodes in document order
    fn elements(&self) -> Vec<NodeId>;

    /// Parent element
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child elements in order
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lowercase tag name, `None` for stale handles
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Concatenated text of the subtree
    fn text_content(&self, node: NodeId) -> String;

    /// Form control state: `input`/`textarea` value, selected `select` option
    fn control_value(&self, node: NodeId) -> Option<String>;

    /// Not hidden by `hidden`, `display: none` or `visibility: hidden`
    fn is_displayed(&self, node: NodeId) -> bool;

    fn matches(&self, node: NodeId, selector: &Selector) -> bool;

    /// Assign a form control value; false if `node` is not a control
    fn set_value(&mut self, node: NodeId, value: &str) -> bool;

    fn dispatch_event(&mut self, node: NodeId, event: HostEvent);

    fn click(&mut self, node: NodeId);

    /// Pick up any render the host finished since the last call
    fn refresh(&mut self) {}

    /// Address of the page, when known
    fn location(&self) -> Option<&str> {
        None
    }

    /// First element in document order matching `selector`
    fn query(&self, selector: &Selector) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|node| self.matches(*node, selector))
    }

    fn query_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.elements()
            .into_iter()
            .filter(|node| self.matches(*node, selector))
            .collect()
    }

    /// Descendant elements of `scope` in document order (excluding `scope`)
    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(scope).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).into_iter().rev());
        }
        out
    }

    fn query_within(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|node| self.matches(*node, selector))
    }

    fn query_all_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| self.matches(*node, selector))
            .collect()
    }

    /// Nearest inclusive ancestor matching `selector`
    fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.matches(candidate, selector) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }
}

/// Host reaction to clicking an edit trigger: the page re-renders into
/// `markup` once `render_delay` has passed.
#[derive(Debug, Clone)]
pub struct EditView {
    pub trigger: Selector,
    pub markup: String,
    pub render_delay: Duration,
}

#[derive(Debug, Clone)]
struct PendingRender {
    due: Instant,
    markup: String,
}

/// Event as observed on the page, with its propagation path
#[derive(Debug, Clone, Serialize)]
pub struct DispatchedEvent {
    /// Render the target belonged to
    pub render: u32,
    pub target: NodeId,
    pub event: HostEvent,
    /// Target first, then every ancestor the event reached
    pub path: Vec<NodeId>,
    /// Target's control value at dispatch time
    pub value: Option<String>,
}

const VOID_ELEMENTS: [&str; 8] = ["area", "br", "hr", "img", "input", "link", "meta", "source"];

/// In-memory page: the `scraper` tree of the current render plus the
/// control values assigned since, the event journal and simulated host
/// re-renders.
#[derive(Debug, Clone)]
pub struct PageDocument {
    url: Option<String>,
    html: Html,
    /// Element nodes of the render in document order; a `NodeId` indexes it
    order: Vec<ego_tree::NodeId>,
    handles: HashMap<ego_tree::NodeId, NodeId>,
    values: HashMap<NodeId, String>,
    render: u32,
    clicks: u32,
    events: Vec<DispatchedEvent>,
    edit_views: Vec<EditView>,
    pending: Option<PendingRender>,
}

impl PageDocument {
    /// Parse a full HTML document
    pub fn parse(markup: &str) -> Self {
        let mut doc = Self {
            url: None,
            html: Html::new_document(),
            order: Vec::new(),
            handles: HashMap::new(),
            values: HashMap::new(),
            render: 0,
            clicks: 0,
            events: Vec::new(),
            edit_views: Vec::new(),
            pending: None,
        };
        doc.load(markup);
        doc
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Navigate: later renders belong to `url`
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
    }

    /// Register a host re-render triggered by clicking a matching element
    pub fn on_click_render(mut self, view: EditView) -> Self {
        self.edit_views.push(view);
        self
    }

    /// Replace the page with new markup (a host re-render).
    /// Control values assigned before are dropped with the old tree.
    pub fn replace_markup(&mut self, markup: &str) {
        self.load(markup);
        self.render += 1;
        self.pending = None;
        debug!(render = self.render, elements = self.order.len(), "page re-rendered");
    }

    /// Number of re-renders since parsing
    pub fn render_count(&self) -> u32 {
        self.render
    }

    /// Clicks received since parsing, whether or not they triggered a render
    pub fn click_count(&self) -> u32 {
        self.clicks
    }

    /// Every event dispatched so far
    pub fn events(&self) -> &[DispatchedEvent] {
        &self.events
    }

    /// Serialize the current tree, including assigned control values
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_node(*self.html.root_element(), &mut out);
        out
    }

    fn load(&mut self, markup: &str) {
        self.html = Html::parse_document(markup);
        self.order = self
            .html
            .root_element()
            .descendent_elements()
            .map(|element| element.id())
            .collect();
        self.handles = self
            .order
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, NodeId(index)))
            .collect();
        self.values.clear();
    }

    fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        let id = *self.order.get(node.0)?;
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    fn handle(&self, element: ElementRef<'_>) -> Option<NodeId> {
        self.handles.get(&element.id()).copied()
    }

    fn selected_option(&self, select: NodeId) -> Option<NodeId> {
        let options: Vec<NodeId> = self
            .descendants(select)
            .into_iter()
            .filter(|n| self.tag_name(*n) == Some("option"))
            .collect();
        options
            .iter()
            .copied()
            .find(|n| self.attribute(*n, "selected").is_some())
            .or_else(|| options.first().copied())
    }

    fn option_value(&self, option: NodeId) -> String {
        self.attribute(option, "value")
            .map(str::to_string)
            .unwrap_or_else(|| self.text_content(option).trim().to_string())
    }

    fn is_control(&self, id: NodeId) -> bool {
        matches!(self.tag_name(id), Some("input" | "textarea" | "select"))
    }

    fn write_node(&self, node: NodeRef<'_, Node>, out: &mut String) {
        match node.value() {
            Node::Text(text) => out.push_str(&escape(text, false)),
            Node::Element(element) => {
                let tag = element.name();
                let assigned = self
                    .handles
                    .get(&node.id())
                    .and_then(|handle| self.values.get(handle));
                out.push('<');
                out.push_str(tag);
                for (name, value) in element.attrs() {
                    if tag == "input" && name == "value" && assigned.is_some() {
                        continue;
                    }
                    out.push_str(&format!(" {}=\"{}\"", name, escape(value, true)));
                }
                if tag == "input" {
                    if let Some(value) = assigned {
                        out.push_str(&format!(" value=\"{}\"", escape(value, true)));
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag) {
                    return;
                }
                match (tag, assigned) {
                    ("textarea", Some(value)) => out.push_str(&escape(value, false)),
                    _ => {
                        for child in node.children() {
                            self.write_node(child, out);
                        }
                    }
                }
                out.push_str(&format!("</{}>", tag));
            }
            Node::Document | Node::Fragment => {
                for child in node.children() {
                    self.write_node(child, out);
                }
            }
            _ => {}
        }
    }
}

impl HostDocument for PageDocument {
    fn elements(&self) -> Vec<NodeId> {
        (0..self.order.len()).map(NodeId).collect()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.element(node)?.parent().and_then(ElementRef::wrap)?;
        self.handle(parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.element(node)
            .map(|element| {
                element
                    .child_elements()
                    .filter_map(|child| self.handle(child))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.value().name())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?.value().attr(&name.to_ascii_lowercase())
    }

    fn text_content(&self, node: NodeId) -> String {
        self.element(node)
            .map(|element| element.text().collect())
            .unwrap_or_default()
    }

    fn control_value(&self, node: NodeId) -> Option<String> {
        let assigned = self.values.get(&node).cloned();
        match self.tag_name(node)? {
            "input" => assigned.or_else(|| {
                Some(self.attribute(node, "value").unwrap_or_default().to_string())
            }),
            "textarea" => assigned.or_else(|| Some(self.text_content(node))),
            "select" => assigned.or_else(|| {
                self.selected_option(node).map(|option| self.option_value(option))
            }),
            _ => None,
        }
    }

    fn is_displayed(&self, node: NodeId) -> bool {
        if self.element(node).is_none() {
            return false;
        }
        let mut current = Some(node);
        while let Some(id) = current {
            if self.attribute(id, "hidden").is_some() {
                return false;
            }
            if let Some(style) = self.attribute(id, "style") {
                let style: String = style
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase();
                if style.contains("display:none") || style.contains("visibility:hidden") {
                    return false;
                }
            }
            current = self.parent(id);
        }
        true
    }

    fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        self.element(node)
            .map_or(false, |element| selector.compiled().matches(&element))
    }

    fn query_within(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        let scope = self.element(scope)?;
        scope
            .select(selector.compiled())
            .find_map(|element| self.handle(element))
    }

    fn query_all_within(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.element(scope)
            .map(|scope| {
                scope
                    .select(selector.compiled())
                    .filter_map(|element| self.handle(element))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> bool {
        if !self.is_control(node) {
            return false;
        }
        self.values.insert(node, value.to_string());
        trace!(?node, value, "control value assigned");
        true
    }

    fn dispatch_event(&mut self, node: NodeId, event: HostEvent) {
        if self.tag_name(node).is_none() {
            return;
        }
        let mut path = vec![node];
        if event.bubbles {
            let mut current = self.parent(node);
            while let Some(ancestor) = current {
                path.push(ancestor);
                current = self.parent(ancestor);
            }
        }
        let value = self.control_value(node);
        trace!(?node, kind = %event.kind, reached = path.len(), "event dispatched");
        self.events.push(DispatchedEvent {
            render: self.render,
            target: node,
            event,
            path,
            value,
        });
    }

    fn click(&mut self, node: NodeId) {
        self.clicks += 1;
        let reaction = self
            .edit_views
            .iter()
            .find(|view| self.matches(node, &view.trigger))
            .cloned();
        let Some(view) = reaction else {
            debug!(?node, "click had no effect");
            return;
        };
        if view.render_delay.is_zero() {
            self.replace_markup(&view.markup);
        } else {
            debug!(delay_ms = view.render_delay.as_millis() as u64, "edit view render scheduled");
            self.pending = Some(PendingRender {
                due: Instant::now() + view.render_delay,
                markup: view.markup,
            });
        }
    }

    fn location(&self) -> Option<&str> {
        self.url.as_deref()
    }

    fn refresh(&mut self) {
        let due = self
            .pending
            .as_ref()
            .map_or(false, |pending| pending.due <= Instant::now());
        if due {
            if let Some(pending) = self.pending.take() {
                self.replace_markup(&pending.markup);
            }
        }
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HostEventKind;

    const PAGE: &str = r#"
        <div data-testid="issue-field-number.ui.issue-field-story-point-estimate--container">
          <span>Add story points</span>
          <button aria-label="Edit Story Points">✎</button>
        </div>
        <select name="complexity">
          <option value="0.1">Trivial</option>
          <option value="1.5" selected>Hard</option>
        </select>
        <div data-testid="log-time-modal" style="display: none"><input name="time-spent"></div>
    "#;

    const EDIT_PAGE: &str = r#"
        <div data-testid="issue-field-number.ui.issue-field-story-point-estimate--container">
          <input type="number" value="">
        </div>
    "#;

    fn sel(source: &str) -> Selector {
        Selector::parse(source).unwrap()
    }

    #[test]
    fn test_text_and_attributes() {
        let doc = PageDocument::parse(PAGE);
        let button = doc.query(&sel("button")).unwrap();
        assert_eq!(doc.attribute(button, "aria-label"), Some("Edit Story Points"));
        assert_eq!(doc.text_content(button), "✎");
        assert_eq!(doc.tag_name(button), Some("button"));
    }

    #[test]
    fn test_select_value_uses_selected_option() {
        let doc = PageDocument::parse(PAGE);
        let select = doc.query(&sel("select")).unwrap();
        assert_eq!(doc.control_value(select), Some("1.5".to_string()));
    }

    #[test]
    fn test_hidden_ancestor_is_not_displayed() {
        let doc = PageDocument::parse(PAGE);
        let modal = doc.query(&sel(r#"[data-testid*="log-time-modal"]"#)).unwrap();
        let input = doc.query_within(modal, &sel("input")).unwrap();
        assert!(!doc.is_displayed(modal));
        assert!(!doc.is_displayed(input));
        let button = doc.query(&sel("button")).unwrap();
        assert!(doc.is_displayed(button));
    }

    #[test]
    fn test_set_value_only_on_controls() {
        let mut doc = PageDocument::parse(PAGE);
        let button = doc.query(&sel("button")).unwrap();
        assert!(!doc.set_value(button, "1"));
        let select = doc.query(&sel("select")).unwrap();
        assert!(doc.set_value(select, "0.1"));
        assert_eq!(doc.control_value(select), Some("0.1".to_string()));
    }

    #[test]
    fn test_bubbling_event_reaches_root() {
        let mut doc = PageDocument::parse(EDIT_PAGE);
        let input = doc.query(&sel("input")).unwrap();
        doc.set_value(input, "0.63");
        doc.dispatch_event(input, HostEvent::bubbling(HostEventKind::Input));

        let event = &doc.events()[0];
        assert_eq!(event.target, input);
        assert_eq!(event.value.as_deref(), Some("0.63"));
        assert_eq!(event.path.first(), Some(&input));
        assert_eq!(doc.tag_name(*event.path.last().unwrap()), Some("html"));
    }

    #[test]
    fn test_click_renders_edit_view_immediately_without_delay() {
        let mut doc = PageDocument::parse(PAGE).on_click_render(EditView {
            trigger: sel(r#"button[aria-label="Edit Story Points"]"#),
            markup: EDIT_PAGE.to_string(),
            render_delay: Duration::ZERO,
        });
        let button = doc.query(&sel("button")).unwrap();
        doc.click(button);
        assert_eq!(doc.render_count(), 1);
        assert!(doc.query(&sel(r#"input[type="number"]"#)).is_some());
    }

    #[test]
    fn test_delayed_render_applies_on_refresh() {
        let mut doc = PageDocument::parse(PAGE).on_click_render(EditView {
            trigger: sel("button"),
            markup: EDIT_PAGE.to_string(),
            render_delay: Duration::from_millis(20),
        });
        let button = doc.query(&sel("button")).unwrap();
        doc.click(button);
        doc.refresh();
        assert_eq!(doc.render_count(), 0);

        std::thread::sleep(Duration::from_millis(30));
        doc.refresh();
        assert_eq!(doc.render_count(), 1);
    }

    #[test]
    fn test_to_html_carries_assigned_value() {
        let mut doc = PageDocument::parse(EDIT_PAGE);
        let input = doc.query(&sel("input")).unwrap();
        doc.set_value(input, "2.23");
        let html = doc.to_html();
        assert!(html.contains(r#"value="2.23""#), "{}", html);
        assert!(!html.contains(r#"value="""#));
    }

    #[test]
    fn test_closest_includes_self() {
        let doc = PageDocument::parse(PAGE);
        let span = doc.query(&sel("span")).unwrap();
        let container = doc.closest(span, &sel(r#"[data-testid*="container"]"#)).unwrap();
        assert_eq!(doc.closest(container, &sel("div")), Some(container));
    }
}
