//! In-memory HTML document.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Form controls carry
//! live state (value, checkedness, option selection) separately from their
//! attributes, the way a browser separates properties from markup.

mod event;
mod parse;
mod selector;

pub use event::{Event, EventRecord, ListenerId};
pub use selector::{css_escape, Selector, SelectorError};

use event::ListenerStore;
use tracing::debug;

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(Element),
    Text(String),
    Comment,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug, Clone)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    value: String,
    checked: bool,
    selected: bool,
}

/// A state change made to a form control through the document API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlWrite {
    pub node: NodeId,
    pub change: ControlChange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlChange {
    Value(String),
    Checked(bool),
    /// Index of the selected option, `None` when nothing is selected.
    Selected(Option<usize>),
}

/// An HTML document with form state, focus and page-level event listeners.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    active: Option<NodeId>,
    listeners: ListenerStore,
    events: Vec<EventRecord>,
    submissions: Vec<NodeId>,
    journal: Vec<ControlWrite>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Input types that hold free text.
const NON_TEXT_INPUT_TYPES: &[&str] = &[
    "checkbox", "radio", "button", "submit", "reset", "image", "file",
];

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            active: None,
            listeners: ListenerStore::default(),
            events: Vec::new(),
            submissions: Vec::new(),
            journal: Vec::new(),
        }
    }

    /// Parse HTML. Parsing is forgiving and never fails.
    pub fn parse(html: &str) -> Self {
        let mut doc = Self::new();
        parse::parse_into(&mut doc, html);
        doc.initialize_controls();
        debug!("parsed document: {} nodes", doc.nodes.len());
        doc
    }

    /// The document node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// First element child of the document node (normally `<html>`).
    pub fn document_element(&self) -> Option<NodeId> {
        self.element_children(self.root()).into_iter().next()
    }

    // --- tree ---

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.node(id)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element(Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            value: String::new(),
            checked: false,
            selected: false,
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    pub(crate) fn create_comment(&mut self) -> NodeId {
        self.push_node(NodeKind::Comment)
    }

    /// Append `child` to `parent`, detaching it from its previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || self.node(parent).is_none() || self.node(child).is_none() {
            return;
        }
        if self.is_inclusive_ancestor(child, parent) {
            return;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Remove a node (and its subtree) from the tree.
    pub fn remove(&mut self, node: NodeId) {
        if self.active.is_some_and(|a| self.is_inclusive_ancestor(node, a)) {
            self.active = None;
        }
        self.detach(node);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.node(node).and_then(|n| n.parent) {
            self.nodes[parent.0].children.retain(|c| *c != node);
            self.nodes[node.0].parent = None;
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Whether the node is attached to the document.
    pub fn is_connected(&self, node: NodeId) -> bool {
        self.is_inclusive_ancestor(self.root(), node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }

    /// Parent, if it is an element.
    pub fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.parent(node).filter(|p| self.is_element(*p))
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    /// Elements below `node`, in document order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.is_element(id) {
                out.push(id);
            }
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Every connected element, in document order.
    pub fn all_elements(&self) -> Vec<NodeId> {
        self.descendants(self.root())
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        self.element(node).is_some()
    }

    /// Lowercase tag name.
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)?
            .attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.attr(node, name).is_some()
    }

    /// Attributes in source order.
    pub fn attrs(&self, node: NodeId) -> &[(String, String)] {
        self.element(node).map(|el| el.attrs.as_slice()).unwrap_or(&[])
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        if let Some(el) = self.element_mut(node) {
            match el.attrs.iter_mut().find(|(k, _)| *k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => el.attrs.push((name, value.to_string())),
            }
        }
    }

    pub fn remove_attr(&mut self, node: NodeId, name: &str) {
        if let Some(el) = self.element_mut(node) {
            el.attrs.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.node(node) else {
            return;
        };
        match &n.kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Comment => {}
            _ => {
                for child in &n.children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    /// 1-based position of `node` among its parent's children with the same
    /// tag, as used by `:nth-of-type`.
    pub fn index_of_type(&self, node: NodeId) -> usize {
        let tag = self.tag_name(node);
        let Some(parent) = self.parent(node) else {
            return 1;
        };
        self.element_children(parent)
            .into_iter()
            .filter(|s| self.tag_name(*s) == tag)
            .position(|s| s == node)
            .map_or(1, |i| i + 1)
    }

    /// Absolute selector for `node`, e.g.
    /// `html:nth-of-type(1) > body:nth-of-type(1) > input:nth-of-type(2)`.
    pub fn css_path(&self, node: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(node).filter(|n| self.is_element(*n));
        while let Some(id) = current {
            if let Some(tag) = self.tag_name(id) {
                parts.push(format!("{}:nth-of-type({})", tag, self.index_of_type(id)));
            }
            current = self.parent_element(id);
        }
        parts.reverse();
        parts.join(" > ")
    }

    /// First connected element whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.all_elements()
            .into_iter()
            .find(|n| self.attr(*n, "id") == Some(id))
    }

    // --- selectors ---

    /// First element matching a CSS selector, in document order.
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self
            .all_elements()
            .into_iter()
            .find(|n| selector.matches(self, *n)))
    }

    /// All elements matching a CSS selector, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.select(&selector))
    }

    /// All elements matching a parsed selector, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        self.all_elements()
            .into_iter()
            .filter(|n| selector.matches(self, *n))
            .collect()
    }

    /// Whether `node` matches a selector string.
    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool, SelectorError> {
        Ok(Selector::parse(selector)?.matches(self, node))
    }

    /// Nearest inclusive ancestor element matching the selector.
    pub fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut current = Some(node).filter(|n| self.is_element(*n));
        while let Some(id) = current {
            if selector.matches(self, id) {
                return Some(id);
            }
            current = self.parent_element(id);
        }
        None
    }

    // --- form controls ---

    /// `input`, `select` or `textarea`.
    pub fn is_form_control(&self, node: NodeId) -> bool {
        matches!(self.tag_name(node), Some("input" | "select" | "textarea"))
    }

    /// Lowercased `type` of an input, defaulting to `text`.
    pub fn input_type(&self, node: NodeId) -> Option<String> {
        if self.tag_name(node)? != "input" {
            return None;
        }
        Some(
            self.attr(node, "type")
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "text".to_string()),
        )
    }

    /// Checkbox or radio input.
    pub fn is_checkable(&self, node: NodeId) -> bool {
        matches!(self.input_type(node).as_deref(), Some("checkbox" | "radio"))
    }

    /// Single-line text-like input or textarea.
    pub fn is_text_control(&self, node: NodeId) -> bool {
        match self.tag_name(node) {
            Some("textarea") => true,
            Some("input") => self
                .input_type(node)
                .is_some_and(|t| !NON_TEXT_INPUT_TYPES.contains(&t.as_str())),
            _ => false,
        }
    }

    /// Current value of a control. Selects report their selected option.
    pub fn value(&self, node: NodeId) -> String {
        match self.tag_name(node) {
            Some("select") => self
                .selected_index(node)
                .and_then(|i| self.options(node).get(i).copied())
                .map(|opt| self.option_value(opt))
                .unwrap_or_default(),
            Some("option") => self.option_value(node),
            _ => self.element(node).map(|el| el.value.clone()).unwrap_or_default(),
        }
    }

    /// Set the value of an input or textarea; on a select, selects by value.
    pub fn set_value(&mut self, node: NodeId, value: &str) {
        if self.tag_name(node) == Some("select") {
            self.select_by_value(node, value);
            return;
        }
        if let Some(el) = self.element_mut(node) {
            el.value = value.to_string();
            self.journal.push(ControlWrite {
                node,
                change: ControlChange::Value(value.to_string()),
            });
        }
    }

    pub fn checked(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|el| el.checked)
    }

    /// Set checkedness. Checking a radio unchecks the rest of its group.
    pub fn set_checked(&mut self, node: NodeId, checked: bool) {
        if checked && self.input_type(node).as_deref() == Some("radio") {
            for other in self.radio_group(node) {
                if other != node {
                    if let Some(el) = self.element_mut(other) {
                        el.checked = false;
                    }
                }
            }
        }
        if let Some(el) = self.element_mut(node) {
            el.checked = checked;
            self.journal.push(ControlWrite {
                node,
                change: ControlChange::Checked(checked),
            });
        }
    }

    fn radio_group(&self, node: NodeId) -> Vec<NodeId> {
        let Some(name) = self.attr(node, "name").filter(|n| !n.is_empty()) else {
            return vec![node];
        };
        let owner = self.form_owner(node);
        self.all_elements()
            .into_iter()
            .filter(|n| {
                self.input_type(*n).as_deref() == Some("radio")
                    && self.attr(*n, "name") == Some(name)
                    && self.form_owner(*n) == owner
            })
            .collect()
    }

    /// Nearest ancestor `<form>`.
    pub fn form_owner(&self, node: NodeId) -> Option<NodeId> {
        let mut current = self.parent_element(node);
        while let Some(id) = current {
            if self.tag_name(id) == Some("form") {
                return Some(id);
            }
            current = self.parent_element(id);
        }
        None
    }

    /// `<option>` elements of a select, in document order.
    pub fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendants(select)
            .into_iter()
            .filter(|n| self.tag_name(*n) == Some("option"))
            .collect()
    }

    /// An option's `value` attribute, falling back to its collapsed text.
    pub fn option_value(&self, option: NodeId) -> String {
        match self.attr(option, "value") {
            Some(v) => v.to_string(),
            None => collapse_whitespace(&self.text_content(option)),
        }
    }

    pub fn selected_index(&self, select: NodeId) -> Option<usize> {
        self.options(select)
            .iter()
            .position(|opt| self.element(*opt).is_some_and(|el| el.selected))
    }

    /// Select the first option whose value equals `value`, deselecting the
    /// rest. With no matching option nothing stays selected. Returns whether
    /// an option matched.
    pub fn select_by_value(&mut self, select: NodeId, value: &str) -> bool {
        let options = self.options(select);
        let index = options.iter().position(|opt| self.option_value(*opt) == value);
        for (i, opt) in options.iter().enumerate() {
            if let Some(el) = self.element_mut(*opt) {
                el.selected = Some(i) == index;
            }
        }
        self.journal.push(ControlWrite {
            node: select,
            change: ControlChange::Selected(index),
        });
        index.is_some()
    }

    /// Drain the record of control writes made since the last call.
    pub fn take_journal(&mut self) -> Vec<ControlWrite> {
        std::mem::take(&mut self.journal)
    }

    fn initialize_controls(&mut self) {
        for node in self.all_elements() {
            match self.tag_name(node) {
                Some("input") => {
                    let value = self.attr(node, "value").unwrap_or_default().to_string();
                    let checked = self.has_attr(node, "checked");
                    if let Some(el) = self.element_mut(node) {
                        el.value = value;
                        el.checked = checked;
                    }
                }
                Some("textarea") => {
                    let text = self.text_content(node);
                    let text = text.strip_prefix('\n').unwrap_or(&text).to_string();
                    if let Some(el) = self.element_mut(node) {
                        el.value = text;
                    }
                }
                Some("select") => self.initialize_select(node),
                _ => {}
            }
        }
    }

    fn initialize_select(&mut self, select: NodeId) {
        let options = self.options(select);
        let multiple = self.has_attr(select, "multiple");
        let marked: Vec<usize> = options
            .iter()
            .enumerate()
            .filter(|(_, opt)| self.has_attr(**opt, "selected"))
            .map(|(i, _)| i)
            .collect();
        let chosen: Vec<usize> = if multiple {
            marked
        } else {
            // Single selects keep the last marked option, else the first one.
            match marked.last() {
                Some(last) => vec![*last],
                None if !options.is_empty() => vec![0],
                None => Vec::new(),
            }
        };
        for (i, opt) in options.iter().enumerate() {
            if let Some(el) = self.element_mut(*opt) {
                el.selected = chosen.contains(&i);
            }
        }
    }

    // --- focus ---

    pub fn active_element(&self) -> Option<NodeId> {
        self.active
    }

    pub fn focus(&mut self, node: NodeId) {
        if self.is_element(node) && self.is_connected(node) {
            self.active = Some(node);
        }
    }

    pub fn blur(&mut self) {
        self.active = None;
    }

    // --- events ---

    /// Register a page listener. It observes events dispatched at `node` and
    /// events bubbling up from its descendants.
    pub fn add_listener<F>(&mut self, node: NodeId, event_type: &str, callback: F) -> ListenerId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.listeners.add(node, event_type, Box::new(callback))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Dispatch a bubbling event at `target`.
    pub fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> EventRecord {
        let mut path = Vec::new();
        let mut current = Some(target);
        while let Some(id) = current {
            path.push(id);
            current = self.parent(id);
        }
        let delivered = self.listeners.deliver(event_type, target, &path);
        let record = EventRecord {
            event_type: event_type.to_string(),
            target,
            delivered,
        };
        self.events.push(record.clone());
        record
    }

    /// Every event dispatched so far, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        &self.events
    }

    /// How many times `event_type` was dispatched at `target`.
    pub fn event_count(&self, target: NodeId, event_type: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.target == target && e.event_type == event_type)
            .count()
    }

    /// Fire `submit` at a form and record the submission.
    pub fn request_submit(&mut self, form: NodeId) {
        if self.tag_name(form) != Some("form") {
            return;
        }
        self.dispatch_event(form, "submit");
        self.submissions.push(form);
    }

    /// Forms submitted so far.
    pub fn submissions(&self) -> &[NodeId] {
        &self.submissions
    }

    // --- serialization ---

    /// Serialize the document, reflecting current control state.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for child in self.children(self.root()) {
            self.write_html(*child, &mut out);
        }
        out
    }

    /// Serialize one node and its subtree.
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let Some(n) = self.node(node) else {
            return;
        };
        match &n.kind {
            NodeKind::Document => {
                for child in &n.children {
                    self.write_html(*child, out);
                }
            }
            NodeKind::Text(text) => {
                let raw = self
                    .parent(node)
                    .and_then(|p| self.tag_name(p))
                    .is_some_and(|t| matches!(t, "script" | "style"));
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            NodeKind::Comment => {}
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in self.serialized_attrs(node, el) {
                    out.push(' ');
                    out.push_str(&name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(&value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }
                if el.tag == "textarea" {
                    out.push_str(&escape_text(&el.value));
                } else {
                    for child in &n.children {
                        self.write_html(*child, out);
                    }
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }

    fn serialized_attrs(&self, node: NodeId, el: &Element) -> Vec<(String, String)> {
        let mut attrs: Vec<(String, String)> = el
            .attrs
            .iter()
            .filter(|(k, _)| match el.tag.as_str() {
                "input" => k != "value" && k != "checked",
                "option" => k != "selected",
                _ => true,
            })
            .cloned()
            .collect();
        match el.tag.as_str() {
            "input" if self.is_checkable(node) => {
                if let Some(v) = self.attr(node, "value") {
                    attrs.push(("value".into(), v.to_string()));
                }
                if el.checked {
                    attrs.push(("checked".into(), String::new()));
                }
            }
            "input" => {
                if !el.value.is_empty() {
                    attrs.push(("value".into(), el.value.clone()));
                }
            }
            "option" if el.selected => attrs.push(("selected".into(), String::new())),
            _ => {}
        }
        attrs
    }
}

/// Collapse whitespace runs to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
