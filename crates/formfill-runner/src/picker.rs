//! Interactive element picker.
//!
//! While tracking, an overlay follows the element under the pointer. A click
//! commits that element and produces a locator hint that the resolver can
//! find again later; Escape gives up. The picker sees host events before the
//! page does and swallows the ones it acts on.

use crate::dom::{css_escape, Document, NodeId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marker attribute carried by the overlay element.
pub const OVERLAY_MARKER: &str = "data-formfill-overlay";

const OVERLAY_STYLE: &str = "position:fixed;pointer-events:none;z-index:2147483647;\
border:2px solid #2563eb;border-radius:6px;background:rgba(37,99,235,0.08);\
box-shadow:0 0 0 1px rgba(37,99,235,0.3)";

/// Outcome of a pick. An empty `locator_hint` means the user cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickResult {
    pub locator_hint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_label: Option<String>,
}

impl PickResult {
    pub fn cancelled() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.locator_hint.is_empty()
    }
}

/// Client rectangle of an element, as reported by the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// Input events delivered by the host environment.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    PointerMove { target: NodeId, rect: Rect },
    Click { target: Option<NodeId> },
    KeyDown { key: String },
}

/// Whether an event continues on to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Consumed,
    PassThrough,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickState {
    Idle,
    Tracking,
    Resolved,
    Cancelled,
}

impl PickState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PickState::Resolved | PickState::Cancelled)
    }
}

/// One pick interaction.
#[derive(Debug)]
pub struct Picker {
    state: PickState,
    overlay: Option<NodeId>,
    candidate: Option<NodeId>,
    result: Option<PickResult>,
}

impl Default for Picker {
    fn default() -> Self {
        Self::new()
    }
}

impl Picker {
    pub fn new() -> Self {
        Self {
            state: PickState::Idle,
            overlay: None,
            candidate: None,
            result: None,
        }
    }

    pub fn state(&self) -> PickState {
        self.state
    }

    /// The committed result, once terminal.
    pub fn result(&self) -> Option<&PickResult> {
        self.result.as_ref()
    }

    pub fn overlay(&self) -> Option<NodeId> {
        self.overlay
    }

    /// Install the overlay and start tracking. Only valid from `Idle`.
    pub fn begin(&mut self, doc: &mut Document) {
        if self.state != PickState::Idle {
            return;
        }
        let overlay = doc.create_element("div");
        doc.set_attr(overlay, OVERLAY_MARKER, "");
        doc.set_attr(overlay, "style", OVERLAY_STYLE);
        let host = doc.document_element().unwrap_or_else(|| doc.root());
        doc.append_child(host, overlay);
        self.overlay = Some(overlay);
        self.state = PickState::Tracking;
        debug!("pick started");
    }

    /// Route a host event. Returns whether the page should still see it.
    pub fn handle(&mut self, doc: &mut Document, event: &HostEvent) -> Disposition {
        match event {
            HostEvent::PointerMove { target, rect } => self.pointer_move(doc, *target, *rect),
            HostEvent::Click { target } => self.click(doc, *target),
            HostEvent::KeyDown { key } => self.key(doc, key),
        }
    }

    /// Follow the pointer. Never consumes the event.
    pub fn pointer_move(&mut self, doc: &mut Document, target: NodeId, rect: Rect) -> Disposition {
        if self.state != PickState::Tracking || !doc.is_element(target) {
            return Disposition::PassThrough;
        }
        self.candidate = Some(target);
        if let Some(overlay) = self.overlay {
            let style = format!(
                "{};top:{}px;left:{}px;width:{}px;height:{}px",
                OVERLAY_STYLE,
                rect.y.max(0.0),
                rect.x.max(0.0),
                rect.width.max(0.0),
                rect.height.max(0.0)
            );
            doc.set_attr(overlay, "style", &style);
        }
        Disposition::PassThrough
    }

    /// Commit `target`, or the last hovered element when the click has none.
    pub fn click(&mut self, doc: &mut Document, target: Option<NodeId>) -> Disposition {
        if self.state != PickState::Tracking {
            return Disposition::PassThrough;
        }
        let chosen = target
            .filter(|t| doc.is_element(*t) && Some(*t) != self.overlay)
            .or(self.candidate);
        match chosen {
            Some(node) => {
                let result = PickResult {
                    locator_hint: locator_hint(doc, node),
                    suggested_label: Some(suggested_label(doc, node)),
                };
                debug!("picked {:?}", result.locator_hint);
                self.finish(doc, PickState::Resolved, result);
            }
            None => self.finish(doc, PickState::Cancelled, PickResult::cancelled()),
        }
        Disposition::Consumed
    }

    /// Escape cancels; other keys reach the page.
    pub fn key(&mut self, doc: &mut Document, key: &str) -> Disposition {
        if self.state != PickState::Tracking || key != "Escape" {
            return Disposition::PassThrough;
        }
        debug!("pick cancelled");
        self.finish(doc, PickState::Cancelled, PickResult::cancelled());
        Disposition::Consumed
    }

    /// Abandon the pick from outside, e.g. when another pick replaces it.
    pub fn cancel(&mut self, doc: &mut Document) {
        match self.state {
            PickState::Idle => self.state = PickState::Cancelled,
            PickState::Tracking => self.finish(doc, PickState::Cancelled, PickResult::cancelled()),
            PickState::Resolved | PickState::Cancelled => {}
        }
        if self.result.is_none() {
            self.result = Some(PickResult::cancelled());
        }
    }

    fn finish(&mut self, doc: &mut Document, state: PickState, result: PickResult) {
        if let Some(overlay) = self.overlay.take() {
            doc.remove(overlay);
        }
        self.candidate = None;
        self.state = state;
        self.result = Some(result);
    }
}

fn control_attr<'a>(doc: &'a Document, node: NodeId, name: &str) -> Option<&'a str> {
    doc.attr(node, name).filter(|v| !v.is_empty())
}

/// A hint that re-resolves to `node`: a stable attribute on form controls,
/// else the element's position among same-tag siblings.
pub fn locator_hint(doc: &Document, node: NodeId) -> String {
    if doc.is_form_control(node) {
        if let Some(id) = control_attr(doc, node, "id") {
            return format!("#{}", css_escape(id));
        }
        for attr in ["name", "data-testid", "placeholder", "aria-label"] {
            if let Some(value) = control_attr(doc, node, attr) {
                return format!("[{}=\"{}\"]", attr, css_escape(value));
            }
        }
        if let Some(kind) = control_attr(doc, node, "type") {
            return format!("input[type=\"{}\"]", css_escape(kind));
        }
    }
    let tag = doc.tag_name(node).unwrap_or_default();
    if doc.parent_element(node).is_none() {
        return tag.to_string();
    }
    format!("{}:nth-of-type({})", tag, doc.index_of_type(node))
}

/// A human-readable name for `node`.
pub fn suggested_label(doc: &Document, node: NodeId) -> String {
    if doc.is_form_control(node) {
        for attr in ["aria-label", "placeholder", "name"] {
            if let Some(value) = control_attr(doc, node, attr) {
                return value.to_string();
            }
        }
    }
    doc.tag_name(node).unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;

    const PAGE: &str = r#"<html><body><form>
        <input id="user.name">
        <input name="email" placeholder="you@example.com">
        <select data-testid="plan"></select>
        <textarea placeholder="Say &quot;hi&quot;"></textarea>
        <input aria-label="Search">
        <input type="date">
        <input>
        <p>one</p><p id="second">two</p>
    </form></body></html>"#;

    fn nth_control(doc: &Document, n: usize) -> NodeId {
        doc.all_elements()
            .into_iter()
            .filter(|e| doc.is_form_control(*e))
            .nth(n)
            .unwrap()
    }

    #[test]
    fn test_locator_hints() {
        let doc = Document::parse(PAGE);
        let hints: Vec<String> = (0..7).map(|i| locator_hint(&doc, nth_control(&doc, i))).collect();
        assert_eq!(
            hints,
            [
                r"#user\.name",
                r#"[name="email"]"#,
                r#"[data-testid="plan"]"#,
                r#"[placeholder="Say\ \"hi\""]"#,
                r#"[aria-label="Search"]"#,
                r#"input[type="date"]"#,
                "input:nth-of-type(5)",
            ]
        );
        let second = doc.element_by_id("second").unwrap();
        assert_eq!(locator_hint(&doc, second), "p:nth-of-type(2)");
        let html = doc.document_element().unwrap();
        assert_eq!(locator_hint(&doc, html), "html");
    }

    #[test]
    fn test_locator_hints_re_resolve() {
        let doc = Document::parse(PAGE);
        for i in 0..7 {
            let node = nth_control(&doc, i);
            let hint = locator_hint(&doc, node);
            assert_eq!(resolve(&doc, &hint).node(), Some(node), "hint {}", hint);
        }
    }

    #[test]
    fn test_suggested_labels() {
        let doc = Document::parse(PAGE);
        assert_eq!(suggested_label(&doc, nth_control(&doc, 1)), "you@example.com");
        assert_eq!(suggested_label(&doc, nth_control(&doc, 2)), "select");
        assert_eq!(suggested_label(&doc, nth_control(&doc, 4)), "Search");
        let second = doc.element_by_id("second").unwrap();
        assert_eq!(suggested_label(&doc, second), "p");
    }

    #[test]
    fn test_overlay_lifecycle() {
        let mut doc = Document::parse(PAGE);
        let mut picker = Picker::new();
        picker.begin(&mut doc);
        assert_eq!(picker.state(), PickState::Tracking);
        let overlay = picker.overlay().unwrap();
        assert!(doc.has_attr(overlay, OVERLAY_MARKER));

        let target = nth_control(&doc, 1);
        let moved = picker.pointer_move(&mut doc, target, Rect::new(-5.0, 40.0, 120.0, -1.0));
        assert_eq!(moved, Disposition::PassThrough);
        let style = doc.attr(overlay, "style").unwrap();
        assert!(style.contains("top:40px;left:0px;width:120px;height:0px"));
        assert!(style.contains("pointer-events:none"));

        assert_eq!(picker.click(&mut doc, None), Disposition::Consumed);
        assert_eq!(picker.state(), PickState::Resolved);
        assert_eq!(picker.result().unwrap().locator_hint, r#"[name="email"]"#);
        assert!(!doc.is_connected(overlay));
    }

    #[test]
    fn test_escape_cancels_and_other_keys_pass() {
        let mut doc = Document::parse(PAGE);
        let mut picker = Picker::new();
        picker.begin(&mut doc);
        assert_eq!(picker.key(&mut doc, "a"), Disposition::PassThrough);
        assert_eq!(picker.key(&mut doc, "Escape"), Disposition::Consumed);
        assert_eq!(picker.state(), PickState::Cancelled);
        let result = picker.result().unwrap();
        assert!(result.is_cancelled());
        assert_eq!(result.suggested_label, None);

        let target = nth_control(&doc, 0);
        assert_eq!(picker.click(&mut doc, Some(target)), Disposition::PassThrough);
        assert_eq!(picker.state(), PickState::Cancelled);
        assert!(doc.query_selector("[data-formfill-overlay]").unwrap().is_none());
    }

    #[test]
    fn test_idle_picker_ignores_events() {
        let mut doc = Document::parse(PAGE);
        let mut picker = Picker::new();
        let target = nth_control(&doc, 0);
        assert_eq!(picker.click(&mut doc, Some(target)), Disposition::PassThrough);
        assert_eq!(picker.state(), PickState::Idle);
    }
}
