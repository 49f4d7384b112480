use crate::dom::{Document, NodeId};
use crate::runner::InjectionOutcome;
use tracing::debug;

/// Id of the panel's host element. Its presence is the panel's open state.
pub const PANEL_ID: &str = "formfill-panel";

const PANEL_STYLE: &str = "position:fixed;right:16px;bottom:16px;z-index:2147483647;\
width:300px;font-family:Inter,system-ui,sans-serif";

/// Opens and closes the floating panel. Holds no state of its own; the
/// document is asked every time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanelController;

impl PanelController {
    pub fn new() -> Self {
        Self
    }

    pub fn is_open(&self, doc: &Document) -> bool {
        doc.element_by_id(PANEL_ID).is_some()
    }

    /// Mount the panel. Returns false when it was already mounted.
    pub fn open(&self, doc: &mut Document) -> bool {
        if self.is_open(doc) {
            debug!("panel already open");
            return false;
        }

        let host = doc.create_element("div");
        doc.set_attr(host, "id", PANEL_ID);
        doc.set_attr(host, "style", PANEL_STYLE);

        let header = doc.create_element("h2");
        let title = doc.create_text("formfill");
        doc.append_child(header, title);
        doc.append_child(host, header);

        for class in ["status", "results"] {
            let tag = if class == "status" { "p" } else { "ul" };
            let el = doc.create_element(tag);
            doc.set_attr(el, "class", class);
            doc.append_child(host, el);
        }

        let parent = doc.document_element().unwrap_or_else(|| doc.root());
        doc.append_child(parent, host);
        debug!("panel opened");
        true
    }

    /// Unmount the panel. Returns false when it was not mounted.
    pub fn close(&self, doc: &mut Document) -> bool {
        match doc.element_by_id(PANEL_ID) {
            Some(host) => {
                doc.remove(host);
                true
            }
            None => false,
        }
    }

    /// List injection outcomes in an open panel. Does nothing when closed.
    pub fn show_results(&self, doc: &mut Document, outcomes: &[InjectionOutcome]) {
        let Some(host) = doc.element_by_id(PANEL_ID) else {
            return;
        };
        let Some(status) = self.part(doc, host, "status") else {
            return;
        };
        let Some(list) = self.part(doc, host, "results") else {
            return;
        };

        let matched = outcomes.iter().filter(|o| o.matched).count();
        clear(doc, status);
        let summary = doc.create_text(&format!("{}/{} fields filled", matched, outcomes.len()));
        doc.append_child(status, summary);

        clear(doc, list);
        for outcome in outcomes {
            let line = match outcome.failure_reason {
                None => format!("OK {}", outcome.locator_tried),
                Some(reason) => format!("NG {} ({})", outcome.locator_tried, reason),
            };
            let item = doc.create_element("li");
            doc.set_attr(item, "class", if outcome.matched { "ok" } else { "ng" });
            let text = doc.create_text(&line);
            doc.append_child(item, text);
            doc.append_child(list, item);
        }
    }

    fn part(&self, doc: &Document, host: NodeId, class: &str) -> Option<NodeId> {
        doc.element_children(host)
            .into_iter()
            .find(|c| doc.attr(*c, "class") == Some(class))
    }
}

fn clear(doc: &mut Document, node: NodeId) {
    for child in doc.children(node).to_vec() {
        doc.remove(child);
    }
}
