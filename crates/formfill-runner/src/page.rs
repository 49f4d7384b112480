//! A document plus the host-event routing that sits in front of it.

use crate::dom::{Document, NodeId};
use crate::picker::{Disposition, HostEvent, PickResult, Picker};
use tokio::sync::oneshot;
use tracing::debug;

struct PickSession {
    picker: Picker,
    reply: oneshot::Sender<PickResult>,
}

/// A loaded page. Host events go to an active pick first, then to the
/// document's own listeners.
pub struct Page {
    doc: Document,
    url: String,
    pick: Option<PickSession>,
}

impl Page {
    pub fn new(doc: Document) -> Self {
        Self {
            doc,
            url: "about:blank".to_string(),
            pick: None,
        }
    }

    pub fn from_html(html: &str) -> Self {
        Self::new(Document::parse(html))
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn is_picking(&self) -> bool {
        self.pick.is_some()
    }

    /// Start an interactive pick. The receiver resolves when the user clicks
    /// an element or presses Escape. A pick already in progress is cancelled
    /// and resolves with an empty hint.
    pub fn start_pick(&mut self) -> oneshot::Receiver<PickResult> {
        self.cancel_pick();
        let (reply, rx) = oneshot::channel();
        let mut picker = Picker::new();
        picker.begin(&mut self.doc);
        self.pick = Some(PickSession { picker, reply });
        rx
    }

    /// Cancel the active pick, if any.
    pub fn cancel_pick(&mut self) {
        if let Some(mut session) = self.pick.take() {
            debug!("cancelling active pick");
            session.picker.cancel(&mut self.doc);
            let _ = session.reply.send(PickResult::cancelled());
        }
    }

    /// Deliver a host event.
    pub fn dispatch_host_event(&mut self, event: HostEvent) -> Disposition {
        if let Some(session) = self.pick.as_mut() {
            let disposition = session.picker.handle(&mut self.doc, &event);
            if session.picker.state().is_terminal() {
                self.finish_pick();
            }
            if disposition == Disposition::Consumed {
                return disposition;
            }
        }

        match &event {
            HostEvent::PointerMove { target, .. } => {
                self.doc.dispatch_event(*target, "mousemove");
            }
            HostEvent::Click { target } => {
                if let Some(target) = self.click_target(*target) {
                    self.doc.dispatch_event(target, "click");
                }
            }
            HostEvent::KeyDown { .. } => {
                let target = self
                    .doc
                    .active_element()
                    .or_else(|| self.doc.document_element())
                    .unwrap_or_else(|| self.doc.root());
                self.doc.dispatch_event(target, "keydown");
            }
        }
        Disposition::PassThrough
    }

    fn click_target(&self, target: Option<NodeId>) -> Option<NodeId> {
        target.or_else(|| self.doc.document_element())
    }

    fn finish_pick(&mut self) {
        if let Some(session) = self.pick.take() {
            let result = session.picker.result().cloned().unwrap_or_default();
            // The requester may have gone away; the pick is still over.
            let _ = session.reply.send(result);
        }
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("url", &self.url)
            .field("picking", &self.pick.is_some())
            .finish_non_exhaustive()
    }
}
