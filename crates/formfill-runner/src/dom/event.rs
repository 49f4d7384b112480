//! Page-level event listeners.

use std::fmt;

use super::NodeId;

/// An event as seen by a page listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event type, e.g. `"input"`, `"change"`, `"submit"`.
    pub event_type: String,
    /// Node the event was dispatched at.
    pub target: NodeId,
    /// Node whose listener is currently running.
    pub current_target: NodeId,
}

/// A completed dispatch, kept in the document's event log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub event_type: String,
    pub target: NodeId,
    /// Number of listeners that observed the event.
    pub delivered: usize,
}

/// Handle returned by [`Document::add_listener`](super::Document::add_listener).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Box<dyn FnMut(&Event) + Send>;

struct Listener {
    id: ListenerId,
    node: NodeId,
    event_type: String,
    callback: Callback,
}

#[derive(Default)]
pub(super) struct ListenerStore {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl ListenerStore {
    pub(super) fn add(&mut self, node: NodeId, event_type: &str, callback: Callback) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push(Listener {
            id,
            node,
            event_type: event_type.to_string(),
            callback,
        });
        id
    }

    pub(super) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Invoke listeners along `path` (target first, then ancestors).
    /// Returns how many listeners ran.
    pub(super) fn deliver(&mut self, event_type: &str, target: NodeId, path: &[NodeId]) -> usize {
        let mut delivered = 0;
        for &node in path {
            let event = Event {
                event_type: event_type.to_string(),
                target,
                current_target: node,
            };
            for listener in self
                .listeners
                .iter_mut()
                .filter(|l| l.node == node && l.event_type == event_type)
            {
                (listener.callback)(&event);
                delivered += 1;
            }
        }
        delivered
    }
}

impl fmt::Debug for ListenerStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerStore")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
