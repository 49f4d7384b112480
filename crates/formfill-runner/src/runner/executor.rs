use crate::config::FieldType;
use crate::dom::{Document, NodeId};
use tracing::debug;

/// Values that check a checkbox or radio button. Anything else unchecks it.
const TRUTHY: &[&str] = &["true", "1", "on"];

pub fn is_truthy(value: &str) -> bool {
    TRUTHY.contains(&value)
}

/// Write `value` into `node` according to `field_type`.
///
/// Returns `false` without touching the node when the element cannot take
/// that kind of value.
pub fn apply_value(doc: &mut Document, node: NodeId, field_type: FieldType, value: &str) -> bool {
    match field_type {
        FieldType::Checkbox => {
            if !doc.is_checkable(node) {
                return false;
            }
            let checked = is_truthy(value);
            debug!("set checked={} on {:?}", checked, node);
            doc.set_checked(node, checked);
        }
        FieldType::Select => {
            if doc.tag_name(node) != Some("select") {
                return false;
            }
            if !doc.select_by_value(node, value) {
                debug!("no option with value {:?}; selection cleared", value);
            }
        }
        FieldType::Text | FieldType::Email | FieldType::Number | FieldType::Date => {
            if !doc.is_text_control(node) {
                return false;
            }
            doc.set_value(node, value);
        }
    }
    true
}

/// Let the page react to a programmatic change: `input`, then `change`.
pub fn notify(doc: &mut Document, node: NodeId) {
    doc.dispatch_event(node, "input");
    doc.dispatch_event(node, "change");
}

/// The form to submit: the one holding focus, else the first in the document.
pub fn submit_target(doc: &Document) -> Option<NodeId> {
    let focused = doc.active_element().and_then(|active| {
        if doc.tag_name(active) == Some("form") {
            Some(active)
        } else {
            doc.form_owner(active)
        }
    });
    focused.or_else(|| {
        doc.all_elements()
            .into_iter()
            .find(|n| doc.tag_name(*n) == Some("form"))
    })
}
