//! Element resolution: turn a loose hint into one form control.
//!
//! A hint may be a CSS selector, an exact attribute value, an input type, a
//! label's text or a fragment of any of these. Strategies run in a fixed order
//! and the first one that finds a control wins.

use crate::dom::{collapse_whitespace, Document, NodeId, Selector};
use tracing::debug;

/// Outcome of resolving a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(NodeId),
    NotFound,
}

impl Resolution {
    pub fn node(self) -> Option<NodeId> {
        match self {
            Resolution::Found(node) => Some(node),
            Resolution::NotFound => None,
        }
    }

    pub fn is_found(self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

/// Resolution strategies, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    LiteralSelector,
    ExactAttribute,
    InputKind,
    LabelExact,
    PartialAttribute,
    LabelPartial,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::LiteralSelector => "literal-selector",
            Strategy::ExactAttribute => "exact-attribute",
            Strategy::InputKind => "input-kind",
            Strategy::LabelExact => "label-exact",
            Strategy::PartialAttribute => "partial-attribute",
            Strategy::LabelPartial => "label-partial",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

type StrategyFn = fn(&Document, &str) -> Option<NodeId>;

const STRATEGIES: &[(Strategy, StrategyFn)] = &[
    (Strategy::LiteralSelector, by_literal_selector),
    (Strategy::ExactAttribute, by_exact_attribute),
    (Strategy::InputKind, by_input_kind),
    (Strategy::LabelExact, by_label_exact),
    (Strategy::PartialAttribute, by_partial_attribute),
    (Strategy::LabelPartial, by_label_partial),
];

const EXACT_ATTRIBUTES: &[&str] = &[
    "name",
    "id",
    "placeholder",
    "aria-label",
    "data-testid",
    "autocomplete",
];

const PARTIAL_ATTRIBUTES: &[&str] = &["placeholder", "aria-label", "name", "id"];

/// Resolve `hint` to a form control.
pub fn resolve(doc: &Document, hint: &str) -> Resolution {
    match resolve_with_strategy(doc, hint) {
        Some((node, _)) => Resolution::Found(node),
        None => Resolution::NotFound,
    }
}

/// Resolve `hint`, also reporting which strategy matched.
pub fn resolve_with_strategy(doc: &Document, hint: &str) -> Option<(NodeId, Strategy)> {
    let hint = hint.trim();
    if hint.is_empty() {
        return None;
    }
    STRATEGIES.iter().find_map(|(strategy, find)| {
        let node = find(doc, hint)?;
        debug!("hint {:?} resolved by {}", hint, strategy);
        Some((node, *strategy))
    })
}

/// `input`, `select` and `textarea` elements in document order.
fn controls(doc: &Document) -> impl Iterator<Item = NodeId> + '_ {
    doc.all_elements()
        .into_iter()
        .filter(move |n| doc.is_form_control(*n))
}

fn normalize(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

fn by_literal_selector(doc: &Document, hint: &str) -> Option<NodeId> {
    let selector = Selector::parse(hint).ok()?;
    controls(doc).find(|n| selector.matches(doc, *n))
}

fn by_exact_attribute(doc: &Document, hint: &str) -> Option<NodeId> {
    EXACT_ATTRIBUTES
        .iter()
        .find_map(|attr| controls(doc).find(|n| doc.attr(*n, attr) == Some(hint)))
}

fn by_input_kind(doc: &Document, hint: &str) -> Option<NodeId> {
    let is_kind = hint
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !is_kind {
        return None;
    }
    controls(doc).find(|n| {
        doc.tag_name(*n) == Some("input")
            && doc
                .attr(*n, "type")
                .is_some_and(|t| t.eq_ignore_ascii_case(hint))
    })
}

fn by_label_exact(doc: &Document, hint: &str) -> Option<NodeId> {
    let hint = normalize(hint);
    by_label(doc, |text| text == hint)
}

fn by_label_partial(doc: &Document, hint: &str) -> Option<NodeId> {
    let hint = normalize(hint);
    by_label(doc, |text| text.contains(&hint))
}

/// First control reached through a label whose normalized text satisfies
/// `accept`. Labels that lead nowhere are skipped.
fn by_label(doc: &Document, accept: impl Fn(&str) -> bool) -> Option<NodeId> {
    doc.all_elements()
        .into_iter()
        .filter(|n| doc.tag_name(*n) == Some("label"))
        .filter(|label| accept(&normalize(&doc.text_content(*label))))
        .find_map(|label| labelled_control(doc, label))
}

fn labelled_control(doc: &Document, label: NodeId) -> Option<NodeId> {
    if let Some(target) = doc.attr(label, "for").filter(|f| !f.is_empty()) {
        return doc
            .element_by_id(target)
            .filter(|n| doc.is_form_control(*n));
    }
    doc.descendants(label)
        .into_iter()
        .find(|n| doc.is_form_control(*n))
}

fn by_partial_attribute(doc: &Document, hint: &str) -> Option<NodeId> {
    let hint = normalize(hint);
    controls(doc).find(|n| {
        PARTIAL_ATTRIBUTES.iter().any(|attr| {
            doc.attr(*n, attr)
                .is_some_and(|v| v.to_lowercase().contains(&hint))
        })
    })
}
