use super::executor;
use crate::config::{FieldRule, Preset};
use crate::dom::Document;
use crate::generate::GeneratorCatalog;
use crate::materialize::materialize;
use crate::resolver::resolve_with_strategy;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Fields processed between cooperative yields.
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Why a field was not filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    ElementNotFound,
    UnsupportedElementOrType,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::ElementNotFound => "element-not-found",
            FailureReason::UnsupportedElementOrType => "unsupported-element-or-type",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing one field rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionOutcome {
    pub field_id: String,
    pub matched: bool,
    pub locator_tried: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

impl InjectionOutcome {
    fn matched(rule: &FieldRule) -> Self {
        Self {
            field_id: rule.id.clone(),
            matched: true,
            locator_tried: rule.locator.clone(),
            failure_reason: None,
        }
    }

    fn failed(rule: &FieldRule, reason: FailureReason) -> Self {
        Self {
            field_id: rule.id.clone(),
            matched: false,
            locator_tried: rule.locator.clone(),
            failure_reason: Some(reason),
        }
    }
}

/// Applies a preset's field rules to a document.
#[derive(Debug, Clone)]
pub struct Injector {
    batch_size: usize,
    allow_batch_yield: bool,
}

impl Default for Injector {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            allow_batch_yield: true,
        }
    }
}

impl Injector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yield to the scheduler after every `size` fields. Zero is treated as one.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn allow_batch_yield(mut self, allow: bool) -> Self {
        self.allow_batch_yield = allow;
        self
    }

    /// Fill every field of `preset`, in order, returning one outcome per
    /// field. Submits the form afterwards when the preset asks for it.
    pub async fn inject(
        &self,
        doc: &mut Document,
        preset: &Preset,
        catalog: &dyn GeneratorCatalog,
    ) -> Vec<InjectionOutcome> {
        let mut outcomes = Vec::with_capacity(preset.fields.len());

        for (i, rule) in preset.fields.iter().enumerate() {
            outcomes.push(self.inject_field(doc, rule, catalog));

            if self.allow_batch_yield && (i + 1) % self.batch_size == 0 {
                tokio::task::yield_now().await;
            }
        }

        if preset.auto_submit {
            match executor::submit_target(doc) {
                Some(form) => {
                    debug!("submitting form {:?}", form);
                    doc.request_submit(form);
                }
                None => debug!("auto_submit: no form on page"),
            }
        }

        let matched = outcomes.iter().filter(|o| o.matched).count();
        info!(
            "preset '{}': {}/{} fields filled",
            preset.name,
            matched,
            outcomes.len()
        );
        outcomes
    }

    fn inject_field(
        &self,
        doc: &mut Document,
        rule: &FieldRule,
        catalog: &dyn GeneratorCatalog,
    ) -> InjectionOutcome {
        let Some((node, strategy)) = resolve_with_strategy(doc, &rule.locator) else {
            debug!("field '{}': nothing matches {:?}", rule.id, rule.locator);
            return InjectionOutcome::failed(rule, FailureReason::ElementNotFound);
        };

        let value = materialize(rule, catalog);
        if !executor::apply_value(doc, node, rule.field_type, &value) {
            debug!(
                "field '{}': {} value does not fit <{}>",
                rule.id,
                rule.field_type,
                doc.tag_name(node).unwrap_or_default()
            );
            return InjectionOutcome::failed(rule, FailureReason::UnsupportedElementOrType);
        }

        executor::notify(doc, node);
        debug!("field '{}': filled via {}", rule.id, strategy);
        InjectionOutcome::matched(rule)
    }
}
