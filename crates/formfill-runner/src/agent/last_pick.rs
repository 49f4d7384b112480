use crate::generate::suggest_generator;
use crate::picker::PickResult;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// How long a recorded pick stays readable.
pub const LAST_PICK_TTL_MS: i64 = 2 * 60 * 1000;

/// The most recent completed pick, tagged with the field it was made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPick {
    pub target: String,
    pub result: PickResult,
    /// Generator guessed from the picked element's label, or the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_generator: Option<String>,
    /// Unix time in milliseconds.
    pub timestamp: i64,
}

/// Shared slot holding at most one [`LastPick`]. Reading removes it.
#[derive(Debug, Clone, Default)]
pub struct LastPickStore {
    slot: Arc<Mutex<Option<LastPick>>>,
}

impl LastPickStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<LastPick>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn record(&self, target: impl Into<String>, result: PickResult) {
        self.record_at(target, result, now_millis());
    }

    pub fn record_at(&self, target: impl Into<String>, result: PickResult, timestamp: i64) {
        let target = target.into();
        let suggested_generator = result
            .suggested_label
            .as_deref()
            .and_then(suggest_generator)
            .or_else(|| suggest_generator(&target))
            .map(str::to_string);
        *self.slot() = Some(LastPick {
            target,
            result,
            suggested_generator,
            timestamp,
        });
    }

    /// Remove and return the record unless it has expired. Expired records
    /// are discarded either way.
    pub fn take(&self) -> Option<LastPick> {
        self.take_at(now_millis())
    }

    pub fn take_at(&self, now: i64) -> Option<LastPick> {
        let pick = self.slot().take()?;
        if now - pick.timestamp > LAST_PICK_TTL_MS {
            debug!("discarding stale pick for '{}'", pick.target);
            return None;
        }
        Some(pick)
    }

    pub fn is_empty(&self) -> bool {
        self.slot().is_none()
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
