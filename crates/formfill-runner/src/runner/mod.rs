mod executor;
mod injector;
mod live;

pub use executor::is_truthy;
pub use injector::{FailureReason, InjectionOutcome, Injector, DEFAULT_BATCH_SIZE};
pub use live::{BrowserOptions, LiveSession};

use crate::config::Preset;
use crate::dom::Document;
use crate::generate::{FakeCatalog, GeneratorCatalog};
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Result of running a preset against a page.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// One outcome per field, in preset order.
    pub outcomes: Vec<InjectionOutcome>,
    /// Whether a form was submitted.
    pub submitted: bool,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RunResult {
    /// Every field found a control and took its value.
    pub fn success(&self) -> bool {
        self.outcomes.iter().all(|o| o.matched)
    }

    pub fn matched(&self) -> usize {
        self.outcomes.iter().filter(|o| o.matched).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.matched()
    }
}

/// Runs presets against an in-memory document or a live browser page.
#[derive(Clone)]
pub struct Runner {
    injector: Injector,
    catalog: Arc<dyn GeneratorCatalog>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// A runner using the built-in random catalog.
    pub fn new() -> Self {
        Self::with_catalog(Arc::new(FakeCatalog))
    }

    pub fn with_catalog(catalog: Arc<dyn GeneratorCatalog>) -> Self {
        Self {
            injector: Injector::default(),
            catalog,
        }
    }

    pub fn injector(mut self, injector: Injector) -> Self {
        self.injector = injector;
        self
    }

    pub fn catalog(&self) -> &dyn GeneratorCatalog {
        self.catalog.as_ref()
    }

    /// Fill `preset` into `doc`.
    pub async fn run(&self, doc: &mut Document, preset: &Preset) -> RunResult {
        let start = Instant::now();
        let submissions_before = doc.submissions().len();

        let outcomes = self
            .injector
            .inject(doc, preset, self.catalog.as_ref())
            .await;

        RunResult {
            outcomes,
            submitted: doc.submissions().len() > submissions_before,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Fill `preset` into the page currently open in `session`.
    ///
    /// The page is snapshotted, filled in memory, and every write is then
    /// replayed into the browser with the same `input`/`change` events.
    pub async fn run_live(&self, session: &LiveSession, preset: &Preset) -> Result<RunResult> {
        let url = session.url().await?;
        if !preset.applies_to(&url) {
            warn!(
                "preset '{}' is scoped to {:?}; running on {} anyway",
                preset.name, preset.url_scope, url
            );
        }

        let mut doc = session.snapshot().await?;
        doc.take_journal();
        let result = self.run(&mut doc, preset).await;

        let writes = doc.take_journal();
        info!("replaying {} writes into {}", writes.len(), url);
        session.replay(&doc, &writes).await?;
        if let Some(form) = doc.submissions().last().filter(|_| result.submitted) {
            session.submit(&doc, *form).await?;
        }
        Ok(result)
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("injector", &self.injector)
            .finish_non_exhaustive()
    }
}
