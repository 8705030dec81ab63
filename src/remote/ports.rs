use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AppError, AppResult, RemoteError};
use crate::stats::{Registry, SharedRegistry};

use super::protocol::TestSpec;

/// The running local scheduler, as far as the coordination core observes it.
pub trait SchedulerHandle: Send + Sync {
    fn running(&self) -> bool;
    fn stop_all(&self);
}

/// A catalog-registered load generator. `start` begins local load for the
/// given spec, recording observations into the shared registry, and returns
/// the scheduler handle the slave probes for liveness.
pub trait LoadGenerator: Send + Sync {
    fn start(&self, spec: &TestSpec, stats: SharedRegistry) -> AppResult<Box<dyn SchedulerHandle>>;
}

/// Consumes the aggregated registry each time the progress window fires.
/// Rendering may lazily sort percentile buffers, hence the mutable borrow.
pub trait ReportRenderer: Send + Sync {
    fn render(&self, registry: &mut Registry);
}

/// Named generators a slave is willing to run.
#[derive(Default, Clone)]
pub struct GeneratorCatalog {
    entries: BTreeMap<String, Arc<dyn LoadGenerator>>,
}

impl GeneratorCatalog {
    pub fn register(&mut self, name: impl Into<String>, generator: Arc<dyn LoadGenerator>) {
        self.entries.insert(name.into(), generator);
    }

    /// Looks up a generator by its wire identifier.
    ///
    /// # Errors
    ///
    /// Returns a protocol error for identifiers not in the catalog.
    pub fn resolve(&self, name: &str) -> AppResult<Arc<dyn LoadGenerator>> {
        self.entries.get(name).cloned().ok_or_else(|| {
            AppError::remote(RemoteError::UnknownGenerator {
                name: name.to_owned(),
            })
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
