use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::StatsError;

use super::sketch::{Sample, Sketch};

/// Named pair of interval and cumulative sketches of one kind.
///
/// The interval view resets after each emission (`next`); the cumulative
/// view accumulates for the lifetime of the test.
#[derive(Debug, Clone)]
pub struct Reportable {
    name: String,
    interval: Sketch,
    cumulative: Sketch,
    add_to_http_report: bool,
    track_interval: bool,
}

impl Reportable {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: Sketch, add_to_http_report: bool) -> Self {
        let interval = kind.new_like();
        Self {
            name: name.into(),
            interval,
            cumulative: kind,
            add_to_http_report,
            track_interval: true,
        }
    }

    /// Builds a reportable whose interval view is disabled; `put` only
    /// updates the cumulative sketch.
    #[must_use]
    pub fn cumulative_only(name: impl Into<String>, kind: Sketch, add_to_http_report: bool) -> Self {
        let mut reportable = Self::new(name, kind, add_to_http_report);
        reportable.track_interval = false;
        reportable
    }

    pub fn put(&mut self, sample: &Sample) {
        if self.track_interval {
            self.interval.put(sample);
        }
        self.cumulative.put(sample);
    }

    /// Ends the current reporting interval: resets the interval view, but
    /// only if it has seen samples since the last reset.
    pub fn next(&mut self) {
        if self.interval.length() > 0 {
            self.interval.clear();
        }
    }

    /// Merges a raw sketch snapshot into both views.
    ///
    /// The argument is deliberately a [`Sketch`], never another
    /// `Reportable`: progress reports ship interval snapshots, and each one
    /// feeds both the receiving interval and cumulative sketches.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot kind or parameters are incompatible.
    pub fn merge(&mut self, snapshot: &Sketch) -> Result<(), StatsError> {
        self.interval.merge(snapshot)?;
        self.cumulative.merge(snapshot)
    }

    pub fn summary(&mut self) -> serde_json::Value {
        serde_json::json!({
            "interval": self.interval.summary(),
            "cumulative": self.cumulative.summary(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn add_to_http_report(&self) -> bool {
        self.add_to_http_report
    }

    /// Number of samples ever delivered.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.cumulative.length()
    }

    #[must_use]
    pub fn interval_sketch(&self) -> &Sketch {
        &self.interval
    }

    #[must_use]
    pub fn cumulative_sketch(&self) -> &Sketch {
        &self.cumulative
    }
}

/// Ordered index of named statistics.
///
/// On the master this routes incoming snapshots to the right reportable,
/// constructing one from the snapshot's declared kind on first sight. On a
/// slave it is the local store the load generator records into.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, Reportable>,
}

impl Registry {
    pub fn register(&mut self, reportable: Reportable) {
        self.entries.insert(reportable.name().to_owned(), reportable);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Reportable> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Reportable> {
        self.entries.get_mut(name)
    }

    /// Records a sample into an already-registered statistic; samples for
    /// unregistered names are dropped.
    pub fn record(&mut self, name: &str, sample: &Sample) {
        match self.entries.get_mut(name) {
            Some(reportable) => reportable.put(sample),
            None => debug!("Dropping sample for unregistered statistic {}", name),
        }
    }

    /// Routes an incoming snapshot to the statistic named `name`, building
    /// the reportable from the snapshot's kind and parameters on first
    /// sight.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot is incompatible with the existing
    /// statistic of the same name.
    pub fn merge_snapshot(
        &mut self,
        name: &str,
        add_to_http_report: bool,
        snapshot: &Sketch,
    ) -> Result<(), StatsError> {
        let entry = self
            .entries
            .entry(name.to_owned())
            .or_insert_with(|| Reportable::new(name, snapshot.new_like(), add_to_http_report));
        entry.merge(snapshot)
    }

    /// Ends the current reporting interval on every statistic.
    pub fn next_all(&mut self) {
        for reportable in self.entries.values_mut() {
            reportable.next();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Moves the contents out, leaving this registry empty.
    #[must_use]
    pub fn take(&mut self) -> Registry {
        Registry {
            entries: std::mem::take(&mut self.entries),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reportable> {
        self.entries.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Reportable> {
        self.entries.values_mut()
    }

    pub fn summaries(&mut self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for reportable in self.entries.values_mut() {
            out.insert(reportable.name().to_owned(), reportable.summary());
        }
        serde_json::Value::Object(out)
    }
}

pub type SharedRegistry = Arc<Mutex<Registry>>;

/// Locks a shared registry, recovering the guard if a writer panicked.
#[must_use]
pub fn lock_registry(shared: &SharedRegistry) -> MutexGuard<'_, Registry> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
