use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub(super) fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

fn rate_per_second(length: u64, start_ms: u64) -> f64 {
    let elapsed_ms = current_time_ms().saturating_sub(start_ms).max(1);
    (length as f64) * 1000.0 / (elapsed_ms as f64)
}

/// Running total and sample count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accumulator {
    total: u64,
    length: u64,
}

impl Accumulator {
    pub fn put(&mut self, sample: u64) {
        self.total = self.total.saturating_add(sample);
        self.length = self.length.saturating_add(1);
    }

    pub fn clear(&mut self) {
        self.total = 0;
        self.length = 0;
    }

    pub fn merge(&mut self, other: &Accumulator) {
        self.total = self.total.saturating_add(other.total);
        self.length = self.length.saturating_add(other.length);
    }

    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({ "total": self.total, "length": self.length })
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }
}

/// Keyed multiset with a start timestamp; the summary reports per-key counts,
/// the overall total, and requests per second since the start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsCounter {
    items: BTreeMap<String, u64>,
    start_ms: u64,
    length: u64,
}

impl ResultsCounter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: BTreeMap::new(),
            start_ms: current_time_ms(),
            length: 0,
        }
    }

    pub fn put(&mut self, key: &str) {
        let count = self.items.entry(key.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
        self.length = self.length.saturating_add(1);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.start_ms = current_time_ms();
        self.length = 0;
    }

    pub fn merge(&mut self, other: &ResultsCounter) {
        for (key, count) in &other.items {
            let entry = self.items.entry(key.clone()).or_insert(0);
            *entry = entry.saturating_add(*count);
        }
        if other.start_ms < self.start_ms {
            self.start_ms = other.start_ms;
        }
        self.length = self.length.saturating_add(other.length);
    }

    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        for (key, count) in &self.items {
            out.insert(key.clone(), serde_json::json!(count));
        }
        out.insert("total".to_owned(), serde_json::json!(self.length));
        out.insert(
            "rps".to_owned(),
            serde_json::json!(rate_per_second(self.length, self.start_ms)),
        );
        serde_json::Value::Object(out)
    }

    #[must_use]
    pub fn count(&self, key: &str) -> u64 {
        self.items.get(key).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }
}

impl Default for ResultsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyed multiset plus a distinct-key counter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uniques {
    items: BTreeMap<String, u64>,
    uniqs: u64,
    length: u64,
}

impl Uniques {
    pub fn put(&mut self, key: &str) {
        match self.items.get_mut(key) {
            Some(count) => *count = count.saturating_add(1),
            None => {
                self.items.insert(key.to_owned(), 1);
                self.uniqs = self.uniqs.saturating_add(1);
            }
        }
        self.length = self.length.saturating_add(1);
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.uniqs = 0;
        self.length = 0;
    }

    pub fn merge(&mut self, other: &Uniques) {
        for (key, count) in &other.items {
            match self.items.get_mut(key) {
                Some(entry) => *entry = entry.saturating_add(*count),
                None => {
                    self.items.insert(key.clone(), *count);
                    self.uniqs = self.uniqs.saturating_add(1);
                }
            }
        }
        self.length = self.length.saturating_add(other.length);
    }

    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({ "total": self.length, "uniqs": self.uniqs })
    }

    #[must_use]
    pub fn uniqs(&self) -> u64 {
        self.uniqs
    }

    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }
}

/// Running maximum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peak {
    peak: u64,
    length: u64,
}

impl Peak {
    pub fn put(&mut self, sample: u64) {
        if sample > self.peak {
            self.peak = sample;
        }
        self.length = self.length.saturating_add(1);
    }

    pub fn clear(&mut self) {
        self.peak = 0;
        self.length = 0;
    }

    pub fn merge(&mut self, other: &Peak) {
        if other.peak > self.peak {
            self.peak = other.peak;
        }
        self.length = self.length.saturating_add(other.length);
    }

    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({ "max": self.peak })
    }

    #[must_use]
    pub fn peak(&self) -> u64 {
        self.peak
    }

    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }
}

/// Sample count over elapsed wall time since the start timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rate {
    start_ms: u64,
    length: u64,
}

impl Rate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_ms: current_time_ms(),
            length: 0,
        }
    }

    pub fn put(&mut self) {
        self.length = self.length.saturating_add(1);
    }

    pub fn clear(&mut self) {
        self.start_ms = current_time_ms();
        self.length = 0;
    }

    pub fn merge(&mut self, other: &Rate) {
        if other.start_ms < self.start_ms {
            self.start_ms = other.start_ms;
        }
        self.length = self.length.saturating_add(other.length);
    }

    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({ "rps": rate_per_second(self.length, self.start_ms) })
    }

    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }
}

impl Default for Rate {
    fn default() -> Self {
        Self::new()
    }
}
