use serde::{Deserialize, Serialize};

use crate::error::StatsError;

pub const DEFAULT_NUM_BUCKETS: usize = 3000;
pub const DEFAULT_PERCENTILES: [f64; 2] = [0.95, 0.99];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramParams {
    pub num_buckets: usize,
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
}

fn default_percentiles() -> Vec<f64> {
    DEFAULT_PERCENTILES.to_vec()
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            num_buckets: DEFAULT_NUM_BUCKETS,
            percentiles: default_percentiles(),
        }
    }
}

/// Fixed-width histogram over non-negative integer samples.
///
/// Samples below the bucket count land in `items` (one unit per bucket);
/// everything else goes to the unbounded `extra` overflow list. The overflow
/// list is sorted lazily on the first percentile query that needs it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Histogram {
    pub params: HistogramParams,
    items: Vec<u64>,
    extra: Vec<u64>,
    min: i64,
    max: i64,
    sum: u64,
    length: u64,
    #[serde(skip)]
    sorted: bool,
}

impl Histogram {
    #[must_use]
    pub fn new(params: HistogramParams) -> Self {
        let items = vec![0; params.num_buckets];
        Self {
            params,
            items,
            extra: Vec::new(),
            min: -1,
            max: -1,
            sum: 0,
            length: 0,
            sorted: true,
        }
    }

    pub fn put(&mut self, sample: u64) {
        match usize::try_from(sample)
            .ok()
            .and_then(|index| self.items.get_mut(index))
        {
            Some(bucket) => *bucket = bucket.saturating_add(1),
            None => {
                self.extra.push(sample);
                self.sorted = false;
            }
        }
        let value = i64::try_from(sample).unwrap_or(i64::MAX);
        if self.min == -1 || value < self.min {
            self.min = value;
        }
        if self.max == -1 || value > self.max {
            self.max = value;
        }
        self.sum = self.sum.saturating_add(sample);
        self.length = self.length.saturating_add(1);
    }

    pub fn clear(&mut self) {
        self.items.fill(0);
        self.extra.clear();
        self.min = -1;
        self.max = -1;
        self.sum = 0;
        self.length = 0;
        self.sorted = true;
    }

    /// Value at percentile `p` (0 < p < 1), counted rank-from-the-top so
    /// that `percentile(0.5)` is the median of the multiset `items ∪ extra`.
    pub fn percentile(&mut self, p: f64) -> u64 {
        if self.length == 0 {
            return 0;
        }
        // length * (1.0 - p) rounds below the exact rank for the default
        // percentiles (100 * (1.0 - 0.95) < 5); subtract the covered rank.
        let covered = (self.length as f64) * p;
        let target = ((self.length as f64) - covered).floor().max(0.0) as usize;
        if self.extra.len() > target {
            if !self.sorted {
                self.extra.sort_unstable();
                self.sorted = true;
            }
            let index = self.extra.len() - target - 1;
            return self.extra.get(index).copied().unwrap_or(0);
        }
        // The top extra.len() ranks live in the overflow list; the remainder
        // of the target rank is found scanning buckets from high to low.
        let remaining = (target - self.extra.len()) as u64;
        let mut seen = 0u64;
        for (bucket, count) in self.items.iter().enumerate().rev() {
            seen = seen.saturating_add(*count);
            if seen > remaining {
                return bucket as u64;
            }
        }
        0
    }

    pub fn median(&mut self) -> u64 {
        self.percentile(0.5)
    }

    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        (self.sum as f64) / (self.length as f64)
    }

    #[must_use]
    pub fn stddev(&self) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let mut squares = 0.0;
        for (bucket, count) in self.items.iter().enumerate() {
            if *count > 0 {
                let delta = (bucket as f64) - mean;
                squares += delta * delta * (*count as f64);
            }
        }
        for sample in &self.extra {
            let delta = (*sample as f64) - mean;
            squares += delta * delta;
        }
        (squares / (self.length as f64)).sqrt()
    }

    /// Merges another histogram of the same shape into this one.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket counts differ.
    pub fn merge(&mut self, other: &Histogram) -> Result<(), StatsError> {
        if self.items.len() != other.items.len() {
            return Err(StatsError::IncompatibleHistograms {
                left: self.items.len(),
                right: other.items.len(),
            });
        }
        for (bucket, count) in self.items.iter_mut().zip(other.items.iter()) {
            *bucket = bucket.saturating_add(*count);
        }
        if !other.extra.is_empty() {
            self.extra.extend_from_slice(&other.extra);
            self.sorted = false;
        }
        if other.min != -1 && (self.min == -1 || other.min < self.min) {
            self.min = other.min;
        }
        if other.max != -1 && (self.max == -1 || other.max > self.max) {
            self.max = other.max;
        }
        self.sum = self.sum.saturating_add(other.sum);
        self.length = self.length.saturating_add(other.length);
        Ok(())
    }

    pub fn summary(&mut self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        out.insert("min".to_owned(), serde_json::json!(self.min));
        out.insert("max".to_owned(), serde_json::json!(self.max));
        out.insert("avg".to_owned(), serde_json::json!(self.mean()));
        out.insert("median".to_owned(), serde_json::json!(self.median()));
        for p in self.params.percentiles.clone() {
            let label = format!("{}%", (p * 100.0).round());
            out.insert(label, serde_json::json!(self.percentile(p)));
        }
        serde_json::Value::Object(out)
    }

    #[must_use]
    pub fn length(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub fn sum(&self) -> u64 {
        self.sum
    }

    #[must_use]
    pub fn min(&self) -> i64 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> i64 {
        self.max
    }

    #[must_use]
    pub fn bucket_count(&self, bucket: usize) -> u64 {
        self.items.get(bucket).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn overflow_len(&self) -> usize {
        self.extra.len()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new(HistogramParams::default())
    }
}
