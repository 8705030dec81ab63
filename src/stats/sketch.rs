use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StatsError;

use super::histogram::Histogram;
use super::sketches::{Accumulator, Peak, Rate, ResultsCounter, Uniques};

/// One observation delivered to a sketch. Numeric sketches take values,
/// keyed sketches take keys; a value delivered to a keyed sketch counts
/// under its decimal rendering.
#[derive(Debug, Clone)]
pub enum Sample {
    Value(u64),
    Key(String),
}

/// A mergeable statistic. The serialized form is self-describing: the kind
/// tag plus any parameters are enough to reconstruct an empty sketch of the
/// same shape on the receiving side, so this type doubles as the wire
/// snapshot of an interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Sketch {
    Histogram(Histogram),
    Accumulator(Accumulator),
    ResultsCounter(ResultsCounter),
    Uniques(Uniques),
    Peak(Peak),
    Rate(Rate),
}

impl Sketch {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Sketch::Histogram(_) => "Histogram",
            Sketch::Accumulator(_) => "Accumulator",
            Sketch::ResultsCounter(_) => "ResultsCounter",
            Sketch::Uniques(_) => "Uniques",
            Sketch::Peak(_) => "Peak",
            Sketch::Rate(_) => "Rate",
        }
    }

    /// Builds an empty sketch of the same kind and parameters.
    #[must_use]
    pub fn new_like(&self) -> Sketch {
        match self {
            Sketch::Histogram(histogram) => {
                Sketch::Histogram(Histogram::new(histogram.params.clone()))
            }
            Sketch::Accumulator(_) => Sketch::Accumulator(Accumulator::default()),
            Sketch::ResultsCounter(_) => Sketch::ResultsCounter(ResultsCounter::new()),
            Sketch::Uniques(_) => Sketch::Uniques(Uniques::default()),
            Sketch::Peak(_) => Sketch::Peak(Peak::default()),
            Sketch::Rate(_) => Sketch::Rate(Rate::new()),
        }
    }

    pub fn put(&mut self, sample: &Sample) {
        match (&mut *self, sample) {
            (Sketch::Histogram(histogram), Sample::Value(value)) => histogram.put(*value),
            (Sketch::Accumulator(accumulator), Sample::Value(value)) => accumulator.put(*value),
            (Sketch::Peak(peak), Sample::Value(value)) => peak.put(*value),
            (Sketch::Rate(rate), _) => rate.put(),
            (Sketch::ResultsCounter(counter), Sample::Key(key)) => counter.put(key),
            (Sketch::ResultsCounter(counter), Sample::Value(value)) => {
                counter.put(&value.to_string());
            }
            (Sketch::Uniques(uniques), Sample::Key(key)) => uniques.put(key),
            (Sketch::Uniques(uniques), Sample::Value(value)) => uniques.put(&value.to_string()),
            (sketch, Sample::Key(_)) => {
                debug!("Dropping keyed sample delivered to {} statistic", sketch.kind());
            }
        }
    }

    pub fn clear(&mut self) {
        match self {
            Sketch::Histogram(histogram) => histogram.clear(),
            Sketch::Accumulator(accumulator) => accumulator.clear(),
            Sketch::ResultsCounter(counter) => counter.clear(),
            Sketch::Uniques(uniques) => uniques.clear(),
            Sketch::Peak(peak) => peak.clear(),
            Sketch::Rate(rate) => rate.clear(),
        }
    }

    #[must_use]
    pub fn length(&self) -> u64 {
        match self {
            Sketch::Histogram(histogram) => histogram.length(),
            Sketch::Accumulator(accumulator) => accumulator.length(),
            Sketch::ResultsCounter(counter) => counter.length(),
            Sketch::Uniques(uniques) => uniques.length(),
            Sketch::Peak(peak) => peak.length(),
            Sketch::Rate(rate) => rate.length(),
        }
    }

    pub fn summary(&mut self) -> serde_json::Value {
        match self {
            Sketch::Histogram(histogram) => histogram.summary(),
            Sketch::Accumulator(accumulator) => accumulator.summary(),
            Sketch::ResultsCounter(counter) => counter.summary(),
            Sketch::Uniques(uniques) => uniques.summary(),
            Sketch::Peak(peak) => peak.summary(),
            Sketch::Rate(rate) => rate.summary(),
        }
    }

    /// Merges another sketch of the same kind into this one.
    ///
    /// # Errors
    ///
    /// Returns an error if the kinds differ, or if two histograms have
    /// different bucket counts.
    pub fn merge(&mut self, other: &Sketch) -> Result<(), StatsError> {
        match (self, other) {
            (Sketch::Histogram(left), Sketch::Histogram(right)) => left.merge(right),
            (Sketch::Accumulator(left), Sketch::Accumulator(right)) => {
                left.merge(right);
                Ok(())
            }
            (Sketch::ResultsCounter(left), Sketch::ResultsCounter(right)) => {
                left.merge(right);
                Ok(())
            }
            (Sketch::Uniques(left), Sketch::Uniques(right)) => {
                left.merge(right);
                Ok(())
            }
            (Sketch::Peak(left), Sketch::Peak(right)) => {
                left.merge(right);
                Ok(())
            }
            (Sketch::Rate(left), Sketch::Rate(right)) => {
                left.merge(right);
                Ok(())
            }
            (left, right) => Err(StatsError::KindMismatch {
                existing: left.kind(),
                incoming: right.kind(),
            }),
        }
    }
}
