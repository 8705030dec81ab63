//! Mergeable statistics: sketches, interval/cumulative reportables, and the
//! named registry that routes incoming snapshots.
mod histogram;
mod reportable;
mod sketch;
mod sketches;


pub use histogram::{DEFAULT_NUM_BUCKETS, DEFAULT_PERCENTILES, Histogram, HistogramParams};
pub use reportable::{Registry, Reportable, SharedRegistry, lock_registry};
pub use sketch::{Sample, Sketch};
pub use sketches::{Accumulator, Peak, Rate, ResultsCounter, Uniques};
