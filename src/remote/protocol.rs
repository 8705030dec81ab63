use serde::{Deserialize, Serialize};

use crate::stats::Sketch;

/// A structured test specification, shipped to every slave as data.
///
/// The `generator` identifier is resolved against each slave's registered
/// catalog; slaves never evaluate code received over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSpec {
    pub generator: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub rate: Option<u64>,
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

const fn default_concurrency() -> usize {
    1
}

const fn default_report_interval_ms() -> u64 {
    2000
}

/// Body of `POST /remote`: assigns the slave its id, tells it where the
/// master can be reached, and carries the test to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBody {
    pub slave_id: String,
    pub master: String,
    pub spec: TestSpec,
}

/// One named interval snapshot inside a progress report. The sketch carries
/// its own kind and parameters so the master can reconstruct the matching
/// statistic on first sight.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatSnapshot {
    pub name: String,
    pub add_to_http_report: bool,
    pub interval: Sketch,
}

/// Body of `POST /remote/progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub slave_id: String,
    pub stats: Vec<StatSnapshot>,
}
