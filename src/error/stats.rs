use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Incompatible histograms ({left} vs {right} buckets).")]
    IncompatibleHistograms { left: usize, right: usize },
    #[error("Cannot merge a {incoming} snapshot into a {existing} statistic.")]
    KindMismatch {
        existing: &'static str,
        incoming: &'static str,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
