use super::{RemoteError, StatsError};

impl From<&'static str> for StatsError {
    fn from(message: &'static str) -> Self {
        StatsError::TestExpectation { message }
    }
}

impl From<String> for StatsError {
    fn from(value: String) -> Self {
        StatsError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}

impl From<&'static str> for RemoteError {
    fn from(message: &'static str) -> Self {
        RemoteError::TestExpectation { message }
    }
}

impl From<String> for RemoteError {
    fn from(value: String) -> Self {
        RemoteError::TestExpectationValue {
            message: "Test expectation failed",
            value,
        }
    }
}
