use thiserror::Error;

use super::{RemoteError, StatsError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("CLI error: {source}")]
    Clap {
        #[from]
        source: clap::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("HTTP client error: {source}")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },
    #[error("Join error: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn stats<E>(error: E) -> Self
    where
        E: Into<StatsError>,
    {
        error.into().into()
    }

    pub fn remote<E>(error: E) -> Self
    where
        E: Into<RemoteError>,
    {
        error.into().into()
    }
}
