mod app;
mod remote;
mod stats;

#[cfg(test)]
mod test_support;

pub use app::{AppError, AppResult};
pub use remote::RemoteError;
pub use stats::StatsError;
