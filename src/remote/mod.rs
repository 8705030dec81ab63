//! Master↔slave coordination: the wire protocol, the slave lifecycle agent,
//! and the master worker pool that merges streamed statistics.
mod http;
mod output;
mod pool;
mod ports;
mod protocol;
mod server;
mod slave;

#[cfg(test)]
mod tests;

pub use output::{ConsoleRenderer, print_final_report};
pub use pool::{
    CompletionCallback, DEFAULT_PING_PERIOD, PROGRESS_WINDOW, PoolOptions, SlaveEndpoint,
    SlaveState, run_master,
};
pub use ports::{GeneratorCatalog, LoadGenerator, ReportRenderer, SchedulerHandle};
pub use protocol::{ProgressReport, StatSnapshot, SubmitBody, TestSpec};
pub use slave::{SlaveAgent, run_slave};
