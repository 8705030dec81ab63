use clap::Parser;

use crate::error::{AppError, AppResult, RemoteError};
use crate::remote::{SlaveEndpoint, TestSpec};

use super::parsers::parse_endpoint;

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Distributed load-test coordinator - one master fans a test spec out to slave nodes, merges their interval statistics, and reports the fleet as a single machine."
)]
pub struct FleetArgs {
    /// Run as master: address to listen on for slave progress reports
    #[arg(long = "master-listen")]
    pub master_listen: Option<String>,

    /// Address slaves should report back to (defaults to the listen address)
    #[arg(long = "advertise")]
    pub advertise: Option<String>,

    /// Slave endpoint as host:port (repeatable)
    #[arg(long = "slave", value_parser = parse_endpoint)]
    pub slaves: Vec<SlaveEndpoint>,

    /// Run as slave: address to listen on for master commands
    #[arg(long = "slave-listen")]
    pub slave_listen: Option<String>,

    /// Generator identifier slaves resolve against their catalog
    #[arg(long, default_value = "synthetic")]
    pub generator: String,

    /// Concurrent workers per slave
    #[arg(long, short = 'c', default_value_t = 1)]
    pub concurrency: usize,

    /// Test duration in seconds
    #[arg(long, short = 't', default_value_t = 10)]
    pub duration: u64,

    /// Target request rate per slave (requests per second)
    #[arg(long)]
    pub rate: Option<u64>,

    /// Interval between progress reports pushed by each slave (ms)
    #[arg(long = "report-interval-ms", default_value_t = 2000)]
    pub report_interval_ms: u64,

    /// Liveness-probe cadence from master to each slave (ms)
    #[arg(long = "ping-period-ms", default_value_t = 3000)]
    pub ping_period_ms: u64,

    /// Keep the master serving after the test completes
    #[arg(long = "stay-alive")]
    pub stay_alive: bool,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Disable ANSI colors in log output
    #[arg(long = "no-color")]
    pub no_color: bool,
}

#[derive(Debug, Clone)]
pub enum Role {
    Master { listen: String },
    Slave { listen: String },
}

impl FleetArgs {
    /// Resolves which role this process runs.
    ///
    /// # Errors
    ///
    /// Returns an error if both or neither of `--master-listen` and
    /// `--slave-listen` are set, or if the master has no slave endpoints.
    pub fn role(&self) -> AppResult<Role> {
        match (self.master_listen.as_ref(), self.slave_listen.as_ref()) {
            (Some(_), Some(_)) => Err(AppError::remote(RemoteError::RoleConflict)),
            (Some(listen), None) => {
                if self.slaves.is_empty() {
                    return Err(AppError::remote(RemoteError::NoSlaves));
                }
                Ok(Role::Master {
                    listen: listen.clone(),
                })
            }
            (None, Some(listen)) => Ok(Role::Slave {
                listen: listen.clone(),
            }),
            (None, None) => Err(AppError::remote(RemoteError::RoleMissing)),
        }
    }

    #[must_use]
    pub fn test_spec(&self) -> TestSpec {
        TestSpec {
            generator: self.generator.clone(),
            concurrency: self.concurrency.max(1),
            duration_ms: Some(self.duration.saturating_mul(1000)),
            rate: self.rate,
            report_interval_ms: self.report_interval_ms.max(1),
        }
    }
}
