use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, RemoteError, StatsError};
use crate::stats::Registry;

use super::ports::ReportRenderer;
use super::protocol::{ProgressReport, SubmitBody, TestSpec};
use super::server::{RemoteRouter, serve};

pub const DEFAULT_PING_PERIOD: Duration = Duration::from_millis(3000);

/// Coalescing delay between the first received progress report of a round
/// and the aggregated emission. Fixed; tolerates clock skew and network
/// jitter across slaves without emitting one report per slave.
pub const PROGRESS_WINDOW: Duration = Duration::from_millis(500);

/// Lifecycle of one slave as seen by the pool. Transitions are pool-driven,
/// except that a slave's own scheduler stopping surfaces as a 410 on the
/// state probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveState {
    NotStarted,
    Running,
    /// A state probe is outstanding; still `Ping` at the next round means
    /// the slave never answered.
    Ping,
    Done,
    Error,
}

impl SlaveState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, SlaveState::Done | SlaveState::Error)
    }
}

#[derive(Debug, Clone)]
pub struct SlaveEndpoint {
    pub id: String,
    pub host: String,
    pub port: u16,
}

impl SlaveEndpoint {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let id = format!("{}:{}", host, port);
        Self { id, host, port }
    }
}

pub(super) struct SlaveDescriptor {
    pub(super) endpoint: SlaveEndpoint,
    pub(super) state: SlaveState,
    client: reqwest::Client,
}

pub(super) enum PoolCommand {
    Progress {
        report: ProgressReport,
        respond_to: oneshot::Sender<Result<(), String>>,
    },
    PingOutcome {
        slave_id: String,
        status: u16,
    },
}

pub struct PoolOptions {
    pub ping_period: Duration,
    /// Address slaves are told to report back to; defaults to the listen
    /// address.
    pub advertise: Option<String>,
    /// Keep serving after the test completes instead of returning.
    pub stay_alive: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            ping_period: DEFAULT_PING_PERIOD,
            advertise: None,
            stay_alive: false,
        }
    }
}

pub type CompletionCallback = Box<dyn FnOnce(Registry) + Send>;

/// Master-side aggregate: the slave map, the spec to submit, the merged
/// statistics registry, and both timer states. All mutation happens on the
/// single coordinator task driving [`WorkerPool::run`], so progress
/// ingestion, ping rounds, completion checks, and window firing are
/// serialized with respect to one another.
pub(super) struct WorkerPool {
    pub(super) slaves: HashMap<String, SlaveDescriptor>,
    spec: TestSpec,
    advertise: String,
    pub(super) registry: Registry,
    renderer: Arc<dyn ReportRenderer>,
    callback: Option<CompletionCallback>,
    ping_period: Duration,
    stay_alive: bool,
    tx: mpsc::UnboundedSender<PoolCommand>,
    pub(super) window_deadline: Option<Instant>,
    pub(super) finished: bool,
}

impl WorkerPool {
    #[expect(
        clippy::too_many_arguments,
        reason = "Pool construction wires every collaborator"
    )]
    pub(super) fn new(
        endpoints: Vec<SlaveEndpoint>,
        spec: TestSpec,
        advertise: String,
        renderer: Arc<dyn ReportRenderer>,
        callback: CompletionCallback,
        ping_period: Duration,
        stay_alive: bool,
        tx: mpsc::UnboundedSender<PoolCommand>,
    ) -> AppResult<Self> {
        let mut slaves = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let client = reqwest::Client::builder().timeout(ping_period).build()?;
            slaves.insert(
                endpoint.id.clone(),
                SlaveDescriptor {
                    endpoint,
                    state: SlaveState::NotStarted,
                    client,
                },
            );
        }
        Ok(Self {
            slaves,
            spec,
            advertise,
            registry: Registry::default(),
            renderer,
            callback: Some(callback),
            ping_period,
            stay_alive,
            tx,
            window_deadline: None,
            finished: false,
        })
    }

    /// Submits the test to every slave and marks them running. Probe rounds
    /// begin on the first ping tick after this.
    pub(super) fn start(&mut self) {
        info!("Submitting test to {} slaves", self.slaves.len());
        for descriptor in self.slaves.values_mut() {
            descriptor.state = SlaveState::Running;
            let body = SubmitBody {
                slave_id: descriptor.endpoint.id.clone(),
                master: self.advertise.clone(),
                spec: self.spec.clone(),
            };
            let client = descriptor.client.clone();
            let url = format!(
                "http://{}:{}/remote",
                descriptor.endpoint.host, descriptor.endpoint.port
            );
            let slave_id = descriptor.endpoint.id.clone();
            tokio::spawn(async move {
                match client.post(&url).json(&body).send().await {
                    Ok(response) if response.status().as_u16() == 200 => {
                        debug!("Slave {} accepted the test", slave_id);
                    }
                    Ok(response) => warn!(
                        "Slave {} rejected the test with status {}",
                        slave_id,
                        response.status()
                    ),
                    Err(err) => warn!("Failed to submit test to slave {}: {}", slave_id, err),
                }
            });
        }
    }

    /// Coordinator loop. Returns once the pool has completed, unless
    /// `stay_alive` keeps it serving (late reports then hit an empty slave
    /// map and are dropped).
    pub(super) async fn run(&mut self, mut rx: mpsc::UnboundedReceiver<PoolCommand>) {
        let mut ping = tokio::time::interval(self.ping_period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first interval tick completes immediately; swallow it so the
        // first probe round happens one ping period after start.
        ping.tick().await;

        loop {
            let window = self.window_deadline;
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else { break; };
                    self.handle_command(command);
                }
                _ = ping.tick() => {
                    if !self.finished {
                        self.send_pings();
                        if self.check_finished() && !self.stay_alive {
                            break;
                        }
                    }
                }
                () = tokio::time::sleep_until(window.unwrap_or_else(Instant::now)), if window.is_some() => {
                    self.emit_progress_report();
                }
            }
        }
    }

    fn handle_command(&mut self, command: PoolCommand) {
        match command {
            PoolCommand::Progress { report, respond_to } => {
                let result = self
                    .receive_progress(report)
                    .map_err(|err| err.to_string());
                if respond_to.send(result).is_err() {
                    // Requester dropped the response channel.
                }
            }
            PoolCommand::PingOutcome { slave_id, status } => {
                self.note_ping_outcome(&slave_id, status);
            }
        }
    }

    /// One probe round, atomic from the pool's point of view: slaves whose
    /// previous probe never answered become errors, running slaves are
    /// probed, and completion is checked.
    pub(super) fn send_pings(&mut self) {
        for (slave_id, descriptor) in &mut self.slaves {
            if descriptor.state == SlaveState::Ping {
                warn!("Slave {} missed a liveness probe; marking it failed", slave_id);
                descriptor.state = SlaveState::Error;
            }
        }
        for descriptor in self.slaves.values_mut() {
            if descriptor.state != SlaveState::Running {
                continue;
            }
            descriptor.state = SlaveState::Ping;
            let client = descriptor.client.clone();
            let url = format!(
                "http://{}:{}/remote/state",
                descriptor.endpoint.host, descriptor.endpoint.port
            );
            let slave_id = descriptor.endpoint.id.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                match client.get(&url).send().await {
                    Ok(response) => {
                        let status = response.status().as_u16();
                        if tx.send(PoolCommand::PingOutcome { slave_id, status }).is_err() {
                            // Pool already shut down.
                        }
                    }
                    Err(err) => {
                        // No outcome: the slave stays in Ping and the next
                        // round marks it failed.
                        debug!("State probe to {} failed: {}", slave_id, err);
                    }
                }
            });
        }
    }

    pub(super) fn note_ping_outcome(&mut self, slave_id: &str, status: u16) {
        let Some(descriptor) = self.slaves.get_mut(slave_id) else {
            return;
        };
        if descriptor.state == SlaveState::Error {
            return;
        }
        match status {
            200 => {
                if descriptor.state == SlaveState::Ping {
                    descriptor.state = SlaveState::Running;
                }
            }
            410 => {
                info!("Slave {} finished", slave_id);
                descriptor.state = SlaveState::Done;
            }
            other => {
                debug!("Unexpected state-probe status {} from {}", other, slave_id);
            }
        }
    }

    /// Fires the completion callback once every slave is terminal. The slave
    /// map is emptied and the registry moved out before the callback runs,
    /// so progress arriving during callback execution is dropped.
    pub(super) fn check_finished(&mut self) -> bool {
        if self.finished {
            return true;
        }
        if !self.slaves.values().all(|descriptor| descriptor.state.is_terminal()) {
            return false;
        }
        info!("All slaves are in a terminal state; test complete");
        self.finished = true;
        self.window_deadline = None;
        self.slaves.clear();
        let registry = self.registry.take();
        if let Some(callback) = self.callback.take() {
            callback(registry);
        }
        true
    }

    /// Ingests one progress report. Reports from unknown slaves are dropped
    /// silently; reports from errored slaves are dropped because those
    /// slaves left the protocol. A report is also an implicit liveness
    /// signal: it returns the slave to `Running`, including a `Done` slave
    /// whose final report arrived after its 410 (harmless, since completion
    /// is only checked on ping ticks and the next probe sees 410 again).
    pub(super) fn receive_progress(&mut self, report: ProgressReport) -> Result<(), StatsError> {
        let Some(descriptor) = self.slaves.get_mut(&report.slave_id) else {
            debug!("Ignoring progress from unknown slave {}", report.slave_id);
            return Ok(());
        };
        if descriptor.state == SlaveState::Error {
            debug!("Ignoring progress from failed slave {}", report.slave_id);
            return Ok(());
        }
        descriptor.state = SlaveState::Running;
        for snapshot in &report.stats {
            self.registry
                .merge_snapshot(&snapshot.name, snapshot.add_to_http_report, &snapshot.interval)?;
        }
        self.arm_progress_window();
        Ok(())
    }

    /// Arms the 500 ms window on the first report of a round; reports inside
    /// an armed window coalesce into the same emission.
    pub(super) fn arm_progress_window(&mut self) {
        if self.finished || self.window_deadline.is_some() {
            return;
        }
        let deadline = Instant::now()
            .checked_add(PROGRESS_WINDOW)
            .unwrap_or_else(Instant::now);
        self.window_deadline = Some(deadline);
    }

    pub(super) fn emit_progress_report(&mut self) {
        self.window_deadline = None;
        if self.finished {
            return;
        }
        debug!("Progress window fired; emitting aggregated report");
        self.renderer.render(&mut self.registry);
        self.registry.next_all();
    }

    #[cfg(test)]
    pub(super) fn slave_state(&self, slave_id: &str) -> Option<SlaveState> {
        self.slaves.get(slave_id).map(|descriptor| descriptor.state)
    }

    #[cfg(test)]
    pub(super) fn set_slave_state(&mut self, slave_id: &str, state: SlaveState) {
        if let Some(descriptor) = self.slaves.get_mut(slave_id) {
            descriptor.state = state;
        }
    }
}

/// Runs the master role: binds the progress listener, submits the test to
/// every slave, and drives the pool until completion.
///
/// # Errors
///
/// Returns an error if no slaves are configured, the listener cannot bind,
/// or an HTTP client cannot be constructed.
pub async fn run_master(
    listen: &str,
    slaves: Vec<SlaveEndpoint>,
    spec: TestSpec,
    renderer: Arc<dyn ReportRenderer>,
    callback: CompletionCallback,
    options: PoolOptions,
) -> AppResult<()> {
    if slaves.is_empty() {
        return Err(AppError::remote(RemoteError::NoSlaves));
    }
    let listener = TcpListener::bind(listen).await.map_err(|err| {
        AppError::remote(RemoteError::Bind {
            addr: listen.to_owned(),
            source: err,
        })
    })?;
    let advertise = options.advertise.clone().unwrap_or_else(|| listen.to_owned());
    info!("Master listening on {} (advertised as {})", listen, advertise);

    // Ctrl-C fans a stop out to every slave, fire-and-forget; completion
    // then arrives through the regular state probes.
    let stop_client = reqwest::Client::builder()
        .timeout(options.ping_period)
        .build()?;
    let stop_urls: Vec<String> = slaves
        .iter()
        .map(|endpoint| format!("http://{}:{}/remote/stop", endpoint.host, endpoint.port))
        .collect();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; stopping all slaves");
            for url in stop_urls {
                if let Err(err) = stop_client.post(&url).send().await {
                    debug!("Stop request to {} failed: {}", url, err);
                }
            }
        }
    });

    let (pool_tx, pool_rx) = mpsc::unbounded_channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(serve(
        listener,
        Arc::new(RemoteRouter::master(pool_tx.clone())),
        shutdown_rx,
    ));

    let mut pool = WorkerPool::new(
        slaves,
        spec,
        advertise,
        renderer,
        callback,
        options.ping_period,
        options.stay_alive,
        pool_tx,
    )?;
    pool.start();
    pool.run(pool_rx).await;

    if shutdown_tx.send(true).is_err() {
        // Server task already gone.
    }
    server.await?;
    Ok(())
}
