use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, RemoteError};
use crate::stats::{Registry, SharedRegistry, lock_registry};

use super::ports::{GeneratorCatalog, SchedulerHandle};
use super::protocol::{ProgressReport, StatSnapshot, SubmitBody};
use super::server::{RemoteRouter, serve};

/// Identity handed out by the master on the first submission, plus the
/// reusable HTTP client bound to it.
struct SlaveContext {
    id: String,
    master: String,
    client: reqwest::Client,
}

#[derive(Default)]
struct SlaveInner {
    context: Option<SlaveContext>,
    scheduler: Option<Box<dyn SchedulerHandle>>,
    registry: SharedRegistry,
}

/// Slave-side singleton: accepts a submitted test, runs it against the
/// local scheduler, answers state probes, and pushes periodic progress to
/// the master.
pub struct SlaveAgent {
    catalog: GeneratorCatalog,
    inner: Mutex<SlaveInner>,
}

impl SlaveAgent {
    #[must_use]
    pub fn new(catalog: GeneratorCatalog) -> Arc<Self> {
        Arc::new(Self {
            catalog,
            inner: Mutex::new(SlaveInner::default()),
        })
    }

    fn lock_inner(&self) -> MutexGuard<'_, SlaveInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accepts a `POST /remote` body: resolves the generator, starts local
    /// load, records the slave context, and spawns the progress-push loop.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed bodies and unknown generator
    /// identifiers; the wire handler answers those with a 400.
    pub async fn submit(self: Arc<Self>, body: &[u8]) -> AppResult<()> {
        let submit: SubmitBody = serde_json::from_slice(body).map_err(|err| {
            AppError::remote(RemoteError::Deserialize {
                context: "submit body",
                source: err,
            })
        })?;
        let generator = self.catalog.resolve(&submit.spec.generator)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let registry: SharedRegistry = Arc::new(Mutex::new(Registry::default()));
        let scheduler = generator.start(&submit.spec, Arc::clone(&registry))?;
        info!(
            "Registered as slave {} reporting to master {}",
            submit.slave_id, submit.master
        );
        {
            let mut inner = self.lock_inner();
            inner.context = Some(SlaveContext {
                id: submit.slave_id,
                master: submit.master,
                client,
            });
            inner.scheduler = Some(scheduler);
            inner.registry = registry;
        }

        let agent = Arc::clone(&self);
        let period = Duration::from_millis(submit.spec.report_interval_ms.max(1));
        tokio::spawn(async move {
            agent.push_progress_loop(period).await;
        });
        Ok(())
    }

    /// Whether the local scheduler is running. A slave that never received
    /// a submission reports not running, which the state endpoint turns
    /// into a 410.
    #[must_use]
    pub fn running(&self) -> bool {
        self.lock_inner()
            .scheduler
            .as_ref()
            .is_some_and(|scheduler| scheduler.running())
    }

    /// Stops all local tests; fire-and-forget from the master's side.
    pub fn stop(&self) {
        if let Some(scheduler) = self.lock_inner().scheduler.as_ref() {
            scheduler.stop_all();
        }
    }

    async fn push_progress_loop(self: Arc<Self>, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await;
        loop {
            interval.tick().await;
            let still_running = self.running();
            self.push_progress().await;
            if !still_running {
                // One final report after the scheduler stopped; the master
                // learns about completion from the next state probe.
                break;
            }
        }
        debug!("Progress push loop ended");
    }

    async fn push_progress(&self) {
        let Some((client, url, report)) = self.build_report() else {
            return;
        };
        match client.post(&url).json(&report).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!("Master rejected progress report: {}", response.status()),
            Err(err) => warn!("Failed to push progress to master: {}", err),
        }
    }

    /// Serializes the interval snapshots and resets them. The push itself is
    /// not awaited for an application-level acknowledgement, so the reset
    /// happens at serialization time.
    fn build_report(&self) -> Option<(reqwest::Client, String, ProgressReport)> {
        let inner = self.lock_inner();
        let context = inner.context.as_ref()?;
        let mut registry = lock_registry(&inner.registry);
        let stats: Vec<StatSnapshot> = registry
            .iter()
            .map(|reportable| StatSnapshot {
                name: reportable.name().to_owned(),
                add_to_http_report: reportable.add_to_http_report(),
                interval: reportable.interval_sketch().clone(),
            })
            .collect();
        registry.next_all();
        let url = format!("http://{}/remote/progress", context.master);
        Some((
            context.client.clone(),
            url,
            ProgressReport {
                slave_id: context.id.clone(),
                stats,
            },
        ))
    }
}

/// Runs the slave role: serves the `/remote` endpoints until the process
/// exits.
///
/// # Errors
///
/// Returns an error if the listener cannot bind.
pub async fn run_slave(listen: &str, catalog: GeneratorCatalog) -> AppResult<()> {
    let listener = TcpListener::bind(listen).await.map_err(|err| {
        AppError::remote(RemoteError::Bind {
            addr: listen.to_owned(),
            source: err,
        })
    })?;
    info!("Slave listening on {}", listen);
    let agent = SlaveAgent::new(catalog);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    serve(listener, Arc::new(RemoteRouter::slave(agent)), shutdown_rx).await;
    Ok(())
}
