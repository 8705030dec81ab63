use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use loadfleet::error::AppResult;
use loadfleet::remote::{LoadGenerator, SchedulerHandle, TestSpec};
use loadfleet::stats::{
    Histogram, Reportable, ResultsCounter, Sample, SharedRegistry, Sketch, lock_registry,
};

/// Deterministic stand-in for a real load generator: emits synthetic
/// latency and status-code observations on a timer, so a fleet can be
/// smoke-tested without a target system.
pub struct SyntheticGenerator;

struct SyntheticHandle {
    running: Arc<AtomicBool>,
}

impl SchedulerHandle for SyntheticHandle {
    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop_all(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl LoadGenerator for SyntheticGenerator {
    fn start(&self, spec: &TestSpec, stats: SharedRegistry) -> AppResult<Box<dyn SchedulerHandle>> {
        {
            let mut registry = lock_registry(&stats);
            registry.register(Reportable::new(
                "latency",
                Sketch::Histogram(Histogram::default()),
                true,
            ));
            registry.register(Reportable::new(
                "results",
                Sketch::ResultsCounter(ResultsCounter::new()),
                true,
            ));
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let rate = spec.rate.unwrap_or(10).max(1);
        let per_tick = usize::try_from(rate.div_ceil(10))
            .unwrap_or(1)
            .saturating_mul(spec.concurrency.max(1));
        let duration = spec.duration_ms.map(Duration::from_millis);

        tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(Duration::from_millis(100));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut seq: u64 = 0;
            while flag.load(Ordering::SeqCst) {
                interval.tick().await;
                if duration.is_some_and(|limit| started.elapsed() >= limit) {
                    break;
                }
                let mut registry = lock_registry(&stats);
                for _ in 0..per_tick {
                    seq = seq.wrapping_add(1);
                    let latency = 5 + (seq * 7) % 45;
                    registry.record("latency", &Sample::Value(latency));
                    let status = if seq % 50 == 0 { "500" } else { "200" };
                    registry.record("results", &Sample::Key(status.to_owned()));
                }
            }
            flag.store(false, Ordering::SeqCst);
            debug!("Synthetic load finished");
        });

        Ok(Box::new(SyntheticHandle { running }))
    }
}
