
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};
use crate::stats::{Histogram, HistogramParams, Registry, Sketch};

use super::pool::{CompletionCallback, PoolCommand, SlaveEndpoint, WorkerPool};
use super::ports::ReportRenderer;
use super::protocol::TestSpec;

pub(super) fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::remote(format!("Failed to build runtime: {}", err)))?;
    runtime.block_on(future)
}

pub(super) fn test_spec() -> TestSpec {
    TestSpec {
        generator: "synthetic".to_owned(),
        concurrency: 1,
        duration_ms: Some(1000),
        rate: None,
        report_interval_ms: 100,
    }
}

pub(super) fn histogram_snapshot(num_buckets: usize, samples: &[u64]) -> Sketch {
    let mut histogram = Histogram::new(HistogramParams {
        num_buckets,
        percentiles: vec![0.95, 0.99],
    });
    for sample in samples {
        histogram.put(*sample);
    }
    Sketch::Histogram(histogram)
}

pub(super) struct CountingRenderer {
    pub(super) calls: AtomicUsize,
}

impl CountingRenderer {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

impl ReportRenderer for CountingRenderer {
    fn render(&self, _registry: &mut Registry) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

pub(super) fn capture_callback() -> (CompletionCallback, Arc<Mutex<Vec<Registry>>>) {
    let store: Arc<Mutex<Vec<Registry>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&store);
    let callback: CompletionCallback = Box::new(move |registry| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(registry);
    });
    (callback, store)
}

pub(super) struct PoolHarness {
    pub(super) pool: WorkerPool,
    pub(super) completions: Arc<Mutex<Vec<Registry>>>,
    pub(super) renderer: Arc<CountingRenderer>,
    // Held so ping outcomes have somewhere to land.
    pub(super) _rx: mpsc::UnboundedReceiver<PoolCommand>,
}

pub(super) fn make_pool(hosts: &[(&str, u16)]) -> AppResult<PoolHarness> {
    let endpoints: Vec<SlaveEndpoint> = hosts
        .iter()
        .map(|(host, port)| SlaveEndpoint::new(*host, *port))
        .collect();
    let (tx, rx) = mpsc::unbounded_channel();
    let (callback, completions) = capture_callback();
    let renderer = CountingRenderer::new();
    let pool = WorkerPool::new(
        endpoints,
        test_spec(),
        "127.0.0.1:7999".to_owned(),
        Arc::clone(&renderer) as Arc<dyn ReportRenderer>,
        callback,
        Duration::from_millis(100),
        false,
        tx,
    )?;
    Ok(PoolHarness {
        pool,
        completions,
        renderer,
        _rx: rx,
    })
}

pub(super) fn completed_count(store: &Arc<Mutex<Vec<Registry>>>) -> usize {
    store.lock().unwrap_or_else(PoisonError::into_inner).len()
}
