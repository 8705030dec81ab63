
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use loadfleet::remote::{
    PoolOptions, SlaveEndpoint, TestSpec, run_master, run_slave,
};
use loadfleet::stats::Registry;

use support_remote::{CollectingRenderer, histogram_length, pick_port, test_catalog};

const SAMPLES_PER_SLAVE: u64 = 20;

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to build runtime: {}", err))
}

fn spawn_slave(port: u16, count: u64, pace: Duration) {
    let addr = format!("127.0.0.1:{}", port);
    let catalog = test_catalog(count, pace);
    tokio::spawn(async move {
        if let Err(err) = run_slave(&addr, catalog).await {
            eprintln!("Slave failed: {}", err);
        }
    });
}

fn test_spec() -> TestSpec {
    TestSpec {
        generator: "testgen".to_owned(),
        concurrency: 1,
        duration_ms: None,
        rate: None,
        report_interval_ms: 100,
    }
}

async fn run_master_to_completion(
    master_port: u16,
    slaves: Vec<SlaveEndpoint>,
    renderer: Arc<CollectingRenderer>,
    ping_period: Duration,
) -> Result<Registry, String> {
    let listen = format!("127.0.0.1:{}", master_port);
    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let callback = Box::new(move |registry: Registry| {
        if done_tx.send(registry).is_err() {
            // Test gave up waiting.
        }
    });
    let options = PoolOptions {
        ping_period,
        advertise: Some(listen.clone()),
        stay_alive: false,
    };
    let master = run_master(&listen, slaves, test_spec(), renderer, callback, options);
    tokio::time::timeout(Duration::from_secs(20), master)
        .await
        .map_err(|_| "Master did not complete in time".to_owned())?
        .map_err(|err| format!("Master failed: {}", err))?;
    done_rx
        .await
        .map_err(|_| "Completion callback never fired".to_owned())
}

#[test]
fn e2e_two_slaves_aggregate_and_complete() -> Result<(), String> {
    let runtime = runtime()?;
    runtime.block_on(async {
        let port_a = pick_port()?;
        let port_b = pick_port()?;
        spawn_slave(port_a, SAMPLES_PER_SLAVE, Duration::from_millis(15));
        spawn_slave(port_b, SAMPLES_PER_SLAVE, Duration::from_millis(15));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let renderer = CollectingRenderer::new();
        let slaves = vec![
            SlaveEndpoint::new("127.0.0.1", port_a),
            SlaveEndpoint::new("127.0.0.1", port_b),
        ];
        let registry = run_master_to_completion(
            pick_port()?,
            slaves,
            Arc::clone(&renderer),
            Duration::from_millis(400),
        )
        .await?;

        let total = histogram_length(&registry, "latency");
        if total != SAMPLES_PER_SLAVE * 2 {
            return Err(format!(
                "Aggregated latency count was {} (expected {})",
                total,
                SAMPLES_PER_SLAVE * 2
            ));
        }
        let renders = renderer.calls.load(Ordering::SeqCst);
        if renders == 0 {
            return Err("No aggregated progress report was emitted".to_owned());
        }
        // Reports land every 100 ms but emissions coalesce into 500 ms
        // windows, so renders stay well below the report count.
        if renders > 4 {
            return Err(format!("Progress reports did not coalesce: {} renders", renders));
        }
        Ok(())
    })
}

#[test]
fn e2e_unresponsive_slave_excluded_from_completion() -> Result<(), String> {
    let runtime = runtime()?;
    runtime.block_on(async {
        let port_a = pick_port()?;
        spawn_slave(port_a, SAMPLES_PER_SLAVE, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Nothing listens on the second endpoint; its probes never answer.
        let dead_port = pick_port()?;
        let renderer = CollectingRenderer::new();
        let slaves = vec![
            SlaveEndpoint::new("127.0.0.1", port_a),
            SlaveEndpoint::new("127.0.0.1", dead_port),
        ];
        let registry = run_master_to_completion(
            pick_port()?,
            slaves,
            renderer,
            Duration::from_millis(300),
        )
        .await?;

        let total = histogram_length(&registry, "latency");
        if total != SAMPLES_PER_SLAVE {
            return Err(format!(
                "Final report should carry only the live slave's samples, got {}",
                total
            ));
        }
        Ok(())
    })
}

#[test]
fn e2e_slave_wire_surface() -> Result<(), String> {
    let runtime = runtime()?;
    runtime.block_on(async {
        let port = pick_port()?;
        spawn_slave(port, 1000, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let base = format!("http://127.0.0.1:{}", port);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| format!("Failed to build client: {}", err))?;

        // Never started: the state probe must answer 410, not 404.
        let status = client
            .get(format!("{}/remote/state", base))
            .send()
            .await
            .map_err(|err| format!("State probe failed: {}", err))?
            .status()
            .as_u16();
        if status != 410 {
            return Err(format!("Fresh slave answered {} (expected 410)", status));
        }

        // Unknown generators are a protocol violation.
        let bad_submit = serde_json::json!({
            "slaveId": "127.0.0.1:1",
            "master": "127.0.0.1:1",
            "spec": { "generator": "mystery" }
        });
        let status = client
            .post(format!("{}/remote", base))
            .json(&bad_submit)
            .send()
            .await
            .map_err(|err| format!("Submit failed: {}", err))?
            .status()
            .as_u16();
        if status != 400 {
            return Err(format!("Unknown generator answered {} (expected 400)", status));
        }

        // A proper submission starts the scheduler.
        let submit = serde_json::json!({
            "slaveId": format!("127.0.0.1:{}", port),
            "master": "127.0.0.1:1",
            "spec": { "generator": "testgen", "reportIntervalMs": 60000 }
        });
        let status = client
            .post(format!("{}/remote", base))
            .json(&submit)
            .send()
            .await
            .map_err(|err| format!("Submit failed: {}", err))?
            .status()
            .as_u16();
        if status != 200 {
            return Err(format!("Submission answered {} (expected 200)", status));
        }
        let status = client
            .get(format!("{}/remote/state", base))
            .send()
            .await
            .map_err(|err| format!("State probe failed: {}", err))?
            .status()
            .as_u16();
        if status != 200 {
            return Err(format!("Running slave answered {} (expected 200)", status));
        }

        // Stop is fire-and-forget and flips the state probe to 410.
        let status = client
            .post(format!("{}/remote/stop", base))
            .send()
            .await
            .map_err(|err| format!("Stop failed: {}", err))?
            .status()
            .as_u16();
        if status != 200 {
            return Err(format!("Stop answered {} (expected 200)", status));
        }
        let status = client
            .get(format!("{}/remote/state", base))
            .send()
            .await
            .map_err(|err| format!("State probe failed: {}", err))?
            .status()
            .as_u16();
        if status != 410 {
            return Err(format!("Stopped slave answered {} (expected 410)", status));
        }

        // Anything else is 405.
        let status = client
            .delete(format!("{}/remote", base))
            .send()
            .await
            .map_err(|err| format!("Delete failed: {}", err))?
            .status()
            .as_u16();
        if status != 405 {
            return Err(format!("Unknown method answered {} (expected 405)", status));
        }
        let status = client
            .get(format!("{}/remote/unknown", base))
            .send()
            .await
            .map_err(|err| format!("Unknown path failed: {}", err))?
            .status()
            .as_u16();
        if status != 405 {
            return Err(format!("Unknown path answered {} (expected 405)", status));
        }
        Ok(())
    })
}

#[test]
fn e2e_master_rejects_malformed_progress() -> Result<(), String> {
    let runtime = runtime()?;
    runtime.block_on(async {
        let port_a = pick_port()?;
        spawn_slave(port_a, 1000, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let master_port = pick_port()?;
        let listen = format!("127.0.0.1:{}", master_port);
        let renderer = CollectingRenderer::new();
        let (done_tx, _done_rx) = tokio::sync::oneshot::channel::<Registry>();
        let callback = Box::new(move |registry: Registry| {
            if done_tx.send(registry).is_err() {
                // Test finished first.
            }
        });
        let options = PoolOptions {
            ping_period: Duration::from_millis(500),
            advertise: Some(listen.clone()),
            stay_alive: false,
        };
        let slaves = vec![SlaveEndpoint::new("127.0.0.1", port_a)];
        let master_listen = listen.clone();
        let master = tokio::spawn(async move {
            run_master(
                &master_listen,
                slaves,
                test_spec(),
                renderer,
                callback,
                options,
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|err| format!("Failed to build client: {}", err))?;
        let status = client
            .post(format!("http://{}/remote/progress", listen))
            .body("not json")
            .send()
            .await
            .map_err(|err| format!("Progress post failed: {}", err))?
            .status()
            .as_u16();
        if status != 400 {
            return Err(format!(
                "Malformed progress answered {} (expected 400)",
                status
            ));
        }

        master.abort();
        Ok(())
    })
}
