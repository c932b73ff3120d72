use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use worker_lab::prelude::*;
use worker_lab::telemetry::{init_telemetry, TelemetryConfig};

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static GLOBAL: dhat::Alloc = dhat::Alloc;

/// Per-variant outcome, printed as one JSON line
#[derive(Debug, Serialize)]
struct RunSummary {
    variant: &'static str,
    submitted: usize,
    accepted: usize,
    results: usize,
    elapsed_ms: u128,
    live_activities_after_stop: usize,
    live_activities_after_drop: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    #[cfg(feature = "dhat-heap")]
    let _profiler = worker_lab::metrics::HeapProfiler::start();

    dotenvy::dotenv().ok();

    // Configure via environment variables:
    // - OTEL_EXPORTER_OTLP_ENDPOINT: OTLP endpoint for pool metrics
    // - RUST_LOG or LOG_LEVEL: Log filter (default: "info")
    // - WORKER_*: pool configuration, see WorkerPoolConfig::from_env
    // - DEMO_TASKS, DEMO_PAYLOAD_SIZE, DEMO_PRODUCERS: workload
    let telemetry = init_telemetry(TelemetryConfig::from_env());
    let sink = telemetry.metrics_sink();

    let base = WorkerPoolConfig::from_env().context("Invalid worker pool configuration")?;
    let tasks = env_usize("DEMO_TASKS", 1000)?;
    let payload_size = env_usize("DEMO_PAYLOAD_SIZE", 100)?;
    let producers = env_usize("DEMO_PRODUCERS", 4)?.max(1);

    tracing::info!(
        tasks,
        payload_size,
        producers,
        worker_count = base.worker_count,
        "worker-lab starting..."
    );

    let batch = TaskGenerator::new(payload_size).batch(tasks);

    for strategy in [LifecycleStrategy::Cooperative, LifecycleStrategy::FireAndForget] {
        let config = base
            .clone()
            .with_name(format!("{}-{}", base.name, strategy))
            .with_strategy(strategy)
            .with_expected_tasks(tasks);

        let summary = run_variant(config, Arc::clone(&sink), batch.clone(), producers)
            .await
            .with_context(|| format!("Failed to run {strategy} variant"))?;

        println!("{}", serde_json::to_string(&summary)?);
    }

    tracing::info!("worker-lab finished");
    Ok(())
}

async fn run_variant(
    config: WorkerPoolConfig,
    sink: Arc<dyn MetricsSink>,
    batch: Vec<Task>,
    producers: usize,
) -> Result<RunSummary> {
    let worker_count = config.worker_count;
    let helper_interval = config.helper_interval;
    let pool = Arc::new(WorkerPool::new(config, sink)?);
    let variant = pool.variant();
    let submitted = batch.len();

    let started = Instant::now();
    pool.start(worker_count)?;

    let chunk = submitted.div_ceil(producers).max(1);
    let mut chunks = Vec::with_capacity(producers);
    let mut rest = batch;
    while !rest.is_empty() {
        let tail = rest.split_off(chunk.min(rest.len()));
        chunks.push(std::mem::replace(&mut rest, tail));
    }

    let submits = chunks.into_iter().map(|chunk| {
        let pool = Arc::clone(&pool);
        async move { pool.submit(chunk).await }
    });
    let accepted: usize = futures::future::try_join_all(submits).await?.into_iter().sum();

    pool.stop().await?;
    let elapsed = started.elapsed();
    let results = pool.results().len();

    // Give leaked activities a chance to show up in the count
    tokio::time::sleep(helper_interval.min(Duration::from_millis(200))).await;
    let live_activities_after_stop = pool.live_activities();

    let gauge = pool.activity_gauge();
    drop(pool);
    gauge.settle(0, Duration::from_secs(2)).await;

    Ok(RunSummary {
        variant,
        submitted,
        accepted,
        results,
        elapsed_ms: elapsed.as_millis(),
        live_activities_after_stop,
        live_activities_after_drop: gauge.live(),
    })
}

fn env_usize(var: &str, default: usize) -> Result<usize> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("Failed to parse {var}='{value}'")),
        Err(_) => Ok(default),
    }
}
