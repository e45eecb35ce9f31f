//! Synthetic workload driver.
//!
//! Many threads request a skewed mix of artifacts through the orchestrator
//! with a fake producer that "decodes" a source image (cached in a weighted
//! memory tier) and "resizes" it. Prints outcome counts, write queue
//! behaviour, and latency percentiles from the telemetry sketches.

use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rastercache::cache::{CacheKey, CacheOutcome, WeightedBoundedCache};
use rastercache::config::{format_size, ConfigFile};
use rastercache::orchestrator::CacheOrchestrator;
use rastercache::telemetry::{
    TelemetryRegistry, GET_OR_CREATE_SINK, PIXELS_SINK, RESOLUTION_SINK,
};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::info;

use crate::error::CliError;

/// Arguments for `rastercache simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Concurrent request threads
    #[arg(long, default_value_t = 8)]
    pub threads: usize,

    /// Requests issued by each thread
    #[arg(long, default_value_t = 200)]
    pub requests: usize,

    /// Distinct artifacts in the request mix
    #[arg(long, default_value_t = 64)]
    pub keys: usize,

    /// Size of each produced artifact in KB
    #[arg(long, default_value_t = 256)]
    pub artifact_kb: usize,

    /// Simulated decode time per source in milliseconds
    #[arg(long, default_value_t = 20)]
    pub produce_ms: u64,

    /// Artifact store directory (overrides the configured one)
    #[arg(long)]
    pub store_dir: Option<PathBuf>,

    /// Seed for the request mix
    #[arg(long, default_value_t = 1)]
    pub seed: u64,
}

#[derive(Default)]
struct Tally {
    hits: AtomicU64,
    misses: AtomicU64,
    failed: AtomicU64,
}

impl Tally {
    fn record(&self, outcome: CacheOutcome) {
        let counter = match outcome {
            CacheOutcome::Hit => &self.hits,
            CacheOutcome::Miss => &self.misses,
            CacheOutcome::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Workload shape shared by every request thread.
#[derive(Debug, Clone, Copy)]
struct Workload {
    requests: usize,
    keys: usize,
    artifact_bytes: usize,
    decode: Duration,
    lock_timeout: Duration,
    modified: SystemTime,
}

/// Run the simulation.
pub fn run(args: SimulateArgs, config: &ConfigFile) -> Result<(), CliError> {
    if args.threads == 0 || args.keys == 0 {
        return Err(CliError::InvalidArgument(
            "--threads and --keys must be at least 1".to_string(),
        ));
    }

    let mut config = config.clone();
    if let Some(dir) = args.store_dir {
        config.store.directory = dir;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let telemetry = Arc::new(TelemetryRegistry::with_default_sinks(config.telemetry.seed));
    let mut orchestrator = CacheOrchestrator::from_config(&config, runtime.handle().clone())?;
    if config.telemetry.enabled {
        orchestrator = orchestrator.with_telemetry(Arc::clone(&telemetry));
    }
    let sources: WeightedBoundedCache<Arc<Vec<u8>>> =
        WeightedBoundedCache::new(config.memory_cache.clone());

    let workload = Workload {
        requests: args.requests,
        keys: args.keys,
        artifact_bytes: args.artifact_kb.max(1) * 1024,
        decode: Duration::from_millis(args.produce_ms),
        lock_timeout: config.locks.wait_timeout,
        modified: SystemTime::now(),
    };
    let tally = Tally::default();

    info!(
        threads = args.threads,
        requests = args.requests,
        keys = args.keys,
        store = %config.store.directory.display(),
        "Starting simulation"
    );

    let started = Instant::now();
    thread::scope(|scope| {
        for worker in 0..args.threads {
            let seed = args.seed.wrapping_add(worker as u64);
            let (orchestrator, sources, telemetry, tally) =
                (&orchestrator, &sources, &telemetry, &tally);
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                for _ in 0..workload.requests {
                    let index = skewed_index(&mut rng, workload.keys);
                    let (width, height) = dimensions(index);
                    telemetry.report(PIXELS_SINK, width * height);
                    telemetry.report(RESOLUTION_SINK, width.max(height));

                    let key = CacheKey::new(
                        format!("gallery/{index:05}_{width}x{height}.jpg"),
                        workload.modified,
                    );
                    let result = orchestrator.get_or_create(&key, workload.lock_timeout, || {
                        produce(sources, index, &workload)
                    });
                    match result {
                        Ok(found) => tally.record(found.outcome()),
                        Err(never) => match never {},
                    }
                }
            });
        }
    });
    let elapsed = started.elapsed();

    let drained = orchestrator.drain(Duration::from_secs(30));
    orchestrator.log_stats();
    telemetry.log_summary();

    let summary = args_summary(args.threads, &workload);
    print_report(
        &summary,
        elapsed,
        drained,
        &orchestrator,
        &sources,
        &telemetry,
        &tally,
    );
    Ok(())
}

/// Decode the source (once per source, via the memory tier) and resize it.
fn produce(
    sources: &WeightedBoundedCache<Arc<Vec<u8>>>,
    index: usize,
    workload: &Workload,
) -> Result<Vec<u8>, Infallible> {
    let source_key = format!("source/{index:05}");
    let source = sources.get_or_insert_with(&source_key, workload.lock_timeout, || {
        thread::sleep(workload.decode);
        Ok::<_, Infallible>(Arc::new(synthetic_pixels(index, workload.artifact_bytes * 4)))
    })?;

    thread::sleep(workload.decode / 4);
    Ok(source
        .iter()
        .step_by(4)
        .take(workload.artifact_bytes)
        .copied()
        .collect())
}

/// Roughly Zipf-like: low indices are requested far more often.
fn skewed_index(rng: &mut StdRng, keys: usize) -> usize {
    let u: f64 = rng.gen();
    ((u * u * u) * keys as f64) as usize % keys
}

fn dimensions(index: usize) -> (u64, u64) {
    let width = 320 + (index as u64 * 193) % 7_680;
    (width, width * 3 / 4)
}

fn synthetic_pixels(index: usize, len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i ^ index) & 0xFF) as u8).collect()
}

fn args_summary(threads: usize, workload: &Workload) -> String {
    format!(
        "{} threads x {} requests over {} keys, {} artifacts",
        threads,
        workload.requests,
        workload.keys,
        format_size(workload.artifact_bytes)
    )
}

fn print_report(
    summary: &str,
    elapsed: Duration,
    drained: bool,
    orchestrator: &CacheOrchestrator,
    sources: &WeightedBoundedCache<Arc<Vec<u8>>>,
    telemetry: &TelemetryRegistry,
    tally: &Tally,
) {
    let stats = orchestrator.stats();
    let queue = orchestrator.write_queue().stats();
    let memory = sources.stats();

    println!("Simulation: {}", summary);
    println!("Elapsed:    {:.2?}", elapsed);
    println!();
    println!("Outcomes");
    println!("  hits:     {}", tally.hits.load(Ordering::Relaxed));
    println!("  misses:   {}", tally.misses.load(Ordering::Relaxed));
    println!("  failed:   {}", tally.failed.load(Ordering::Relaxed));
    println!("  hit rate: {:.1}%", stats.hit_rate() * 100.0);
    println!();
    println!("Write queue");
    println!("  accepted:          {}", queue.accepted);
    println!("  rejected:          {} ({:.1}%)", queue.rejected(), queue.rejection_ratio() * 100.0);
    println!("  completed:         {}", queue.completed);
    println!("  failed:            {}", queue.failed);
    println!("  sync fallbacks:    {}", stats.sync_writes);
    println!("  drained:           {}", if drained { "yes" } else { "no (timed out)" });
    println!();
    println!("Source memory tier");
    println!("  entries:           {}", memory.entry_count);
    println!("  weight:            {}", format_size(memory.weight_bytes as usize));
    println!("  hit rate:          {:.1}%", memory.hit_rate() * 100.0);
    println!("  evictions:         {}", memory.evictions);
    println!();

    if let Ok(latency) = telemetry.percentiles(GET_OR_CREATE_SINK, &[0.5, 0.9, 0.99]) {
        println!("get_or_create latency (approximate)");
        println!("  p50: {:>10} us", latency[0]);
        println!("  p90: {:>10} us", latency[1]);
        println!("  p99: {:>10} us", latency[2]);
    }
    if let Ok(pixels) = telemetry.percentile(PIXELS_SINK, 0.5) {
        println!("median image: {:.1} MP", pixels as f64 / 1_000_000.0);
    }
}
