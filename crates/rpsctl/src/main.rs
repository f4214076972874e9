use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rpsctl_core::{
    Config, FixedExecutor, HttpExecutor, LogReporter, Orchestrator, RequestExecutor, RunResult,
    SimulatedExecutor, TickReport, Timeline,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "rpsctl")]
#[command(about = "Closed-loop load generator - scales virtual users to hold a target RPS")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/example.toml")]
    config: PathBuf,

    /// Request driver
    #[arg(long, value_enum, default_value_t = Mode::Simulated)]
    mode: Mode,

    /// Target RPS (overrides config)
    #[arg(long)]
    target_rps: Option<f64>,

    /// Maximum VUs (overrides config)
    #[arg(long)]
    max_vus: Option<usize>,

    /// Test duration in milliseconds (overrides config)
    #[arg(long)]
    duration_ms: Option<u64>,

    /// Directory for the JSON result file
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    /// Skip writing the JSON result file
    #[arg(long)]
    no_results: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Random 50-100ms latency, 90% success (tunable under [simulation])
    Simulated,
    /// Constant latency from simulation.min_delay_ms, always succeeds
    Fixed,
    /// Real HTTP GET against target.url
    Http,
}

#[derive(Debug, Serialize)]
struct RunFile<'a> {
    timestamp: String,
    target: &'a str,
    mode: String,
    target_rps: f64,
    max_vus: usize,
    result: &'a RunResult,
    ticks: &'a [TickReport],
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    apply_overrides(&mut config, &args);

    let executor = build_executor(args.mode, &config)?;
    info!("Using executor: {}", executor.name());

    let orchestrator =
        Orchestrator::new(config.clone(), executor).context("Invalid configuration")?;
    tokio::spawn(handle_ctrl_c(orchestrator.cancel_token()));

    let mut timeline = Timeline::new();
    let result = orchestrator
        .run(&mut (LogReporter, &mut timeline))
        .await;

    if !args.no_results {
        let path = write_results(&args, &config, &result, &timeline)?;
        info!("Results written to {}", path.display());
    }
    print_summary(&result);

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(rps) = args.target_rps {
        config.load.target_rps = rps;
    }
    if let Some(max_vus) = args.max_vus {
        config.load.max_vus = max_vus;
    }
    if let Some(duration_ms) = args.duration_ms {
        config.load.duration_ms = duration_ms;
    }
}

fn build_executor(mode: Mode, config: &Config) -> Result<Arc<dyn RequestExecutor>> {
    let executor: Arc<dyn RequestExecutor> = match mode {
        Mode::Simulated => Arc::new(SimulatedExecutor::from_config(&config.simulation)),
        Mode::Fixed => Arc::new(FixedExecutor::succeeding(Duration::from_millis(
            config.simulation.min_delay_ms,
        ))),
        Mode::Http => Arc::new(
            HttpExecutor::new(config.target.timeout_ms)
                .context("Failed to create HTTP executor")?,
        ),
    };
    Ok(executor)
}

/// First Ctrl+C drains gracefully, a second one exits immediately.
async fn handle_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to install Ctrl+C handler; run will only stop at its deadline");
        return;
    }
    warn!("Received Ctrl+C, stopping gracefully...");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Received second Ctrl+C, aborting");
        std::process::exit(1);
    }
}

fn write_results(
    args: &Args,
    config: &Config,
    result: &RunResult,
    timeline: &Timeline,
) -> Result<PathBuf> {
    let now = chrono::Utc::now();
    let file = RunFile {
        timestamp: now.to_rfc3339(),
        target: &config.target.url,
        mode: format!("{:?}", args.mode).to_lowercase(),
        target_rps: config.load.target_rps,
        max_vus: config.load.max_vus,
        result,
        ticks: &timeline.ticks,
    };

    std::fs::create_dir_all(&args.results_dir)
        .with_context(|| format!("Failed to create {:?}", args.results_dir))?;
    let path = args
        .results_dir
        .join(format!("run_{}.json", now.format("%Y%m%d_%H%M%S")));
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(path)
}

fn print_summary(result: &RunResult) {
    println!("\n=== Run Summary ===");
    if result.cancelled {
        println!("Cancelled early");
    }
    println!("Duration: {:.1}s", result.elapsed_secs);
    println!("Total requests: {}", result.total_requests);
    println!("Success: {}", result.success_count);
    println!("Errors: {}", result.error_count);
    println!("Final VUs: {}", result.final_vus);
    println!("Peak VUs: {}", result.peak_vus);
    println!("Final RPS: {:.1}", result.final_rps);
    println!("Mean RPS: {:.1}", result.mean_rps);
    if let Some(avg) = result.avg_latency_ms {
        println!("Avg latency: {:.1}ms", avg);
    }
    if let Some(warmup) = &result.warmup {
        println!(
            "Warm-up: {} probes, mean {}, started with {} VUs",
            warmup.probes,
            warmup
                .mean_latency_ms
                .map_or_else(|| "n/a".to_string(), |ms| format!("{:.1}ms", ms)),
            warmup.initial_vus
        );
    }
    if result.drain.aborted > 0 || result.drain.failed > 0 {
        println!(
            "Drain: {} aborted, {} failed",
            result.drain.aborted, result.drain.failed
        );
    }
    println!();
}
