mod telemetry;

use std::io::{self, Write};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use lotel_collector::{HEALTH_URL, StartOutcome, StopOutcome, Supervisor};
use lotel_core::error::LotelError;
use lotel_core::filter::{QueryOptions, some_nonempty};
use lotel_core::paths::Paths;
use lotel_core::time::{parse_duration_str, parse_time_or_relative};
use lotel_store::Store;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "lotel")]
#[command(about = "Local OpenTelemetry: supervise a collector and query telemetry")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start the collector as a detached background process")]
    Start {
        #[arg(long, help = "Block until the collector reports healthy (30s)")]
        wait: bool,
    },
    #[command(about = "Stop the running collector")]
    Stop,
    #[command(about = "Show collector status (JSON; exit 1 when not running)")]
    Status,
    #[command(about = "Check collector health (exit 0 if healthy, 1 if not)")]
    Health,
    #[command(about = "Ingest collector-written JSONL files into the query database")]
    Ingest,
    #[command(about = "Query telemetry data")]
    Query {
        #[command(subcommand)]
        target: QueryCommands,
    },
    #[command(about = "Delete telemetry data older than a threshold")]
    Prune {
        #[arg(long, help = "Age threshold, e.g. 7d, 24h")]
        older_than: Option<String>,
        #[arg(long, help = "Delete all telemetry data")]
        all: bool,
        #[arg(long, help = "Limit pruning to one service")]
        service: Option<String>,
        #[arg(long, help = "Report what would be deleted without deleting")]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum QueryCommands {
    #[command(about = "Query traces (JSON array)")]
    Traces(FilterArgs),
    #[command(about = "Query metric data points (JSON array)")]
    Metrics(FilterArgs),
    #[command(about = "Query logs (JSON array)")]
    Logs(FilterArgs),
    #[command(about = "Compute count/avg/min/max for one metric over a window")]
    Aggregate {
        #[arg(long, help = "Metric name to aggregate")]
        metric: String,
        #[command(flatten)]
        window: WindowArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct WindowArgs {
    #[arg(long, help = "Filter by service.name")]
    service: Option<String>,
    #[arg(long, help = "Start time (RFC3339 or relative like 1h, 24h, 7d)")]
    since: Option<String>,
    #[arg(long, help = "End time (RFC3339 or relative)")]
    until: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    #[command(flatten)]
    window: WindowArgs,
    #[arg(long, help = "Max results (0 = unlimited)")]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_cli_tracing();
    let cli = Cli::parse();
    let paths = Paths::resolve()?;

    match cli.command {
        Commands::Start { wait } => run_start(&paths, wait).await,
        Commands::Stop => run_stop(&paths).await,
        Commands::Status => run_status(&paths).await,
        Commands::Health => run_health(&paths).await,
        Commands::Ingest => run_ingest(&paths),
        Commands::Query { target } => run_query(&paths, target),
        Commands::Prune {
            older_than,
            all,
            service,
            dry_run,
        } => run_prune(&paths, older_than.as_deref(), all, service, dry_run),
    }
}

async fn run_start(paths: &Paths, wait: bool) -> anyhow::Result<()> {
    paths.ensure_layout().context("preparing data directories")?;
    let config_path = paths.config_source().context("resolving configuration")?;
    let supervisor = Supervisor::new(paths.clone());

    match supervisor
        .start(&config_path, &paths.data_dir())
        .context("starting collector")?
    {
        StartOutcome::AlreadyRunning { pid } => {
            println!("Collector is already running (PID {pid}).");
        }
        StartOutcome::Started(record) => {
            println!("Collector started (PID {}).", record.pid);
            println!("Binary: {}", record.binary.display());
            println!("Config: {}", record.config_path.display());
            println!("Data:   {}", record.data_path.display());
            println!("Health: {HEALTH_URL}");
        }
    }

    if wait {
        print!("Waiting for collector to become healthy...");
        io::stdout().flush()?;
        let waited = tokio::select! {
            res = lotel_collector::wait_healthy(Duration::from_secs(30)) => res,
            _ = tokio::signal::ctrl_c() => Err(LotelError::Supervise("interrupted".to_string())),
        };
        match waited {
            Ok(()) => println!(" OK"),
            Err(e) => {
                println!(" FAILED");
                return Err(e).context("collector did not become healthy");
            }
        }
    }

    Ok(())
}

async fn run_stop(paths: &Paths) -> anyhow::Result<()> {
    let supervisor = Supervisor::new(paths.clone());
    match supervisor.stop().await.context("stopping collector")? {
        StopOutcome::NotRunning => println!("No collector is running."),
        StopOutcome::Stopped { pid, forced: false } => println!("Collector stopped (PID {pid})."),
        StopOutcome::Stopped { pid, forced: true } => {
            println!("Collector did not exit in time; killed (PID {pid}).");
        }
    }
    Ok(())
}

async fn run_status(paths: &Paths) -> anyhow::Result<()> {
    let supervisor = Supervisor::new(paths.clone());
    let status = supervisor
        .status()
        .await
        .context("reading collector status")?;
    print_json(&status)?;
    if !status.running {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_health(paths: &Paths) -> anyhow::Result<()> {
    let supervisor = Supervisor::new(paths.clone());
    let status = supervisor
        .status()
        .await
        .context("reading collector status")?;
    if !status.running {
        println!("Collector is not running.");
        std::process::exit(1);
    }
    if !status.healthy {
        println!("Collector is running but not healthy.");
        std::process::exit(1);
    }
    println!("Collector is healthy.");
    Ok(())
}

fn run_ingest(paths: &Paths) -> anyhow::Result<()> {
    let store = open_store(paths)?;
    let summary =
        lotel_ingest::ingest_all(&store, &paths.data_dir()).context("ingesting signal files")?;
    println!("Ingestion complete: {summary}.");
    Ok(())
}

fn run_query(paths: &Paths, target: QueryCommands) -> anyhow::Result<()> {
    // Filters are validated before the database is opened.
    match target {
        QueryCommands::Traces(filter) => {
            let opts = build_options(&filter)?;
            let store = open_store(paths)?;
            print_json(&store.query_spans(&opts).context("querying traces")?)
        }
        QueryCommands::Metrics(filter) => {
            let opts = build_options(&filter)?;
            let store = open_store(paths)?;
            print_json(&store.query_metrics(&opts).context("querying metrics")?)
        }
        QueryCommands::Logs(filter) => {
            let opts = build_options(&filter)?;
            let store = open_store(paths)?;
            print_json(&store.query_logs(&opts).context("querying logs")?)
        }
        QueryCommands::Aggregate { metric, window } => {
            let opts = build_window_options(&window)?;
            let store = open_store(paths)?;
            print_json(
                &store
                    .aggregate_metrics(&opts, &metric)
                    .context("aggregating metrics")?,
            )
        }
    }
}

fn run_prune(
    paths: &Paths,
    older_than: Option<&str>,
    all: bool,
    service: Option<String>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let cutoff = prune_cutoff(older_than, all)?;
    let store = open_store(paths)?;
    let service = service.unwrap_or_default();
    let reports = store
        .prune(cutoff, &service, dry_run)
        .context("pruning telemetry")?;
    if dry_run {
        eprintln!("Dry run: no data was deleted.");
    }
    print_json(&reports)
}

fn prune_cutoff(older_than: Option<&str>, all: bool) -> anyhow::Result<DateTime<Utc>> {
    if all && older_than.is_some() {
        anyhow::bail!("--all and --older-than are mutually exclusive");
    }
    if all {
        // A future cutoff catches every row.
        return Ok(Utc::now() + chrono::Duration::hours(1));
    }

    let raw = older_than
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("--older-than or --all is required (e.g. 7d, 24h)"))?;
    let age = parse_duration_str(raw).context("invalid --older-than")?;
    Ok(Utc::now() - chrono::Duration::from_std(age).context("invalid --older-than")?)
}

fn build_options(filter: &FilterArgs) -> anyhow::Result<QueryOptions> {
    let mut opts = build_window_options(&filter.window)?;
    opts.limit = filter.limit.filter(|limit| *limit > 0);
    Ok(opts)
}

fn build_window_options(window: &WindowArgs) -> anyhow::Result<QueryOptions> {
    let since = window
        .since
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_time_or_relative)
        .transpose()
        .context("invalid --since")?;
    let until = window
        .until
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_time_or_relative)
        .transpose()
        .context("invalid --until")?;

    Ok(QueryOptions {
        service: window.service.as_deref().and_then(some_nonempty),
        since,
        until,
        limit: None,
    })
}

fn open_store(paths: &Paths) -> anyhow::Result<Store> {
    Store::open(&paths.db_path()).context("opening query database")
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
