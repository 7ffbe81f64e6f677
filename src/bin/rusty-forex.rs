//! rusty-forex CLI - cached FX rate history
//!
//! ## Example Usage
//!
//! ```bash
//! # Last month of GBP/INR, filling gaps from upstream
//! rusty-forex fetch GBP/INR --period 1M
//!
//! # Explicit dates as CSV
//! rusty-forex fetch USDEUR --start 2024-01-01 --end 2024-03-31 --format csv
//!
//! # One refresh cycle over the configured pairs
//! rusty-forex refresh
//!
//! # Keep refreshing until Ctrl-C
//! rusty-forex daemon
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rusty_forex::prelude::*;
use rusty_forex::refresh;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Exit status when data came back but some gaps could not be filled
const EXIT_INCOMPLETE: i32 = 2;

/// rusty-forex: locally cached FX rate history
#[derive(Parser)]
#[command(name = "rusty-forex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Robert Fall")]
#[command(about = "Locally cached FX rate history with upstream gap filling", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a rate series, filling missing days from upstream
    Fetch {
        /// Currency pair (GBP/INR, GBP-INR or GBPINR)
        #[arg(value_name = "PAIR")]
        pair: String,

        /// Period ending today (1W, 1M, 3M, 6M, 1Y)
        #[arg(short = 'p', long, conflicts_with_all = ["start", "end"])]
        period: Option<String>,

        /// Start date (YYYY-MM-DD)
        #[arg(short = 's', long, requires = "end")]
        start: Option<String>,

        /// End date (YYYY-MM-DD)
        #[arg(short = 'e', long, requires = "start")]
        end: Option<String>,

        /// Output format
        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Run one refresh cycle over the configured pairs and periods
    Refresh,

    /// Refresh on the configured interval until interrupted
    Daemon,

    /// Show cached pairs and their coverage
    Status,

    /// Show effective configuration
    Info,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            process::exit(1);
        }
    };

    if cli.verbose {
        println!(
            "{} v{}",
            "rusty-forex".cyan().bold(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "Database: {}",
            config.db_path.display().to_string().dimmed()
        );
    }

    let config_path = Config::source_path(cli.config.as_deref());

    let result = match cli.command {
        Commands::Fetch {
            pair,
            period,
            start,
            end,
            format,
        } => {
            fetch_series(FetchConfig {
                pair,
                period,
                start,
                end,
                format,
                config,
            })
            .await
        }
        Commands::Refresh => refresh_once(&config).await,
        Commands::Daemon => run_daemon(&config).await,
        Commands::Status => show_status(&config),
        Commands::Info => show_info(&config, &config_path),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            process::exit(1);
        }
    }
}

struct FetchConfig {
    pair: String,
    period: Option<String>,
    start: Option<String>,
    end: Option<String>,
    format: OutputFormat,
    config: Config,
}

fn build_cache(config: &Config) -> anyhow::Result<ForexCache<YahooChartSource>> {
    config
        .ensure_dirs()
        .context("Failed to create data directory")?;
    let tz = config.tz()?;
    let store = RateStore::open(&config.db_path)?;
    let source = YahooChartSource::new(&config.upstream, tz)?;
    Ok(ForexCache::new(store, source, tz).with_mark_empty_days(config.mark_empty_days))
}

// Command implementations
async fn fetch_series(cfg: FetchConfig) -> anyhow::Result<i32> {
    let pair: CurrencyPair = cfg.pair.parse()?;
    let period = match (&cfg.period, &cfg.start) {
        (None, None) => Some("1M"),
        _ => cfg.period.as_deref(),
    };
    let request = RangeRequest::parse(period, cfg.start.as_deref(), cfg.end.as_deref())?;

    let cache = build_cache(&cfg.config)?;
    let result = cache.get_range(&pair, &request).await?;

    match cfg.format {
        OutputFormat::Table => print_table(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result.records)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            for record in &result.records {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
    }

    if result.is_complete() {
        return Ok(0);
    }

    eprintln!(
        "{} {} gap(s) could not be filled, result is incomplete:",
        "Warning:".yellow().bold(),
        result.failures.len()
    );
    for failure in &result.failures {
        let hint = if failure.error.is_retryable() {
            "retryable"
        } else {
            "no data upstream"
        };
        eprintln!("  {} {} ({})", failure.range, failure.error, hint.dimmed());
    }
    Ok(EXIT_INCOMPLETE)
}

fn print_table(result: &RangeResult) {
    println!(
        "{} {} {}",
        result.pair.to_string().cyan().bold(),
        result.range,
        format!("({} rows)", result.records.len()).dimmed()
    );
    println!(
        "{:<12} {:>12} {:>12} {:>12} {:>12} {:>12}",
        "Date".bold(),
        "Open".bold(),
        "High".bold(),
        "Low".bold(),
        "Close".bold(),
        "Volume".bold()
    );
    for r in &result.records {
        println!(
            "{:<12} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>12}",
            r.date.to_string(),
            r.open,
            r.high,
            r.low,
            r.close,
            r.volume
        );
    }
}

async fn refresh_once(config: &Config) -> anyhow::Result<i32> {
    let schedule = RefreshSchedule::from_config(&config.refresh)?;
    let cache = build_cache(config)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!(
        "Refreshing {} pair(s) x {} period(s)...",
        schedule.pairs.len(),
        schedule.periods.len()
    ));

    let started = Instant::now();
    let summary = refresh::run_once(&cache, &schedule).await;
    pb.finish_with_message("Refresh complete");

    println!();
    println!("{}", "Refresh Summary".cyan().bold());
    println!("  {} {}", "Combinations:".bold(), summary.combinations);
    println!("  {} {}", "Gaps fetched:".bold(), summary.gaps_fetched);
    println!("  {} {}", "Gap failures:".bold(), summary.gap_failures);
    println!("  {} {}", "Errors:".bold(), summary.errors);
    println!("  {} {:.2}s", "Elapsed:".bold(), started.elapsed().as_secs_f64());
    let mut rows: Vec<_> = summary.rows_by_pair.iter().collect();
    rows.sort();
    for (pair, count) in rows {
        println!("  {} {} rows", format!("{}:", pair).bold(), count);
    }

    Ok(if summary.is_clean() { 0 } else { EXIT_INCOMPLETE })
}

async fn run_daemon(config: &Config) -> anyhow::Result<i32> {
    let schedule = RefreshSchedule::from_config(&config.refresh)?;
    let cache = Arc::new(build_cache(config)?);

    println!(
        "{} refreshing {} pair(s) every {}h, Ctrl-C to stop",
        "Daemon:".cyan().bold(),
        schedule.pairs.len(),
        schedule.interval.as_secs() / 3600
    );

    let handle = RefreshTask::spawn(cache, schedule);
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    log::info!("Shutdown signal received");
    handle.shutdown().await;
    Ok(0)
}

fn show_status(config: &Config) -> anyhow::Result<i32> {
    if !config.db_path.exists() {
        println!("{}", "No rate database yet.".yellow());
        return Ok(0);
    }
    let store = RateStore::open(&config.db_path)?;
    let pairs = store.pairs()?;

    println!("{}", "Cached Pairs".cyan().bold());
    if pairs.is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for pair in pairs {
        if let Some(coverage) = store.coverage(&pair)? {
            println!(
                "  {:<10} {} .. {}  {}",
                pair.to_string().bold(),
                coverage.first,
                coverage.last,
                format!("{} rows", coverage.rows).dimmed()
            );
        }
    }
    Ok(0)
}

fn show_info(config: &Config, config_path: &Path) -> anyhow::Result<i32> {
    println!("{}", "rusty-forex Configuration".cyan().bold());
    println!();
    println!("{}", "General:".bold());
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));
    if config_path.exists() {
        println!("  Config file: {}", config_path.display());
    } else {
        println!("  Config file: {} {}", config_path.display(), "(absent, defaults)".dimmed());
    }
    println!("  Database: {}", config.db_path.display());
    println!("  Time zone: {}", config.timezone);
    println!("  Mark empty days: {}", config.mark_empty_days);
    println!();
    println!("{}", "Upstream:".bold());
    println!("  Base URL: {}", config.upstream.base_url);
    println!("  Timeout: {}s", config.upstream.timeout_secs);
    println!();
    println!("{}", "Refresh:".bold());
    println!("  Interval: {}h", config.refresh.interval_hours);
    println!("  Pairs: {}", config.refresh.pairs.join(", "));
    println!("  Periods: {}", config.refresh.periods.join(", "));
    Ok(0)
}
