//! CLI argument definitions for stockdigest.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Stock data for tickers from the best available tier |
//! | `status` | Source availability, budgets, cache and snapshot state |
//! | `cache` | Inspect and clean the durable cache |
//! | `budget` | Daily call budget per source |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--home` | `$STOCKDIGEST_HOME` | Root directory of the cache |
//! | `--log-format` | `text` | Log format on stderr (text, json) |
//! | `--offline` | `false` | Never call live sources |
//!
//! # Examples
//!
//! ```bash
//! stockdigest fetch AAPL MSFT --pretty
//! stockdigest fetch --tickers-file watchlist.csv --format table
//! stockdigest cache get AAPL --source yahoo_finance
//! stockdigest --offline status
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stockdigest_core::SourceId;

/// Daily stock data with a budgeted multi-source fallback chain.
#[derive(Debug, Parser)]
#[command(
    name = "stockdigest",
    author,
    version,
    about = "Daily stock data cache with multi-source fallback",
    long_about = "stockdigest serves stock data from the best tier available:\n\
\n\
  • live sources (Yahoo Finance, Alpha Vantage) at most once per day\n\
  • the durable DuckDB cache\n\
  • the newest CSV snapshot\n\
  • synthetic placeholder data\n\
\n\
Use 'stockdigest <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Root directory for the cache (overrides STOCKDIGEST_HOME).
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Log line format on stderr. Filter with RUST_LOG.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Treat every live source as unavailable for this run.
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns for terminal display.
    Table,
    /// Single JSON document.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch stock data for tickers.
    ///
    /// Without tickers the default watchlist is used.
    ///
    /// # Examples
    ///
    ///   stockdigest fetch AAPL MSFT
    ///   stockdigest fetch --tickers-file watchlist.txt --force-refresh
    Fetch(FetchArgs),

    /// Report source availability, budgets, cache and snapshot state.
    Status,

    /// Durable cache commands.
    Cache(CacheArgs),

    /// Show today's call budget per source.
    Budget(BudgetArgs),
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Ticker symbols (e.g., AAPL, MSFT, BRK.B).
    pub tickers: Vec<String>,

    /// Read tickers from a file: one per line or the first CSV column.
    #[arg(long)]
    pub tickers_file: Option<PathBuf>,

    /// Skip live sources and serve from the cache tiers.
    #[arg(long, default_value_t = false)]
    pub force_refresh: bool,
}

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Newest fresh cached record for a ticker.
    Get(CacheGetArgs),

    /// Tickers with cached records.
    Tickers(CacheTickersArgs),

    /// Delete records older than the given number of days.
    Cleanup(CacheCleanupArgs),
}

#[derive(Debug, Args)]
pub struct CacheGetArgs {
    pub ticker: String,

    /// Restrict to one source (yahoo_finance, alpha_vantage).
    #[arg(long)]
    pub source: Option<SourceId>,

    /// Freshness window in hours (defaults to STOCKDIGEST_FRESHNESS_HOURS).
    #[arg(long)]
    pub max_age_hours: Option<u32>,
}

#[derive(Debug, Args)]
pub struct CacheTickersArgs {
    #[arg(long)]
    pub source: Option<SourceId>,
}

#[derive(Debug, Args)]
pub struct CacheCleanupArgs {
    /// Age cutoff in days (defaults to STOCKDIGEST_CLEANUP_DAYS).
    #[arg(long)]
    pub max_age_days: Option<u32>,
}

#[derive(Debug, Args)]
pub struct BudgetArgs {
    #[arg(long)]
    pub source: Option<SourceId>,
}
