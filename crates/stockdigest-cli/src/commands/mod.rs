mod budget;
mod cache;
mod fetch;
mod status;

use std::sync::Arc;

use serde_json::Value;
use stockdigest_core::{
    CallBudgetTracker, Clock, DigestConfig, DurableCacheStore, FallbackOrchestrator, HttpClient,
    ReqwestHttpClient, SourceChainBuilder, SystemClock, Warehouse,
};

use crate::cli::{CacheCommand, Cli, Command};
use crate::error::CliError;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

/// Everything a command needs, wired once per process.
pub struct Context {
    pub config: DigestConfig,
    pub orchestrator: FallbackOrchestrator,
}

impl Context {
    pub fn open(cli: &Cli) -> Result<Self, CliError> {
        let mut config = DigestConfig::from_env()?;
        if let Some(home) = &cli.home {
            config = config.with_home(home);
        }

        let warehouse = Warehouse::open(config.warehouse_config())?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let http_client: Arc<dyn HttpClient> = Arc::new(
            ReqwestHttpClient::new()
                .map_err(|error| std::io::Error::other(error.message().to_string()))?,
        );

        let store = DurableCacheStore::new(warehouse.clone(), Arc::clone(&clock));
        let mut budget = CallBudgetTracker::new(warehouse, Arc::clone(&clock));
        if let Some(limit) = config.max_daily_calls {
            budget = budget.with_configured_max_daily_calls(limit)?;
        }
        let sources = SourceChainBuilder::from_config(&config)
            .with_offline(cli.offline)
            .build(http_client, Arc::clone(&clock));

        tracing::debug!(
            home = %config.home.display(),
            offline = cli.offline,
            "opened stockdigest context"
        );

        let orchestrator = FallbackOrchestrator::new(
            Arc::new(store),
            Arc::new(budget),
            sources,
            config.cache_dir(),
            clock,
        )
        .with_freshness_hours(config.freshness_hours);

        Ok(Self {
            config,
            orchestrator,
        })
    }
}

pub async fn run(cli: &Cli) -> Result<CommandResult, CliError> {
    let context = Context::open(cli)?;

    match &cli.command {
        Command::Fetch(args) => fetch::run(args, &context).await,
        Command::Status => status::run(&context),
        Command::Cache(args) => match &args.command {
            CacheCommand::Get(args) => cache::get(args, &context),
            CacheCommand::Tickers(args) => cache::tickers(args, &context),
            CacheCommand::Cleanup(args) => cache::cleanup(args, &context),
        },
        Command::Budget(args) => budget::run(args, &context),
    }
}
