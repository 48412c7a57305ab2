use serde::Serialize;
use serde_json::Value;
use stockdigest_core::{SourceId, StockRecord, Ticker};

use crate::cli::{CacheCleanupArgs, CacheGetArgs, CacheTickersArgs};
use crate::error::CliError;

use super::{CommandResult, Context};

#[derive(Debug, Serialize)]
struct CacheGetData {
    ticker: Ticker,
    source: Option<SourceId>,
    max_age_hours: u32,
    record: Option<StockRecord>,
}

#[derive(Debug, Serialize)]
struct CacheTickersData {
    source: Option<SourceId>,
    tickers: Vec<Ticker>,
}

#[derive(Debug, Serialize)]
struct CacheCleanupData {
    max_age_days: u32,
    removed: usize,
}

pub fn get(args: &CacheGetArgs, context: &Context) -> Result<CommandResult, CliError> {
    let ticker = Ticker::parse(&args.ticker)?;
    let max_age_hours = args.max_age_hours.unwrap_or(context.config.freshness_hours);
    let record = context
        .orchestrator
        .store()
        .get(&ticker, args.source, max_age_hours);

    let missing = record.is_none();
    let data = serde_json::to_value(CacheGetData {
        ticker: ticker.clone(),
        source: args.source,
        max_age_hours,
        record,
    })?;

    let result = CommandResult::ok(data);
    if missing {
        return Ok(result.with_warning(format!(
            "no record for {ticker} younger than {max_age_hours}h"
        )));
    }
    Ok(result)
}

pub fn tickers(args: &CacheTickersArgs, context: &Context) -> Result<CommandResult, CliError> {
    let tickers = context.orchestrator.store().list_tickers(args.source);
    let data = serde_json::to_value(CacheTickersData {
        source: args.source,
        tickers,
    })?;
    Ok(CommandResult::ok(data))
}

pub fn cleanup(args: &CacheCleanupArgs, context: &Context) -> Result<CommandResult, CliError> {
    let max_age_days = args.max_age_days.unwrap_or(context.config.cleanup_days);
    let removed = context.orchestrator.store().cleanup(max_age_days);

    let data: Value = serde_json::to_value(CacheCleanupData {
        max_age_days,
        removed,
    })?;
    Ok(CommandResult::ok(data))
}
