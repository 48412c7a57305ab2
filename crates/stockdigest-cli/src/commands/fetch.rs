use std::fs;
use std::path::Path;

use crate::cli::FetchArgs;
use crate::error::CliError;

use super::{CommandResult, Context};

/// Watchlist used when no tickers are given.
pub const DEFAULT_TICKERS: [&str; 10] = [
    "AAPL", "MSFT", "GOOGL", "AMZN", "TSLA", "META", "NVDA", "NFLX", "ADBE", "CRM",
];

pub async fn run(args: &FetchArgs, context: &Context) -> Result<CommandResult, CliError> {
    let mut tickers = args.tickers.clone();
    if let Some(path) = &args.tickers_file {
        tickers.extend(read_ticker_list(path)?);
    }
    if tickers.is_empty() {
        tracing::info!("no tickers given; using the default watchlist");
        tickers = DEFAULT_TICKERS.iter().map(ToString::to_string).collect();
    }

    let dataset = context
        .orchestrator
        .get_stock_data(&tickers, args.force_refresh)
        .await?;

    let warnings = dataset.warnings.clone();
    Ok(CommandResult::ok(serde_json::to_value(&dataset)?).with_warnings(warnings))
}

/// Tickers from a watchlist file: one per line, or the first column of a CSV.
/// Blank lines, `#` comments and a `ticker`/`symbol` header are skipped.
pub fn read_ticker_list(path: &Path) -> Result<Vec<String>, CliError> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_ticker_list(&contents))
}

fn parse_ticker_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let first = line.split(',').next()?.trim().trim_matches('"').trim();
            (!first.is_empty()).then(|| first.to_ascii_uppercase())
        })
        .filter(|ticker| ticker != "TICKER" && ticker != "SYMBOL")
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lists_and_csv_first_columns_are_accepted() {
        let contents = "# watchlist\nticker,weight\naapl,0.5\n\n\"MSFT\",0.5\n  nvda  \n";
        assert_eq!(parse_ticker_list(contents), vec!["AAPL", "MSFT", "NVDA"]);
    }

    #[test]
    fn file_is_read_from_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tickers.txt");
        fs::write(&path, "BRK.B\nSymbol\nTSLA\n").expect("write");

        assert_eq!(read_ticker_list(&path).expect("read"), vec!["BRK.B", "TSLA"]);
        assert!(read_ticker_list(&temp.path().join("absent.txt")).is_err());
    }
}
