//! Daily CSV snapshots of live batches, used as a second cache-only tier.
//!
//! Every snapshot has the same header ([`all_columns`]); absent fields are
//! written as empty cells and skipped again when reading.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Number, Value};
use time::Date;

use crate::domain::{all_columns, format_compact_date, StockRecord, Ticker, TEXT_COLUMNS};
use crate::error::CoreError;

const SNAPSHOT_MARKER: &str = "stock_data";

/// `stock_data_YYYYMMDD.csv`
pub fn snapshot_file_name(date: Date) -> String {
    format!("{SNAPSHOT_MARKER}_{}.csv", format_compact_date(date))
}

/// Write `records` to the snapshot for `date` in `dir`, replacing any earlier
/// snapshot from the same day. Rows go to a staging file that is renamed over
/// the snapshot once complete, so readers never see a partial day.
pub fn write_snapshot(dir: &Path, date: Date, records: &[StockRecord]) -> Result<PathBuf, CoreError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(snapshot_file_name(date));
    let staging = path.with_extension("csv.tmp");
    if let Err(error) = write_rows(&staging, records) {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }
    fs::rename(&staging, &path)?;

    tracing::info!(path = %path.display(), count = records.len(), "wrote csv snapshot");
    Ok(path)
}

fn write_rows(path: &Path, records: &[StockRecord]) -> Result<(), CoreError> {
    let columns = all_columns();
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;
    for record in records {
        let Value::Object(fields) = serde_json::to_value(record)? else {
            continue;
        };
        let row = columns
            .iter()
            .map(|column| match fields.get(*column) {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Number(number)) => number.to_string(),
                Some(Value::Bool(flag)) => flag.to_string(),
                _ => String::new(),
            })
            .collect::<Vec<_>>();
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Most recently modified `*stock_data*.csv` in `dir`; file name breaks ties.
pub fn latest_snapshot(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(Result::ok)
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.contains(SNAPSHOT_MARKER) && name.ends_with(".csv")
        })
        .filter_map(|entry| {
            let modified = entry.metadata().and_then(|meta| meta.modified()).ok()?;
            Some((modified, entry.path()))
        })
        .max()
        .map(|(_, path)| path)
}

/// Every decodable row of a snapshot. Rows that are not valid UTF-8 or do not
/// form a valid record are skipped with a warning.
pub fn read_snapshot(path: &Path) -> Result<Vec<StockRecord>, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(error) if matches!(error.kind(), csv::ErrorKind::Utf8 { .. }) => {
                tracing::warn!(path = %path.display(), line = line + 2, error = %error, "skipping unreadable snapshot row");
                continue;
            }
            Err(error) => return Err(error.into()),
        };
        let mut fields = Map::new();
        for (column, cell) in headers.iter().zip(row.iter()) {
            if cell.is_empty() {
                continue;
            }
            if TEXT_COLUMNS.contains(&column) {
                fields.insert(column.to_string(), Value::String(cell.to_string()));
            } else if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
                fields.insert(column.to_string(), Value::Number(number));
            }
        }

        match serde_json::from_value::<StockRecord>(Value::Object(fields)) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(path = %path.display(), line = line + 2, error = %error, "skipping snapshot row");
            }
        }
    }
    Ok(records)
}

/// Records of the newest snapshot for `tickers`, in request order.
pub fn load_latest(dir: &Path, tickers: &[Ticker]) -> Result<Vec<StockRecord>, CoreError> {
    let Some(path) = latest_snapshot(dir) else {
        return Ok(Vec::new());
    };

    let mut available = read_snapshot(&path)?;
    let records = tickers
        .iter()
        .filter_map(|ticker| {
            let index = available.iter().position(|record| &record.ticker == ticker)?;
            Some(available.swap_remove(index))
        })
        .collect::<Vec<_>>();

    tracing::debug!(path = %path.display(), count = records.len(), "loaded csv snapshot");
    Ok(records)
}
