use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::commands::CommandResult;
use crate::error::CliError;

/// Columns shown for dataset rows in table output.
const TABLE_COLUMNS: [&str; 7] = [
    "ticker",
    "data_source",
    "current_price",
    "change_percent",
    "market_cap_category",
    "pe_ratio",
    "data_completeness_pct",
];

pub fn render(result: &CommandResult, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let document = json!({
                "data": result.data,
                "warnings": result.warnings,
            });
            let payload = if pretty {
                serde_json::to_string_pretty(&document)?
            } else {
                serde_json::to_string(&document)?
            };
            println!("{payload}");
        }
        OutputFormat::Table => render_table(result)?,
    }

    Ok(())
}

fn render_table(result: &CommandResult) -> Result<(), CliError> {
    match result.data.get("records").and_then(Value::as_array) {
        Some(records) => {
            if let Some(provenance) = result.data.get("provenance").and_then(Value::as_str) {
                println!("data_source : {provenance}");
            }
            println!("records     : {}", records.len());
            for line in table_lines(records) {
                println!("{line}");
            }
        }
        None => {
            println!("data:");
            let pretty_data = serde_json::to_string_pretty(&result.data)?;
            for line in pretty_data.lines() {
                println!("  {line}");
            }
        }
    }

    if !result.warnings.is_empty() {
        println!("warnings:");
        for warning in &result.warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}

fn table_lines(records: &[Value]) -> Vec<String> {
    let rows = records
        .iter()
        .map(|record| {
            TABLE_COLUMNS
                .iter()
                .map(|column| cell(record.get(*column)))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let widths = TABLE_COLUMNS
        .iter()
        .enumerate()
        .map(|(index, column)| {
            rows.iter()
                .map(|row| row[index].len())
                .chain([column.len()])
                .max()
                .unwrap_or(column.len())
        })
        .collect::<Vec<_>>();

    let format_row = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let header = TABLE_COLUMNS.iter().map(ToString::to_string).collect();
    std::iter::once(format_row(header))
        .chain(rows.into_iter().map(format_row))
        .collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => match number.as_f64() {
            Some(float) if float.fract() != 0.0 => format!("{float:.2}"),
            _ => number.to_string(),
        },
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::from("-"),
    }
}
