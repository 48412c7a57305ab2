//! Last-resort placeholder data.
//!
//! Values are deterministic functions of the ticker's position in the request,
//! so the same request always yields the same dataset.

use crate::domain::{Dataset, StockMetrics, StockRecord, Ticker, UtcDateTime};
use crate::error::CoreError;
use crate::source::DataSource;

const DEFAULT_SECTOR: &str = "Technology";

const KNOWN_SECTORS: &[(&str, &str)] = &[
    ("AAPL", "Technology"),
    ("MSFT", "Technology"),
    ("GOOGL", "Technology"),
    ("AMZN", "Consumer Cyclical"),
    ("TSLA", "Consumer Cyclical"),
    ("META", "Technology"),
    ("NVDA", "Technology"),
    ("NFLX", "Communication Services"),
    ("ADBE", "Technology"),
    ("CRM", "Technology"),
];

pub fn sector_for(ticker: &Ticker) -> &'static str {
    KNOWN_SECTORS
        .iter()
        .find(|(known, _)| *known == ticker.as_str())
        .map_or(DEFAULT_SECTOR, |(_, sector)| *sector)
}

/// Synthetic dataset for `tickers`, all stamped `collected_at`.
pub fn generate(tickers: &[Ticker], collected_at: UtcDateTime) -> Result<Dataset, CoreError> {
    let records = tickers
        .iter()
        .enumerate()
        .map(|(index, ticker)| synthetic_record(index, ticker, collected_at))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::info!(count = records.len(), "generated synthetic dataset");
    Ok(Dataset::new(DataSource::Synthetic, records))
}

fn synthetic_record(
    index: usize,
    ticker: &Ticker,
    collected_at: UtcDateTime,
) -> Result<StockRecord, CoreError> {
    let i = u32::try_from(index)
        .map(f64::from)
        .map_err(|_| CoreError::Unavailable(format!("ticker index {index} is out of range")))?;
    let at = |base: f64, step: f64| Some(base + step * i);

    let metrics = StockMetrics {
        company_name: Some(format!("{ticker} Corporation")),
        sector: Some(sector_for(ticker).to_string()),
        industry: Some(String::from("Technology")),
        current_price: at(100.0, 35.0),
        change: at(-5.0, 2.0),
        change_percent: at(-5.0, 2.0),
        high_52w: at(120.0, 30.0),
        low_52w: at(80.0, 20.0),
        open: at(99.0, 25.0),
        prev_close: at(100.0, 25.0),
        volume: at(1_000_000.0, 500_000.0),
        avg_volume_30d: at(1_200_000.0, 600_000.0),
        volume_ratio: at(0.8, 0.1),
        market_cap: at(1e9, 5e10),
        enterprise_value: at(1.1e9, 5.5e10),
        shares_outstanding: at(1e7, 1e6),
        float_shares: at(9e6, 9e5),
        pe_ratio: at(15.0, 2.0),
        forward_pe: at(14.0, 1.5),
        peg_ratio: at(1.2, 0.1),
        pb_ratio: at(2.5, 0.3),
        ps_ratio: at(3.0, 0.4),
        ev_ebitda: at(12.0, 1.5),
        debt_to_equity: at(0.3, 0.05),
        debt_to_assets: at(0.2, 0.03),
        current_ratio: at(1.5, 0.1),
        quick_ratio: at(1.2, 0.08),
        free_cash_flow: at(1e8, 5e7),
        operating_cash_flow: at(1.5e8, 7.5e7),
        profit_margin: at(0.15, 0.02),
        operating_margin: at(0.20, 0.025),
        gross_margin: at(0.45, 0.03),
        ebitda_margins: at(0.25, 0.03),
        revenue_growth: at(0.10, 0.02),
        earnings_growth: at(0.15, 0.025),
        eps_growth: at(0.12, 0.02),
        roe: at(0.18, 0.02),
        roa: at(0.12, 0.015),
        roic: at(0.15, 0.02),
        asset_turnover: at(0.8, 0.05),
        eps: at(2.5, 0.5),
        forward_eps: at(2.8, 0.6),
        book_value: at(25.0, 3.0),
        dividend_rate: at(1.2, 0.1),
        dividend_yield: at(0.02, 0.005),
        payout_ratio: at(0.25, 0.03),
        recommendation_key: Some(String::from("buy")),
        target_price: at(110.0, 30.0),
        target_high: at(120.0, 35.0),
        target_low: at(95.0, 25.0),
        number_of_analysts: at(15.0, 2.0),
        trend_30d: at(5.0, 2.0),
        trend_90d: at(12.0, 3.0),
        rsi: at(55.0, 3.0),
        volatility: at(0.25, 0.02),
        beta: at(1.1, 0.05),
        short_ratio: at(2.5, 0.3),
        shares_short: at(500_000.0, 100_000.0),
        shares_short_prev_month: at(480_000.0, 95_000.0),
        ..StockMetrics::default()
    };

    let mut record = StockRecord::new(ticker.clone(), DataSource::Synthetic, collected_at);
    record.metrics = metrics;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tickers(values: &[&str]) -> Vec<Ticker> {
        values
            .iter()
            .map(|value| Ticker::parse(value).expect("ticker"))
            .collect()
    }

    fn at() -> UtcDateTime {
        UtcDateTime::parse("2026-03-02T12:00:00Z").expect("timestamp")
    }

    #[test]
    fn values_follow_ticker_position() {
        let dataset = generate(&tickers(&["AAPL", "AMZN"]), at()).expect("synthetic");
        assert_eq!(dataset.provenance, DataSource::Synthetic);

        let first = &dataset.records[0].metrics;
        assert_eq!(first.current_price, Some(100.0));
        assert_eq!(first.market_cap, Some(1e9));
        assert_eq!(first.sector.as_deref(), Some("Technology"));

        let second = &dataset.records[1].metrics;
        assert_eq!(second.current_price, Some(135.0));
        assert_eq!(second.change, Some(-3.0));
        assert_eq!(second.sector.as_deref(), Some("Consumer Cyclical"));
        assert_eq!(second.company_name.as_deref(), Some("AMZN Corporation"));
    }

    #[test]
    fn generation_is_deterministic() {
        let request = tickers(&["ZZZZ", "NFLX", "CRM"]);
        assert_eq!(
            generate(&request, at()).expect("first"),
            generate(&request, at()).expect("second")
        );
    }

    #[test]
    fn unknown_tickers_default_to_technology() {
        assert_eq!(sector_for(&Ticker::parse("ZZZZ").expect("ticker")), "Technology");
        assert_eq!(
            sector_for(&Ticker::parse("NFLX").expect("ticker")),
            "Communication Services"
        );
    }
}
