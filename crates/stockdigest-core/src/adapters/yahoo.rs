use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::circuit_breaker::CircuitBreaker;
use crate::clock::Clock;
use crate::data_source::{FetchOutcome, SourceError, StockSource};
use crate::domain::{StockRecord, Ticker};
use crate::http_client::{HttpClient, HttpRequest};
use crate::pacing::{CallPacer, PacingPolicy};
use crate::source::{DataSource, SourceId};

const CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const SUMMARY_MODULES: &str = "price,summaryProfile,summaryDetail,defaultKeyStatistics,financialData";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URLS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const REFERER: &str = "https://finance.yahoo.com/";
const CRUMB_TTL: Duration = Duration::from_secs(3600);
const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const RSI_PERIOD: usize = 14;

// ============================================================================
// Crumb authentication
// ============================================================================

/// Cookie/crumb session for the quoteSummary endpoint.
///
/// The session cookie lands in the transport's cookie jar when `fc.yahoo.com`
/// is visited; the crumb is then fetched and appended to every summary URL.
#[derive(Default)]
struct YahooAuthManager {
    crumb: Mutex<Option<(String, Instant)>>,
}

impl YahooAuthManager {
    async fn crumb(&self, http_client: &dyn HttpClient) -> Result<String, SourceError> {
        let mut cached = self.crumb.lock().await;
        if let Some((crumb, fetched_at)) = cached.as_ref() {
            if fetched_at.elapsed() < CRUMB_TTL {
                return Ok(crumb.clone());
            }
        }

        let crumb = Self::fetch_crumb(http_client).await?;
        *cached = Some((crumb.clone(), Instant::now()));
        Ok(crumb)
    }

    async fn invalidate(&self) {
        *self.crumb.lock().await = None;
    }

    async fn fetch_crumb(http_client: &dyn HttpClient) -> Result<String, SourceError> {
        // Only the Set-Cookie side effect matters; fc.yahoo.com usually answers 404.
        let cookie_request = HttpRequest::get(COOKIE_URL).with_header("referer", REFERER);
        if let Err(error) = http_client.execute(cookie_request).await {
            tracing::debug!(error = %error, "yahoo cookie request failed");
        }

        for endpoint in CRUMB_URLS {
            let request = HttpRequest::get(endpoint).with_header("referer", REFERER);
            let response = match http_client.execute(request).await {
                Ok(response) => response,
                Err(error) => {
                    tracing::debug!(endpoint, error = %error, "yahoo crumb request failed");
                    continue;
                }
            };

            let body = response.body.trim();
            if response.status == 429 || body.to_ascii_lowercase().contains("too many requests") {
                return Err(SourceError::rate_limited(
                    "yahoo rate limited while fetching crumb",
                ));
            }
            if response.is_success() && is_plausible_crumb(body) {
                return Ok(body.to_string());
            }
        }

        Err(SourceError::unavailable(
            "failed to fetch yahoo crumb from all endpoints",
        ))
    }
}

fn is_plausible_crumb(body: &str) -> bool {
    !body.is_empty()
        && body.len() < 100
        && !body.contains(char::is_whitespace)
        && !body.contains('<')
}

// ============================================================================
// Yahoo adapter
// ============================================================================

/// Primary source: one year of daily history plus the quoteSummary modules.
pub struct YahooAdapter {
    enabled: bool,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    circuit_breaker: Arc<CircuitBreaker>,
    pacer: CallPacer,
    auth: YahooAuthManager,
}

impl YahooAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: true,
            http_client,
            clock,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            pacer: CallPacer::new(PacingPolicy::yahoo()),
            auth: YahooAuthManager::default(),
        }
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_pacing(mut self, policy: PacingPolicy) -> Self {
        self.pacer = CallPacer::new(policy);
        self
    }

    #[must_use]
    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    async fn fetch_record(&self, ticker: &Ticker) -> Result<StockRecord, SourceError> {
        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::unavailable(
                "yahoo circuit breaker is open; skipping upstream call",
            ));
        }

        let history = match self.fetch_history(ticker).await {
            Ok(history) => {
                self.circuit_breaker.record_success();
                history
            }
            Err(error) => {
                if error.retryable() {
                    self.circuit_breaker.record_failure();
                }
                return Err(error);
            }
        };

        let metrics = HistoryMetrics::from_history(&history).ok_or_else(|| {
            SourceError::not_found(format!("no historical data for {ticker}"))
        })?;

        let summary = match self.fetch_summary(ticker).await {
            Ok(summary) => Some(summary),
            Err(error) => {
                tracing::debug!(ticker = %ticker, error = %error, "yahoo summary unavailable");
                None
            }
        };

        let mut record = StockRecord::new(
            ticker.clone(),
            DataSource::Live(SourceId::YahooFinance),
            self.clock.now(),
        );
        metrics.apply(&mut record);
        if let Some(summary) = summary {
            summary.apply(&mut record);
        }
        if record.metrics.company_name.is_none() {
            record.metrics.company_name = Some(ticker.to_string());
        }
        Ok(record)
    }

    async fn fetch_history(&self, ticker: &Ticker) -> Result<DailyHistory, SourceError> {
        let endpoint = format!(
            "{CHART_URL}/{}?range=1y&interval=1d",
            urlencoding::encode(ticker.as_str())
        );
        self.pacer.before_call().await;
        let request = HttpRequest::get(endpoint).with_header("referer", REFERER);
        let response = self.http_client.execute(request).await.map_err(|error| {
            SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
        })?;

        if response.status == 429 {
            self.pacer.after_rate_limit().await;
            return Err(SourceError::rate_limited("yahoo chart returned status 429"));
        }
        if response.status == 404 {
            return Err(SourceError::not_found(format!("yahoo has no chart for {ticker}")));
        }
        if !response.is_success() {
            return Err(SourceError::unavailable(format!(
                "yahoo chart returned status {}",
                response.status
            )));
        }

        DailyHistory::parse(&response.body)
    }

    async fn fetch_summary(&self, ticker: &Ticker) -> Result<QuoteSummary, SourceError> {
        let http_client = self.http_client.as_ref();
        let mut crumb = self.auth.crumb(http_client).await?;

        for attempt in 0..2 {
            let endpoint = format!(
                "{SUMMARY_URL}/{}?modules={SUMMARY_MODULES}&crumb={}",
                urlencoding::encode(ticker.as_str()),
                urlencoding::encode(&crumb)
            );
            self.pacer.before_call().await;
            let request = HttpRequest::get(endpoint).with_header("referer", REFERER);
            let response = http_client.execute(request).await.map_err(|error| {
                SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
            })?;

            if (response.status == 401 || response.status == 429) && attempt == 0 {
                tracing::debug!(status = response.status, "yahoo rejected crumb, refreshing");
                self.auth.invalidate().await;
                crumb = self.auth.crumb(http_client).await?;
                continue;
            }
            if !response.is_success() {
                return Err(SourceError::unavailable(format!(
                    "yahoo quoteSummary returned status {}",
                    response.status
                )));
            }

            return QuoteSummary::parse(&response.body);
        }

        Err(SourceError::unavailable(
            "yahoo quoteSummary rejected the refreshed crumb",
        ))
    }
}

impl StockSource for YahooAdapter {
    fn id(&self) -> SourceId {
        SourceId::YahooFinance
    }

    fn is_available(&self) -> bool {
        self.enabled
    }

    fn fetch<'a>(
        &'a self,
        ticker: &'a Ticker,
    ) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + 'a>> {
        Box::pin(async move {
            if !self.enabled {
                return FetchOutcome::NotAvailable(SourceError::unavailable(
                    "yahoo adapter is disabled",
                ));
            }

            let outcome = FetchOutcome::from(self.fetch_record(ticker).await);
            self.pacer.after_call().await;
            outcome
        })
    }
}

// ============================================================================
// Chart history
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartData {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct YahooChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// One daily bar with a known close.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DailyBar {
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: f64,
    volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct DailyHistory {
    bars: Vec<DailyBar>,
}

impl DailyHistory {
    fn parse(body: &str) -> Result<Self, SourceError> {
        let response: YahooChartResponse = serde_json::from_str(body).map_err(|error| {
            SourceError::invalid_response(format!("failed to parse yahoo chart: {error}"))
        })?;

        if let Some(error) = response.chart.error.filter(|error| !error.is_null()) {
            return Err(SourceError::not_found(format!("yahoo chart error: {error}")));
        }

        let result = response
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| SourceError::not_found("yahoo chart has no result"))?;
        let rows = result.timestamp.map_or(0, |timestamps| timestamps.len());
        let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

        let bars = (0..rows)
            .filter_map(|index| {
                let close = value_at(&quote.close, index)?;
                Some(DailyBar {
                    open: value_at(&quote.open, index),
                    high: value_at(&quote.high, index),
                    low: value_at(&quote.low, index),
                    close,
                    volume: value_at(&quote.volume, index),
                })
            })
            .collect();

        Ok(Self { bars })
    }

    fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }
}

fn value_at(series: &[Option<f64>], index: usize) -> Option<f64> {
    series
        .get(index)
        .copied()
        .flatten()
        .filter(|value| value.is_finite())
}

/// Price, volume and technical fields derived from daily history.
#[derive(Debug, Clone, PartialEq)]
struct HistoryMetrics {
    current_price: f64,
    prev_close: f64,
    change: f64,
    change_percent: f64,
    high_52w: Option<f64>,
    low_52w: Option<f64>,
    open: Option<f64>,
    day_high: Option<f64>,
    day_low: Option<f64>,
    volume: Option<f64>,
    avg_volume_30d: Option<f64>,
    volume_ratio: f64,
    trend_30d: f64,
    trend_90d: f64,
    rsi: f64,
    volatility: Option<f64>,
}

impl HistoryMetrics {
    fn from_history(history: &DailyHistory) -> Option<Self> {
        let last = history.bars.last()?;
        let closes = history.closes();
        let current_price = last.close;
        let prev_close = closes
            .len()
            .checked_sub(2)
            .and_then(|index| closes.get(index).copied())
            .unwrap_or(current_price);
        let change = current_price - prev_close;
        let change_percent = if prev_close > 0.0 {
            change / prev_close * 100.0
        } else {
            0.0
        };

        let high_52w = history
            .bars
            .iter()
            .filter_map(|bar| bar.high)
            .reduce(f64::max);
        let low_52w = history
            .bars
            .iter()
            .filter_map(|bar| bar.low)
            .reduce(f64::min);

        let recent_volumes = history
            .bars
            .iter()
            .rev()
            .take(30)
            .filter_map(|bar| bar.volume)
            .collect::<Vec<_>>();
        let avg_volume_30d = mean(&recent_volumes);
        let volume_ratio = match (last.volume, avg_volume_30d) {
            (Some(volume), Some(average)) if average > 0.0 => volume / average,
            _ => 1.0,
        };

        Some(Self {
            current_price: round_to(current_price, 2),
            prev_close: round_to(prev_close, 2),
            change: round_to(change, 2),
            change_percent: round_to(change_percent, 2),
            high_52w: high_52w.map(|value| round_to(value, 2)),
            low_52w: low_52w.map(|value| round_to(value, 2)),
            open: last.open.map(|value| round_to(value, 2)),
            day_high: last.high.map(|value| round_to(value, 2)),
            day_low: last.low.map(|value| round_to(value, 2)),
            volume: last.volume.map(f64::trunc),
            avg_volume_30d: avg_volume_30d.map(f64::trunc),
            volume_ratio: round_to(volume_ratio, 2),
            trend_30d: round_to(trend_percent(&closes, 30), 2),
            trend_90d: round_to(trend_percent(&closes, 90), 2),
            rsi: round_to(relative_strength_index(&closes, RSI_PERIOD), 2),
            volatility: annualized_volatility(&closes).map(|value| round_to(value, 4)),
        })
    }

    fn apply(&self, record: &mut StockRecord) {
        let metrics = &mut record.metrics;
        metrics.current_price = Some(self.current_price);
        metrics.prev_close = Some(self.prev_close);
        metrics.change = Some(self.change);
        metrics.change_percent = Some(self.change_percent);
        metrics.high_52w = self.high_52w;
        metrics.low_52w = self.low_52w;
        metrics.open = self.open;
        metrics.day_high = self.day_high;
        metrics.day_low = self.day_low;
        metrics.volume = self.volume;
        metrics.avg_volume_30d = self.avg_volume_30d;
        metrics.volume_ratio = Some(self.volume_ratio);
        metrics.trend_30d = Some(self.trend_30d);
        metrics.trend_90d = Some(self.trend_90d);
        metrics.rsi = Some(self.rsi);
        metrics.volatility = self.volatility;
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10_f64.powi(places);
    (value * scale).round() / scale
}

/// Percent change against the close `bars` sessions back; 0 with shorter history.
fn trend_percent(closes: &[f64], bars: usize) -> f64 {
    let Some(current) = closes.last().copied() else {
        return 0.0;
    };
    if closes.len() < bars {
        return 0.0;
    }
    let past = closes[closes.len() - bars];
    if past > 0.0 {
        (current - past) / past * 100.0
    } else {
        0.0
    }
}

/// RSI over simple rolling means of gains and losses; neutral 50 when history is short.
fn relative_strength_index(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return 50.0;
    }

    let window = &closes[closes.len() - (period + 1)..];
    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gains, losses), delta| {
            if delta > 0.0 {
                (gains + delta, losses)
            } else {
                (gains, losses - delta)
            }
        });

    let average_gain = gains / period as f64;
    let average_loss = losses / period as f64;
    if average_loss == 0.0 {
        return if average_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let relative_strength = average_gain / average_loss;
    100.0 - 100.0 / (1.0 + relative_strength)
}

/// Sample standard deviation of daily returns scaled to a trading year.
fn annualized_volatility(closes: &[f64]) -> Option<f64> {
    let returns = closes
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| pair[1] / pair[0] - 1.0)
        .collect::<Vec<_>>();
    if returns.len() < 2 {
        return None;
    }

    let average = mean(&returns)?;
    let variance = returns
        .iter()
        .map(|value| (value - average).powi(2))
        .sum::<f64>()
        / (returns.len() - 1) as f64;
    Some(variance.sqrt() * TRADING_DAYS_PER_YEAR.sqrt())
}

// ============================================================================
// quoteSummary
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: YahooQuoteSummaryData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooQuoteSummaryData {
    #[serde(default)]
    result: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<Value>,
}

/// The quoteSummary modules of one ticker.
#[derive(Debug, Clone, PartialEq)]
struct QuoteSummary {
    modules: Value,
}

impl QuoteSummary {
    fn parse(body: &str) -> Result<Self, SourceError> {
        let response: YahooQuoteSummaryResponse = serde_json::from_str(body).map_err(|error| {
            SourceError::invalid_response(format!("failed to parse yahoo quoteSummary: {error}"))
        })?;

        if let Some(error) = response.quote_summary.error.filter(|error| !error.is_null()) {
            return Err(SourceError::not_found(format!(
                "yahoo quoteSummary error: {error}"
            )));
        }

        let modules = response
            .quote_summary
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| SourceError::not_found("yahoo quoteSummary has no result"))?;
        Ok(Self { modules })
    }

    /// Numeric field, either a bare number or Yahoo's `{ "raw": .. }` wrapper.
    fn number(&self, module: &str, key: &str) -> Option<f64> {
        let value = self.modules.get(module)?.get(key)?;
        let number = match value {
            Value::Object(wrapper) => wrapper.get("raw")?.as_f64(),
            other => other.as_f64(),
        }?;
        number.is_finite().then_some(number)
    }

    fn text(&self, module: &str, key: &str) -> Option<String> {
        let value = self.modules.get(module)?.get(key)?.as_str()?.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    fn apply(&self, record: &mut StockRecord) {
        let metrics = &mut record.metrics;
        metrics.company_name = self
            .text("price", "longName")
            .or_else(|| self.text("price", "shortName"));
        metrics.sector = self.text("summaryProfile", "sector");
        metrics.industry = self.text("summaryProfile", "industry");

        metrics.market_cap = self
            .number("price", "marketCap")
            .or_else(|| self.number("summaryDetail", "marketCap"));
        metrics.enterprise_value = self.number("defaultKeyStatistics", "enterpriseValue");
        metrics.shares_outstanding = self.number("defaultKeyStatistics", "sharesOutstanding");
        metrics.float_shares = self.number("defaultKeyStatistics", "floatShares");
        metrics.average_volume = self.number("summaryDetail", "averageVolume");

        metrics.pe_ratio = self.number("summaryDetail", "trailingPE");
        metrics.forward_pe = self
            .number("summaryDetail", "forwardPE")
            .or_else(|| self.number("defaultKeyStatistics", "forwardPE"));
        metrics.peg_ratio = self.number("defaultKeyStatistics", "pegRatio");
        metrics.pb_ratio = self.number("defaultKeyStatistics", "priceToBook");
        metrics.ps_ratio = self.number("summaryDetail", "priceToSalesTrailing12Months");
        metrics.ev_ebitda = self.number("defaultKeyStatistics", "enterpriseToEbitda");

        metrics.debt_to_equity = self.number("financialData", "debtToEquity");
        metrics.current_ratio = self.number("financialData", "currentRatio");
        metrics.quick_ratio = self.number("financialData", "quickRatio");
        metrics.free_cash_flow = self.number("financialData", "freeCashflow");
        metrics.operating_cash_flow = self.number("financialData", "operatingCashflow");

        metrics.profit_margin = self
            .number("financialData", "profitMargins")
            .or_else(|| self.number("defaultKeyStatistics", "profitMargins"));
        metrics.operating_margin = self.number("financialData", "operatingMargins");
        metrics.gross_margin = self.number("financialData", "grossMargins");
        metrics.ebitda_margins = self.number("financialData", "ebitdaMargins");

        metrics.revenue_growth = self.number("financialData", "revenueGrowth");
        metrics.earnings_growth = self.number("financialData", "earningsGrowth");
        metrics.eps_growth = self.number("defaultKeyStatistics", "earningsQuarterlyGrowth");

        metrics.roe = self.number("financialData", "returnOnEquity");
        metrics.roa = self.number("financialData", "returnOnAssets");

        metrics.eps = self.number("defaultKeyStatistics", "trailingEps");
        metrics.forward_eps = self.number("defaultKeyStatistics", "forwardEps");
        metrics.book_value = self.number("defaultKeyStatistics", "bookValue");

        metrics.dividend_rate = self.number("summaryDetail", "dividendRate");
        metrics.dividend_yield = self.number("summaryDetail", "dividendYield");
        metrics.payout_ratio = self.number("summaryDetail", "payoutRatio");

        metrics.recommendation_mean = self.number("financialData", "recommendationMean");
        metrics.recommendation_key = self.text("financialData", "recommendationKey");
        metrics.target_price = self.number("financialData", "targetMeanPrice");
        metrics.target_high = self.number("financialData", "targetHighPrice");
        metrics.target_low = self.number("financialData", "targetLowPrice");
        metrics.number_of_analysts = self.number("financialData", "numberOfAnalystOpinions");

        metrics.beta = self
            .number("summaryDetail", "beta")
            .or_else(|| self.number("defaultKeyStatistics", "beta"));
        metrics.short_ratio = self.number("defaultKeyStatistics", "shortRatio");
        metrics.shares_short = self.number("defaultKeyStatistics", "sharesShort");
        metrics.shares_short_prev_month =
            self.number("defaultKeyStatistics", "sharesShortPriorMonth");

        if let (Some(bid), Some(ask)) = (
            self.number("summaryDetail", "bid"),
            self.number("summaryDetail", "ask"),
        ) {
            if bid > 0.0 && ask >= bid {
                metrics.bid_ask_spread = Some(round_to(ask - bid, 4));
            }
        }
    }
}
