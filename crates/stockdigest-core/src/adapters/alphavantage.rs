use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::circuit_breaker::CircuitBreaker;
use crate::clock::Clock;
use crate::data_source::{FetchOutcome, SourceError, StockSource};
use crate::domain::{StockRecord, Ticker};
use crate::http_client::{HttpClient, HttpRequest};
use crate::pacing::{CallPacer, PacingPolicy};
use crate::source::{DataSource, SourceId};

const BASE_URL: &str = "https://www.alphavantage.co/query";

/// Secondary source: `GLOBAL_QUOTE` + `OVERVIEW`, with `INCOME_STATEMENT`
/// growth figures when the third call succeeds.
pub struct AlphaVantageAdapter {
    api_key: Option<String>,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    circuit_breaker: Arc<CircuitBreaker>,
    pacer: CallPacer,
}

impl AlphaVantageAdapter {
    /// A blank key is treated as missing.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            api_key: api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            http_client,
            clock,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            pacer: CallPacer::new(PacingPolicy::alpha_vantage()),
        }
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

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    async fn fetch_record(&self, ticker: &Ticker) -> Result<StockRecord, SourceError> {
        let quote = self.query("GLOBAL_QUOTE", ticker).await?;
        let quote = quote
            .get("Global Quote")
            .and_then(Value::as_object)
            .filter(|fields| !fields.is_empty())
            .ok_or_else(|| SourceError::not_found(format!("no alphavantage quote for {ticker}")))?;

        let overview = self.query("OVERVIEW", ticker).await?;
        if !overview.contains_key("Symbol") {
            return Err(SourceError::not_found(format!(
                "no alphavantage overview for {ticker}"
            )));
        }

        let mut record = StockRecord::new(
            ticker.clone(),
            DataSource::Live(SourceId::AlphaVantage),
            self.clock.now(),
        );
        apply_quote(quote, &mut record);
        apply_overview(&overview, &mut record);

        match self.query("INCOME_STATEMENT", ticker).await {
            Ok(statement) => apply_income_statement(&statement, &mut record),
            Err(error) => {
                tracing::debug!(ticker = %ticker, error = %error, "alphavantage income statement unavailable");
            }
        }

        Ok(record)
    }

    /// One paced, authenticated call; returns the top-level JSON object.
    async fn query(&self, function: &str, ticker: &Ticker) -> Result<Map<String, Value>, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::unavailable("alphavantage api key is not configured"))?;

        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::unavailable(
                "alphavantage circuit breaker is open; skipping upstream call",
            ));
        }

        let endpoint = format!(
            "{BASE_URL}?function={function}&symbol={}&apikey={}",
            urlencoding::encode(ticker.as_str()),
            urlencoding::encode(api_key)
        );
        self.pacer.before_call().await;
        let response = self
            .http_client
            .execute(HttpRequest::get(endpoint))
            .await
            .map_err(|error| {
                self.circuit_breaker.record_failure();
                SourceError::unavailable(format!("alphavantage transport error: {}", error.message()))
            })?;

        if !response.is_success() {
            self.circuit_breaker.record_failure();
            return Err(SourceError::unavailable(format!(
                "alphavantage upstream returned status {}",
                response.status
            )));
        }
        self.circuit_breaker.record_success();

        let body: Value = serde_json::from_str(&response.body).map_err(|error| {
            SourceError::invalid_response(format!("failed to parse alphavantage response: {error}"))
        })?;
        let Value::Object(fields) = body else {
            return Err(SourceError::invalid_response(
                "alphavantage response is not a JSON object",
            ));
        };

        check_service_message(&fields)?;
        Ok(fields)
    }
}

impl StockSource for AlphaVantageAdapter {
    fn id(&self) -> SourceId {
        SourceId::AlphaVantage
    }

    fn is_available(&self) -> bool {
        self.has_api_key()
    }

    fn fetch<'a>(
        &'a self,
        ticker: &'a Ticker,
    ) -> Pin<Box<dyn Future<Output = FetchOutcome> + Send + 'a>> {
        Box::pin(async move { FetchOutcome::from(self.fetch_record(ticker).await) })
    }
}

/// Alpha Vantage reports throttling and bad keys as 200 responses.
fn check_service_message(fields: &Map<String, Value>) -> Result<(), SourceError> {
    let message = |key: &str| {
        fields
            .get(key)
            .map(|value| value.as_str().map_or_else(|| value.to_string(), str::to_string))
    };

    if let Some(note) = message("Note").or_else(|| message("Information")) {
        return Err(SourceError::rate_limited(format!("alphavantage: {note}")));
    }
    if let Some(error) = message("Error Message") {
        return Err(SourceError::invalid_response(format!("alphavantage: {error}")));
    }
    Ok(())
}

/// `"None"`, `"-"` and blanks mean the field is absent.
fn field_text<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    let value = fields.get(key)?.as_str()?.trim();
    match value {
        "" | "None" | "-" => None,
        other => Some(other),
    }
}

fn field_number(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    if let Some(number) = fields.get(key).and_then(Value::as_f64) {
        return Some(number);
    }
    field_text(fields, key)?
        .trim_end_matches('%')
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Market cap strings sometimes carry separators; keep digits and the decimal point.
fn parse_market_cap(raw: &str) -> Option<f64> {
    let cleaned = raw
        .chars()
        .filter(|ch| ch.is_ascii_digit() || *ch == '.')
        .collect::<String>();
    cleaned.parse::<f64>().ok().filter(|value| *value > 0.0)
}

fn apply_quote(quote: &Map<String, Value>, record: &mut StockRecord) {
    let metrics = &mut record.metrics;
    metrics.current_price = field_number(quote, "05. price");
    metrics.change = field_number(quote, "09. change");
    metrics.change_percent = field_number(quote, "10. change percent");
    metrics.open = field_number(quote, "02. open");
    metrics.day_high = field_number(quote, "03. high");
    metrics.day_low = field_number(quote, "04. low");
    metrics.prev_close = field_number(quote, "08. previous close");
    metrics.volume = field_number(quote, "06. volume");
}

fn apply_overview(overview: &Map<String, Value>, record: &mut StockRecord) {
    let text = |key: &str| field_text(overview, key).map(str::to_string);
    let number = |key: &str| field_number(overview, key);
    let metrics = &mut record.metrics;

    metrics.company_name = text("Name");
    metrics.sector = text("Sector");
    metrics.industry = text("Industry");
    metrics.market_cap = field_text(overview, "MarketCapitalization").and_then(parse_market_cap);
    metrics.shares_outstanding = number("SharesOutstanding");
    metrics.pe_ratio = number("PERatio");
    metrics.forward_pe = number("ForwardPE");
    metrics.pb_ratio = number("PriceToBookRatio");
    metrics.ps_ratio = number("PriceToSalesRatioTTM").or_else(|| number("PriceToSalesRatio"));
    metrics.peg_ratio = number("PEGRatio");
    metrics.ev_ebitda = number("EVToEBITDA");
    metrics.debt_to_equity = number("DebtToEquity").or_else(|| number("DebtToEquityRatio"));
    metrics.profit_margin = number("ProfitMargin");
    metrics.operating_margin = number("OperatingMarginTTM").or_else(|| number("OperatingMargin"));
    metrics.roe = number("ReturnOnEquityTTM").or_else(|| number("ReturnOnEquity"));
    metrics.roa = number("ReturnOnAssetsTTM").or_else(|| number("ReturnOnAssets"));
    metrics.eps = number("EPS");
    metrics.book_value = number("BookValue");
    metrics.dividend_yield = number("DividendYield");
    metrics.beta = number("Beta");
    metrics.high_52w = number("52WeekHigh");
    metrics.low_52w = number("52WeekLow");
    metrics.target_price = number("AnalystTargetPrice");
}

fn apply_income_statement(statement: &Map<String, Value>, record: &mut StockRecord) {
    let Some(reports) = statement.get("annualReports").and_then(Value::as_array) else {
        return;
    };
    let report = |index: usize| reports.get(index).and_then(Value::as_object);
    let (Some(latest), Some(previous)) = (report(0), report(1)) else {
        return;
    };

    let growth = |key: &str| {
        let current = field_number(latest, key)?;
        let prior = field_number(previous, key).filter(|prior| *prior > 0.0)?;
        Some((current - prior) / prior)
    };

    let metrics = &mut record.metrics;
    if let Some(revenue_growth) = growth("totalRevenue") {
        metrics.revenue_growth = Some(revenue_growth);
    }
    if let Some(earnings_growth) = growth("netIncome") {
        metrics.earnings_growth = Some(earnings_growth);
        metrics.eps_growth = Some(earnings_growth);
    }
}
