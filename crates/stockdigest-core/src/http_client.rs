//! Transport seam between source adapters and the network.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Per-request timeout applied to every upstream call.
pub const UPSTREAM_TIMEOUT_MS: u64 = 10_000;

const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; stockdigest/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// GET request issued by an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_ms: UPSTREAM_TIMEOUT_MS,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self::with_status(200, body)
    }

    pub fn with_status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Transport-level HTTP error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    message: String,
    retryable: bool,
}

impl HttpError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }
}

impl Display for HttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HttpError {}

/// Async transport used by source adapters.
pub trait HttpClient: Send + Sync {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// reqwest transport with a cookie jar, so session cookies picked up during
/// authentication ride along on later calls.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: Arc<reqwest::Client>,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(Duration::from_millis(UPSTREAM_TIMEOUT_MS))
            .build()
            .map_err(|error| {
                HttpError::non_retryable(format!("failed to build http client: {error}"))
            })?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .get(&request.url)
                .timeout(Duration::from_millis(request.timeout_ms));
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = builder.send().await.map_err(|error| {
                if error.is_timeout() {
                    HttpError::new(format!("request timeout: {error}"))
                } else if error.is_connect() {
                    HttpError::new(format!("connection failed: {error}"))
                } else {
                    HttpError::new(format!("request failed: {error}"))
                }
            })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|error| {
                HttpError::new(format!("failed to read response body: {error}"))
            })?;

            Ok(HttpResponse { status, body })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_default_to_upstream_timeout() {
        let request = HttpRequest::get("https://example.test/quote").with_header("Referer", "x");
        assert_eq!(request.timeout_ms, UPSTREAM_TIMEOUT_MS);
        assert_eq!(request.headers.get("referer").map(String::as_str), Some("x"));
    }

    #[test]
    fn only_2xx_is_success() {
        assert!(HttpResponse::ok_json("{}").is_success());
        assert!(!HttpResponse::with_status(429, "").is_success());
        assert!(!HttpResponse::with_status(302, "").is_success());
    }
}

/// Canned transport for adapter tests: routes by URL substring and records requests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Mutex, PoisonError};

    use super::*;

    #[derive(Debug, Default)]
    pub(crate) struct CannedHttpClient {
        routes: Mutex<Vec<(String, VecDeque<Result<HttpResponse, HttpError>>)>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl CannedHttpClient {
        /// Queue `response` for URLs containing `pattern`; the last queued
        /// response for a route keeps being served once earlier ones are used.
        pub(crate) fn route(
            self,
            pattern: &str,
            response: Result<HttpResponse, HttpError>,
        ) -> Self {
            {
                let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
                match routes.iter_mut().find(|(existing, _)| existing == pattern) {
                    Some((_, queue)) => queue.push_back(response),
                    None => routes.push((pattern.to_string(), VecDeque::from([response]))),
                }
            }
            self
        }

        pub(crate) fn ok(self, pattern: &str, body: &str) -> Self {
            self.route(pattern, Ok(HttpResponse::ok_json(body)))
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub(crate) fn count(&self, pattern: &str) -> usize {
            self.requests()
                .iter()
                .filter(|request| request.url.contains(pattern))
                .count()
        }

        fn respond(&self, url: &str) -> Result<HttpResponse, HttpError> {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            let route = routes
                .iter_mut()
                .find(|(pattern, _)| url.contains(pattern.as_str()));
            let Some((_, queue)) = route else {
                return Err(HttpError::new(format!("no canned response for {url}")));
            };
            if queue.len() > 1 {
                queue.pop_front().unwrap_or_else(|| Err(HttpError::new("empty route")))
            } else {
                queue
                    .front()
                    .cloned()
                    .unwrap_or_else(|| Err(HttpError::new("empty route")))
            }
        }
    }

    impl HttpClient for CannedHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let response = self.respond(&request.url);
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);
            Box::pin(async move { response })
        }
    }
}
