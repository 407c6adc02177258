//! HTTP transport with per-attempt timeout, retry and cancellation.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client as HttpClient, Method, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::cancel::CancelHandle;
use crate::config::ConnectionConfig;
use crate::error::{
    classify_network, classify_response, exhausted, Classified, KotaDbError, Result,
    TransportFailure,
};

/// Upper bound for a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(10);

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Raw HTTP response: status and fully read body
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// A request relative to the configured base URL
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Vec<u8>>,
    /// Safe to repeat without an idempotency key
    pub idempotent: bool,
    pub idempotency_key: Option<String>,
}

impl Request {
    pub fn new<I, S>(method: Method, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let idempotent = method != Method::POST && method != Method::PATCH;
        Self {
            method,
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
            idempotent,
            idempotency_key: None,
        }
    }

    pub fn query(mut self, pairs: Vec<(&'static str, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    /// Whether transient failures may be retried
    pub fn is_retryable(&self) -> bool {
        self.idempotent || self.idempotency_key.is_some()
    }
}

/// Delay before retry number `retry` (1-based): `base * 2^(retry - 1)`, capped
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let factor = 2u32.saturating_pow(retry.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

pub struct Transport {
    http: HttpClient,
    config: ConnectionConfig,
}

impl Transport {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .default_headers(config.headers.clone())
            .build()
            .map_err(|e| KotaDbError::configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Send a request, retrying transient failures when the request allows it
    ///
    /// `max_retries` counts every attempt, the first one included.
    #[tracing::instrument(
        skip_all,
        fields(method = %request.method, path = %request.segments.join("/"))
    )]
    pub async fn send(&self, request: &Request, cancel: Option<&CancelHandle>) -> Result<Response> {
        let attempts = if request.is_retryable() {
            self.config.max_retries.max(1)
        } else {
            1
        };
        let segments: Vec<&str> = request.segments.iter().map(String::as_str).collect();
        let url = self.config.url_for(&segments);

        let mut attempt = 1;
        loop {
            if cancel.is_some_and(CancelHandle::is_cancelled) {
                return Err(KotaDbError::Cancelled);
            }

            debug!(attempt, attempts, url = %url, "sending request");
            match with_cancel(cancel, self.attempt(&url, request)).await? {
                Classified::Success(response) => {
                    debug!(attempt, status = %response.status, "request succeeded");
                    return Ok(response);
                }
                Classified::Terminal(err) => {
                    debug!(attempt, error = %err, "request failed");
                    return Err(err);
                }
                Classified::Retryable(failure) if attempt < attempts => {
                    let delay = backoff_delay(self.config.retry_base_delay, attempt);
                    warn!(attempt, attempts, ?delay, error = %failure, "retrying request");
                    with_cancel(cancel, tokio::time::sleep(delay)).await?;
                    attempt += 1;
                }
                Classified::Retryable(failure) => {
                    warn!(attempts, error = %failure, "giving up on request");
                    return Err(exhausted(failure, attempt, self.config.timeout));
                }
            }
        }
    }

    async fn attempt(&self, url: &Url, request: &Request) -> Classified {
        let mut builder = self.http.request(request.method.clone(), url.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(key) = &request.idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, key.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let exchange = async {
            let response = builder.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(Response {
                status,
                body: body.to_vec(),
            })
        };

        match tokio::time::timeout(self.config.timeout, exchange).await {
            Err(_) => Classified::Retryable(TransportFailure::TimedOut(self.config.timeout)),
            Ok(Err(err)) => classify_network(err),
            Ok(Ok(response)) => classify_response(response),
        }
    }
}

/// Race `fut` against the cancellation signal, if any
async fn with_cancel<F: Future>(cancel: Option<&CancelHandle>, fut: F) -> Result<F::Output> {
    match cancel {
        None => Ok(fut.await),
        Some(handle) => {
            tokio::select! {
                biased;
                _ = handle.cancelled() => Err(KotaDbError::Cancelled),
                value = fut => Ok(value),
            }
        }
    }
}
