//! Connection configuration resolution.
//!
//! A [`ConnectionConfig`] is resolved once, when the client is built, from
//! three layers. For every setting the first layer that provides it wins:
//!
//! 1. explicit [`ClientOptions`] fields
//! 2. values carried by a `kotadb://host[:port]/database?timeout=&retries=`
//!    connection string
//! 3. the [`ConfigProvider`] (`KOTADB_URL`, `KOTADB_TIMEOUT_MS`, `KOTADB_RETRIES`)
//!
//! then the built-in defaults. Malformed input of any layer fails here, never
//! on the first request.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use url::Url;

use crate::error::{KotaDbError, Result};

pub const URL_ENV: &str = "KOTADB_URL";
pub const TIMEOUT_ENV: &str = "KOTADB_TIMEOUT_MS";
pub const RETRIES_ENV: &str = "KOTADB_RETRIES";

/// Port used when a connection string omits one
pub const DEFAULT_PORT: u16 = 8080;

const CONNECTION_SCHEME: &str = "kotadb";

fn default_timeout() -> Duration {
    Duration::from_millis(30_000)
}

fn default_retries() -> u32 {
    3
}

fn default_retry_base_delay() -> Duration {
    Duration::from_millis(100)
}

/// Source of process-wide settings
///
/// The default reads environment variables. Tests substitute a map so they
/// never touch process state.
pub trait ConfigProvider: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EnvProvider;

impl ConfigProvider for EnvProvider {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl ConfigProvider for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Constructor options; every field is optional
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// `http(s)://` URL or `kotadb://` connection string
    pub url: Option<String>,
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
    /// Total attempts for retryable operations, the first one included
    pub retries: Option<u32>,
    /// Extra headers in insertion order; they replace the defaults on name collision
    pub headers: Vec<(String, String)>,
    pub retry_base_delay: Option<Duration>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Set a header; names compare case-insensitively and the last value wins
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }
}

/// Parsed `kotadb://host[:port]/database` connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
}

impl ConnectionString {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            timeout: None,
            retries: None,
        }
    }

    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: String| {
            KotaDbError::configuration(format!("invalid connection string {input:?}: {reason}"))
        };

        let url = Url::parse(input).map_err(|e| invalid(e.to_string()))?;
        if url.scheme() != CONNECTION_SCHEME {
            return Err(invalid(format!("scheme must be {CONNECTION_SCHEME}://")));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials are not supported".into()));
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".into()))?
            .to_string();
        let port = url.port().unwrap_or(DEFAULT_PORT);

        let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
        let database = match segments.as_slice() {
            [database] => database.to_string(),
            [] => return Err(invalid("missing database name".into())),
            _ => return Err(invalid("database must be a single path segment".into())),
        };

        let mut parsed = Self::new(host, port, database);
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "timeout" => {
                    let ms = value.parse::<u64>().map_err(|_| {
                        invalid(format!("timeout {value:?} is not a number of milliseconds"))
                    })?;
                    parsed.timeout = Some(Duration::from_millis(ms));
                }
                "retries" => {
                    let retries = value
                        .parse::<u32>()
                        .map_err(|_| invalid(format!("retries {value:?} is not a whole number")))?;
                    parsed.retries = Some(retries);
                }
                other => return Err(invalid(format!("unknown parameter {other:?}"))),
            }
        }
        Ok(parsed)
    }

    /// The equivalent HTTP base URL; the database becomes the path prefix
    pub fn base_url(&self) -> Result<Url> {
        let raw = format!("http://{}:{}/{}", self.host, self.port, self.database);
        Url::parse(&raw).map_err(|e| {
            KotaDbError::configuration(format!(
                "connection string maps to invalid URL {raw:?}: {e}"
            ))
        })
    }
}

impl FromStr for ConnectionString {
    type Err = KotaDbError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}",
            CONNECTION_SCHEME, self.host, self.port, self.database
        )?;
        let mut separator = '?';
        if let Some(timeout) = self.timeout {
            write!(f, "{separator}timeout={}", timeout.as_millis())?;
            separator = '&';
        }
        if let Some(retries) = self.retries {
            write!(f, "{separator}retries={retries}")?;
        }
        Ok(())
    }
}

/// Fully resolved, immutable client configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub headers: HeaderMap,
}

impl ConnectionConfig {
    pub fn resolve(options: &ClientOptions, provider: &dyn ConfigProvider) -> Result<Self> {
        let raw_url = match &options.url {
            Some(url) => url.clone(),
            None => provider.var(URL_ENV).ok_or_else(|| {
                KotaDbError::configuration(format!("no URL given and {URL_ENV} is not set"))
            })?,
        };

        let (base_url, url_timeout, url_retries) = match parse_target(raw_url.trim())? {
            Target::Http(url) => (url, None, None),
            Target::Connection(conn) => (conn.base_url()?, conn.timeout, conn.retries),
        };

        let env_timeout = provider_value::<u64>(provider, TIMEOUT_ENV)?.map(Duration::from_millis);
        let env_retries = provider_value::<u32>(provider, RETRIES_ENV)?;

        let timeout = options
            .timeout
            .or(url_timeout)
            .or(env_timeout)
            .unwrap_or_else(default_timeout);
        if timeout.is_zero() {
            return Err(KotaDbError::configuration("timeout must be greater than zero"));
        }

        let max_retries = options
            .retries
            .or(url_retries)
            .or(env_retries)
            .unwrap_or_else(default_retries);

        Ok(Self {
            base_url,
            timeout,
            max_retries,
            retry_base_delay: options
                .retry_base_delay
                .unwrap_or_else(default_retry_base_delay),
            headers: merge_headers(&options.headers)?,
        })
    }

    /// Base URL extended with percent-encoded path segments
    pub fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

enum Target {
    Http(Url),
    Connection(ConnectionString),
}

fn parse_target(raw: &str) -> Result<Target> {
    let url = Url::parse(raw)
        .map_err(|e| KotaDbError::configuration(format!("invalid URL {raw:?}: {e}")))?;

    match url.scheme() {
        CONNECTION_SCHEME => ConnectionString::parse(raw).map(Target::Connection),
        "http" | "https" => {
            if url.host_str().map_or(true, str::is_empty) {
                return Err(KotaDbError::configuration(format!("URL {raw:?} has no host")));
            }
            let mut url = url;
            url.set_query(None);
            url.set_fragment(None);
            Ok(Target::Http(url))
        }
        other => Err(KotaDbError::configuration(format!(
            "unsupported scheme {other:?} in {raw:?}; expected http, https or {CONNECTION_SCHEME}"
        ))),
    }
}

fn provider_value<T: FromStr>(provider: &dyn ConfigProvider, key: &str) -> Result<Option<T>> {
    match provider.var(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            KotaDbError::configuration(format!("{key}={raw:?} is not a valid number"))
        }),
    }
}

fn merge_headers(overrides: &[(String, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!("kotadb-rs/", env!("CARGO_PKG_VERSION"))),
    );

    for (name, value) in overrides {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| KotaDbError::configuration(format!("invalid header name {name:?}: {e}")))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            KotaDbError::configuration(format!("invalid value for header {name:?}: {e}"))
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}
