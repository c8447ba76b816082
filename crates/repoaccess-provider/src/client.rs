//! HTTP client with per-host rate limiting, retry and request statistics.

use crate::error::{ProviderError, Result};
use dashmap::DashMap;
use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use repoaccess_core::{
    AccessConfig, AuthError, Control, ResolvedAuth, RetryFailure, RetryPolicy, retry,
};
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Requests per second per host.
    pub rate_limit_per_host: u32,
    /// Retry policy for transient failures.
    pub retry: RetryPolicy,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            rate_limit_per_host: 10,
            retry: RetryPolicy::default(),
            user_agent: format!("repoaccess/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Derive from the access layer configuration.
    #[must_use]
    pub fn from_access(config: &AccessConfig) -> Self {
        Self {
            timeout: config.http_timeout(),
            connect_timeout: config.connect_timeout(),
            rate_limit_per_host: config.rate_limit_per_host,
            retry: config.retry_policy(),
            ..Default::default()
        }
    }
}

/// HTTP client statistics.
#[derive(Debug, Default)]
pub struct HttpClientStats {
    /// Total requests sent.
    pub requests: AtomicU64,
    /// Successful requests (2xx).
    pub successes: AtomicU64,
    /// Client errors (4xx).
    pub client_errors: AtomicU64,
    /// Server errors (5xx).
    pub server_errors: AtomicU64,
    /// Retries attempted.
    pub retries: AtomicU64,
    /// Rate limit hits (429).
    pub rate_limited: AtomicU64,
    total_request_time_ms: AtomicU64,
}

impl HttpClientStats {
    /// Requests sent so far.
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Average request time in milliseconds.
    #[must_use]
    pub fn avg_request_time_ms(&self) -> f64 {
        let total = self.total_request_time_ms.load(Ordering::Relaxed);
        let count = self.requests.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    fn record_request(&self, duration: Duration) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_request_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }
}

/// Response body and headers.
#[derive(Debug)]
pub struct HttpResponse {
    /// Response body.
    pub body: Vec<u8>,
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
}

impl HttpResponse {
    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns a parse error naming `url`.
    pub fn json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        sonic_rs::from_slice(&self.body).map_err(|e| ProviderError::parse(url.as_str(), e))
    }

    /// Header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type HostRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// HTTP client shared by all provider adapters.
#[derive(Debug)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiters: DashMap<String, Arc<HostRateLimiter>>,
    stats: Arc<HttpClientStats>,
}

impl HttpClient {
    /// Create a client with default configuration.
    ///
    /// # Errors
    /// Returns error if the client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a client with custom configuration.
    ///
    /// # Errors
    /// Returns error if the client cannot be created.
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|_| {
                ProviderError::InvalidConfig {
                    message: "invalid user agent".into(),
                }
            })?,
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .gzip(true)
            .default_headers(headers)
            .build()
            .map_err(|e| ProviderError::InvalidConfig {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            config,
            rate_limiters: DashMap::new(),
            stats: Arc::new(HttpClientStats::default()),
        })
    }

    /// Request statistics.
    #[must_use]
    pub fn stats(&self) -> &HttpClientStats {
        &self.stats
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    fn rate_limiter(&self, host: &str) -> Arc<HostRateLimiter> {
        self.rate_limiters
            .entry(host.to_string())
            .or_insert_with(|| {
                let quota = Quota::per_second(
                    NonZeroU32::new(self.config.rate_limit_per_host).unwrap_or(NonZeroU32::MIN),
                );
                Arc::new(RateLimiter::direct(quota))
            })
            .clone()
    }

    /// GET `url` with provider auth, retrying transient failures.
    ///
    /// 401/403 map to `AuthError::Rejected`, 404 to `NotFound`, 429/5xx and
    /// request timeouts are retried under the configured policy.
    ///
    /// # Errors
    /// Returns the classified error of the last attempt.
    pub async fn get(
        &self,
        url: &Url,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<HttpResponse> {
        let auth_header = match auth {
            ResolvedAuth::SshKey { .. } => {
                return Err(AuthError::UnsupportedProviderForCredentialKind {
                    kind: auth.kind(),
                    target: url.to_string(),
                }
                .into());
            }
            _ => auth
                .api_header()
                .map(|(name, value)| {
                    let mut value = HeaderValue::from_str(&value)
                        .map_err(|_| AuthError::malformed("token is not a valid header value"))?;
                    value.set_sensitive(true);
                    Ok::<_, AuthError>((HeaderName::from_static(name), value))
                })
                .transpose()?,
        };

        let host = url
            .host_str()
            .ok_or_else(|| ProviderError::invalid_url(url.as_str(), "no host in url"))?
            .to_string();

        let outcome = retry(
            &self.config.retry,
            control,
            ProviderError::interrupt,
            |attempt| {
                let auth_header = auth_header.clone();
                let host = host.clone();
                async move {
                    if attempt.is_retry() {
                        self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    }
                    control
                        .guard(self.send_once(url, &host, auth_header))
                        .await
                }
            },
        )
        .await;

        match outcome {
            Ok(done) => Ok(done.value),
            Err(RetryFailure::Permanent { error, .. } | RetryFailure::Exhausted { last: error, .. }) => {
                Err(error)
            }
            Err(RetryFailure::Interrupted { interrupt, .. }) => Err(interrupt.into()),
        }
    }

    /// GET and decode JSON.
    ///
    /// # Errors
    /// Returns error if the request fails or the body does not decode.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        auth: &ResolvedAuth,
        control: &Control,
    ) -> Result<(T, HttpResponse)> {
        let response = self.get(url, auth, control).await?;
        let value = response.json(url)?;
        Ok((value, response))
    }

    async fn send_once(
        &self,
        url: &Url,
        host: &str,
        auth_header: Option<(HeaderName, HeaderValue)>,
    ) -> Result<HttpResponse> {
        self.rate_limiter(host).until_ready().await;

        let mut request = self.client.get(url.clone());
        if let Some((name, value)) = auth_header {
            request = request.header(name, value);
        }

        let start = Instant::now();
        let result = request.send().await;
        self.stats.record_request(start.elapsed());
        let url_str = url.to_string();

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(ProviderError::Timeout { url: url_str });
            }
            Err(e) => {
                return Err(ProviderError::Network {
                    url: url_str,
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();
        debug!(url = %url_str, status = status.as_u16(), "provider response");

        if status.is_success() {
            self.stats.successes.fetch_add(1, Ordering::Relaxed);
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        url: url_str.clone(),
                    }
                } else {
                    ProviderError::Network {
                        url: url_str.clone(),
                        message: e.to_string(),
                    }
                }
            })?;
            return Ok(HttpResponse {
                body: body.to_vec(),
                status,
                headers,
            });
        }

        if status.is_server_error() {
            self.stats.server_errors.fetch_add(1, Ordering::Relaxed);
            warn!(url = %url_str, status = status.as_u16(), "provider server error");
            return Err(ProviderError::Server {
                url: url_str,
                status: status.as_u16(),
            });
        }

        self.stats.client_errors.fetch_add(1, Ordering::Relaxed);
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AuthError::rejected(url_str, status.to_string()).into())
            }
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound { url: url_str }),
            StatusCode::TOO_MANY_REQUESTS => {
                self.stats.rate_limited.fetch_add(1, Ordering::Relaxed);
                let retry_after = response
                    .headers()
                    .get(header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse().ok());
                Err(ProviderError::RateLimited {
                    url: url_str,
                    retry_after,
                })
            }
            _ => Err(ProviderError::Status {
                url: url_str,
                status: status.as_u16(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_access() {
        let mut access = AccessConfig::default();
        access.max_attempts = 5;
        access.http_timeout = 7;
        let config = HttpClientConfig::from_access(&access);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_stats_average() {
        let stats = HttpClientStats::default();
        assert!((stats.avg_request_time_ms() - 0.0).abs() < f64::EPSILON);
        stats.record_request(Duration::from_millis(10));
        stats.record_request(Duration::from_millis(30));
        assert_eq!(stats.request_count(), 2);
        assert!((stats.avg_request_time_ms() - 20.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_ssh_auth_is_unsupported_for_api_calls() {
        let client = HttpClient::new().unwrap();
        let url = Url::parse("https://api.github.com/repos/o/r").unwrap();
        let auth = ResolvedAuth::SshKey {
            identity: "/tmp/id".into(),
        };
        let err = client.get(&url, &auth, &Control::new()).await.unwrap_err();
        assert!(err.is_auth_error());
        assert_eq!(client.stats().request_count(), 0);
    }
}
