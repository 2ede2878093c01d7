//! Reload notification for the downstream metrics engine.
//!
//! A reload waits for a propagation delay and then sends one request to the
//! fixed host and one to every resolved endpoint, concurrently. Each request
//! is retried with exponential backoff on network errors and 5xx responses;
//! any other response counts as success. Failures are logged, never
//! returned.

mod endpoints;
mod http;

pub use endpoints::{DnsEndpointResolver, EndpointResolver, StaticEndpoints};
pub use http::{HttpReloader, ReloadOutcome};

use async_trait::async_trait;
use std::time::Duration;

/// Something that can be asked to reload.
#[async_trait]
pub trait Reload: Send + Sync {
    async fn reload(&self);
}

/// Where and how reload requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadTarget {
    pub scheme: String,
    pub method: String,
    /// Fixed host; empty disables the fixed request.
    pub host: String,
    /// Port used for the fixed host and for resolved endpoints.
    pub port: u16,
    pub path: String,
    pub delay: Duration,
    pub retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for ReloadTarget {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            method: "POST".to_string(),
            host: "localhost".to_string(),
            port: 9090,
            path: "/-/reload".to_string(),
            delay: Duration::from_secs(2),
            retries: 4,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
        }
    }
}

impl ReloadTarget {
    /// The reload URL for one host. IPv6 literals are bracketed.
    pub fn url_for(&self, host: &str) -> String {
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", self.scheme, host, self.port, path)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.retry_base_delay, self.retry_max_delay)
    }
}

/// Exponential backoff: `base * 2^n` for the n-th wait, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            attempt: 0,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
