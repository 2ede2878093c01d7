use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::{Client, Method, Url};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use super::{Backoff, EndpointResolver, Reload, ReloadTarget};
use crate::error::ReloadError;

/// Result of reloading one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub url: String,
    pub attempts: u32,
    /// Waits between consecutive attempts.
    pub delays: Vec<Duration>,
    pub success: bool,
}

/// Sends reload requests over HTTP.
#[derive(Clone)]
pub struct HttpReloader {
    client: Client,
    method: Method,
    target: ReloadTarget,
    resolver: Option<Arc<dyn EndpointResolver>>,
    cancel: CancellationToken,
}

impl HttpReloader {
    pub fn new(target: ReloadTarget) -> Result<Self, ReloadError> {
        let method = Method::from_bytes(target.method.to_uppercase().as_bytes())
            .map_err(|_| ReloadError::InvalidMethod(target.method.clone()))?;

        let sample = target.url_for("localhost");
        Url::parse(&sample).map_err(|e| ReloadError::InvalidUrl {
            url: sample.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            client: Client::new(),
            method,
            target,
            resolver: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Also reload every endpoint the resolver returns.
    pub fn with_resolver(mut self, resolver: Arc<dyn EndpointResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Cancelling the token abandons pending delays and retries.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn target(&self) -> &ReloadTarget {
        &self.target
    }

    /// URLs to reload right now: the fixed host plus resolved endpoints.
    async fn urls(&self) -> Vec<String> {
        let mut urls = Vec::new();

        if !self.target.host.is_empty() {
            urls.push(self.target.url_for(&self.target.host));
        }

        if let Some(resolver) = &self.resolver {
            match resolver.resolve().await {
                Ok(addrs) if addrs.is_empty() => {
                    log::debug!("no endpoints returned for {}", resolver.describe());
                }
                Ok(addrs) => {
                    urls.extend(addrs.iter().map(|ip| self.target.url_for(&ip.to_string())));
                }
                Err(e) => log::warn!("failed listing reload endpoints: {}", e),
            }
        }

        urls
    }

    /// Sends one reload to every target concurrently and waits for all of
    /// them, retries included.
    pub async fn fan_out(&self) -> Vec<ReloadOutcome> {
        let urls = self.urls().await;
        if urls.is_empty() {
            log::debug!("no reload options are active");
            return Vec::new();
        }

        let span = info_span!("reload", targets = urls.len());
        join_all(urls.into_iter().map(|url| {
            reload_one(
                &self.client,
                &self.method,
                url,
                self.target.retries,
                self.target.backoff(),
                &self.cancel,
            )
        }))
        .instrument(span)
        .await
    }
}

#[async_trait]
impl Reload for HttpReloader {
    /// Waits the propagation delay, then fans out in the background.
    async fn reload(&self) {
        log::info!("reloading prometheus");

        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = tokio::time::sleep(self.target.delay) => {}
        }

        let this = self.clone();
        tokio::spawn(async move {
            this.fan_out().await;
        });
    }
}

/// Reloads one URL, retrying up to `retries` times.
pub(crate) async fn reload_one(
    client: &Client,
    method: &Method,
    url: String,
    retries: u32,
    mut backoff: Backoff,
    cancel: &CancellationToken,
) -> ReloadOutcome {
    log::debug!("starting reload of {} using a {}", url, method);

    let mut outcome = ReloadOutcome {
        url,
        attempts: 0,
        delays: Vec::new(),
        success: false,
    };

    for attempt in 0..=retries {
        outcome.attempts += 1;

        match client.request(method.clone(), &outcome.url).send().await {
            Ok(res) => {
                let status = res.status();
                // Drain so the connection can be reused.
                let _ = res.bytes().await;
                if status.as_u16() < 500 {
                    log::debug!("reloaded {} ({})", outcome.url, status);
                    outcome.success = true;
                    return outcome;
                }
                log::debug!("reload {} response, {}", outcome.url, status);
            }
            Err(e) => log::debug!("reload {} failed, {}", outcome.url, e),
        }

        if attempt == retries {
            break;
        }

        let delay = backoff.next_delay();
        outcome.delays.push(delay);
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("reload of {} cancelled", outcome.url);
                return outcome;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    log::warn!(
        "giving up reload of {} after {} attempts",
        outcome.url,
        outcome.attempts
    );
    outcome
}
