use async_trait::async_trait;
use std::collections::BTreeSet;
use std::net::IpAddr;

use crate::error::ReloadError;

/// Resolves the current set of reload endpoints. Called on every reload.
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    fn describe(&self) -> String;

    async fn resolve(&self) -> Result<Vec<IpAddr>, ReloadError>;
}

/// Resolves a DNS name (typically a headless service) to all of its
/// addresses.
#[derive(Debug, Clone)]
pub struct DnsEndpointResolver {
    name: String,
}

impl DnsEndpointResolver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl EndpointResolver for DnsEndpointResolver {
    fn describe(&self) -> String {
        format!("dns {}", self.name)
    }

    async fn resolve(&self) -> Result<Vec<IpAddr>, ReloadError> {
        let addrs = tokio::net::lookup_host((self.name.as_str(), 0))
            .await
            .map_err(|e| ReloadError::Resolve {
                name: self.name.clone(),
                source: e,
            })?;
        let unique: BTreeSet<IpAddr> = addrs.map(|sa| sa.ip()).collect();
        Ok(unique.into_iter().collect())
    }
}

/// A fixed endpoint list.
#[derive(Debug, Clone, Default)]
pub struct StaticEndpoints(pub Vec<IpAddr>);

#[async_trait]
impl EndpointResolver for StaticEndpoints {
    fn describe(&self) -> String {
        format!("{} static endpoints", self.0.len())
    }

    async fn resolve(&self) -> Result<Vec<IpAddr>, ReloadError> {
        Ok(self.0.clone())
    }
}
