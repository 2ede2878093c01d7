//! Controller configuration file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::duration::PromDuration;
use crate::error::ConfigError;
use crate::reload::ReloadTarget;
use crate::sink::ObjectRef;
use crate::source::{LabelSelector, ListScope};

/// Top-level controller configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControllerConfig {
    /// Namespace to watch; empty means all namespaces.
    pub namespace: String,
    /// Label selector applied to every listing.
    pub selector: String,
    pub manifests_dir: PathBuf,
    pub rules: RulesOutput,
    pub scrapes: ScrapesOutput,
    /// Root of the filesystem object store; unset disables object sinks.
    pub object_store_dir: Option<PathBuf>,
    pub reload: ReloadConfig,
    /// Admission server address.
    pub listen: String,
    pub queue: QueueConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            selector: String::new(),
            manifests_dir: PathBuf::from("manifests"),
            rules: RulesOutput::default(),
            scrapes: ScrapesOutput::default(),
            object_store_dir: None,
            reload: ReloadConfig::default(),
            listen: "0.0.0.0:8443".to_string(),
            queue: QueueConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulesOutput {
    pub object_store: ObjectRef,
    /// Empty disables the file sink.
    pub file: PathBuf,
}

impl Default for RulesOutput {
    fn default() -> Self {
        Self {
            object_store: ObjectRef::new("infra", "prom-config-controller", "rules.yaml"),
            file: PathBuf::from("rules.yaml"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrapesOutput {
    pub object_store: ObjectRef,
    pub file: PathBuf,
    /// Template producing the base scrape document.
    pub template: Option<PathBuf>,
    /// YAML list handed to the template as `clusters`.
    pub clusters_file: Option<PathBuf>,
}

impl Default for ScrapesOutput {
    fn default() -> Self {
        Self {
            object_store: ObjectRef::new("infra", "prom-config-controller-scrape", "config.yaml"),
            file: PathBuf::from("config.yaml"),
            template: None,
            clusters_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReloadConfig {
    pub scheme: String,
    pub method: String,
    /// `host:port` of the fixed target; empty disables it.
    pub host: String,
    pub path: String,
    /// DNS name whose addresses are each reloaded.
    pub endpoints: Option<String>,
    pub delay: PromDuration,
    pub retries: u32,
    pub retry_base_delay: PromDuration,
    pub retry_max_delay: PromDuration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            method: "POST".to_string(),
            host: "localhost:9090".to_string(),
            path: "/-/reload".to_string(),
            endpoints: None,
            delay: PromDuration::from_secs(2),
            retries: 4,
            retry_base_delay: PromDuration::from_millis(500),
            retry_max_delay: PromDuration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    pub base_delay: PromDuration,
    pub max_delay: PromDuration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_delay: PromDuration::from_millis(5),
            max_delay: PromDuration::from_secs(1000),
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.label_selector()?;
        self.reload_target()?;

        if self.listen.is_empty() {
            return Err(ConfigError::validation("listen address must not be empty"));
        }
        if self.reload.method.is_empty() {
            return Err(ConfigError::validation("reload method must not be empty"));
        }
        if !matches!(self.reload.scheme.as_str(), "http" | "https") {
            return Err(ConfigError::validation(format!(
                "unsupported reload scheme '{}'",
                self.reload.scheme
            )));
        }
        if self.reload.retry_base_delay > self.reload.retry_max_delay {
            return Err(ConfigError::validation(
                "reload retryBaseDelay must not exceed retryMaxDelay",
            ));
        }
        if self.queue.base_delay > self.queue.max_delay {
            return Err(ConfigError::validation(
                "queue baseDelay must not exceed maxDelay",
            ));
        }
        Ok(())
    }

    fn label_selector(&self) -> Result<LabelSelector, ConfigError> {
        self.selector
            .parse()
            .map_err(|e| ConfigError::validation(format!("{}", e)))
    }

    /// Namespace and selector every listing is restricted to.
    pub fn scope(&self) -> Result<ListScope, ConfigError> {
        Ok(ListScope::new(
            Some(self.namespace.clone()),
            self.label_selector()?,
        ))
    }

    pub fn reload_target(&self) -> Result<ReloadTarget, ConfigError> {
        let defaults = ReloadTarget::default();
        let (host, port) = if self.reload.host.is_empty() {
            (String::new(), defaults.port)
        } else {
            split_host_port(&self.reload.host)?
        };

        Ok(ReloadTarget {
            scheme: self.reload.scheme.clone(),
            method: self.reload.method.clone(),
            host,
            port,
            path: self.reload.path.clone(),
            delay: self.reload.delay.as_duration(),
            retries: self.reload.retries,
            retry_base_delay: self.reload.retry_base_delay.as_duration(),
            retry_max_delay: self.reload.retry_max_delay.as_duration(),
        })
    }
}

/// Splits `host:port` or `[v6]:port`.
fn split_host_port(addr: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::validation(format!("reload host '{}' is not host:port", addr));

    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return Err(invalid());
    }
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    Ok((host.to_string(), port))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ControllerConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ControllerConfig, ConfigError> {
    let config: ControllerConfig = if content.trim().is_empty() {
        ControllerConfig::default()
    } else {
        serde_yaml::from_str(content)?
    };

    config.validate()?;

    Ok(config)
}
