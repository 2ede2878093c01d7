use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::DocumentError;
use crate::duration::PromDuration;

/// The scrape configuration document.
///
/// Only the parts the controller manipulates are typed; every other
/// top-level section (`alerting`, `rule_files`, `remote_write`, ...) is kept
/// verbatim in `sections`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,

    #[serde(flatten)]
    pub sections: BTreeMap<String, serde_yaml::Value>,

    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub scrape_configs: Vec<ScrapeConfig>,
}

/// `scrape_configs:` with nothing under it, as templates often produce.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Config {
    /// Parses and validates a base document. Blank or comment-only input
    /// yields the defaults.
    pub fn load(content: &str) -> Result<Self, DocumentError> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        let config: Config = if value.is_null() {
            Config::default()
        } else {
            serde_yaml::from_value(value)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        self.global.validate()?;

        let mut seen = HashSet::new();
        for sc in &self.scrape_configs {
            sc.validate()?;
            if !seen.insert(sc.job_name.as_str()) {
                return Err(DocumentError::Invalid(format!(
                    "found multiple scrape configs with job name {:?}",
                    sc.job_name
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default = "default_scrape_interval")]
    pub scrape_interval: PromDuration,

    #[serde(default = "default_scrape_timeout")]
    pub scrape_timeout: PromDuration,

    #[serde(default = "default_evaluation_interval")]
    pub evaluation_interval: PromDuration,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

fn default_scrape_interval() -> PromDuration {
    PromDuration::from_secs(60)
}

fn default_scrape_timeout() -> PromDuration {
    PromDuration::from_secs(10)
}

fn default_evaluation_interval() -> PromDuration {
    PromDuration::from_secs(60)
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            scrape_interval: default_scrape_interval(),
            scrape_timeout: default_scrape_timeout(),
            evaluation_interval: default_evaluation_interval(),
            extra: BTreeMap::new(),
        }
    }
}

impl GlobalConfig {
    fn validate(&self) -> Result<(), DocumentError> {
        if self.scrape_timeout > self.scrape_interval {
            return Err(DocumentError::Invalid(
                "global scrape timeout greater than scrape interval".to_string(),
            ));
        }
        Ok(())
    }
}

/// One `scrape_configs` entry. Keys other than the typed ones are kept
/// as-is and emitted in sorted order after them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default)]
    pub job_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_timeout: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ScrapeConfig {
    /// Parses one scrape_config fragment.
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        if value.is_null() {
            return Err(DocumentError::Invalid("empty scrape config".to_string()));
        }
        let sc: ScrapeConfig = serde_yaml::from_value(value)?;
        sc.validate()?;
        Ok(sc)
    }

    pub fn validate(&self) -> Result<(), DocumentError> {
        if let Some(scheme) = &self.scheme {
            if scheme != "http" && scheme != "https" {
                return Err(DocumentError::Invalid(format!(
                    "unsupported scheme {:?} for scrape config",
                    scheme
                )));
            }
        }
        if let (Some(interval), Some(timeout)) = (self.scrape_interval, self.scrape_timeout) {
            if timeout > interval {
                return Err(DocumentError::Invalid(format!(
                    "scrape timeout greater than scrape interval for scrape config with job name {:?}",
                    self.job_name
                )));
            }
        }
        Ok(())
    }
}
