//! Target document schemas: the rule file and the scrape configuration
//! consumed by the metrics engine.

mod rules;
mod scrape;

pub use rules::{Rule, RuleGroup, RuleGroups};
pub use scrape::{Config, GlobalConfig, ScrapeConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("{0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("{0}")]
    Invalid(String),
}
