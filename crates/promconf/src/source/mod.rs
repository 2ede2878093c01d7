//! Record listing: the collaborator that returns the current RuleGroup and
//! Scrape records within a namespace scope and label selector.

pub(crate) mod manifest;
mod memory;
mod selector;

pub use manifest::ManifestDirectory;
pub use memory::MemoryRecords;
pub use selector::{LabelSelector, SelectorError};

use async_trait::async_trait;

use crate::error::ListError;
use crate::resource::{ObjectMeta, RuleGroupResource, ScrapeResource};

/// Which records a lister returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListScope {
    /// `None` means every namespace.
    pub namespace: Option<String>,
    pub selector: LabelSelector,
}

impl ListScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(namespace: Option<String>, selector: LabelSelector) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()),
            selector,
        }
    }

    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        if let Some(ns) = &self.namespace {
            if meta.namespace() != ns {
                return false;
            }
        }
        self.selector.matches(&meta.labels)
    }
}

#[async_trait]
pub trait RecordLister: Send + Sync {
    async fn list_rule_groups(&self, scope: &ListScope) -> Result<Vec<RuleGroupResource>, ListError>;

    async fn list_scrapes(&self, scope: &ListScope) -> Result<Vec<ScrapeResource>, ListError>;
}
