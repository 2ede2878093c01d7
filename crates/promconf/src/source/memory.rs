use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::{ListScope, RecordLister};
use crate::error::ListError;
use crate::resource::{RecordKey, ResourceKind, RuleGroupResource, ScrapeResource};

/// In-process record set, for embedding and tests.
///
/// Listing returns records in insertion order so callers cannot rely on
/// any ordering from the lister.
#[derive(Default)]
pub struct MemoryRecords {
    rule_groups: RwLock<Vec<RuleGroupResource>>,
    scrapes: RwLock<Vec<ScrapeResource>>,
    failing: AtomicBool,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a RuleGroup.
    pub fn put_rule_group(&self, record: RuleGroupResource) {
        let mut records = self.rule_groups.write().unwrap_or_else(|e| e.into_inner());
        let key = record.key();
        records.retain(|r| r.key() != key);
        records.push(record);
    }

    /// Adds or replaces a Scrape.
    pub fn put_scrape(&self, record: ScrapeResource) {
        let mut records = self.scrapes.write().unwrap_or_else(|e| e.into_inner());
        let key = record.key();
        records.retain(|r| r.key() != key);
        records.push(record);
    }

    pub fn remove(&self, kind: ResourceKind, key: &RecordKey) {
        match kind {
            ResourceKind::RuleGroup => self
                .rule_groups
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|r| &r.key() != key),
            ResourceKind::Scrape => self
                .scrapes
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .retain(|r| &r.key() != key),
        }
    }

    /// Makes listing fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_failing(&self, kind: ResourceKind) -> Result<(), ListError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ListError::Backend {
                kind,
                message: "record store unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RecordLister for MemoryRecords {
    async fn list_rule_groups(&self, scope: &ListScope) -> Result<Vec<RuleGroupResource>, ListError> {
        self.check_failing(ResourceKind::RuleGroup)?;
        let records = self.rule_groups.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .iter()
            .filter(|r| scope.matches(&r.metadata))
            .cloned()
            .collect())
    }

    async fn list_scrapes(&self, scope: &ListScope) -> Result<Vec<ScrapeResource>, ListError> {
        self.check_failing(ResourceKind::Scrape)?;
        let records = self.scrapes.read().unwrap_or_else(|e| e.into_inner());
        Ok(records
            .iter()
            .filter(|r| scope.matches(&r.metadata))
            .cloned()
            .collect())
    }
}

impl FromIterator<RuleGroupResource> for MemoryRecords {
    fn from_iter<I: IntoIterator<Item = RuleGroupResource>>(iter: I) -> Self {
        let records = Self::new();
        for r in iter {
            records.put_rule_group(r);
        }
        records
    }
}
