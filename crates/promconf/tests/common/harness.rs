//! Isolated in-memory records and sinks for reconcile tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use promconf::{
    FileSink, ListScope, MemoryObjectStore, MemoryRecords, ObjectRef, ObjectSink, ObjectStore,
    RuleReconciler, ScrapeReconciler,
};

pub const STORE_NAMESPACE: &str = "infra";
pub const STORE_NAME: &str = "prom-config-controller";
pub const RULES_KEY: &str = "rules.yaml";
pub const SCRAPES_KEY: &str = "config.yaml";

/// Records, an object store and a file sink per document.
pub struct Harness {
    temp_dir: TempDir,
    pub records: Arc<MemoryRecords>,
    pub store: Arc<MemoryObjectStore>,
    pub rules_file: PathBuf,
    pub scrapes_file: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let rules_file = temp_dir.path().join("out/rules.yaml");
        let scrapes_file = temp_dir.path().join("out/config.yaml");
        Self {
            temp_dir,
            records: Arc::new(MemoryRecords::new()),
            store: Arc::new(MemoryObjectStore::new()),
            rules_file,
            scrapes_file,
        }
    }

    fn object_sink(&self, key: &str) -> Arc<ObjectSink> {
        let store: Arc<dyn ObjectStore> = self.store.clone();
        Arc::new(ObjectSink::new(
            store,
            ObjectRef::new(STORE_NAMESPACE, STORE_NAME, key),
        ))
    }

    pub fn rules(&self) -> RuleReconciler {
        RuleReconciler::new(self.records.clone(), ListScope::all())
            .with_sink(self.object_sink(RULES_KEY))
            .with_sink(Arc::new(FileSink::new(&self.rules_file)))
    }

    pub fn scrapes(&self) -> ScrapeReconciler {
        ScrapeReconciler::new(self.records.clone(), ListScope::all())
            .with_sink(self.object_sink(SCRAPES_KEY))
            .with_sink(Arc::new(FileSink::new(&self.scrapes_file)))
    }

    /// Rules document as stored in the object store.
    pub fn stored_rules(&self) -> Option<String> {
        self.store.field(STORE_NAMESPACE, STORE_NAME, RULES_KEY)
    }

    pub fn stored_scrapes(&self) -> Option<String> {
        self.store.field(STORE_NAMESPACE, STORE_NAME, SCRAPES_KEY)
    }

    pub fn rules_file_content(&self) -> String {
        std::fs::read_to_string(&self.rules_file).unwrap_or_default()
    }
}
