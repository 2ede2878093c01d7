use async_trait::async_trait;
use std::sync::Arc;
use tracing::{field, info_span, Instrument, Span};

use super::{write_all, DesiredDocument, Reconciler};
use crate::convert::convert_rule_group;
use crate::error::SyncError;
use crate::render::render_rule_groups;
use crate::resource::ResourceKind;
use crate::sink::Sink;
use crate::source::{ListScope, RecordLister};

/// Reconciles RuleGroup records into the rule document.
pub struct RuleReconciler {
    lister: Arc<dyn RecordLister>,
    scope: ListScope,
    sinks: Vec<Arc<dyn Sink>>,
}

impl RuleReconciler {
    pub fn new(lister: Arc<dyn RecordLister>, scope: ListScope) -> Self {
        Self {
            lister,
            scope,
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Lists, converts and renders without writing anything.
    pub async fn desired(&self) -> Result<DesiredDocument, SyncError> {
        let kind = ResourceKind::RuleGroup;
        let records = self
            .lister
            .list_rule_groups(&self.scope)
            .await
            .map_err(|source| SyncError::List { kind, source })?;
        Span::current().record("records", records.len());

        let mut groups = Vec::with_capacity(records.len());
        let mut accepted = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();

        for record in &records {
            let key = record.key();
            match convert_rule_group(record) {
                Ok(group) => {
                    accepted.push(key.clone());
                    groups.push((key, group));
                }
                Err(errors) => {
                    for cause in &errors {
                        log::warn!("rule error in {}: {}", key, cause);
                    }
                    rejected.push(key);
                }
            }
        }

        accepted.sort();
        rejected.sort();

        let document =
            render_rule_groups(groups).map_err(|source| SyncError::Render { kind, source })?;

        Ok(DesiredDocument {
            document,
            accepted,
            rejected,
        })
    }
}

#[async_trait]
impl Reconciler for RuleReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::RuleGroup
    }

    async fn sync(&self) -> Result<bool, SyncError> {
        let span = info_span!("reconcile", kind = "rulegroups", records = field::Empty);
        async {
            let desired = self.desired().await?;
            let changed = write_all(&self.sinks, &desired.document).await?;
            if changed {
                log::info!(
                    "rules updated: {} groups, {} rejected, fingerprint {}",
                    desired.accepted.len(),
                    desired.rejected.len(),
                    desired.document.fingerprint
                );
            } else {
                log::debug!("rules unchanged");
            }
            Ok::<_, SyncError>(changed)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderedDocument;
    use crate::resource::{RuleGroupResource, RuleGroupSpec, RuleSpec};
    use crate::sink::{FileSink, MemoryObjectStore, ObjectRef, ObjectSink};
    use crate::source::MemoryRecords;
    use tempfile::TempDir;

    fn record(name: &str, rules: Vec<RuleSpec>) -> RuleGroupResource {
        RuleGroupResource::rule_group(
            "default",
            name,
            RuleGroupSpec {
                interval: String::new(),
                rules,
            },
        )
    }

    #[tokio::test]
    async fn test_sync_writes_then_settles() {
        let dir = TempDir::new().unwrap();
        let records = Arc::new(MemoryRecords::new());
        records.put_rule_group(record(
            "test",
            vec![
                RuleSpec::record("something", "1 + 1"),
                RuleSpec::record("something2", "1 + 1"),
            ],
        ));

        let path = dir.path().join("rules.yaml");
        let reconciler = RuleReconciler::new(records, ListScope::all())
            .with_sink(Arc::new(FileSink::new(&path)));

        assert!(reconciler.sync().await.unwrap());
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("name: default/test"));
        assert!(written.contains("record: something2"));

        assert!(!reconciler.sync().await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_record_is_left_out() {
        let records = Arc::new(MemoryRecords::new());
        records.put_rule_group(record("good", vec![RuleSpec::record("a", "1")]));
        records.put_rule_group(record(
            "bad",
            vec![RuleSpec::alert("A", "1").with_for("not-a-duration")],
        ));

        let reconciler = RuleReconciler::new(records, ListScope::all());
        let desired = reconciler.desired().await.unwrap();
        assert_eq!(desired.accepted.len(), 1);
        assert_eq!(desired.rejected[0].to_string(), "default/bad");
        assert!(!desired.document.content.contains("default/bad"));
    }

    #[tokio::test]
    async fn test_listing_failure_aborts() {
        let records = Arc::new(MemoryRecords::new());
        records.set_failing(true);
        let reconciler = RuleReconciler::new(records, ListScope::all());
        let err = reconciler.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::List { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_sink_failure_stops_pass() {
        let dir = TempDir::new().unwrap();
        let records = Arc::new(MemoryRecords::new());
        records.put_rule_group(record("test", vec![RuleSpec::record("a", "1")]));

        let store = Arc::new(MemoryObjectStore::new());
        store.set_failing(true);
        let path = dir.path().join("rules.yaml");
        let reconciler = RuleReconciler::new(records, ListScope::all())
            .with_sink(Arc::new(ObjectSink::new(
                store.clone(),
                ObjectRef::new("infra", "prom", "rules.yaml"),
            )))
            .with_sink(Arc::new(FileSink::new(&path)));

        let err = reconciler.sync().await.unwrap_err();
        assert!(matches!(err, SyncError::Sink { .. }));
        assert!(!path.exists());

        store.set_failing(false);
        assert!(reconciler.sync().await.unwrap());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_no_records_renders_empty_document() {
        let reconciler = RuleReconciler::new(Arc::new(MemoryRecords::new()), ListScope::all());
        let desired = reconciler.desired().await.unwrap();
        assert_eq!(desired.document, RenderedDocument::new("groups: []\n".to_string()));
    }
}
