//! Reconcile passes: list, convert, render, write.
//!
//! A pass always recomputes the complete document for its kind. Records
//! that fail conversion are logged and left out; listing and sink failures
//! abort the pass.

mod rules;
mod scrapes;

pub use rules::RuleReconciler;
pub use scrapes::ScrapeReconciler;

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::SyncError;
use crate::render::RenderedDocument;
use crate::resource::{RecordKey, ResourceKind};
use crate::sink::Sink;

/// One reconcile loop.
#[async_trait]
pub trait Reconciler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Runs one pass and reports whether any sink was written.
    async fn sync(&self) -> Result<bool, SyncError>;
}

/// Output of the convert and render steps of a pass.
#[derive(Debug, Clone)]
pub struct DesiredDocument {
    pub document: RenderedDocument,
    /// Records that made it into the document.
    pub accepted: Vec<RecordKey>,
    /// Records left out because they failed conversion.
    pub rejected: Vec<RecordKey>,
}

/// Writes `doc` to each sink in order. Stops at the first failure; the
/// error lists the sinks already updated.
async fn write_all(sinks: &[Arc<dyn Sink>], doc: &RenderedDocument) -> Result<bool, SyncError> {
    let mut written = Vec::new();
    for sink in sinks {
        match sink.write_if_changed(doc).await {
            Ok(true) => written.push(sink.describe()),
            Ok(false) => {}
            Err(source) => {
                if !written.is_empty() {
                    log::warn!(
                        "{} failed after updating {}; reload deferred to the next pass",
                        sink.describe(),
                        written.join(", ")
                    );
                }
                return Err(SyncError::Sink {
                    sink: sink.describe(),
                    written,
                    source,
                });
            }
        }
    }
    Ok(!written.is_empty())
}
