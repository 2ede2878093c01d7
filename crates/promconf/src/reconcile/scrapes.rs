use async_trait::async_trait;
use std::sync::Arc;
use tracing::{field, info_span, Instrument, Span};

use super::{write_all, DesiredDocument, Reconciler};
use crate::convert::convert_scrape;
use crate::document::Config;
use crate::error::SyncError;
use crate::render::render_scrape_config;
use crate::resource::ResourceKind;
use crate::sink::Sink;
use crate::source::{ListScope, RecordLister};
use crate::template::{ClusterLister, ConfigTemplate};

/// Reconciles Scrape records into the scrape configuration document.
///
/// The base document comes from the config template when one is set, and
/// is the default configuration otherwise.
pub struct ScrapeReconciler {
    lister: Arc<dyn RecordLister>,
    scope: ListScope,
    sinks: Vec<Arc<dyn Sink>>,
    template: Option<ConfigTemplate>,
    clusters: Option<Arc<dyn ClusterLister>>,
}

impl ScrapeReconciler {
    pub fn new(lister: Arc<dyn RecordLister>, scope: ListScope) -> Self {
        Self {
            lister,
            scope,
            sinks: Vec::new(),
            template: None,
            clusters: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_template(mut self, template: ConfigTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_clusters(mut self, clusters: Arc<dyn ClusterLister>) -> Self {
        self.clusters = Some(clusters);
        self
    }

    /// Renders the template, if any, and parses the result.
    pub async fn base_config(&self) -> Result<Config, SyncError> {
        let content = match &self.template {
            None => String::new(),
            Some(template) => {
                let clusters = match &self.clusters {
                    Some(lister) => lister.list_clusters().await.unwrap_or_else(|e| {
                        log::warn!("listing clusters failed: {}", e);
                        Vec::new()
                    }),
                    None => Vec::new(),
                };
                let rendered = template.render(&clusters)?;
                log::trace!("base config template output:\n{}", rendered);
                rendered
            }
        };

        Config::load(&content).map_err(SyncError::BaseConfig)
    }

    /// Builds the base document, lists, converts and renders without
    /// writing anything.
    pub async fn desired(&self) -> Result<DesiredDocument, SyncError> {
        let kind = ResourceKind::Scrape;
        let base = self.base_config().await?;

        let records = self
            .lister
            .list_scrapes(&self.scope)
            .await
            .map_err(|source| SyncError::List { kind, source })?;
        Span::current().record("records", records.len());

        let mut fragments = Vec::with_capacity(records.len());
        let mut accepted = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();

        for record in &records {
            let key = record.key();
            match convert_scrape(record) {
                Ok(sc) => {
                    accepted.push(key.clone());
                    fragments.push((key, sc));
                }
                Err(e) => {
                    log::warn!("scrape error in {}: {}", key, e);
                    rejected.push(key);
                }
            }
        }

        accepted.sort();
        rejected.sort();

        let document = render_scrape_config(base, fragments)
            .map_err(|source| SyncError::Render { kind, source })?;

        Ok(DesiredDocument {
            document,
            accepted,
            rejected,
        })
    }
}

#[async_trait]
impl Reconciler for ScrapeReconciler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Scrape
    }

    async fn sync(&self) -> Result<bool, SyncError> {
        let span = info_span!("reconcile", kind = "scrapes", records = field::Empty);
        async {
            let desired = self.desired().await?;
            let changed = write_all(&self.sinks, &desired.document).await?;
            if changed {
                log::info!(
                    "scrape config updated: {} jobs, {} rejected, fingerprint {}",
                    desired.accepted.len(),
                    desired.rejected.len(),
                    desired.document.fingerprint
                );
            } else {
                log::debug!("scrape config unchanged");
            }
            Ok::<_, SyncError>(changed)
        }
        .instrument(span)
        .await
    }
}
