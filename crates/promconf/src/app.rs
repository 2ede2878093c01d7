//! Builds the controller and its collaborators from a [`ControllerConfig`].

use axum::Router;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::admission::{self, AdmissionValidator};
use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::{Result, WatchError};
use crate::reconcile::{RuleReconciler, ScrapeReconciler};
use crate::reload::{DnsEndpointResolver, HttpReloader};
use crate::resource::ResourceKind;
use crate::sink::{DirectoryObjectStore, FileSink, ObjectRef, ObjectSink, ObjectStore, Sink};
use crate::source::{ManifestDirectory, RecordLister};
use crate::template::{ConfigTemplate, FileClusterLister};
use crate::watcher::ManifestWatcher;

/// Background tasks started by [`App::start`].
pub struct Running {
    pub workers: tokio::task::JoinHandle<()>,
    pub watcher: std::thread::JoinHandle<std::result::Result<(), WatchError>>,
}

/// A fully wired controller process.
pub struct App {
    config: ControllerConfig,
    controller: Arc<Controller>,
    validator: Arc<AdmissionValidator>,
}

impl App {
    /// Wires every collaborator named in `config`. Cancelling `cancel`
    /// abandons pending reload retries.
    pub fn from_config(config: ControllerConfig, cancel: &CancellationToken) -> Result<Self> {
        config.validate()?;

        let scope = config.scope()?;
        let lister: Arc<dyn RecordLister> = Arc::new(ManifestDirectory::new(&config.manifests_dir));
        let store: Option<Arc<dyn ObjectStore>> = config
            .object_store_dir
            .as_ref()
            .map(|dir| Arc::new(DirectoryObjectStore::new(dir)) as Arc<dyn ObjectStore>);

        let mut rules = RuleReconciler::new(Arc::clone(&lister), scope.clone());
        for sink in sinks(store.as_ref(), &config.rules.object_store, &config.rules.file) {
            rules = rules.with_sink(sink);
        }

        let mut scrapes = ScrapeReconciler::new(lister, scope);
        for sink in sinks(store.as_ref(), &config.scrapes.object_store, &config.scrapes.file) {
            scrapes = scrapes.with_sink(sink);
        }
        if let Some(path) = &config.scrapes.template {
            scrapes = scrapes.with_template(ConfigTemplate::from_file(path)?);
        }
        if let Some(path) = &config.scrapes.clusters_file {
            scrapes = scrapes.with_clusters(Arc::new(FileClusterLister::new(path)));
        }

        let mut reloader =
            HttpReloader::new(config.reload_target()?)?.with_cancellation(cancel.clone());
        if let Some(name) = &config.reload.endpoints {
            reloader = reloader.with_resolver(Arc::new(DnsEndpointResolver::new(name.clone())));
        }

        let controller = Controller::with_backoff(
            Arc::new(rules),
            Arc::new(scrapes),
            config.queue.base_delay.as_duration(),
            config.queue.max_delay.as_duration(),
        )
        .with_reloader(Arc::new(reloader));

        Ok(Self {
            config,
            controller: Arc::new(controller),
            validator: Arc::new(AdmissionValidator::new()),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn controller(&self) -> Arc<Controller> {
        Arc::clone(&self.controller)
    }

    /// Watcher feeding both queues from the manifest directory.
    pub fn watcher(&self) -> ManifestWatcher {
        ManifestWatcher::new(
            &self.config.manifests_dir,
            self.controller.queue(ResourceKind::RuleGroup),
            self.controller.queue(ResourceKind::Scrape),
        )
    }

    /// Starts watching, runs the initial sync, then starts the workers.
    /// Changes made while the initial sync runs wait in the queues.
    pub async fn start(&self, cancel: &CancellationToken) -> Running {
        let watcher = self.watcher().spawn(cancel.clone());
        self.controller.initial_sync().await;
        let workers = tokio::spawn(self.controller().run(cancel.clone()));
        Running { workers, watcher }
    }

    /// The admission HTTP router.
    pub fn router(&self) -> Router {
        admission::router(Arc::clone(&self.validator))
    }
}

/// Object-store and file sinks for one document, in that order.
fn sinks(
    store: Option<&Arc<dyn ObjectStore>>,
    object: &ObjectRef,
    file: &std::path::Path,
) -> Vec<Arc<dyn Sink>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
    if let Some(store) = store {
        if object.is_enabled() {
            sinks.push(Arc::new(ObjectSink::new(Arc::clone(store), object.clone())));
        }
    }
    if !file.as_os_str().is_empty() {
        sinks.push(Arc::new(FileSink::new(file)));
    }
    sinks
}
