pub mod admission;
pub mod app;
pub mod config;
pub mod controller;
pub mod convert;
pub mod document;
pub mod duration;
pub mod error;
pub mod queue;
pub mod reconcile;
pub mod reload;
pub mod render;
pub mod resource;
pub mod sink;
pub mod source;
pub mod template;
pub mod validation;
pub mod watcher;

pub use app::{App, Running};
pub use admission::{router, AdmissionResult, AdmissionReview, AdmissionValidator};
pub use config::{load_config, load_config_from_str, ControllerConfig};
pub use controller::Controller;
pub use convert::{convert_rule_group, convert_scrape, ConvertError};
pub use duration::PromDuration;
pub use error::{
    ConfigError, ListError, PromConfError, ReloadError, Result, SinkError, SyncError, WatchError,
};
pub use queue::WorkQueue;
pub use reconcile::{Reconciler, RuleReconciler, ScrapeReconciler};
pub use reload::{DnsEndpointResolver, EndpointResolver, HttpReloader, Reload, ReloadTarget};
pub use render::{Fingerprint, RenderedDocument};
pub use resource::{
    RecordKey, Resource, ResourceKind, RuleGroupResource, RuleGroupSpec, RuleSpec,
    ScrapeResource, ScrapeSpec, API_VERSION,
};
pub use sink::{DirectoryObjectStore, FileSink, MemoryObjectStore, ObjectRef, ObjectSink, ObjectStore, Sink};
pub use source::{LabelSelector, ListScope, ManifestDirectory, MemoryRecords, RecordLister};
pub use template::{ClusterLister, ConfigTemplate, FileClusterLister};
pub use validation::{ValidationCause, ValidationErrors};
pub use watcher::ManifestWatcher;
