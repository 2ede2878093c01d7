use std::path::PathBuf;
use thiserror::Error;

use crate::convert::ConvertError;
use crate::document::DocumentError;
use crate::render::RenderError;
use crate::resource::ResourceKind;
use crate::sink::ObjectStoreError;
use crate::template::TemplateError;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }
}

/// Errors returned by a record listing collaborator.
#[derive(Error, Debug)]
pub enum ListError {
    #[error("Manifest directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Failed to read manifest directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Listing {kind} failed: {message}")]
    Backend { kind: ResourceKind, message: String },
}

/// Errors from persisting a rendered document.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Object {object}: {source}")]
    Store {
        object: String,
        #[source]
        source: ObjectStoreError,
    },
}

/// Errors that abort a reconcile pass.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("listing {kind}: {source}")]
    List {
        kind: ResourceKind,
        #[source]
        source: ListError,
    },

    #[error("rendering config template: {0}")]
    Template(#[from] TemplateError),

    #[error("checking config template result: {0}")]
    BaseConfig(#[source] DocumentError),

    #[error("rendering {kind} document: {source}")]
    Render {
        kind: ResourceKind,
        #[source]
        source: RenderError,
    },

    #[error("update {sink}: {source}")]
    Sink {
        sink: String,
        /// Sinks that were already updated earlier in the same pass.
        written: Vec<String>,
        #[source]
        source: SinkError,
    },
}

impl SyncError {
    /// Returns true for store-side failures that are expected to clear on
    /// their own (listing and sink writes).
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::List { .. } | SyncError::Sink { .. })
    }
}

#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("Failed to resolve reload endpoints '{name}': {source}")]
    Resolve {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid reload URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid reload method '{0}'")]
    InvalidMethod(String),
}

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watch error: {0}")]
    Notify(String),

    #[error("Manifest directory not found: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Any error surfaced by the library.
#[derive(Error, Debug)]
pub enum PromConfError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    List(#[from] ListError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Reload(#[from] ReloadError),

    #[error(transparent)]
    Watch(#[from] WatchError),
}

pub type Result<T> = std::result::Result<T, PromConfError>;
