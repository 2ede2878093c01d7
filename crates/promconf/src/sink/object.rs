use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::{write_atomic, Sink};
use crate::error::SinkError;
use crate::render::{Fingerprint, RenderedDocument};

#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("object {namespace}/{name} not found")]
    NotFound { namespace: String, name: String },

    #[error("object {namespace}/{name} already exists")]
    AlreadyExists { namespace: String, name: String },

    #[error("object {namespace}/{name} was modified concurrently")]
    Conflict { namespace: String, name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed object: {0}")]
    Parse(String),

    #[error("{0}")]
    Backend(String),
}

/// A namespaced object holding string fields, shaped like a ConfigMap.
///
/// `resource_version` is bumped by the store on every write. An update
/// carrying a stale version fails with [`ObjectStoreError::Conflict`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl StoredObject {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            resource_version: 0,
            data: BTreeMap::new(),
        }
    }

    fn conflict(&self) -> ObjectStoreError {
        ObjectStoreError::Conflict {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
        }
    }
}

/// Read-modify-write rounds an [`ObjectSink`] attempts before giving up on
/// a contended object.
const MAX_CONFLICT_RETRIES: usize = 5;

/// The key/value object store boundary.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<StoredObject, ObjectStoreError>;

    async fn create(&self, object: StoredObject) -> Result<StoredObject, ObjectStoreError>;

    async fn update(&self, object: StoredObject) -> Result<StoredObject, ObjectStoreError>;
}

/// Where in the object store a document lives: one field of one object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectRef {
    pub namespace: String,
    pub name: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            key: key.into(),
        }
    }

    /// An empty name or key disables the destination.
    pub fn is_enabled(&self) -> bool {
        !self.name.is_empty() && !self.key.is_empty()
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}[{}]", self.namespace, self.name, self.key)
    }
}

/// One field of an object in an [`ObjectStore`].
pub struct ObjectSink {
    store: Arc<dyn ObjectStore>,
    target: ObjectRef,
}

impl ObjectSink {
    pub fn new(store: Arc<dyn ObjectStore>, target: ObjectRef) -> Self {
        Self { store, target }
    }

    pub fn target(&self) -> &ObjectRef {
        &self.target
    }

    fn store_error(&self, source: ObjectStoreError) -> SinkError {
        SinkError::Store {
            object: self.target.to_string(),
            source,
        }
    }

    /// Fetches the object, creating it empty when missing.
    async fn current(&self) -> Result<StoredObject, SinkError> {
        let ObjectRef {
            namespace, name, ..
        } = &self.target;

        match self.store.get(namespace, name).await {
            Ok(obj) => Ok(obj),
            Err(ObjectStoreError::NotFound { .. }) => {
                log::debug!("object {}/{} not found, creating", namespace, name);
                match self.store.create(StoredObject::new(namespace, name)).await {
                    Ok(obj) => Ok(obj),
                    // Lost a race with another writer.
                    Err(ObjectStoreError::AlreadyExists { .. }) => self
                        .store
                        .get(namespace, name)
                        .await
                        .map_err(|e| self.store_error(e)),
                    Err(e) => Err(self.store_error(e)),
                }
            }
            Err(e) => Err(self.store_error(e)),
        }
    }
}

#[async_trait]
impl Sink for ObjectSink {
    fn describe(&self) -> String {
        if self.target.is_enabled() {
            format!("object {}", self.target)
        } else {
            "object (disabled)".to_string()
        }
    }

    async fn write_if_changed(&self, doc: &RenderedDocument) -> Result<bool, SinkError> {
        if !self.target.is_enabled() {
            return Ok(false);
        }

        let mut attempt = 0;
        loop {
            let mut object = self.current().await?;
            let previous = object
                .data
                .get(&self.target.key)
                .map(String::as_str)
                .unwrap_or("");

            if Fingerprint::of(previous.as_bytes()) == doc.fingerprint {
                log::debug!("object {} unchanged", self.target);
                return Ok(false);
            }

            log::info!("object {} changed, updating", self.target);

            object
                .data
                .insert(self.target.key.clone(), doc.content.clone());
            match self.store.update(object).await {
                Ok(_) => return Ok(true),
                Err(ObjectStoreError::Conflict { .. }) if attempt < MAX_CONFLICT_RETRIES => {
                    attempt += 1;
                    log::debug!(
                        "object {} modified concurrently, re-reading (attempt {})",
                        self.target,
                        attempt
                    );
                }
                Err(e) => return Err(self.store_error(e)),
            }
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// An in-process object store.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<(String, String), StoredObject>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful create and update calls.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every following call fail with a backend error until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns a field of a stored object.
    pub fn field(&self, namespace: &str, name: &str, key: &str) -> Option<String> {
        self.lock()
            .get(&(namespace.to_string(), name.to_string()))
            .and_then(|o| o.data.get(key).cloned())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<(String, String), StoredObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_failing(&self) -> Result<(), ObjectStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<StoredObject, ObjectStoreError> {
        self.check_failing()?;
        self.lock()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn create(&self, mut object: StoredObject) -> Result<StoredObject, ObjectStoreError> {
        self.check_failing()?;
        let mut objects = self.lock();
        let id = (object.namespace.clone(), object.name.clone());
        if objects.contains_key(&id) {
            return Err(ObjectStoreError::AlreadyExists {
                namespace: id.0,
                name: id.1,
            });
        }
        object.resource_version = 1;
        objects.insert(id, object.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(object)
    }

    async fn update(&self, mut object: StoredObject) -> Result<StoredObject, ObjectStoreError> {
        self.check_failing()?;
        let mut objects = self.lock();
        let id = (object.namespace.clone(), object.name.clone());
        match objects.get_mut(&id) {
            Some(existing) => {
                if existing.resource_version != object.resource_version {
                    return Err(object.conflict());
                }
                object.resource_version += 1;
                *existing = object.clone();
                self.writes.fetch_add(1, Ordering::SeqCst);
                Ok(object)
            }
            None => Err(ObjectStoreError::NotFound {
                namespace: id.0,
                name: id.1,
            }),
        }
    }
}

// ============================================================================
// Directory-backed store
// ============================================================================

/// Objects persisted as `<root>/<namespace>/<name>.yaml`.
///
/// Creates and updates are serialised in-process so the version check and
/// the write happen as one step.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
    writer: Arc<tokio::sync::Mutex<()>>,
}

impl DirectoryObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writer: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, namespace: &str, name: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{}.yaml", name))
    }

    async fn read(&self, namespace: &str, name: &str) -> Result<StoredObject, ObjectStoreError> {
        let path = self.object_path(namespace, name);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectStoreError::NotFound {
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        serde_yaml::from_str(&content)
            .map_err(|e| ObjectStoreError::Parse(format!("{}: {}", path.display(), e)))
    }

    async fn write(&self, object: &StoredObject) -> Result<(), ObjectStoreError> {
        let path = self.object_path(&object.namespace, &object.name);
        let content =
            serde_yaml::to_string(object).map_err(|e| ObjectStoreError::Parse(e.to_string()))?;
        write_atomic(&path, content.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<StoredObject, ObjectStoreError> {
        self.read(namespace, name).await
    }

    async fn create(&self, mut object: StoredObject) -> Result<StoredObject, ObjectStoreError> {
        let _guard = self.writer.lock().await;
        let path = self.object_path(&object.namespace, &object.name);
        if tokio::fs::try_exists(&path).await? {
            return Err(ObjectStoreError::AlreadyExists {
                namespace: object.namespace,
                name: object.name,
            });
        }
        object.resource_version = 1;
        self.write(&object).await?;
        Ok(object)
    }

    async fn update(&self, mut object: StoredObject) -> Result<StoredObject, ObjectStoreError> {
        let _guard = self.writer.lock().await;
        let existing = self.read(&object.namespace, &object.name).await?;
        if existing.resource_version != object.resource_version {
            return Err(object.conflict());
        }
        object.resource_version += 1;
        self.write(&object).await?;
        Ok(object)
    }
}
