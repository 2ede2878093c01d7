//! Destinations for rendered documents.
//!
//! Every sink follows the same read-compare-write contract: read what is
//! stored, compare fingerprints, write the whole document only on a
//! difference and report whether it wrote. A sink with no configured
//! destination is disabled and never writes. Store errors are returned
//! unchanged; retrying is the caller's business.

mod file;
mod object;

pub use file::FileSink;
pub use object::{
    DirectoryObjectStore, MemoryObjectStore, ObjectRef, ObjectSink, ObjectStore,
    ObjectStoreError, StoredObject,
};

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::SinkError;
use crate::render::RenderedDocument;

#[async_trait]
pub trait Sink: Send + Sync {
    /// Human readable destination, used in logs and errors.
    fn describe(&self) -> String;

    /// Writes `doc` if it differs from the stored content. Returns whether
    /// a write happened.
    async fn write_if_changed(&self, doc: &RenderedDocument) -> Result<bool, SinkError>;
}

/// Replaces `path` with `content` via a uniquely named temporary file in
/// the same directory and a rename.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir).await?;

    let path = path.to_path_buf();
    let content = content.to_vec();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        tmp.write_all(&content)?;
        // Temp files are created 0600; readers such as Prometheus need 0644.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }
        // A failed persist drops the temp file, which removes it.
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(std::io::Error::other)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/rules.yaml");
        write_atomic(&path, b"groups: []\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "groups: []\n");

        write_atomic(&path, b"replaced").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "replaced");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_one_path_all_succeed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared.yaml");

        let writes: Vec<_> = (0..16)
            .map(|i| {
                let path = path.clone();
                tokio::spawn(async move { write_atomic(&path, format!("v{}", i).as_bytes()).await })
            })
            .collect();
        for w in writes {
            w.await.unwrap().unwrap();
        }

        assert!(std::fs::read_to_string(&path).unwrap().starts_with('v'));
    }
}
