use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{write_atomic, Sink};
use crate::error::SinkError;
use crate::render::{Fingerprint, RenderedDocument};

/// A local file. A missing file counts as empty previous content.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: Option<PathBuf>,
}

impl FileSink {
    /// An empty path gives a disabled sink.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            path: (!path.as_os_str().is_empty()).then_some(path),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[async_trait]
impl Sink for FileSink {
    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("file {}", path.display()),
            None => "file (disabled)".to_string(),
        }
    }

    async fn write_if_changed(&self, doc: &RenderedDocument) -> Result<bool, SinkError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        let previous = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(SinkError::ReadFile {
                    path: path.clone(),
                    source: e,
                })
            }
        };

        let old = Fingerprint::of(&previous);
        if old == doc.fingerprint {
            log::debug!("file {} unchanged ({})", path.display(), old);
            return Ok(false);
        }

        log::debug!("file {}: old {} new {}", path.display(), old, doc.fingerprint);
        log::info!("file {} changed, updating", path.display());

        write_atomic(path, doc.as_bytes())
            .await
            .map_err(|e| SinkError::WriteFile {
                path: path.clone(),
                source: e,
            })?;

        Ok(true)
    }
}
