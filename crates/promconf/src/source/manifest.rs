//! Record listing over a directory of YAML manifests.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{ListScope, RecordLister};
use crate::error::ListError;
use crate::resource::{
    AnyResource, RecordKey, ResourceHeader, ResourceKind, RuleGroupResource, ScrapeResource,
};

/// Records loaded from a manifest directory.
#[derive(Debug, Clone, Default)]
pub struct Manifests {
    pub rule_groups: Vec<RuleGroupResource>,
    pub scrapes: Vec<ScrapeResource>,
}

/// A directory of manifests, walked recursively on every listing.
///
/// Hidden files and directories are skipped, files may hold several
/// `---` separated documents, and documents of other APIs are ignored.
/// A file that fails to parse is logged and skipped so one bad manifest
/// does not hide the others.
#[derive(Debug, Clone)]
pub struct ManifestDirectory {
    dir: PathBuf,
}

impl ManifestDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Loads every record in the directory.
    pub fn load(&self) -> Result<Manifests, ListError> {
        if !self.dir.is_dir() {
            return Err(ListError::DirectoryNotFound(self.dir.clone()));
        }

        let mut manifests = Manifests::default();
        let mut seen: BTreeSet<(ResourceKind, RecordKey)> = BTreeSet::new();

        for entry in WalkDir::new(&self.dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| ListError::ReadDirectory {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();

            if !path.is_file() || !is_manifest_path(&self.dir, path) {
                continue;
            }

            let resources = match self.load_file(path) {
                Ok(resources) => resources,
                Err(e) => {
                    log::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            for resource in resources {
                if !seen.insert((resource.kind(), resource.key())) {
                    log::warn!(
                        "Duplicate {} {} in {}, keeping the first",
                        resource.kind(),
                        resource.key(),
                        path.display()
                    );
                    continue;
                }
                match resource {
                    AnyResource::RuleGroup(r) => manifests.rule_groups.push(r),
                    AnyResource::Scrape(r) => manifests.scrapes.push(r),
                }
            }
        }

        Ok(manifests)
    }

    /// Loads all records in one file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<AnyResource>, ListError> {
        let content = fs::read_to_string(path).map_err(|e| ListError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        parse_manifests(&content, path)
    }

    async fn load_async(&self, kind: ResourceKind) -> Result<Manifests, ListError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.load())
            .await
            .map_err(|e| ListError::Backend {
                kind,
                message: e.to_string(),
            })?
    }
}

#[async_trait]
impl RecordLister for ManifestDirectory {
    async fn list_rule_groups(&self, scope: &ListScope) -> Result<Vec<RuleGroupResource>, ListError> {
        let manifests = self.load_async(ResourceKind::RuleGroup).await?;
        Ok(manifests
            .rule_groups
            .into_iter()
            .filter(|r| scope.matches(&r.metadata))
            .collect())
    }

    async fn list_scrapes(&self, scope: &ListScope) -> Result<Vec<ScrapeResource>, ListError> {
        let manifests = self.load_async(ResourceKind::Scrape).await?;
        Ok(manifests
            .scrapes
            .into_iter()
            .filter(|r| scope.matches(&r.metadata))
            .collect())
    }
}

/// True for `.yaml`/`.yml` files with no hidden component below `root`.
pub(crate) fn is_manifest_path(root: &Path, path: &Path) -> bool {
    if let Ok(relative) = path.strip_prefix(root) {
        let hidden = relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| s.starts_with('.'))
                .unwrap_or(false)
        });
        if hidden {
            return false;
        }
    }

    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parses every document of a multi-document YAML stream.
///
/// A YAML syntax error fails the whole stream. A well-formed document that
/// does not decode as its declared kind is logged and skipped.
pub(crate) fn parse_manifests(content: &str, path: &Path) -> Result<Vec<AnyResource>, ListError> {
    let mut resources = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| ListError::ParseYaml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if value.is_null() {
            continue;
        }

        let header: ResourceHeader = serde_yaml::from_value(value.clone()).unwrap_or_default();
        let decoded = match header.resource_kind() {
            Some(ResourceKind::RuleGroup) => serde_yaml::from_value(value).map(AnyResource::RuleGroup),
            Some(ResourceKind::Scrape) => serde_yaml::from_value(value).map(AnyResource::Scrape),
            None => {
                log::debug!(
                    "Ignoring {} {} in {}",
                    header.api_version,
                    header.kind,
                    path.display()
                );
                continue;
            }
        };
        match decoded {
            Ok(resource) => resources.push(resource),
            Err(e) => log::warn!(
                "Skipping document {} ({}) in {}: {}",
                index,
                header.kind,
                path.display(),
                e
            ),
        }
    }

    Ok(resources)
}
