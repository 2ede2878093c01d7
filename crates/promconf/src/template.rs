//! Base scrape document templating.
//!
//! The template is rendered with a single context variable, `clusters`, the
//! list returned by a [`ClusterLister`].

use async_trait::async_trait;
use minijinja::{context, Environment, UndefinedBehavior};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Render(#[from] minijinja::Error),

    #[error("listing clusters: {0}")]
    Clusters(String),
}

/// A parsed config template.
#[derive(Debug, Clone)]
pub struct ConfigTemplate {
    name: String,
    source: String,
}

impl ConfigTemplate {
    pub fn from_file(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|e| TemplateError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        Self::from_source(name, source)
    }

    /// Checks the template syntax up front.
    pub fn from_source(name: impl Into<String>, source: impl Into<String>) -> Result<Self, TemplateError> {
        let template = Self {
            name: name.into(),
            source: source.into(),
        };
        template.environment()?;
        Ok(template)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn environment(&self) -> Result<Environment<'_>, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_template(&self.name, &self.source)?;
        Ok(env)
    }

    pub fn render(&self, clusters: &[serde_json::Value]) -> Result<String, TemplateError> {
        let env = self.environment()?;
        let template = env.get_template(&self.name)?;
        Ok(template.render(context! { clusters => clusters })?)
    }
}

/// Supplies the downstream clusters made available to the template.
#[async_trait]
pub trait ClusterLister: Send + Sync {
    async fn list_clusters(&self) -> Result<Vec<serde_json::Value>, TemplateError>;
}

/// Reads the cluster list from a YAML file on every call.
#[derive(Debug, Clone)]
pub struct FileClusterLister {
    path: PathBuf,
}

impl FileClusterLister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ClusterLister for FileClusterLister {
    async fn list_clusters(&self) -> Result<Vec<serde_json::Value>, TemplateError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| TemplateError::Read {
                path: self.path.clone(),
                source: e,
            })?;
        let value: Option<Vec<serde_json::Value>> = serde_yaml::from_str(&content)
            .map_err(|e| TemplateError::Clusters(format!("{}: {}", self.path.display(), e)))?;
        Ok(value.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const TEMPLATE: &str = r#"global:
  scrape_interval: 30s
scrape_configs:
{% for c in clusters %}- job_name: federate-{{ c.name }}
  static_configs:
  - targets: ['{{ c.endpoint }}']
{% endfor %}"#;

    #[test]
    fn test_render_with_clusters() {
        let t = ConfigTemplate::from_source("config.yaml.j2", TEMPLATE).unwrap();
        let out = t
            .render(&[json!({"name": "eu", "endpoint": "10.0.0.1:9090"})])
            .unwrap();
        assert!(out.contains("job_name: federate-eu"));
        assert!(out.contains("10.0.0.1:9090"));
    }

    #[test]
    fn test_render_without_clusters() {
        let t = ConfigTemplate::from_source("t", TEMPLATE).unwrap();
        let out = t.render(&[]).unwrap();
        assert!(!out.contains("federate"));
    }

    #[test]
    fn test_syntax_error_rejected_early() {
        assert!(matches!(
            ConfigTemplate::from_source("t", "{% for %}"),
            Err(TemplateError::Render(_))
        ));
    }

    #[test]
    fn test_missing_field_fails_render() {
        let t = ConfigTemplate::from_source("t", "{{ clusters[0].missing.deeper }}").unwrap();
        assert!(t.render(&[json!({"name": "eu"})]).is_err());
    }

    #[tokio::test]
    async fn test_file_cluster_lister() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clusters.yaml");
        std::fs::write(&path, "- name: eu\n  endpoint: 10.0.0.1:9090\n- name: us\n").unwrap();

        let clusters = FileClusterLister::new(&path).list_clusters().await.unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[1]["name"], "us");

        std::fs::write(&path, "").unwrap();
        assert!(FileClusterLister::new(&path).list_clusters().await.unwrap().is_empty());

        assert!(FileClusterLister::new(dir.path().join("missing.yaml"))
            .list_clusters()
            .await
            .is_err());
    }
}
