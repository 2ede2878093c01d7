//! Deterministic serialization of fragments into a document with a content
//! fingerprint.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::document::{Config, RuleGroup, RuleGroups, ScrapeConfig};
use crate::resource::RecordKey;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("serializing document: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// SHA-256 of a rendered document.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let mut out = [0u8; 32];
        out.copy_from_slice(&Sha256::digest(bytes));
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

/// A serialized document and its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub content: String,
    pub fingerprint: Fingerprint,
}

impl RenderedDocument {
    pub fn new(content: String) -> Self {
        let fingerprint = Fingerprint::of(content.as_bytes());
        Self {
            content,
            fingerprint,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }
}

/// Serializes any document to YAML.
pub fn render<T: Serialize>(doc: &T) -> Result<RenderedDocument, RenderError> {
    Ok(RenderedDocument::new(serde_yaml::to_string(doc)?))
}

/// Renders rule groups ordered by record key, whatever order they arrive in.
pub fn render_rule_groups(
    groups: impl IntoIterator<Item = (RecordKey, RuleGroup)>,
) -> Result<RenderedDocument, RenderError> {
    let sorted: BTreeMap<RecordKey, RuleGroup> = groups.into_iter().collect();
    let doc = RuleGroups {
        groups: sorted.into_values().collect(),
    };
    render(&doc)
}

/// Appends scrape fragments, ordered by record key, to the base document's
/// own scrape list and renders the result.
pub fn render_scrape_config(
    mut base: Config,
    fragments: impl IntoIterator<Item = (RecordKey, ScrapeConfig)>,
) -> Result<RenderedDocument, RenderError> {
    let sorted: BTreeMap<RecordKey, ScrapeConfig> = fragments.into_iter().collect();
    base.scrape_configs.extend(sorted.into_values());
    render(&base)
}
