//! K8s-style RuleGroup and Scrape resource types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// API group served by the admission webhook.
pub const GROUP: &str = "config.prometheus.io";

/// API version within [`GROUP`].
pub const VERSION: &str = "v1beta1";

/// The `apiVersion` string carried by every resource.
pub const API_VERSION: &str = "config.prometheus.io/v1beta1";

/// Namespace assumed for resources that do not set one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// The kind of resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    RuleGroup,
    Scrape,
}

impl ResourceKind {
    /// Returns the plural resource name used in API paths.
    pub fn plural(&self) -> &'static str {
        match self {
            ResourceKind::RuleGroup => "rulegroups",
            ResourceKind::Scrape => "scrapes",
        }
    }

    /// Returns all resource kinds.
    pub fn all() -> &'static [ResourceKind] {
        &[ResourceKind::RuleGroup, ResourceKind::Scrape]
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::RuleGroup => write!(f, "RuleGroup"),
            ResourceKind::Scrape => write!(f, "Scrape"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rulegroup" | "rulegroups" => Ok(ResourceKind::RuleGroup),
            "scrape" | "scrapes" => Ok(ResourceKind::Scrape),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}

/// Metadata for a resource, following K8s conventions.
///
/// Unknown metadata fields (uid, resourceVersion, managedFields, ...) are
/// ignored on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// The effective namespace; empty means `default`.
    pub fn namespace(&self) -> &str {
        if self.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }
}

/// Stable identity of a record: namespace then name.
///
/// Ordering is lexicographic on namespace, then name, which is the order
/// fragments appear in rendered documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub namespace: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parses a `namespace/name` key. A key without a slash lives in
    /// the default namespace.
    pub fn parse(key: &str) -> Self {
        match key.split_once('/') {
            Some((ns, name)) => Self::new(ns, name),
            None => Self::new(DEFAULT_NAMESPACE, key),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Status subresource. Modelled so full objects deserialize; the
/// controller never writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    #[serde(default)]
    pub recording_rules: usize,
    #[serde(default)]
    pub alert_rules: usize,
    #[serde(default)]
    pub error_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// A generic K8s-style resource wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource<T> {
    pub api_version: String,
    pub kind: ResourceKind,
    pub metadata: ObjectMeta,
    pub spec: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResourceStatus>,
}

impl<T> Resource<T> {
    pub fn new(
        kind: ResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: T,
    ) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind,
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        self.metadata.namespace()
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.namespace(), self.name())
    }
}

// ============================================================================
// RuleGroup
// ============================================================================

/// Spec of a RuleGroup resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleGroupSpec {
    /// Evaluation interval; empty means the document default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub interval: String,

    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

/// An alerting or recording rule as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub record: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub alert: String,

    #[serde(default)]
    pub expr: String,

    #[serde(rename = "for", default, skip_serializing_if = "String::is_empty")]
    pub for_: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl RuleSpec {
    pub fn record(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            record: name.into(),
            expr: expr.into(),
            ..Default::default()
        }
    }

    pub fn alert(name: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            alert: name.into(),
            expr: expr.into(),
            ..Default::default()
        }
    }

    pub fn with_for(mut self, duration: impl Into<String>) -> Self {
        self.for_ = duration.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

pub type RuleGroupResource = Resource<RuleGroupSpec>;

impl RuleGroupResource {
    pub fn rule_group(namespace: impl Into<String>, name: impl Into<String>, spec: RuleGroupSpec) -> Self {
        Resource::new(ResourceKind::RuleGroup, namespace, name, spec)
    }
}

// ============================================================================
// Scrape
// ============================================================================

/// Spec of a Scrape resource: a scrape_config fragment serialized as YAML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScrapeSpec(pub String);

pub type ScrapeResource = Resource<ScrapeSpec>;

impl ScrapeResource {
    pub fn scrape(namespace: impl Into<String>, name: impl Into<String>, spec: impl Into<String>) -> Self {
        Resource::new(ResourceKind::Scrape, namespace, name, ScrapeSpec(spec.into()))
    }
}

// ============================================================================
// Any resource
// ============================================================================

/// Any supported resource, dispatched on `kind`.
#[derive(Debug, Clone, PartialEq)]
pub enum AnyResource {
    RuleGroup(RuleGroupResource),
    Scrape(ScrapeResource),
}

impl AnyResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            AnyResource::RuleGroup(_) => ResourceKind::RuleGroup,
            AnyResource::Scrape(_) => ResourceKind::Scrape,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            AnyResource::RuleGroup(r) => &r.metadata,
            AnyResource::Scrape(r) => &r.metadata,
        }
    }

    pub fn key(&self) -> RecordKey {
        match self {
            AnyResource::RuleGroup(r) => r.key(),
            AnyResource::Scrape(r) => r.key(),
        }
    }
}

/// Intermediate struct for parsing resources before determining their type.
/// Kinds from other APIs are kept as strings so they can be skipped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceHeader {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

impl ResourceHeader {
    /// The resource kind, if this header belongs to our API group.
    pub fn resource_kind(&self) -> Option<ResourceKind> {
        if self.api_version != API_VERSION {
            return None;
        }
        match self.kind.as_str() {
            "RuleGroup" => Some(ResourceKind::RuleGroup),
            "Scrape" => Some(ResourceKind::Scrape),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
