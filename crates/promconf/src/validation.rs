//! Structured validation causes shared by the converter and the admission
//! validator.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static RE_LABEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap());

static RE_METRIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").unwrap());

/// Returns true if `name` is a valid Prometheus label name.
pub fn is_valid_label_name(name: &str) -> bool {
    RE_LABEL_NAME.is_match(name)
}

/// Returns true if `name` is a valid Prometheus metric name.
pub fn is_valid_metric_name(name: &str) -> bool {
    RE_METRIC_NAME.is_match(name)
}

/// One reason a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationCause {
    /// Path of the offending field, e.g. `spec.rules[1].for`.
    pub field: Option<String>,
    pub message: String,
}

impl ValidationCause {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn with_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Prefixes the field path, e.g. `rules[0].expr` becomes
    /// `spec.rules[0].expr`.
    pub(crate) fn prefixed(mut self, prefix: &str) -> Self {
        self.field = Some(match self.field.take() {
            Some(field) => format!("{}.{}", prefix, field),
            None => prefix.to_string(),
        });
        self
    }
}

impl fmt::Display for ValidationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}: {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// A non-empty list of causes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationCause>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cause: ValidationCause) {
        self.0.push(cause);
    }

    pub fn extend(&mut self, causes: impl IntoIterator<Item = ValidationCause>) {
        self.0.extend(causes);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationCause> {
        self.0.iter()
    }

    pub fn into_causes(self) -> Vec<ValidationCause> {
        self.0
    }

    /// `Ok(())` when no cause was collected.
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Vec<ValidationCause>> for ValidationErrors {
    fn from(causes: Vec<ValidationCause>) -> Self {
        Self(causes)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationCause;
    type IntoIter = std::vec::IntoIter<ValidationCause>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationCause;
    type IntoIter = std::slice::Iter<'a, ValidationCause>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cause) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
