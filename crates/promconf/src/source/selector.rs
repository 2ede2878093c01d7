//! Kubernetes-style label selectors.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("invalid label selector {selector:?}: {message}")]
    Invalid { selector: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, BTreeSet<String>),
    NotIn(String, BTreeSet<String>),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::In(k, vs) => labels.get(k).is_some_and(|v| vs.contains(v)),
            Requirement::NotIn(k, vs) => !labels.get(k).is_some_and(|v| vs.contains(v)),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::DoesNotExist(k) => !labels.contains_key(k),
        }
    }
}

/// A parsed selector such as `team=infra,tier in (a, b),!legacy`.
/// The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    source: String,
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let invalid = |message: &str| SelectorError::Invalid {
            selector: selector.to_string(),
            message: message.to_string(),
        };

        let mut requirements = Vec::new();
        for term in split_terms(selector) {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            requirements.push(parse_term(term).map_err(|m| invalid(&m))?);
        }

        Ok(Self {
            source: selector.trim().to_string(),
            requirements,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl std::str::FromStr for LabelSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Splits on commas that are not inside a `(...)` value set.
fn split_terms(s: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                terms.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&s[start..]);
    terms
}

fn parse_term(term: &str) -> Result<Requirement, String> {
    if let Some(key) = term.strip_prefix('!') {
        return Ok(Requirement::DoesNotExist(parse_key(key)?));
    }

    if let Some((key, value)) = term.split_once("!=") {
        return Ok(Requirement::NotEquals(parse_key(key)?, parse_value(value)?));
    }
    if let Some((key, value)) = term.split_once("==") {
        return Ok(Requirement::Equals(parse_key(key)?, parse_value(value)?));
    }
    if let Some((key, value)) = term.split_once('=') {
        return Ok(Requirement::Equals(parse_key(key)?, parse_value(value)?));
    }

    let mut parts = term.splitn(2, char::is_whitespace);
    let key = parts.next().unwrap_or_default();
    let rest = parts.next().map(str::trim).unwrap_or_default();
    if rest.is_empty() {
        return Ok(Requirement::Exists(parse_key(key)?));
    }

    let (op, values) = if let Some(v) = rest.strip_prefix("notin") {
        ("notin", v)
    } else if let Some(v) = rest.strip_prefix("in") {
        ("in", v)
    } else {
        return Err(format!("unknown operator in {:?}", term));
    };

    let values = values.trim();
    let inner = values
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .ok_or_else(|| format!("expected a parenthesised value set in {:?}", term))?;
    let set = inner
        .split(',')
        .map(parse_value)
        .collect::<Result<BTreeSet<_>, _>>()?;

    let key = parse_key(key)?;
    Ok(match op {
        "in" => Requirement::In(key, set),
        _ => Requirement::NotIn(key, set),
    })
}

fn parse_key(key: &str) -> Result<String, String> {
    let key = key.trim();
    // Prefixed keys such as app.kubernetes.io/name are allowed.
    let (prefix, name) = match key.rsplit_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };
    let prefix_ok = prefix.map_or(true, |p| {
        !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    });
    let name_ok = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if prefix_ok && name_ok {
        Ok(key.to_string())
    } else {
        Err(format!("invalid label key {:?}", key))
    }
}

fn parse_value(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        Ok(value.to_string())
    } else {
        Err(format!("invalid label value {:?}", value))
    }
}
