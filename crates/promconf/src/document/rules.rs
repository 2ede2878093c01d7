use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::duration::PromDuration;
use crate::validation::{is_valid_label_name, is_valid_metric_name, ValidationCause};

/// A rule file: the top-level `groups:` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleGroups {
    #[serde(default)]
    pub groups: Vec<RuleGroup>,
}

impl RuleGroups {
    /// Checks every group and the uniqueness of group names.
    pub fn validate(&self) -> Vec<ValidationCause> {
        let mut causes = Vec::new();
        let mut seen = HashSet::new();

        for (i, group) in self.groups.iter().enumerate() {
            if !group.name.is_empty() && !seen.insert(group.name.as_str()) {
                causes.push(ValidationCause::with_field(
                    format!("groups[{}].name", i),
                    format!("group {:?}: repeated in the same file", group.name),
                ));
            }
            causes.extend(group.validate());
        }

        causes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<PromDuration>,

    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleGroup {
    /// Structural checks for one group. Field paths are relative to the
    /// group (`rules[2].expr`).
    pub fn validate(&self) -> Vec<ValidationCause> {
        let mut causes = Vec::new();

        if self.name.is_empty() {
            causes.push(ValidationCause::with_field("name", "group name must not be empty"));
        }

        let mut seen = HashSet::new();
        for (i, rule) in self.rules.iter().enumerate() {
            for cause in rule.validate() {
                causes.push(ValidationCause {
                    field: cause.field.map(|f| format!("rules[{}].{}", i, f)),
                    message: format!("group {:?}, rule {}: {}", self.name, i, cause.message),
                });
            }

            let name = rule.name();
            if !name.is_empty() && !seen.insert(name) {
                causes.push(ValidationCause::with_field(
                    format!("rules[{}]", i),
                    format!("group {:?}, rule {}: duplicate rule name {:?}", self.name, i, name),
                ));
            }
        }

        causes
    }
}

/// An alerting or recording rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,

    pub expr: String,

    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_: Option<PromDuration>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

impl Rule {
    /// The record or alert name, whichever is set.
    pub fn name(&self) -> &str {
        self.record
            .as_deref()
            .or(self.alert.as_deref())
            .unwrap_or_default()
    }

    pub fn is_recording(&self) -> bool {
        self.record.is_some()
    }

    fn validate(&self) -> Vec<ValidationCause> {
        let mut causes = Vec::new();

        match (&self.record, &self.alert) {
            (Some(_), Some(_)) => causes.push(ValidationCause::with_field(
                "record",
                "only one of 'record' and 'alert' must be set",
            )),
            (None, None) => causes.push(ValidationCause::with_field(
                "record",
                "one of 'record' or 'alert' must be set",
            )),
            _ => {}
        }

        if self.expr.trim().is_empty() {
            causes.push(ValidationCause::with_field("expr", "field 'expr' must be set in rule"));
        }

        if let Some(record) = &self.record {
            if !is_valid_metric_name(record) {
                causes.push(ValidationCause::with_field(
                    "record",
                    format!("invalid recording rule name: {}", record),
                ));
            }
            if !self.annotations.is_empty() {
                causes.push(ValidationCause::with_field(
                    "annotations",
                    "invalid field 'annotations' in recording rule",
                ));
            }
            if self.for_.is_some() {
                causes.push(ValidationCause::with_field(
                    "for",
                    "invalid field 'for' in recording rule",
                ));
            }
        }

        if let Some(alert) = &self.alert {
            if alert.is_empty() {
                causes.push(ValidationCause::with_field("alert", "alert name must not be empty"));
            }
        }

        for name in self.labels.keys() {
            if name == "__name__" {
                causes.push(ValidationCause::with_field(
                    "labels",
                    "invalid label name: __name__",
                ));
            } else if !is_valid_label_name(name) {
                causes.push(ValidationCause::with_field(
                    "labels",
                    format!("invalid label name: {}", name),
                ));
            }
        }

        for name in self.annotations.keys() {
            if !is_valid_label_name(name) {
                causes.push(ValidationCause::with_field(
                    "annotations",
                    format!("invalid annotation name: {}", name),
                ));
            }
        }

        causes
    }
}
