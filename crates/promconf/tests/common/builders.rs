//! Builders for RuleGroup and Scrape records.

#![allow(dead_code)]

use promconf::{RuleGroupResource, RuleGroupSpec, RuleSpec, ScrapeResource};

/// Builds a RuleGroup record.
pub struct RuleGroupBuilder {
    namespace: String,
    name: String,
    interval: String,
    rules: Vec<RuleSpec>,
    labels: Vec<(String, String)>,
}

impl RuleGroupBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            namespace: "default".to_string(),
            name: name.to_string(),
            interval: String::new(),
            rules: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    pub fn interval(mut self, interval: &str) -> Self {
        self.interval = interval.to_string();
        self
    }

    pub fn record(mut self, name: &str, expr: &str) -> Self {
        self.rules.push(RuleSpec::record(name, expr));
        self
    }

    pub fn rule(mut self, rule: RuleSpec) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn label(mut self, key: &str, value: &str) -> Self {
        self.labels.push((key.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> RuleGroupResource {
        let mut record = RuleGroupResource::rule_group(
            self.namespace,
            self.name,
            RuleGroupSpec {
                interval: self.interval,
                rules: self.rules,
            },
        );
        for (k, v) in self.labels {
            record.metadata.labels.insert(k, v);
        }
        record
    }
}

/// A Scrape record carrying `blob` as its spec.
pub fn scrape(namespace: &str, name: &str, blob: &str) -> ScrapeResource {
    ScrapeResource::scrape(namespace, name, blob)
}

/// The two-record group used by the basic rule scenario.
pub fn two_record_group() -> RuleGroupResource {
    RuleGroupBuilder::new("test")
        .record("something", "1 + 1")
        .record("something2", "1 + 1")
        .build()
}
