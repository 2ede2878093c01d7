//! Turns one resource record into one target-document fragment.
//!
//! Both functions are pure. The reconcile loops and the admission validator
//! call exactly these, so a record is admitted if and only if it would be
//! rendered.

use thiserror::Error;

use crate::document::{DocumentError, Rule, RuleGroup, ScrapeConfig};
use crate::duration::PromDuration;
use crate::resource::{RecordKey, RuleGroupResource, ScrapeResource};
use crate::validation::{ValidationCause, ValidationErrors};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("invalid scrape config in {key}: {source}")]
    Scrape {
        key: RecordKey,
        #[source]
        source: DocumentError,
    },
}

/// Converts a RuleGroup record into a rule group named `namespace/name`.
///
/// Every interval, `for` and structural problem is collected; any cause
/// discards the whole group.
pub fn convert_rule_group(record: &RuleGroupResource) -> Result<RuleGroup, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let interval = match parse_optional_duration(&record.spec.interval) {
        Ok(d) => d,
        Err(e) => {
            errors.push(ValidationCause::with_field(
                "spec.interval",
                format!("invalid interval: {}", e),
            ));
            None
        }
    };

    let mut rules = Vec::with_capacity(record.spec.rules.len());
    for (i, spec) in record.spec.rules.iter().enumerate() {
        let for_ = match parse_optional_duration(&spec.for_) {
            Ok(d) => d,
            Err(e) => {
                errors.push(ValidationCause::with_field(
                    format!("spec.rules[{}].for", i),
                    format!("invalid for duration in rule {}: {}", i, e),
                ));
                continue;
            }
        };

        rules.push(Rule {
            record: non_empty(&spec.record),
            alert: non_empty(&spec.alert),
            expr: spec.expr.clone(),
            for_,
            labels: spec.labels.clone(),
            annotations: spec.annotations.clone(),
        });
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let group = RuleGroup {
        name: record.key().to_string(),
        interval,
        rules,
    };

    errors.extend(group.validate().into_iter().map(|c| c.prefixed("spec")));
    errors.into_result()?;

    Ok(group)
}

/// Converts a Scrape record. The blob's own `job_name` is replaced by
/// `namespace/name`.
pub fn convert_scrape(record: &ScrapeResource) -> Result<ScrapeConfig, ConvertError> {
    let key = record.key();
    let mut sc = ScrapeConfig::parse(&record.spec.0).map_err(|source| ConvertError::Scrape {
        key: key.clone(),
        source,
    })?;
    sc.job_name = key.to_string();
    Ok(sc)
}

/// Empty means unset. A zero duration is also treated as unset, matching
/// the target format's omitempty behaviour.
fn parse_optional_duration(s: &str) -> Result<Option<PromDuration>, crate::duration::DurationError> {
    if s.is_empty() {
        return Ok(None);
    }
    let d = PromDuration::parse(s)?;
    Ok((!d.is_zero()).then_some(d))
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{RuleGroupSpec, RuleSpec};

    fn rule_group(name: &str, interval: &str, rules: Vec<RuleSpec>) -> RuleGroupResource {
        RuleGroupResource::rule_group(
            "default",
            name,
            RuleGroupSpec {
                interval: interval.to_string(),
                rules,
            },
        )
    }

    #[test]
    fn test_convert_recording_rules() {
        let rg = rule_group(
            "test",
            "",
            vec![
                RuleSpec::record("something", "1 + 1"),
                RuleSpec::record("something2", "1 + 1"),
            ],
        );
        let group = convert_rule_group(&rg).unwrap();
        assert_eq!(group.name, "default/test");
        assert_eq!(group.interval, None);
        assert_eq!(group.rules.len(), 2);
        assert_eq!(group.rules[1].record.as_deref(), Some("something2"));
        assert_eq!(group.rules[1].alert, None);
    }

    #[test]
    fn test_convert_interval_and_for() {
        let rg = rule_group(
            "alerts",
            "30s",
            vec![RuleSpec::alert("Down", "up == 0").with_for("5m")],
        );
        let group = convert_rule_group(&rg).unwrap();
        assert_eq!(group.interval, Some(PromDuration::from_secs(30)));
        assert_eq!(group.rules[0].for_, Some(PromDuration::from_secs(300)));
    }

    #[test]
    fn test_invalid_for_collects_every_rule() {
        let rg = rule_group(
            "bad",
            "",
            vec![
                RuleSpec::alert("A", "1").with_for("not-a-duration"),
                RuleSpec::alert("B", "1"),
                RuleSpec::alert("C", "1").with_for("soon"),
            ],
        );
        let errors = convert_rule_group(&rg).unwrap_err();
        let causes = errors.into_causes();
        assert_eq!(causes.len(), 2);
        assert_eq!(causes[0].field.as_deref(), Some("spec.rules[0].for"));
        assert!(causes[0].message.contains("rule 0"));
        assert_eq!(causes[1].field.as_deref(), Some("spec.rules[2].for"));
    }

    #[test]
    fn test_invalid_interval() {
        let rg = rule_group("bad", "often", vec![RuleSpec::record("a", "1")]);
        let errors = convert_rule_group(&rg).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors.iter().next().unwrap().field.as_deref(),
            Some("spec.interval")
        );
    }

    #[test]
    fn test_structural_causes_are_prefixed() {
        let rg = rule_group("bad", "", vec![RuleSpec::record("a", "")]);
        let errors = convert_rule_group(&rg).unwrap_err();
        assert_eq!(
            errors.iter().next().unwrap().field.as_deref(),
            Some("spec.rules[0].expr")
        );
    }

    #[test]
    fn test_zero_duration_is_unset() {
        let rg = rule_group("z", "0s", vec![RuleSpec::alert("A", "1").with_for("0")]);
        let group = convert_rule_group(&rg).unwrap();
        assert_eq!(group.interval, None);
        assert_eq!(group.rules[0].for_, None);
    }

    #[test]
    fn test_convert_scrape_overrides_job_name() {
        let s = ScrapeResource::scrape("default", "node", "job_name: whatever\nmetrics_path: /m\n");
        let sc = convert_scrape(&s).unwrap();
        assert_eq!(sc.job_name, "default/node");
        assert_eq!(sc.metrics_path.as_deref(), Some("/m"));
    }

    #[test]
    fn test_convert_scrape_parse_error() {
        let s = ScrapeResource::scrape("default", "node", "scrape_interval: [\n");
        let err = convert_scrape(&s).unwrap_err();
        assert!(err.to_string().contains("default/node"));
    }
}
