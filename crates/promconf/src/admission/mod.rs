//! Admission validation for RuleGroup and Scrape records.
//!
//! The validator runs the same conversion the reconcile loops run, so a
//! record is admitted exactly when it would be rendered.

mod review;
mod server;

pub use review::{
    AdmissionRequest, AdmissionResponse, AdmissionReview, GroupVersionKind, GroupVersionResource,
    Status, StatusCause, StatusDetails, ADMISSION_API_VERSION,
};
pub use server::router;

use std::collections::HashMap;

use crate::convert::{convert_rule_group, convert_scrape};
use crate::resource::{ResourceKind, RuleGroupResource, ScrapeResource, GROUP, VERSION};
use crate::validation::ValidationCause;

/// Reason attached to every rejection.
pub const REASON_NOT_ACCEPTABLE: &str = "NotAcceptable";

/// Outcome of validating one candidate record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionResult {
    pub allowed: bool,
    pub message: String,
    pub reason: String,
    pub causes: Vec<ValidationCause>,
}

impl AdmissionResult {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            message: String::new(),
            reason: String::new(),
            causes: Vec::new(),
        }
    }

    pub fn reject(message: impl Into<String>, causes: Vec<ValidationCause>) -> Self {
        Self {
            allowed: false,
            message: message.into(),
            reason: REASON_NOT_ACCEPTABLE.to_string(),
            causes,
        }
    }

    /// Rejects with `message` as the sole cause.
    fn reject_with(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::reject(message.clone(), vec![ValidationCause::new(message)])
    }

    pub fn into_response(self, uid: impl Into<String>) -> AdmissionResponse {
        let status = (!self.allowed).then(|| Status {
            message: self.message,
            reason: self.reason,
            details: Some(StatusDetails {
                causes: self
                    .causes
                    .into_iter()
                    .map(|c| StatusCause {
                        message: c.message,
                        field: c.field,
                    })
                    .collect(),
            }),
        });
        AdmissionResponse {
            uid: uid.into(),
            allowed: self.allowed,
            status,
        }
    }
}

type ValidateFn = fn(&serde_json::Value) -> AdmissionResult;

/// Validates candidate records by plural resource name.
pub struct AdmissionValidator {
    validators: HashMap<&'static str, ValidateFn>,
}

impl Default for AdmissionValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionValidator {
    pub fn new() -> Self {
        let mut validators: HashMap<&'static str, ValidateFn> = HashMap::new();
        validators.insert(ResourceKind::RuleGroup.plural(), validate_rule_group);
        validators.insert(ResourceKind::Scrape.plural(), validate_scrape);
        Self { validators }
    }

    /// Validates one candidate record of the given resource.
    pub fn admit(
        &self,
        resource: &GroupVersionResource,
        object: Option<&serde_json::Value>,
    ) -> AdmissionResult {
        if resource.group != GROUP || resource.version != VERSION {
            return AdmissionResult::reject_with("unexpected resource or version");
        }

        let Some(validate) = self.validators.get(resource.resource.as_str()) else {
            return AdmissionResult::reject_with(format!("unknown resource {}", resource.resource));
        };

        match object {
            Some(object) => validate(object),
            None => AdmissionResult::reject_with("request carries no object"),
        }
    }

    /// Answers a full review, echoing the request uid.
    pub fn review(&self, review: AdmissionReview) -> AdmissionReview {
        let Some(request) = review.request else {
            return AdmissionReview::respond(
                AdmissionResult::reject_with("admission review carries no request").into_response(""),
            );
        };

        let result = self.admit(&request.resource, request.object.as_ref());
        if result.allowed {
            log::debug!("admitted {} {}/{}", request.resource.resource, request.namespace, request.name);
        } else {
            log::info!(
                "rejected {} {}/{}: {}",
                request.resource.resource,
                request.namespace,
                request.name,
                result.message
            );
        }
        AdmissionReview::respond(result.into_response(request.uid))
    }
}

fn validate_rule_group(object: &serde_json::Value) -> AdmissionResult {
    let record: RuleGroupResource = match serde_json::from_value(object.clone()) {
        Ok(r) => r,
        Err(e) => return AdmissionResult::reject_with(e.to_string()),
    };

    match convert_rule_group(&record) {
        Ok(_) => AdmissionResult::allow(),
        Err(errors) => {
            let causes = errors.into_causes();
            let joined = causes
                .iter()
                .map(|c| c.message.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            AdmissionResult::reject(format!("errors during rulegroup validation, {}", joined), causes)
        }
    }
}

fn validate_scrape(object: &serde_json::Value) -> AdmissionResult {
    let record: ScrapeResource = match serde_json::from_value(object.clone()) {
        Ok(r) => r,
        Err(e) => return AdmissionResult::reject_with(e.to_string()),
    };

    match convert_scrape(&record) {
        Ok(_) => AdmissionResult::allow(),
        Err(e) => {
            let message = format!("errors during scrape validation, {}", e);
            AdmissionResult::reject(
                message,
                vec![ValidationCause::with_field("spec", e.to_string())],
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{RuleGroupSpec, RuleSpec, API_VERSION};
    use serde_json::json;

    fn gvr(resource: &str) -> GroupVersionResource {
        GroupVersionResource {
            group: GROUP.into(),
            version: VERSION.into(),
            resource: resource.into(),
        }
    }

    fn rule_group(rules: Vec<RuleSpec>) -> serde_json::Value {
        let record = RuleGroupResource::rule_group(
            "default",
            "test",
            RuleGroupSpec {
                interval: String::new(),
                rules,
            },
        );
        serde_json::to_value(record).unwrap()
    }

    #[test]
    fn test_admits_valid_rule_group() {
        let v = AdmissionValidator::new();
        let obj = rule_group(vec![RuleSpec::record("something", "1 + 1")]);
        let result = v.admit(&gvr("rulegroups"), Some(&obj));
        assert!(result.allowed);
        assert!(result.causes.is_empty());
    }

    #[test]
    fn test_rejects_bad_for_duration() {
        let v = AdmissionValidator::new();
        let obj = rule_group(vec![RuleSpec::alert("Down", "up == 0").with_for("not-a-duration")]);
        let result = v.admit(&gvr("rulegroups"), Some(&obj));
        assert!(!result.allowed);
        assert_eq!(result.reason, REASON_NOT_ACCEPTABLE);
        assert!(result.message.starts_with("errors during rulegroup validation, "));
        assert_eq!(result.causes.len(), 1);
        assert_eq!(result.causes[0].field.as_deref(), Some("spec.rules[0].for"));
    }

    #[test]
    fn test_rejects_bad_scrape_blob() {
        let v = AdmissionValidator::new();
        let obj = json!({
            "apiVersion": API_VERSION,
            "kind": "Scrape",
            "metadata": {"name": "web", "namespace": "default"},
            "spec": "scrape_interval: often\n"
        });
        let result = v.admit(&gvr("scrapes"), Some(&obj));
        assert!(!result.allowed);
        assert!(result.message.starts_with("errors during scrape validation, "));
        assert_eq!(result.causes.len(), 1);
    }

    #[test]
    fn test_undecodable_object_is_sole_cause() {
        let v = AdmissionValidator::new();
        let obj = json!({"kind": "RuleGroup", "spec": {"rules": "nope"}});
        let result = v.admit(&gvr("rulegroups"), Some(&obj));
        assert!(!result.allowed);
        assert_eq!(result.causes.len(), 1);
        assert_eq!(result.causes[0].message, result.message);
    }

    #[test]
    fn test_unexpected_group_or_resource() {
        let v = AdmissionValidator::new();
        let mut other = gvr("rulegroups");
        other.version = "v1".into();
        let result = v.admit(&other, Some(&json!({})));
        assert_eq!(result.message, "unexpected resource or version");

        let result = v.admit(&gvr("pods"), Some(&json!({})));
        assert_eq!(result.message, "unknown resource pods");
    }

    #[test]
    fn test_review_echoes_uid() {
        let v = AdmissionValidator::new();
        let review = AdmissionReview {
            api_version: ADMISSION_API_VERSION.into(),
            kind: "AdmissionReview".into(),
            request: Some(AdmissionRequest {
                uid: "1234".into(),
                resource: gvr("rulegroups"),
                object: Some(rule_group(vec![RuleSpec::record("a:b", "1")])),
                ..Default::default()
            }),
            response: None,
        };
        let out = v.review(review);
        let response = out.response.unwrap();
        assert_eq!(response.uid, "1234");
        assert!(response.allowed);
        assert!(response.status.is_none());
    }

    #[test]
    fn test_review_without_request() {
        let out = AdmissionValidator::new().review(AdmissionReview::default());
        let response = out.response.unwrap();
        assert!(!response.allowed);
        assert_eq!(response.status.unwrap().reason, REASON_NOT_ACCEPTABLE);
    }
}
