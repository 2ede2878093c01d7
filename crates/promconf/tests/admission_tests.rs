//! Admission decisions must agree with what the reconcile loops render.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use common::RuleGroupBuilder;
use promconf::admission::GroupVersionResource;
use promconf::resource::{GROUP, VERSION};
use promconf::{
    convert_rule_group, convert_scrape, router, AdmissionValidator, RuleGroupResource, RuleSpec,
    ScrapeResource,
};

fn gvr(resource: &str) -> GroupVersionResource {
    GroupVersionResource {
        group: GROUP.to_string(),
        version: VERSION.to_string(),
        resource: resource.to_string(),
    }
}

struct RuleCase {
    name: &'static str,
    record: RuleGroupResource,
}

fn rule_cases() -> Vec<RuleCase> {
    vec![
        RuleCase {
            name: "two_records",
            record: common::two_record_group(),
        },
        RuleCase {
            name: "alert_with_for",
            record: RuleGroupBuilder::new("alerts")
                .rule(
                    RuleSpec::alert("InstanceDown", "up == 0")
                        .with_for("5m")
                        .with_label("severity", "page")
                        .with_annotation("summary", "down"),
                )
                .build(),
        },
        RuleCase {
            name: "bad_for",
            record: RuleGroupBuilder::new("c")
                .rule(RuleSpec::alert("X", "up == 0").with_for("not-a-duration"))
                .build(),
        },
        RuleCase {
            name: "bad_interval",
            record: RuleGroupBuilder::new("d").interval("5 minutes").record("a", "1").build(),
        },
        RuleCase {
            name: "record_and_alert",
            record: RuleGroupBuilder::new("e")
                .rule(RuleSpec {
                    alert: "Both".into(),
                    ..RuleSpec::record("both", "1")
                })
                .build(),
        },
        RuleCase {
            name: "empty_expr",
            record: RuleGroupBuilder::new("f").record("a", "").build(),
        },
        RuleCase {
            name: "recording_with_annotation",
            record: RuleGroupBuilder::new("g")
                .rule(RuleSpec::record("a", "1").with_annotation("summary", "x"))
                .build(),
        },
        RuleCase {
            name: "invalid_label_name",
            record: RuleGroupBuilder::new("h")
                .rule(RuleSpec::record("a", "1").with_label("bad-label", "x"))
                .build(),
        },
        RuleCase {
            name: "duplicate_rule",
            record: RuleGroupBuilder::new("i").record("a", "1").record("a", "2").build(),
        },
    ]
}

#[test]
fn test_rule_group_admission_matches_conversion() {
    let validator = AdmissionValidator::new();
    for case in rule_cases() {
        let object = serde_json::to_value(&case.record).unwrap();
        let admitted = validator.admit(&gvr("rulegroups"), Some(&object));
        let converted = convert_rule_group(&case.record);

        assert_eq!(
            admitted.allowed,
            converted.is_ok(),
            "case {}: admission and conversion disagree",
            case.name
        );
        if let Err(errors) = converted {
            assert_eq!(
                admitted.causes,
                errors.into_causes(),
                "case {}: causes differ",
                case.name
            );
        }
    }
}

#[test]
fn test_scrape_admission_matches_conversion() {
    let validator = AdmissionValidator::new();
    let blobs = [
        "static_configs:\n- targets: ['a:80']\n",
        "job_name: ignored\nscrape_interval: 30s\nscrape_timeout: 10s\n",
        "scrape_interval: 10s\nscrape_timeout: 30s\n",
        "scheme: ftp\n",
        "scrape_interval: often\n",
        "",
        "- not\n- a\n- mapping\n",
    ];
    for blob in blobs {
        let record = ScrapeResource::scrape("default", "web", blob);
        let object = serde_json::to_value(&record).unwrap();
        let admitted = validator.admit(&gvr("scrapes"), Some(&object));
        assert_eq!(
            admitted.allowed,
            convert_scrape(&record).is_ok(),
            "blob {:?}: admission and conversion disagree",
            blob
        );
    }
}

#[test]
fn test_bad_for_rejection_names_the_rule() {
    let record = RuleGroupBuilder::new("c")
        .record("ok", "1")
        .rule(RuleSpec::alert("X", "up == 0").with_for("not-a-duration"))
        .build();
    let object = serde_json::to_value(&record).unwrap();
    let result = AdmissionValidator::new().admit(&gvr("rulegroups"), Some(&object));

    assert!(!result.allowed);
    assert_eq!(result.causes.len(), 1);
    assert_eq!(result.causes[0].field.as_deref(), Some("spec.rules[1].for"));
    assert!(result.causes[0].message.contains("rule 1"));
}

async fn post_review(review: serde_json::Value) -> serde_json::Value {
    let app = router(Arc::new(AdmissionValidator::new()));
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/validate")
                .header("content-type", "application/json")
                .body(Body::from(review.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_webhook_accepts_valid_rule_group() {
    let object = serde_json::to_value(common::two_record_group()).unwrap();
    let review = post_review(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "a-1",
            "kind": {"group": GROUP, "version": VERSION, "kind": "RuleGroup"},
            "resource": {"group": GROUP, "version": VERSION, "resource": "rulegroups"},
            "operation": "CREATE",
            "object": object
        }
    }))
    .await;

    assert_eq!(review["apiVersion"], json!("admission.k8s.io/v1"));
    assert_eq!(review["response"]["uid"], json!("a-1"));
    assert_eq!(review["response"]["allowed"], json!(true));
}

#[tokio::test]
async fn test_webhook_rejects_with_causes() {
    let record = RuleGroupBuilder::new("c")
        .rule(RuleSpec::alert("X", "up == 0").with_for("not-a-duration"))
        .build();
    let review = post_review(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "a-2",
            "resource": {"group": GROUP, "version": VERSION, "resource": "rulegroups"},
            "object": serde_json::to_value(record).unwrap()
        }
    }))
    .await;

    let response = &review["response"];
    assert_eq!(response["allowed"], json!(false));
    let message = response["status"]["message"].as_str().unwrap();
    assert!(message.starts_with("errors during rulegroup validation, "));
    let causes = response["status"]["details"]["causes"].as_array().unwrap();
    assert_eq!(causes.len(), 1);
    assert_eq!(causes[0]["field"], json!("spec.rules[0].for"));
}

#[tokio::test]
async fn test_webhook_rejects_unknown_resource() {
    let review = post_review(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "a-3",
            "resource": {"group": "apps", "version": "v1", "resource": "deployments"},
            "object": {}
        }
    }))
    .await;

    assert_eq!(review["response"]["allowed"], json!(false));
    assert_eq!(
        review["response"]["status"]["message"],
        json!("unexpected resource or version")
    );
}
