//! End-to-end reconcile passes against in-memory records and sinks.

mod common;

use common::{scrape, two_record_group, Harness, RuleGroupBuilder};

use promconf::document::{Config, RuleGroups};
use promconf::{Reconciler, RuleSpec, SyncError};

fn parse_rules(content: &str) -> RuleGroups {
    serde_yaml::from_str(content).expect("rendered rules must parse")
}

#[tokio::test]
async fn test_single_rule_group_written_once() {
    let h = Harness::new();
    h.records.put_rule_group(two_record_group());
    let rules = h.rules();

    assert!(rules.sync().await.unwrap());

    let stored = h.stored_rules().unwrap();
    assert_eq!(stored, h.rules_file_content());
    let doc = parse_rules(&stored);
    assert_eq!(doc.groups.len(), 1);
    assert_eq!(doc.groups[0].name, "default/test");
    let names: Vec<_> = doc.groups[0].rules.iter().map(|r| r.name()).collect();
    assert_eq!(names, vec!["something", "something2"]);

    assert!(!rules.sync().await.unwrap());
}

#[tokio::test]
async fn test_scrape_job_name_is_forced() {
    let h = Harness::new();
    h.records.put_scrape(scrape(
        "default",
        "web",
        "job_name: whatever\nstatic_configs:\n- targets: ['web:8080']\n",
    ));

    assert!(h.scrapes().sync().await.unwrap());

    let doc = Config::load(&h.stored_scrapes().unwrap()).unwrap();
    assert_eq!(doc.scrape_configs.len(), 1);
    assert_eq!(doc.scrape_configs[0].job_name, "default/web");
    assert!(doc.scrape_configs[0].extra.contains_key("static_configs"));
}

#[tokio::test]
async fn test_bad_for_duration_drops_group() {
    let h = Harness::new();
    h.records.put_rule_group(
        RuleGroupBuilder::new("broken")
            .rule(RuleSpec::alert("Down", "up == 0").with_for("not-a-duration"))
            .build(),
    );

    let desired = h.rules().desired().await.unwrap();
    assert!(desired.accepted.is_empty());
    assert_eq!(desired.rejected.len(), 1);
    assert_eq!(desired.document.content, "groups: []\n");
}

#[tokio::test]
async fn test_output_independent_of_insertion_order() {
    let groups = vec![
        RuleGroupBuilder::new("b").namespace("team-a").record("b:sum", "sum(b)").build(),
        RuleGroupBuilder::new("a").namespace("team-b").record("a:sum", "sum(a)").build(),
        RuleGroupBuilder::new("a").namespace("team-a").record("c:sum", "sum(c)").build(),
        RuleGroupBuilder::new("z").interval("30s").record("z:sum", "sum(z)").build(),
    ];

    let forward = Harness::new();
    for g in groups.iter().cloned() {
        forward.records.put_rule_group(g);
    }
    let backward = Harness::new();
    for g in groups.iter().rev().cloned() {
        backward.records.put_rule_group(g);
    }

    forward.rules().sync().await.unwrap();
    backward.rules().sync().await.unwrap();

    let a = forward.stored_rules().unwrap();
    let b = backward.stored_rules().unwrap();
    assert_eq!(a, b);

    let names: Vec<_> = parse_rules(&a).groups.into_iter().map(|g| g.name).collect();
    assert_eq!(names, vec!["default/z", "team-a/a", "team-a/b", "team-b/a"]);
}

#[tokio::test]
async fn test_repeat_pass_issues_no_writes() {
    let h = Harness::new();
    h.records.put_rule_group(two_record_group());
    h.records.put_scrape(scrape("default", "web", "metrics_path: /m\n"));
    let rules = h.rules();
    let scrapes = h.scrapes();

    assert!(rules.sync().await.unwrap());
    assert!(scrapes.sync().await.unwrap());
    let writes = h.store.writes();

    assert!(!rules.sync().await.unwrap());
    assert!(!scrapes.sync().await.unwrap());
    assert_eq!(h.store.writes(), writes);
}

#[tokio::test]
async fn test_one_malformed_record_does_not_block_others() {
    let h = Harness::new();
    for i in 0..4 {
        h.records.put_rule_group(
            RuleGroupBuilder::new(&format!("group-{}", i))
                .record(&format!("job:metric_{}:sum", i), "sum(up)")
                .build(),
        );
    }
    h.records.put_rule_group(
        RuleGroupBuilder::new("group-bad")
            .rule(RuleSpec::record("bad metric name", "1"))
            .build(),
    );
    h.records.put_scrape(scrape("default", "ok", "scheme: https\n"));
    h.records.put_scrape(scrape("default", "nope", "scheme: gopher\n"));

    h.rules().sync().await.unwrap();
    h.scrapes().sync().await.unwrap();

    let groups = parse_rules(&h.stored_rules().unwrap()).groups;
    assert_eq!(groups.len(), 4);
    assert!(groups.iter().all(|g| g.name != "default/group-bad"));

    let doc = Config::load(&h.stored_scrapes().unwrap()).unwrap();
    let jobs: Vec<_> = doc.scrape_configs.iter().map(|s| s.job_name.as_str()).collect();
    assert_eq!(jobs, vec!["default/ok"]);
}

#[tokio::test]
async fn test_listing_failure_surfaces_and_recovers() {
    let h = Harness::new();
    h.records.put_rule_group(two_record_group());
    h.records.set_failing(true);
    let rules = h.rules();

    let err = rules.sync().await.unwrap_err();
    assert!(matches!(err, SyncError::List { .. }));
    assert!(err.is_retryable());
    assert!(h.stored_rules().is_none());

    h.records.set_failing(false);
    assert!(rules.sync().await.unwrap());
}

#[tokio::test]
async fn test_store_failure_aborts_before_file_sink() {
    let h = Harness::new();
    h.records.put_rule_group(two_record_group());
    h.store.set_failing(true);

    let err = h.rules().sync().await.unwrap_err();
    assert!(matches!(err, SyncError::Sink { .. }));
    assert!(!h.rules_file.exists());
}

#[tokio::test]
async fn test_removed_record_is_dropped() {
    let h = Harness::new();
    let group = two_record_group();
    let key = group.key();
    h.records.put_rule_group(group);
    let rules = h.rules();
    rules.sync().await.unwrap();

    h.records.remove(promconf::ResourceKind::RuleGroup, &key);
    assert!(rules.sync().await.unwrap());
    assert_eq!(h.stored_rules().unwrap(), "groups: []\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_passes_sharing_one_object_keep_both_documents() {
    for round in 0..50 {
        let h = Harness::new();
        h.records.put_rule_group(two_record_group());
        h.records.put_scrape(scrape("default", "web", "metrics_path: /m\n"));
        let rules = h.rules();
        let scrapes = h.scrapes();

        let (r, s) = tokio::join!(
            tokio::spawn(async move { rules.sync().await }),
            tokio::spawn(async move { scrapes.sync().await }),
        );
        assert!(r.unwrap().unwrap(), "round {}", round);
        assert!(s.unwrap().unwrap(), "round {}", round);

        assert!(h.stored_rules().is_some(), "round {}: rules lost", round);
        assert!(h.stored_scrapes().is_some(), "round {}: scrapes lost", round);
    }
}
