// SPDX-License-Identifier: MIT OR Apache-2.0
//! Integration tests for the audit module.

use odin_policy::{HELPolicy, HELPolicyEngine, PolicyAuditor};
use serde_json::json;

fn permissive_auditor() -> PolicyAuditor {
    PolicyAuditor::new(HELPolicyEngine::new(HELPolicy::default()).unwrap())
}

fn restrictive_auditor() -> PolicyAuditor {
    PolicyAuditor::new(
        HELPolicyEngine::new(HELPolicy {
            deny_intents: vec!["delete".into(), "execute".into()],
            require_reason_for_intents: vec!["delete".into()],
            ..Default::default()
        })
        .unwrap(),
    )
}

#[test]
fn auditor_records_allowed_evaluations() {
    let mut auditor = permissive_auditor();
    let result = auditor.evaluate("req-1", &json!({"intent": "echo"}));
    assert!(result.allowed);
    assert_eq!(auditor.entries().len(), 1);
    assert!(auditor.entries()[0].allowed);
    assert_eq!(auditor.entries()[0].subject, "req-1");
}

#[test]
fn auditor_records_denied_evaluations_with_codes() {
    let mut auditor = restrictive_auditor();
    let result = auditor.evaluate("req-1", &json!({"intent": "delete"}));
    assert!(!result.allowed);
    let entry = &auditor.entries()[0];
    assert!(!entry.allowed);
    assert!(entry.violation_codes.contains(&"intent.denied".to_string()));
    assert!(entry.violation_codes.contains(&"reason.required".to_string()));
}

#[test]
fn auditor_accumulates_entries_across_many_requests() {
    let mut auditor = restrictive_auditor();
    for i in 0..5 {
        auditor.evaluate(&format!("req-{i}"), &json!({"intent": "query"}));
    }
    auditor.evaluate("req-bad", &json!({"intent": "execute"}));

    assert_eq!(auditor.entries().len(), 6);
    let summary = auditor.summary();
    assert_eq!(summary.allowed, 5);
    assert_eq!(summary.denied, 1);
}

#[test]
fn auditor_entries_are_chronological() {
    let mut auditor = permissive_auditor();
    auditor.evaluate("first", &json!({"intent": "a"}));
    auditor.evaluate("second", &json!({"intent": "b"}));
    let entries = auditor.entries();
    assert_eq!(entries[0].subject, "first");
    assert_eq!(entries[1].subject, "second");
    assert!(entries[0].timestamp <= entries[1].timestamp);
}

#[test]
fn summary_on_fresh_auditor_is_zero() {
    let auditor = permissive_auditor();
    let summary = auditor.summary();
    assert_eq!(summary.allowed, 0);
    assert_eq!(summary.denied, 0);
}
