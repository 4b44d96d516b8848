// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for `odin_policy`'s content-stage HEL policy evaluation.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use odin_policy::{FieldConstraint, HELPolicy, HELPolicyEngine};
use serde_json::json;

fn sample_policy() -> HELPolicy {
    HELPolicy {
        deny_intents: vec!["transfer.*".to_string()],
        require_reason_for_intents: vec!["transfer".to_string()],
        field_constraints: vec![FieldConstraint {
            when_intent: Some("query".to_string()),
            path: "/amount".to_string(),
            op: "present".to_string(),
            value: None,
        }],
        ..Default::default()
    }
}

fn bench_evaluate(c: &mut Criterion) {
    let engine = HELPolicyEngine::new(sample_policy()).unwrap();
    let payload = json!({
        "intent": "query",
        "amount": 12,
        "nested": { "intent": "notify", "reason": "scheduled" }
    });

    c.bench_function("policy_evaluate", |b| {
        b.iter(|| engine.evaluate(black_box(&payload)));
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
