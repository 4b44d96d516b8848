// SPDX-License-Identifier: MIT OR Apache-2.0
//! Literal-input end-to-end scenarios covering translation, receipt
//! building, and receipt chaining, run entirely in-process against the
//! wired `odin-translate`/`odin-receipt`/`odin-sft` crates.

use std::collections::BTreeMap;

use odin_error::ErrorCode;
use odin_keystore::Keypair;
use odin_receipt::{build_transform_subject, chain_links, sign_transform_receipt, MapSource};
use odin_sft::SftRegistry;
use odin_translate::{translate, SftMap};
use serde_json::json;

fn identity_map() -> SftMap {
    SftMap {
        id: "identity".to_string(),
        from_sft: "core@v0.1".to_string(),
        to_sft: "core@v0.1".to_string(),
        ..Default::default()
    }
}

fn rename_const_drop_map() -> SftMap {
    SftMap {
        id: "greet-to-say-hello".to_string(),
        from_sft: "A@1".to_string(),
        to_sft: "B@1".to_string(),
        drop: vec!["debug".to_string()],
        fields: vec![("user_name".to_string(), "name".to_string())],
        intents: BTreeMap::from([("greet".to_string(), "say_hello".to_string())]),
        r#const: BTreeMap::from([("version".to_string(), json!("1"))]),
        ..Default::default()
    }
}

#[test]
fn scenario_1_identity_translation_is_passthrough() {
    let registry = SftRegistry::new();
    let input = json!({"intent": "echo", "user": "a"});

    let (output, receipt) = translate(&input, &identity_map(), &registry).unwrap();

    assert_eq!(output, input);
    assert_eq!(receipt.coverage_percent, 100.0);
    assert_eq!(receipt.transformation_count, 0);
}

#[test]
fn scenario_2_rename_const_and_drop_compose() {
    let registry = SftRegistry::new();
    let input = json!({"intent": "greet", "user_name": "M", "debug": true});

    let (output, receipt) = translate(&input, &rename_const_drop_map(), &registry).unwrap();

    assert_eq!(
        output,
        json!({"intent": "say_hello", "name": "M", "version": "1"})
    );

    let ops: Vec<&str> = receipt
        .provenance
        .iter()
        .map(|entry| entry.operation.as_str())
        .collect();
    assert!(ops.contains(&"drop"));
    assert!(ops.contains(&"rename"));
    assert!(ops.contains(&"intent"));
    assert!(ops.contains(&"const"));
}

#[test]
fn scenario_3_enum_violation_is_rejected() {
    let registry = SftRegistry::new();
    let map = SftMap {
        id: "bad-model".to_string(),
        from_sft: "A@1".to_string(),
        to_sft: "B@1".to_string(),
        r#const: BTreeMap::from([("model".to_string(), json!("invalid"))]),
        enum_constraints: BTreeMap::from([(
            "model".to_string(),
            vec![json!("gpt-4"), json!("gpt-4-turbo")],
        )]),
        ..Default::default()
    };
    let input = json!({"intent": "echo"});

    let err = translate(&input, &map, &registry).unwrap_err();

    assert_eq!(err.code, ErrorCode::TranslateEnumViolation);
    assert!(err.violations.iter().any(|v| v.path.as_deref() == Some("/model")));
}

#[test]
fn scenario_4_insufficient_coverage_is_rejected() {
    let registry = SftRegistry::new();
    let map = SftMap {
        id: "lossy".to_string(),
        from_sft: "A@1".to_string(),
        to_sft: "B@1".to_string(),
        drop: vec![
            "b".to_string(),
            "c".to_string(),
            "d".to_string(),
            "e".to_string(),
        ],
        min_coverage_percent: Some(75.0),
        ..Default::default()
    };
    let input = json!({"a": 1, "b": 2, "c": 3, "d": 4, "e": 5});

    let err = translate(&input, &map, &registry).unwrap_err();

    assert_eq!(err.code, ErrorCode::TranslateInsufficientCoverage);
}

#[test]
fn scenario_6_receipt_chain_links_head_to_tail() {
    let keypair = Keypair::generate("chain-k1");
    let a = json!({"intent": "echo", "user": "a"});
    let b = json!({"intent": "echo", "user": "a", "hop": 1});
    let c = json!({"intent": "echo", "user": "a", "hop": 2});
    let map = json!({"id": "a-to-b"});

    let first_subject =
        build_transform_subject(&a, &b, "A@1", "B@1", MapSource::Value(&map), "a-to-b", None)
            .unwrap();
    let first = sign_transform_receipt(first_subject, &keypair, None, None, false).unwrap();

    let second_subject =
        build_transform_subject(&b, &c, "B@1", "A@1", MapSource::Value(&map), "b-to-a", None)
            .unwrap();
    let second = sign_transform_receipt(second_subject, &keypair, None, None, false).unwrap();

    assert!(chain_links(&first, &second));
    assert_eq!(
        first.subject.output_sha256_b64u,
        second.subject.input_sha256_b64u
    );
}
