// SPDX-License-Identifier: MIT OR Apache-2.0
#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use odin_policy::{HELPolicy, HELPolicyEngine};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    policy_json: &'a str,
    payload_json: &'a str,
}

fuzz_target!(|input: Input| {
    let Ok(policy) = serde_json::from_str::<HELPolicy>(input.policy_json) else {
        return;
    };
    let Ok(payload) = serde_json::from_str::<serde_json::Value>(input.payload_json) else {
        return;
    };
    let Ok(engine) = HELPolicyEngine::new(policy) else {
        return;
    };

    let result = engine.evaluate(&payload);
    assert_eq!(result.allowed, result.violations.is_empty());
});
