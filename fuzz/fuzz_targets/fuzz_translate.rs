// SPDX-License-Identifier: MIT OR Apache-2.0
#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use odin_sft::SftRegistry;
use odin_translate::{translate, SftMap};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    map_json: &'a str,
    payload_json: &'a str,
}

fuzz_target!(|input: Input| {
    let Ok(map) = serde_json::from_str::<SftMap>(input.map_json) else {
        return;
    };
    let Ok(payload) = serde_json::from_str::<serde_json::Value>(input.payload_json) else {
        return;
    };

    let registry = SftRegistry::new();
    // Translation must never panic, only return a structured error.
    let _ = translate(&payload, &map, &registry);
});
