// SPDX-License-Identifier: MIT OR Apache-2.0
#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use odin_receipt::{chain_links, TransformReceipt};

#[derive(Arbitrary, Debug)]
struct Input<'a> {
    first_json: &'a str,
    second_json: &'a str,
}

fuzz_target!(|input: Input| {
    let Ok(first) = serde_json::from_str::<TransformReceipt>(input.first_json) else {
        return;
    };

    // Parsing an arbitrary document into a receipt, then asking whether it
    // chains with itself or with a second arbitrary receipt, must never
    // panic even when the digests and linkage hash were hand-forged.
    let _ = chain_links(&first, &first);

    if let Ok(second) = serde_json::from_str::<TransformReceipt>(input.second_json) {
        let _ = chain_links(&first, &second);
    }
});
