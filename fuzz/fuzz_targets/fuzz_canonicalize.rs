// SPDX-License-Identifier: MIT OR Apache-2.0
#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(text) else {
        return;
    };

    if let Ok(bytes) = odin_codec::canonicalize_default(&value) {
        let first = odin_codec::cid(&bytes);
        let second = odin_codec::cid(&bytes);
        assert_eq!(first, second, "cid must be deterministic over identical bytes");

        if let Ok(again) = odin_codec::canonicalize_default(&value) {
            assert_eq!(bytes, again, "canonicalization must be deterministic");
        }
    }
});
