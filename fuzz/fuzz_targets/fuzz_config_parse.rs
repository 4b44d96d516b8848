// SPDX-License-Identifier: MIT OR Apache-2.0
#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = odin_config::parse_toml(text) {
        // A config that parses must also survive validation without
        // panicking, regardless of how nonsensical its field values are.
        let _ = odin_config::validate_config(&config);
    }

    let _ = odin_config::parse_redact_fields(text);
});
