// SPDX-License-Identifier: MIT OR Apache-2.0
#![no_main]

use libfuzzer_sys::fuzz_target;
use odin_envelope::ProofEnvelope;

fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = serde_json::from_slice::<ProofEnvelope>(data) else {
        return;
    };

    // Decoding must never panic regardless of how the base64url/JSON
    // fields inside the envelope are malformed.
    let _ = envelope.decode_ope();
    let _ = envelope.decode_content();
});
