// SPDX-License-Identifier: MIT OR Apache-2.0
//! Deterministic canonical JSON encoding and content-addressing.
//!
//! Every hash and signature in the ODIN gateway is computed over bytes
//! produced by [`canonicalize`]: Unicode NFC-normalize every string value
//! and key, sort object keys by Unicode code point, and emit with no
//! insignificant whitespace. The resulting bytes are the single source of
//! truth for both [`cid`] (content addressing) and the SHA-256 digests used
//! by `odin-receipt`'s `TransformSubject`.
//!
//! Grounded on `original_source/libs/odin_core/odin/transform.py`'s `_canon`
//! (`json.dumps(obj, separators=(",", ":"), sort_keys=True)`); this
//! implementation is stricter than the original in one respect: it also
//! NFC-normalizes strings, which the original does not. spec.md's prose is
//! explicit about NFC, so the stricter reading wins (see `DESIGN.md`).
#![deny(unsafe_code)]
#![warn(missing_docs)]

use odin_error::{ErrorCode, OdinError};
use serde_json::Value;
use unicode_normalization::UnicodeNormalization;

/// The default canonicalization algorithm identifier.
pub const DEFAULT_CANON_ALG: &str = "json/nfc/no_ws/sort_keys";

/// The reserved (not yet implemented) CBOR canonicalization identifier.
pub const CBOR_CANON_ALG: &str = "cbor/canonical";

/// Maximum recursion depth accepted by [`canonicalize`].
///
/// `serde_json::Value` is tree-shaped and cannot structurally contain a
/// reference cycle, but spec.md requires cyclic/self-referential payloads to
/// be rejected with `canon.cycle`. A bounded recursion depth is the
/// practical stand-in: any payload nested deeper than this is treated the
/// same as a cycle would be, since no legitimate translated payload nests
/// this deep.
pub const MAX_DEPTH: usize = 512;

/// Canonicalize `value` under the named algorithm.
///
/// # Errors
///
/// Returns [`ErrorCode::CanonUnsupportedAlg`] for any `alg` other than
/// [`DEFAULT_CANON_ALG`] (CBOR support is reserved, not implemented), and
/// [`ErrorCode::CanonCycle`] if `value` nests deeper than [`MAX_DEPTH`].
pub fn canonicalize(value: &Value, alg: &str) -> Result<Vec<u8>, OdinError> {
    if alg != DEFAULT_CANON_ALG {
        return Err(OdinError::new(
            ErrorCode::CanonUnsupportedAlg,
            format!("unsupported canonicalization algorithm '{alg}'"),
        )
        .with_context("alg", alg));
    }
    let mut out = Vec::new();
    write_canonical(value, 0, &mut out)?;
    Ok(out)
}

/// Canonicalize `value` under [`DEFAULT_CANON_ALG`].
pub fn canonicalize_default(value: &Value) -> Result<Vec<u8>, OdinError> {
    canonicalize(value, DEFAULT_CANON_ALG)
}

fn write_canonical(value: &Value, depth: usize, out: &mut Vec<u8>) -> Result<(), OdinError> {
    if depth > MAX_DEPTH {
        return Err(OdinError::new(
            ErrorCode::CanonCycle,
            "payload nesting exceeds the maximum canonicalization depth",
        )
        .with_context("max_depth", MAX_DEPTH));
    }
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => write_canonical_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, depth + 1, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            out.push(b'{');
            let mut keys: Vec<String> = map.keys().map(|k| k.nfc().collect::<String>()).collect();
            keys.sort();
            keys.dedup();
            for (i, key) in keys.iter().enumerate() {
                // serde_json::Map lookups are by original (non-normalized) key;
                // find the first entry whose NFC form matches.
                let (_orig, v) = map
                    .iter()
                    .find(|(k, _)| k.nfc().collect::<String>() == *key)
                    .expect("key was derived from this map's own keys");
                if i > 0 {
                    out.push(b',');
                }
                write_canonical_string(key, out);
                out.push(b':');
                write_canonical(v, depth + 1, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_canonical_string(s: &str, out: &mut Vec<u8>) {
    let normalized: String = s.nfc().collect();
    out.push(b'"');
    for ch in normalized.chars() {
        match ch {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\r' => out.extend_from_slice(b"\\r"),
            '\t' => out.extend_from_slice(b"\\t"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

// ---------------------------------------------------------------------------
// Content addressing
// ---------------------------------------------------------------------------

/// BLAKE3-256 digest of `bytes` as raw 32 bytes.
#[must_use]
pub fn blake3_digest(bytes: &[u8]) -> [u8; 32] {
    *blake3::hash(bytes).as_bytes()
}

/// SHA-256 digest of `bytes` as raw 32 bytes.
#[must_use]
pub fn sha256_digest(bytes: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Base64url, no padding, encoding of arbitrary bytes.
#[must_use]
pub fn b64u_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Base64url decode, tolerant of missing padding.
///
/// # Errors
///
/// Returns an error if `s` is not valid base64url.
pub fn b64u_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(s.trim())
}

/// SHA-256 of `bytes`, base64url-nopad encoded — the digest form used
/// throughout `TransformSubject`.
#[must_use]
pub fn sha256_b64u(bytes: &[u8]) -> String {
    b64u_encode(&sha256_digest(bytes))
}

/// BLAKE3-256 of `bytes`, base64url-nopad encoded.
#[must_use]
pub fn blake3_b64u(bytes: &[u8]) -> String {
    b64u_encode(&blake3_digest(bytes))
}

/// Lowercase, unpadded base32 content identifier for canonical `bytes`,
/// prefixed with `b` (multibase-like), per spec.md §3: `BLAKE3-256` of the
/// canonical bytes.
#[must_use]
pub fn cid(bytes: &[u8]) -> String {
    let digest = blake3_digest(bytes);
    let mut encoded = data_encoding::BASE32_NOPAD.encode(&digest).to_lowercase();
    encoded.insert(0, 'b');
    encoded
}

/// Convenience: canonicalize `value` under [`DEFAULT_CANON_ALG`] and compute
/// its [`cid`] in one step.
///
/// # Errors
///
/// Propagates [`canonicalize`]'s errors.
pub fn cid_of(value: &Value) -> Result<String, OdinError> {
    let bytes = canonicalize_default(value)?;
    Ok(cid(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unsupported_alg_errors() {
        let err = canonicalize(&json!({}), "xml").unwrap_err();
        assert_eq!(err.code, ErrorCode::CanonUnsupportedAlg);
    }

    #[test]
    fn key_order_is_irrelevant() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(
            canonicalize_default(&a).unwrap(),
            canonicalize_default(&b).unwrap()
        );
    }

    #[test]
    fn no_whitespace_emitted() {
        let bytes = canonicalize_default(&json!({"a": 1, "b": [1, 2]})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"a":1,"b":[1,2]}"#);
    }

    #[test]
    fn nfc_normalizes_strings_and_keys() {
        // "é" as combining sequence (e + U+0301) vs precomposed (U+00E9).
        let decomposed = json!({"cafe\u{0301}": "cafe\u{0301}"});
        let precomposed = json!({"café": "café"});
        assert_eq!(
            canonicalize_default(&decomposed).unwrap(),
            canonicalize_default(&precomposed).unwrap()
        );
    }

    #[test]
    fn numbers_round_trip_shortest_decimal() {
        let bytes = canonicalize_default(&json!({"amount": 1.5, "ts": 1700000000})).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("1.5"));
        assert!(text.contains("1700000000"));
    }

    #[test]
    fn cid_is_deterministic_and_prefixed() {
        let bytes = canonicalize_default(&json!({"intent": "echo"})).unwrap();
        let id1 = cid(&bytes);
        let id2 = cid(&bytes);
        assert_eq!(id1, id2);
        assert!(id1.starts_with('b'));
        assert!(id1.chars().skip(1).all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn cid_changes_with_content() {
        let a = cid_of(&json!({"intent": "echo"})).unwrap();
        let b = cid_of(&json!({"intent": "query"})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn deep_nesting_rejected_as_cycle() {
        let mut value = json!(1);
        for _ in 0..(MAX_DEPTH + 10) {
            value = json!([value]);
        }
        let err = canonicalize_default(&value).unwrap_err();
        assert_eq!(err.code, ErrorCode::CanonCycle);
    }

    #[test]
    fn b64u_round_trips() {
        let raw = b"hello world, this is odin";
        let encoded = b64u_encode(raw);
        assert!(!encoded.contains('='));
        let decoded = b64u_decode(&encoded).unwrap();
        assert_eq!(decoded, raw);
    }

    #[test]
    fn sha256_b64u_matches_known_vector() {
        // sha256("") base64url-nopad
        let digest = sha256_b64u(b"");
        assert_eq!(digest, "47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU");
    }

    #[test]
    fn property_shuffled_keys_canonicalize_identically() {
        use std::collections::BTreeMap;
        let mut a = serde_json::Map::new();
        a.insert("z".into(), json!(1));
        a.insert("a".into(), json!(2));
        a.insert("m".into(), json!(3));
        let shuffled: BTreeMap<_, _> = a.clone().into_iter().collect();
        let b: serde_json::Map<String, Value> = shuffled.into_iter().collect();
        assert_eq!(
            canonicalize_default(&Value::Object(a)).unwrap(),
            canonicalize_default(&Value::Object(b)).unwrap()
        );
    }
}
