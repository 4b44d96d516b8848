// SPDX-License-Identifier: MIT OR Apache-2.0
//! ODIN Proof of Execution: Ed25519 signatures bound to a content identifier.
//!
//! Grounded on `original_source/libs/odin_core/odin/transform.py`'s
//! `sign_over_content` call shape (`sign_over_content(kp, bytes, oml_cid)`)
//! and `apps/gateway/envelope.py`'s usage of the resulting record. The
//! signature covers `content_bytes` directly — no prehashing — exactly as
//! spec.md §4.3 requires.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use odin_codec::{b64u_decode, b64u_encode, cid};
use odin_error::{ErrorCode, OdinError};
use odin_keystore::{JwkSet, Keypair};
use serde::{Deserialize, Serialize};

/// An ODIN Proof of Execution record: `{kid, oml_cid, sig_b64u}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ope {
    /// The key id that produced `sig_b64u`.
    pub kid: String,
    /// Content identifier of the signed bytes.
    pub oml_cid: String,
    /// Base64url-nopad encoded 64-byte Ed25519 signature.
    pub sig_b64u: String,
}

/// The outcome of a successful [`verify`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// The content identifier that was verified.
    pub cid: String,
    /// The key id that signed it.
    pub kid: String,
}

/// Sign `content_bytes` with `keypair`, binding the signature to `oml_cid`.
///
/// Per spec.md §4.3, Ed25519 signs `content_bytes` directly; no prehash
/// variant is used.
#[must_use]
pub fn sign(keypair: &Keypair, content_bytes: &[u8], oml_cid: &str) -> Ope {
    use ed25519_dalek::Signer;
    let sig = keypair.signing_key().sign(content_bytes);
    Ope {
        kid: keypair.kid.clone(),
        oml_cid: oml_cid.to_string(),
        sig_b64u: b64u_encode(&sig.to_bytes()),
    }
}

/// Convenience: sign `content_bytes`, computing `oml_cid` from the bytes
/// themselves via [`odin_codec::cid`].
#[must_use]
pub fn sign_over_content(keypair: &Keypair, content_bytes: &[u8]) -> Ope {
    sign(keypair, content_bytes, &cid(content_bytes))
}

/// Verify `ope` against `content_bytes`, resolving the signing key from
/// `jwks`.
///
/// # Errors
///
/// Returns [`ErrorCode::ProofInvalid`] with a `reason` context of
/// `cid_mismatch`, `kid_not_found`, or `sig_invalid` matching spec.md §4.3.
pub fn verify(ope: &Ope, content_bytes: &[u8], jwks: &JwkSet) -> Result<Verified, OdinError> {
    let computed = cid(content_bytes);
    if computed != ope.oml_cid {
        return Err(OdinError::new(ErrorCode::ProofInvalid, "content ID mismatch")
            .with_context("reason", "cid_mismatch")
            .with_context("expected", &ope.oml_cid)
            .with_context("computed", &computed));
    }

    let jwk = jwks
        .by_kid()
        .get(&ope.kid)
        .copied()
        .cloned()
        .ok_or_else(|| {
            OdinError::new(ErrorCode::ProofInvalid, "signing key id not found in JWKS")
                .with_context("reason", "kid_not_found")
                .with_context("kid", &ope.kid)
        })?;

    let raw_pub = jwk.public_key_bytes()?;
    let verifying_key = VerifyingKey::from_bytes(&raw_pub).map_err(|e| {
        OdinError::new(ErrorCode::ProofInvalid, "JWK public key is not a valid Ed25519 point")
            .with_context("reason", "sig_invalid")
            .with_context("detail", e.to_string())
    })?;

    let sig_bytes = b64u_decode(&ope.sig_b64u).map_err(|e| {
        OdinError::new(ErrorCode::ProofInvalid, "OPE signature is not valid base64url")
            .with_context("reason", "sig_invalid")
            .with_context("detail", e.to_string())
    })?;
    let sig_array: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| {
        OdinError::new(ErrorCode::ProofInvalid, "OPE signature must be 64 bytes")
            .with_context("reason", "sig_invalid")
            .with_context("len", sig_bytes.len())
    })?;
    let signature = Signature::from_bytes(&sig_array);

    verifying_key
        .verify(content_bytes, &signature)
        .map_err(|e| {
            OdinError::new(ErrorCode::ProofInvalid, "OPE signature verification failed")
                .with_context("reason", "sig_invalid")
                .with_context("detail", e.to_string())
        })?;

    Ok(Verified {
        cid: computed,
        kid: ope.kid.clone(),
    })
}
