// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pluggable byte storage and an append-only receipt ledger.
//!
//! Grounded on `original_source/libs/odin_core/odin/storage/__init__.py`
//! (`StorageBackend` protocol, `create_storage_from_env` factory,
//! `key_oml`/`key_receipt`/`key_transform_receipt` naming helpers) and
//! `apps/gateway/ledger.py` (`create_ledger_from_env`, the file-backend
//! `ledger.jsonl` append/index-by-line-count behavior). The original's
//! collection/document-id `StorageBackend` protocol is generalized here to
//! a flat key-value contract, matching spec.md §4.8's literal
//! `receipts/transform/<output_sha256_b64u>.json` storage keys.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod ledger;
mod storage;

pub use ledger::{FileLedger, Ledger, LedgerEntry, LedgerQuery, MemoryLedger};
pub use storage::{LocalFsStorage, MemoryStorage, Storage};

#[cfg(feature = "object_store")]
pub use storage::ObjectStoreStorage;

/// Storage key for an OML (canonicalized payload) blob.
#[must_use]
pub fn key_oml(trace_id: &str) -> String {
    format!("oml/{trace_id}")
}

/// Storage key for a per-hop receipt.
#[must_use]
pub fn key_receipt(trace_id: &str, hop_id: &str) -> String {
    format!("receipts/hop/{trace_id}/{hop_id}.json")
}

/// Storage key for a transform receipt, keyed by the output's SHA-256
/// (base64url, no padding) per spec.md §4.8 / `DESIGN.md`'s Open Question 1.
#[must_use]
pub fn key_transform_receipt(output_sha256_b64u: &str) -> String {
    format!("receipts/transform/{output_sha256_b64u}.json")
}
