//! Discovery document and JWKS publication, and `X-ODIN-Accept-Proof`
//! negotiation constants.
//!
//! Grounded on `original_source/apps/gateway/discovery.py` (the discovery
//! document, simplified from its many optional admin/mesh fields down to
//! the `{protocol, jwks_url, endpoints, capabilities, policy}` shape spec.md
//! §6 actually specifies) and `original_source/libs/odin_core/odin/
//! constants.py` (the `X-ODIN-Accept-Proof`/`X-ODIN-Proof-Version` header
//! names and the `"1"` protocol version value).

use odin_keystore::{JwkSet, WELL_KNOWN_JWKS_PATH};
use serde::Serialize;
use serde_json::Value;

/// Protocol version advertised via `X-ODIN-Proof-Version` and the discovery
/// document's `protocol` field.
pub const ODIN_PROOF_VERSION_VALUE: &str = "1";

/// Header a client sends to negotiate response proofs.
pub const ACCEPT_PROOF_HEADER: &str = "x-odin-accept-proof";

/// Header the server emits naming the resolved proof negotiation outcome.
pub const PROOF_STATUS_HEADER: &str = "x-odin-proof-status";

/// The well-known discovery document shape: protocol version, JWKS
/// location, routed endpoints, capability flags, and a summary of the
/// active signing/enforcement policy.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryDocument {
    /// Protocol identifier and version, e.g. `{"odin": "0.1", "proof_version": "1"}`.
    pub protocol: Value,
    /// Absolute or base-relative URL serving the active JWKS.
    pub jwks_url: String,
    /// Named route paths this gateway exposes.
    pub endpoints: Value,
    /// Capability flags (which optional features are enabled).
    pub capabilities: Value,
    /// Summary of enforcement/signing configuration.
    pub policy: Value,
}

/// Build the discovery document from the active configuration.
///
/// `base_url` is the request's own scheme+host, used to make `jwks_url`
/// absolute; when `None` a base-relative path is used instead.
#[must_use]
pub fn build_discovery_document(config: &odin_config::OdinConfig, base_url: Option<&str>) -> DiscoveryDocument {
    let jwks_url = match base_url {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), WELL_KNOWN_JWKS_PATH),
        None => WELL_KNOWN_JWKS_PATH.to_string(),
    };

    DiscoveryDocument {
        protocol: serde_json::json!({
            "odin": "0.1",
            "proof_version": ODIN_PROOF_VERSION_VALUE,
        }),
        jwks_url,
        endpoints: serde_json::json!({
            "translate": "/v1/translate",
            "jwks": WELL_KNOWN_JWKS_PATH,
            "discovery": "/.well-known/odin/discovery.json",
            "receipts_transform_get": "/v1/receipts/transform/{out_cid}",
            "receipts_transform_list": "/v1/receipts/transform",
        }),
        capabilities: serde_json::json!({
            "translate": true,
            "transform_receipts": true,
            "dynamic_reload": config.dynamic_enable,
        }),
        policy: serde_json::json!({
            "enforce_routes": config.enforce_routes,
            "sign_routes": config.sign_routes,
            "sign_require": config.sign_require,
            "sign_embed": config.sign_embed,
        }),
    }
}

/// Build the JWKS document this gateway publishes.
#[must_use]
pub fn build_jwks_document(keystore: &odin_keystore::Keystore) -> JwkSet {
    keystore.to_jwks()
}
