//! The `/v1/translate` request lifecycle.
//!
//! Grounded on `original_source/apps/gateway/bridge.py`'s general
//! request-routing shape (bounded body read, envelope unwrap, dispatch,
//! response interception) and spec.md §4.12's five-step lifecycle: read a
//! bounded body, extract a proof envelope if present, enforce verification
//! and HEL policy on enforced routes, dispatch to the translation engine,
//! then hand the result to [`crate::response_signer`].
//!
//! spec.md never defines an explicit `/v1/translate` wire schema beyond
//! `TranslationEngine`'s pure `(payload, map)` function signature, so this
//! module settles the open question: the request body is either a bare
//! [`TranslateRequest`] (`{"map_id", "input"}`), or, on an enforced route,
//! that same object wrapped as a [`odin_envelope::ProofEnvelope`]'s
//! `payload` (`{"payload": {"map_id", "input"}, "proof": {...}}`). Recorded
//! in `DESIGN.md`.

use axum::http::HeaderMap;
use odin_error::{ErrorCode, OdinError, Violation};
use odin_envelope::ProofEnvelope;
use odin_receipt::{build_transform_subject, persist_transform_receipt, sign_transform_receipt, MapSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discovery::ACCEPT_PROOF_HEADER;
use crate::response_signer::{sign_response, ProofPreference};
use crate::state::{path_matches_any, PipelineState};
use crate::stubs::TraceContext;

/// The body of a `/v1/translate` request, before or after envelope
/// unwrapping.
#[derive(Debug, Clone, Deserialize)]
pub struct TranslateRequest {
    /// Id of the registered [`odin_translate::SftMap`] to apply.
    pub map_id: String,
    /// The payload to translate.
    pub input: Value,
}

/// The result of a completed `/v1/translate` call: the response body
/// (possibly re-wrapped in a proof envelope) and the headers to attach.
#[derive(Debug, Clone, Serialize)]
pub struct TranslateOutcome {
    /// Response JSON body.
    pub body: Value,
    /// Headers to attach to the response: proof negotiation headers from
    /// [`sign_response`], plus `x-odin-transform-receipt` (and
    /// `x-odin-transform-receipt-url`, when the storage backend can serve
    /// one directly).
    #[serde(skip)]
    pub headers: Vec<(&'static str, String)>,
}

fn to_odin_violations(violations: Vec<odin_policy::Violation>) -> Vec<Violation> {
    violations
        .into_iter()
        .map(|v| Violation::new(v.code, v.message).at(v.path))
        .collect()
}

/// Extract the hostname (no scheme, no port, no path) from a URL, for HEL
/// host-allowlist checks. Deliberately minimal: this crate has no general
/// URL-parsing need elsewhere, so it doesn't pull in a dedicated crate for
/// it.
fn url_host(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host_port = without_scheme.split(['/', '?', '#']).next()?;
    let host = host_port.rsplit_once('@').map_or(host_port, |(_, rest)| rest);
    let host = host.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Run the full `/v1/translate` lifecycle: admission, envelope
/// verification, HEL policy enforcement, translation, receipt issuance,
/// ledger append, and response proof negotiation.
///
/// # Errors
///
/// Returns an [`OdinError`] at whichever stage rejects the request; the
/// caller maps it to an HTTP response via [`crate::error_response::ApiError`].
pub async fn handle_translate(
    state: &PipelineState,
    route: &str,
    headers: &HeaderMap,
    raw_body: &[u8],
    base_url: Option<&str>,
    tenant: Option<&str>,
) -> Result<TranslateOutcome, OdinError> {
    if raw_body.len() as u64 > state.config.max_body_bytes {
        return Err(OdinError::new(
            ErrorCode::RequestTooLarge,
            "request body exceeds the configured maximum",
        )
        .with_context("max_body_bytes", state.config.max_body_bytes.to_string()));
    }

    state.quota.admit(tenant).await?;

    let body_value: Value = serde_json::from_slice(raw_body).map_err(|e| {
        OdinError::new(ErrorCode::RequestInvalidJson, "request body is not valid JSON")
            .with_context("detail", e.to_string())
    })?;

    let enforced_in = path_matches_any(&state.config.enforce_routes, route);

    let (request_value, verified_kid) = if ProofEnvelope::is_wrapped(&body_value) {
        let obj = body_value.as_object().expect("checked by is_wrapped");
        let inner = obj.get("payload").cloned().unwrap_or(Value::Null);
        let envelope: ProofEnvelope = serde_json::from_value(obj.get("proof").cloned().unwrap_or(Value::Null))
            .map_err(|e| {
                OdinError::new(ErrorCode::ProofInvalid, "envelope 'proof' field is malformed")
                    .with_context("detail", e.to_string())
            })?;

        if enforced_in {
            let engine = state.policy_engine(false).await?;

            if let Some(jwks_url) = envelope.jwks_url.as_deref() {
                if envelope.jwks_inline.is_none() {
                    let host = url_host(jwks_url).ok_or_else(|| {
                        OdinError::new(ErrorCode::ProofInvalid, "envelope 'jwks_url' is not a valid URL")
                    })?;
                    if !engine.host_allowed(&host) {
                        return Err(OdinError::new(
                            ErrorCode::PolicyJwksHostForbidden,
                            "envelope jwks_url host is not allowed by policy",
                        )
                        .with_context("host", host));
                    }
                }
            }

            let canonical = odin_codec::canonicalize_default(&inner)?;
            let verified = state.verifier.verify(&envelope, Some(&canonical), base_url).await?;

            if !engine.kid_allowed(&verified.kid) {
                return Err(OdinError::new(
                    ErrorCode::PolicyBlocked,
                    "signing key is not allowed by policy",
                )
                .with_context("kid", verified.kid.clone()));
            }

            (inner, Some(verified.kid))
        } else {
            (inner, None)
        }
    } else {
        if enforced_in {
            return Err(OdinError::new(
                ErrorCode::ProofMissing,
                "route requires a proof envelope",
            ));
        }
        (body_value, None)
    };
    let _ = verified_kid;

    let translate_request: TranslateRequest = serde_json::from_value(request_value).map_err(|e| {
        OdinError::new(
            ErrorCode::RequestInvalidJson,
            "translate request body must be {map_id, input}",
        )
        .with_context("detail", e.to_string())
    })?;

    let map = state.reloader.sft_map(&translate_request.map_id, false).await?;
    let registry = state.reloader.sft_registry().await;
    let (translated, _translation_receipt) =
        odin_translate::translate(&translate_request.input, &map, &registry)?;

    if enforced_in {
        let engine = state.policy_engine(false).await?;
        let result = engine.evaluate(&translated);
        if !result.allowed {
            return Err(OdinError::new(ErrorCode::PolicyBlocked, "translated payload violates HEL policy")
                .with_violations(to_odin_violations(result.violations)));
        }
    }

    let keypair = state.signing_keypair()?;
    let jwks_url = state
        .config
        .public_base_url
        .as_deref()
        .map(|base| format!("{}{}", base.trim_end_matches('/'), odin_keystore::WELL_KNOWN_JWKS_PATH))
        .unwrap_or_else(|| odin_keystore::WELL_KNOWN_JWKS_PATH.to_string());

    let map_value = serde_json::to_value(&*map).map_err(|e| {
        OdinError::new(ErrorCode::TranslateInputInvalid, "map failed to serialize for receipting")
            .with_context("detail", e.to_string())
    })?;
    let subject = build_transform_subject(
        &translate_request.input,
        &translated,
        &map.from_sft,
        &map.to_sft,
        MapSource::Value(&map_value),
        &translate_request.map_id,
        None,
    )?;
    let output_sha256_b64u = subject.output_sha256_b64u.clone();
    let receipt = sign_transform_receipt(subject, keypair, Some(jwks_url.clone()), None, false)?;
    let receipt_key = persist_transform_receipt(state.storage.as_ref(), &receipt, false).await?;

    state
        .ledger
        .append(serde_json::json!({
            "kind": "transform.receipt",
            "cid": output_sha256_b64u,
            "map": translate_request.map_id,
            "receipt_key": receipt_key,
        }))
        .await?;

    if let Some(telemetry) = &state.telemetry {
        telemetry.emit_receipt(&TraceContext::default(), &receipt).await;
    }
    if let Some(billing) = &state.billing {
        billing.report_usage(tenant, &translate_request.map_id).await;
    }

    let preference = ProofPreference::parse(
        headers
            .get(ACCEPT_PROOF_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    let enforced_out = path_matches_any(&state.config.sign_routes, route) || state.config.http_sign_require;

    let outcome = sign_response(
        enforced_out,
        preference,
        Some(&translated),
        keypair,
        Some(&jwks_url),
        Some(map.to_sft.as_str()),
        state.config.sign_embed,
    )?;

    let mut response_headers = outcome.headers;
    response_headers.push(("x-odin-transform-map", translate_request.map_id.clone()));
    if let Some(url) = state.storage.url_for(&receipt_key) {
        response_headers.push(("x-odin-transform-receipt-url", url));
    } else {
        response_headers.push(("x-odin-transform-receipt", receipt_key));
    }

    Ok(TranslateOutcome {
        body: outcome.body,
        headers: response_headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_host_strips_scheme_port_and_path() {
        assert_eq!(url_host("https://jwks.example.com:8443/keys").as_deref(), Some("jwks.example.com"));
        assert_eq!(url_host("http://example.com").as_deref(), Some("example.com"));
        assert_eq!(url_host("not a url").as_deref(), Some("not a url"));
    }
}
