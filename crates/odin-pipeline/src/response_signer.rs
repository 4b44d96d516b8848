//! Per-response proof negotiation and signing, per the route-enforced /
//! client-preference decision table.
//!
//! Grounded on `original_source/apps/gateway/middleware/response_signing.py`'s
//! `ResponseSigningMiddleware.dispatch`: route enforcement and client
//! `X-ODIN-Accept-Proof` negotiation are folded into a single decision
//! (`enforced || preference != None`) rather than the original's two
//! separately-tracked booleans, since every row of spec.md's decision table
//! falls out of that one predicate plus whether the body is JSON.

use odin_codec::{b64u_encode, canonicalize_default};
use odin_error::{ErrorCode, OdinError};
use odin_keystore::Keypair;
use odin_ope::sign_over_content;
use serde_json::Value;

/// Client's `X-ODIN-Accept-Proof` preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofPreference {
    /// Caller requires a proof; absence of one is an error.
    Required,
    /// Caller wants a proof if cheaply available, otherwise accepts none.
    IfAvailable,
    /// Caller does not want proofs applied on their behalf.
    None,
}

impl ProofPreference {
    /// Parse the raw header value, case-insensitively. Absent or
    /// unrecognized values are treated as [`ProofPreference::None`].
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            Some("required") => ProofPreference::Required,
            Some("if-available") => ProofPreference::IfAvailable,
            _ => ProofPreference::None,
        }
    }
}

/// The `X-ODIN-Proof-Status` response value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofStatus {
    /// The response was signed.
    Signed,
    /// No proof was attached.
    Absent,
    /// The route enforces signing, so the client's `none` preference was
    /// overridden.
    Ignored,
}

impl ProofStatus {
    /// The wire value for the `X-ODIN-Proof-Status` header.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProofStatus::Signed => "signed",
            ProofStatus::Absent => "absent",
            ProofStatus::Ignored => "ignored",
        }
    }
}

/// A response header name/value pair to attach to the outgoing HTTP
/// response. Kept as plain strings so this module stays free of any HTTP
/// framework dependency.
pub type ProofHeader = (&'static str, String);

/// The result of applying [`sign_response`]: the (possibly re-wrapped) body,
/// the proof status, and the headers to attach.
pub struct SignOutcome {
    /// The response body to send, possibly re-wrapped as `{payload, proof}`.
    pub body: Value,
    /// The negotiated proof status.
    pub status: ProofStatus,
    /// Proof headers to attach to the response, always including
    /// `X-ODIN-Proof-Status`.
    pub headers: Vec<ProofHeader>,
}

fn passthrough(body: Value) -> SignOutcome {
    SignOutcome {
        body,
        status: ProofStatus::Absent,
        headers: vec![("x-odin-proof-status", ProofStatus::Absent.as_str().to_string())],
    }
}

/// Mirror an already-enveloped response's proof fields into headers without
/// re-signing, per spec.md §4.9's "body is already an envelope" clause.
fn mirror_existing_envelope(body: &Value) -> Option<SignOutcome> {
    let obj = body.as_object()?;
    if !(obj.contains_key("payload") && obj.contains_key("proof")) {
        return None;
    }
    let proof = obj.get("proof")?.as_object()?;
    let mut headers = vec![("x-odin-proof-status", ProofStatus::Signed.as_str().to_string())];
    if let Some(cid) = proof.get("oml_cid").and_then(Value::as_str) {
        headers.push(("x-odin-oml-cid", cid.to_string()));
    }
    if let Some(ope) = proof.get("ope").and_then(Value::as_str) {
        headers.push(("x-odin-ope", ope.to_string()));
    }
    if let Some(kid) = proof.get("kid").and_then(Value::as_str) {
        headers.push(("x-odin-ope-kid", kid.to_string()));
    }
    if let Some(jwks) = proof.get("jwks_url").and_then(Value::as_str) {
        headers.push(("x-odin-jwks", jwks.to_string()));
    }
    Some(SignOutcome {
        body: body.clone(),
        status: ProofStatus::Signed,
        headers,
    })
}

/// Apply spec.md §4.9's decision table to a JSON response body.
///
/// `enforced` is whether the route is in the server's `sign_routes`
/// configuration. `body` is `None` when the response is not a JSON payload
/// (e.g. an empty body, or a non-2xx error the orchestrator never routes
/// here in practice).
///
/// # Errors
///
/// Returns [`ErrorCode::ProofRequired`] when the client demanded a proof
/// (`required`) but the response is not JSON and so cannot be signed. The
/// caller is responsible for mapping this to HTTP 406 and still emitting
/// `X-ODIN-Proof-Status: absent`, per the Locality rule.
pub fn sign_response(
    enforced: bool,
    preference: ProofPreference,
    body: Option<&Value>,
    keypair: &Keypair,
    jwks_url: Option<&str>,
    sft_id: Option<&str>,
    embed: bool,
) -> Result<SignOutcome, OdinError> {
    let acts = enforced || preference != ProofPreference::None;

    let Some(body) = body else {
        if !acts {
            return Ok(passthrough(Value::Null));
        }
        return match preference {
            ProofPreference::Required => Err(OdinError::new(
                ErrorCode::ProofRequired,
                "server could not provide required proof for a non-JSON response",
            )),
            _ => Ok(passthrough(Value::Null)),
        };
    };

    if !acts {
        return Ok(passthrough(body.clone()));
    }

    if let Some(mirrored) = mirror_existing_envelope(body) {
        return Ok(mirrored);
    }

    let canonical = canonicalize_default(body)?;
    let ope = sign_over_content(keypair, &canonical);
    let ope_json = serde_json::to_vec(&ope).map_err(|e| {
        OdinError::new(ErrorCode::SignStreamError, "signed OPE record failed to serialize")
            .with_context("detail", e.to_string())
    })?;
    let ope_b64u = b64u_encode(&ope_json);
    let jwks_url = jwks_url.unwrap_or(odin_keystore::WELL_KNOWN_JWKS_PATH).to_string();

    let status = if enforced && preference == ProofPreference::None {
        ProofStatus::Ignored
    } else {
        ProofStatus::Signed
    };

    let mut headers = vec![
        ("x-odin-proof-status", status.as_str().to_string()),
        ("x-odin-oml-cid", ope.oml_cid.clone()),
        ("x-odin-ope", ope_b64u.clone()),
        ("x-odin-ope-kid", ope.kid.clone()),
        ("x-odin-jwks", jwks_url.clone()),
    ];

    let out_body = if embed {
        let mut proof = serde_json::json!({
            "oml_cid": ope.oml_cid,
            "kid": ope.kid,
            "ope": ope_b64u,
            "jwks_url": jwks_url,
        });
        if let Some(sft_id) = sft_id {
            proof["sft_id"] = Value::String(sft_id.to_string());
        }
        serde_json::json!({ "payload": body, "proof": proof })
    } else {
        headers.push(("x-odin-oml-c-path", odin_storage::key_oml(&ope.oml_cid)));
        body.clone()
    };

    Ok(SignOutcome {
        body: out_body,
        status,
        headers,
    })
}
