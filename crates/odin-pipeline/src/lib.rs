// SPDX-License-Identifier: MIT OR Apache-2.0
//! The ODIN gateway's HTTP surface: request lifecycle orchestration,
//! discovery, JWKS publication, and transform receipt retrieval.
//!
//! Grounded on `abp-daemon`'s `AppState`/`build_app`/`ApiError` shape (read
//! in full) for the Axum wiring pattern, generalized from one backend-run
//! endpoint to the `/v1/translate` lifecycle spec.md §4.12 describes, plus
//! the discovery/JWKS/receipt-fetch surface spec.md §6 specifies. Every
//! other module in this crate is reusable outside HTTP entirely
//! (`orchestrator::handle_translate` takes plain bytes and headers, not an
//! Axum request) — this module is the only place that touches `axum`
//! directly, per the Locality rule in `odin-error`.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod discovery;
pub mod error_response;
pub mod orchestrator;
pub mod quota;
pub mod response_signer;
pub mod state;
pub mod stubs;

use std::sync::Arc;

use axum::extract::{Path as AxPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use odin_error::{ErrorCode, OdinError};
use odin_storage::LedgerQuery;
use serde::Deserialize;
use serde_json::Value;

pub use discovery::{ACCEPT_PROOF_HEADER, ODIN_PROOF_VERSION_VALUE, PROOF_STATUS_HEADER};
pub use error_response::ApiError;
pub use orchestrator::{handle_translate, TranslateOutcome, TranslateRequest};
pub use quota::QuotaTracker;
pub use response_signer::{sign_response, ProofPreference, ProofStatus, SignOutcome};
pub use state::{path_matches_any, PipelineState};
pub use stubs::{BillingReporter, NullBilling, NullTelemetry, TelemetryEmitter, TraceContext};

const TRANSLATE_ROUTE: &str = "/v1/translate";

/// Shared state handle every route handler closes over.
pub type SharedState = Arc<PipelineState>;

/// Build the gateway's Axum router: `/v1/translate`, the discovery
/// document, JWKS publication, and transform receipt fetch/list.
///
/// This is deliberately a thin surface, not an admin UI — per spec.md §1's
/// Non-goals, the admin HTTP surface and FastAPI-style routing glue are
/// external collaborators, not part of this core.
#[must_use]
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(TRANSLATE_ROUTE, post(post_translate))
        .route("/.well-known/odin/discovery.json", get(get_discovery))
        .route("/.well-known/odin/jwks.json", get(get_jwks))
        .route("/v1/receipts/transform", get(list_transform_receipts))
        .route(
            "/v1/receipts/transform/{out_cid}",
            get(get_transform_receipt),
        )
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

fn request_base_url(headers: &HeaderMap, state: &PipelineState) -> Option<String> {
    if let Some(base) = state.config.public_base_url.as_deref() {
        return Some(base.to_string());
    }
    let host = headers.get(axum::http::header::HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    Some(format!("{scheme}://{host}"))
}

async fn post_translate(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, ApiError> {
    let base_url = request_base_url(&headers, &state);
    let tenant = headers
        .get("x-odin-tenant")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let outcome = handle_translate(
        &state,
        TRANSLATE_ROUTE,
        &headers,
        &body,
        base_url.as_deref(),
        tenant.as_deref(),
    )
    .await?;

    let mut response = Json(outcome.body).into_response();
    for (name, value) in outcome.headers {
        if let Ok(header_value) = axum::http::HeaderValue::from_str(&value) {
            response.headers_mut().insert(
                axum::http::HeaderName::from_static(name),
                header_value,
            );
        }
    }
    Ok(response)
}

async fn get_discovery(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let base_url = request_base_url(&headers, &state);
    let doc = discovery::build_discovery_document(&state.config, base_url.as_deref());
    (
        [(axum::http::header::CACHE_CONTROL, "public, max-age=60")],
        Json(doc),
    )
}

async fn get_jwks(State(state): State<SharedState>) -> impl IntoResponse {
    let jwks = discovery::build_jwks_document(&state.keystore);
    (
        [(axum::http::header::CACHE_CONTROL, "public, max-age=60")],
        Json(jwks),
    )
}

#[derive(Debug, Deserialize)]
struct ReceiptListParams {
    limit: Option<usize>,
    map: Option<String>,
    cid_prefix: Option<String>,
    since_ns: Option<u128>,
}

async fn list_transform_receipts(
    State(state): State<SharedState>,
    Query(params): Query<ReceiptListParams>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let limit = params.limit.unwrap_or(50);
    // Over-fetch so post-filtering by kind still yields up to `limit`
    // transform-receipt events, per SPEC_FULL.md §6's
    // `max(limit*4, 200)` rule.
    let fetch_limit = (limit * 4).max(200);
    let query = LedgerQuery {
        map: params.map,
        cid_prefix: params.cid_prefix,
        since_ns: params.since_ns,
        limit: Some(fetch_limit),
    };
    let entries = state.ledger.query(query).await?;
    let out: Vec<Value> = entries
        .into_iter()
        .filter(|e| e.record.get("kind").and_then(Value::as_str) == Some("transform.receipt"))
        .take(limit)
        .map(|e| e.record)
        .collect();
    Ok(Json(out))
}

async fn get_transform_receipt(
    State(state): State<SharedState>,
    AxPath(out_cid): AxPath<String>,
) -> Result<Response, ApiError> {
    let key = odin_storage::key_transform_receipt(&out_cid);
    let bytes = state
        .storage
        .get(&key)
        .await?
        .ok_or_else(|| {
            OdinError::new(ErrorCode::TranslateMapNotFound, "no transform receipt for that output CID")
                .with_context("out_cid", out_cid.clone())
        })?;

    let etag = format!(
        "\"{}\"",
        data_encoding::HEXLOWER.encode(&odin_codec::sha256_digest(&bytes))
    );
    let mut response = (
        StatusCode::OK,
        [
            (axum::http::header::CONTENT_TYPE, "application/json".to_string()),
            (axum::http::header::ETAG, etag),
            (
                axum::http::header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        bytes,
    )
        .into_response();
    response.headers_mut().remove(axum::http::header::CONTENT_LENGTH);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use odin_config::OdinConfig;
    use odin_envelope::EnvelopeVerifier;
    use odin_keystore::Keystore;
    use odin_reload::DynamicReloader;
    use odin_storage::{MemoryLedger, MemoryStorage};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let mut keystore = Keystore::new();
        keystore.insert(odin_keystore::Keypair::generate("k1"));
        let reloader = DynamicReloader::new(Duration::from_secs(60));
        let storage: Arc<dyn odin_storage::Storage> = Arc::new(MemoryStorage::new());
        let ledger: Arc<dyn odin_storage::Ledger> = Arc::new(MemoryLedger::new());
        let verifier = EnvelopeVerifier::new(Duration::from_secs(5));
        Arc::new(PipelineState::new(
            OdinConfig::default(),
            keystore,
            reloader,
            storage,
            ledger,
            verifier,
        ))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn discovery_document_is_served_with_cache_control() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/.well-known/odin/discovery.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(axum::http::header::CACHE_CONTROL).unwrap(),
            "public, max-age=60"
        );
    }

    #[tokio::test]
    async fn jwks_document_is_served() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/.well-known/odin/jwks.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_transform_receipt_is_404() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/receipts/transform/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn translate_identity_map_round_trips_over_http() {
        let state = test_state();
        state
            .reloader
            .register_sft_map(
                "identity",
                Arc::new(odin_reload::StaticAssetSource::new(
                    serde_json::to_vec(&odin_translate::SftMap {
                        id: "identity".into(),
                        from_sft: "core@v0.1".into(),
                        to_sft: "core@v0.1".into(),
                        ..Default::default()
                    })
                    .unwrap(),
                )),
            )
            .await;

        let app = build_router(state);
        let body = serde_json::json!({
            "map_id": "identity",
            "input": {"intent": "echo", "user": "a"},
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/translate")
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("x-odin-transform-map")
            .is_some());
    }
}
