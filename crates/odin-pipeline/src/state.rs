//! The pipeline's single `Runtime`-adjacent state bundle.
//!
//! Per spec.md §9's "global mutable state is a single `Runtime` value"
//! design note, every mutable or shared resource the orchestrator touches
//! hangs off one [`PipelineState`], held behind an `Arc` and passed by
//! reference to handlers — mirroring `abp-daemon::AppState`'s
//! `Arc<Runtime>` shape.

use std::sync::Arc;

use odin_config::OdinConfig;
use odin_envelope::EnvelopeVerifier;
use odin_error::{ErrorCode, OdinError};
use odin_keystore::Keystore;
use odin_policy::HELPolicyEngine;
use odin_reload::DynamicReloader;
use odin_storage::{Ledger, Storage};
use tokio::sync::RwLock;

use crate::quota::QuotaTracker;
use crate::stubs::{BillingReporter, NullBilling, NullTelemetry, TelemetryEmitter};

struct CompiledPolicy {
    source: Arc<odin_policy::HELPolicy>,
    engine: Arc<HELPolicyEngine>,
}

/// Bundles every shared resource the request lifecycle needs: signing keys,
/// hot-reloadable policy/SFT assets, storage, the ledger, proof
/// verification, tenant quotas, and the optional telemetry/billing
/// collaborators.
pub struct PipelineState {
    /// The loaded, validated configuration this runtime was built from.
    pub config: OdinConfig,
    /// Signing keys and the JWKS they publish.
    pub keystore: Arc<Keystore>,
    /// Hot-reloadable HEL policy and named SFT maps.
    pub reloader: Arc<DynamicReloader>,
    /// Byte storage for OML blobs and receipts.
    pub storage: Arc<dyn Storage>,
    /// Append-only event ledger.
    pub ledger: Arc<dyn Ledger>,
    /// Verifies inbound proof envelopes.
    pub verifier: Arc<EnvelopeVerifier>,
    /// Per-tenant quota and rate limiting.
    pub quota: Arc<QuotaTracker>,
    /// Observability sink for completed transforms; `None` disables it.
    pub telemetry: Option<Arc<dyn TelemetryEmitter>>,
    /// Usage/billing sink for completed transforms; `None` disables it.
    pub billing: Option<Arc<dyn BillingReporter>>,
    compiled_policy: RwLock<Option<CompiledPolicy>>,
}

impl PipelineState {
    /// Build a runtime from its already-constructed resources. Telemetry
    /// and billing default to the no-op implementations.
    #[must_use]
    pub fn new(
        config: OdinConfig,
        keystore: Keystore,
        reloader: DynamicReloader,
        storage: Arc<dyn Storage>,
        ledger: Arc<dyn Ledger>,
        verifier: EnvelopeVerifier,
    ) -> Self {
        let quota = QuotaTracker::new(
            config.tenant_quota_monthly_requests,
            config.tenant_rate_limit_qps,
        )
        .shared();
        Self {
            config,
            keystore: Arc::new(keystore),
            reloader: Arc::new(reloader),
            storage,
            ledger,
            verifier: Arc::new(verifier),
            quota,
            telemetry: Some(Arc::new(NullTelemetry)),
            billing: Some(Arc::new(NullBilling)),
            compiled_policy: RwLock::new(None),
        }
    }

    /// Replace the telemetry sink.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Option<Arc<dyn TelemetryEmitter>>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Replace the billing sink.
    #[must_use]
    pub fn with_billing(mut self, billing: Option<Arc<dyn BillingReporter>>) -> Self {
        self.billing = billing;
        self
    }

    /// The active signing keypair, or an error if the keystore is empty.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::SignStreamError`] if no keypair is loaded.
    pub fn signing_keypair(&self) -> Result<&odin_keystore::Keypair, OdinError> {
        self.keystore
            .signing_keypair()
            .ok_or_else(|| OdinError::new(ErrorCode::SignStreamError, "no signing keypair loaded"))
    }

    /// The current compiled [`HELPolicyEngine`], recompiling from the
    /// reloader's policy document only when it has changed since the last
    /// call (compared by `Arc` identity, not content equality, since
    /// `DynamicReloader::policy` only produces a new `Arc` on an actual
    /// reload).
    ///
    /// # Errors
    ///
    /// Propagates reload failures from `DynamicReloader::policy`, and
    /// returns [`ErrorCode::ConfigInvalid`] if the policy document fails to
    /// compile (e.g. an unparseable glob pattern).
    pub async fn policy_engine(&self, force_reload: bool) -> Result<Arc<HELPolicyEngine>, OdinError> {
        let doc = self.reloader.policy(force_reload).await?;

        {
            let cached = self.compiled_policy.read().await;
            if let Some(compiled) = cached.as_ref() {
                if Arc::ptr_eq(&compiled.source, &doc) {
                    return Ok(compiled.engine.clone());
                }
            }
        }

        let engine = Arc::new(HELPolicyEngine::new((*doc).clone()).map_err(|e| {
            OdinError::new(ErrorCode::ConfigInvalid, "HEL policy document failed to compile")
                .with_context("detail", e.to_string())
        })?);

        let mut cached = self.compiled_policy.write().await;
        *cached = Some(CompiledPolicy {
            source: doc,
            engine: engine.clone(),
        });
        Ok(engine)
    }
}

/// `true` if `path` starts with any of `prefixes`. Empty `prefixes` never
/// matches, mirroring `ODIN_ENFORCE_ROUTES`/`ODIN_SIGN_ROUTES` defaulting to
/// "enforce nothing" when unset.
#[must_use]
pub fn path_matches_any(prefixes: &[String], path: &str) -> bool {
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}
