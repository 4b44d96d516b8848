//! No-op interfaces for collaborators the pipeline references but does not
//! implement: telemetry/SIEM dispatch and billing/metering. Both are
//! optional (`Option<Arc<dyn Trait>>`) so the core request lifecycle never
//! depends on either to function.

use async_trait::async_trait;
use odin_receipt::TransformReceipt;

/// Trace context passed to [`TelemetryEmitter::emit_receipt`].
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    /// Correlates a chain of hops across services, if the caller supplied one.
    pub trace_id: Option<String>,
    /// This hop's identifier within `trace_id`.
    pub hop_id: Option<String>,
}

/// Emits observability events for completed transforms. Grounded on the
/// `telemetry_bridge`/SIEM integration the gateway forwards receipts to;
/// out of scope here beyond the trait boundary, so the default
/// implementation is a silent no-op.
#[async_trait]
pub trait TelemetryEmitter: Send + Sync {
    /// Called once a transform receipt has been built and persisted.
    async fn emit_receipt(&self, ctx: &TraceContext, receipt: &TransformReceipt);
}

/// Reports billable usage for a completed transform. Grounded on the
/// metering/Stripe-usage-reporting collaborator; out of scope beyond the
/// trait boundary.
#[async_trait]
pub trait BillingReporter: Send + Sync {
    /// Called once per completed transform request, after the response has
    /// been signed.
    async fn report_usage(&self, tenant: Option<&str>, map_id: &str);
}

/// The default no-op [`TelemetryEmitter`].
pub struct NullTelemetry;

#[async_trait]
impl TelemetryEmitter for NullTelemetry {
    async fn emit_receipt(&self, _ctx: &TraceContext, _receipt: &TransformReceipt) {}
}

/// The default no-op [`BillingReporter`].
pub struct NullBilling;

#[async_trait]
impl BillingReporter for NullBilling {
    async fn report_usage(&self, _tenant: Option<&str>, _map_id: &str) {}
}
