//! Unified error taxonomy with stable error codes for the ODIN gateway.
//!
//! Every ODIN error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag matching the wire codes in the error response shape), a
//! human-readable message, a list of field-level [`Violation`]s, an optional
//! cause chain, and arbitrary key-value context. Use the builder returned by
//! [`OdinError::new`] to construct errors fluently. Per the orchestrator
//! locality rule, only the pipeline crate maps [`ErrorCode`] to an HTTP
//! status; every other component surfaces only its own codes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or oversized request bodies.
    Request,
    /// Proof envelope / OPE verification errors.
    Proof,
    /// HEL policy evaluation errors.
    Policy,
    /// SFT translation errors.
    Translate,
    /// SFT validator errors.
    Sft,
    /// Response signing errors.
    Sign,
    /// Storage backend errors.
    Storage,
    /// Ledger append/query errors.
    Ledger,
    /// Canonicalization errors.
    Canon,
    /// Configuration errors.
    Config,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Request => "request",
            Self::Proof => "proof",
            Self::Policy => "policy",
            Self::Translate => "translate",
            Self::Sft => "sft",
            Self::Sign => "sign",
            Self::Storage => "storage",
            Self::Ledger => "ledger",
            Self::Canon => "canon",
            Self::Config => "config",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to the exact dotted string used in the wire
/// error response shape (`{error: "<stable.code>", ...}`) and is guaranteed
/// not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request body is not valid JSON.
    #[serde(rename = "odin.request.invalid_json")]
    RequestInvalidJson,
    /// Request body exceeds the configured maximum size.
    #[serde(rename = "odin.request.too_large")]
    RequestTooLarge,

    /// Route requires a proof envelope but none was supplied.
    #[serde(rename = "odin.proof.missing")]
    ProofMissing,
    /// Proof envelope failed verification (CID mismatch, bad signature, ...).
    #[serde(rename = "odin.proof.invalid")]
    ProofInvalid,
    /// Client required a proof envelope the server could not provide.
    #[serde(rename = "odin.proof.required")]
    ProofRequired,

    /// HEL policy denied the request.
    #[serde(rename = "odin.policy.blocked")]
    PolicyBlocked,
    /// JWKS host is not in the policy's allow-list.
    #[serde(rename = "odin.policy.jwks_host_forbidden")]
    PolicyJwksHostForbidden,
    /// A tenant's monthly request cap or QPS rate limit has been exceeded.
    /// Rendered as plain text, not the JSON error shape — see
    /// `odin-pipeline::error_response`.
    #[serde(rename = "odin.policy.tenant_quota_exceeded")]
    TenantQuotaExceeded,

    /// Input payload failed `from_sft` validation.
    #[serde(rename = "odin.translate.input_invalid")]
    TranslateInputInvalid,
    /// Output payload failed `to_sft` validation.
    #[serde(rename = "odin.translate.output_invalid")]
    TranslateOutputInvalid,
    /// Named SftMap could not be found.
    #[serde(rename = "odin.translate.map_not_found")]
    TranslateMapNotFound,
    /// A mapped field violated an enum constraint.
    #[serde(rename = "odin.translate.enum_violation")]
    TranslateEnumViolation,
    /// A required output field was missing or null.
    #[serde(rename = "odin.translate.required_missing")]
    TranslateRequiredMissing,
    /// Computed key coverage fell below the configured gate.
    #[serde(rename = "odin.translate.insufficient_coverage")]
    TranslateInsufficientCoverage,

    /// SFT validator rejected the value.
    #[serde(rename = "odin.sft.invalid")]
    SftInvalid,

    /// Response signing failed mid-stream.
    #[serde(rename = "odin.sign.stream_error")]
    SignStreamError,

    /// Canonicalization algorithm is not recognized.
    #[serde(rename = "canon.unsupported_alg")]
    CanonUnsupportedAlg,
    /// Payload contains a reference cycle.
    #[serde(rename = "canon.cycle")]
    CanonCycle,

    /// Configuration value is invalid.
    #[serde(rename = "odin.config.invalid")]
    ConfigInvalid,
    /// Redaction path in configuration could not be parsed.
    #[serde(rename = "odin.config.invalid_redaction_path")]
    ConfigInvalidRedactionPath,

    /// Storage backend operation failed.
    #[serde(rename = "odin.storage.failed")]
    StorageFailed,
    /// Ledger append or query failed.
    #[serde(rename = "odin.ledger.failed")]
    LedgerFailed,

    /// Catch-all for unexpected internal errors.
    #[serde(rename = "odin.internal")]
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RequestInvalidJson | Self::RequestTooLarge => ErrorCategory::Request,
            Self::ProofMissing | Self::ProofInvalid | Self::ProofRequired => ErrorCategory::Proof,
            Self::PolicyBlocked | Self::PolicyJwksHostForbidden | Self::TenantQuotaExceeded => {
                ErrorCategory::Policy
            }
            Self::TranslateInputInvalid
            | Self::TranslateOutputInvalid
            | Self::TranslateMapNotFound
            | Self::TranslateEnumViolation
            | Self::TranslateRequiredMissing
            | Self::TranslateInsufficientCoverage => ErrorCategory::Translate,
            Self::SftInvalid => ErrorCategory::Sft,
            Self::SignStreamError => ErrorCategory::Sign,
            Self::CanonUnsupportedAlg | Self::CanonCycle => ErrorCategory::Canon,
            Self::ConfigInvalid | Self::ConfigInvalidRedactionPath => ErrorCategory::Config,
            Self::StorageFailed => ErrorCategory::Storage,
            Self::LedgerFailed => ErrorCategory::Ledger,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code, exactly as it
    /// appears on the wire (e.g. `"odin.proof.missing"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestInvalidJson => "odin.request.invalid_json",
            Self::RequestTooLarge => "odin.request.too_large",
            Self::ProofMissing => "odin.proof.missing",
            Self::ProofInvalid => "odin.proof.invalid",
            Self::ProofRequired => "odin.proof.required",
            Self::PolicyBlocked => "odin.policy.blocked",
            Self::PolicyJwksHostForbidden => "odin.policy.jwks_host_forbidden",
            Self::TenantQuotaExceeded => "odin.policy.tenant_quota_exceeded",
            Self::TranslateInputInvalid => "odin.translate.input_invalid",
            Self::TranslateOutputInvalid => "odin.translate.output_invalid",
            Self::TranslateMapNotFound => "odin.translate.map_not_found",
            Self::TranslateEnumViolation => "odin.translate.enum_violation",
            Self::TranslateRequiredMissing => "odin.translate.required_missing",
            Self::TranslateInsufficientCoverage => "odin.translate.insufficient_coverage",
            Self::SftInvalid => "odin.sft.invalid",
            Self::SignStreamError => "odin.sign.stream_error",
            Self::CanonUnsupportedAlg => "canon.unsupported_alg",
            Self::CanonCycle => "canon.cycle",
            Self::ConfigInvalid => "odin.config.invalid",
            Self::ConfigInvalidRedactionPath => "odin.config.invalid_redaction_path",
            Self::StorageFailed => "odin.storage.failed",
            Self::LedgerFailed => "odin.ledger.failed",
            Self::Internal => "odin.internal",
        }
    }

    /// The HTTP status this code maps to. Only the orchestrator is expected
    /// to call this — components surface codes, not statuses.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::RequestInvalidJson => 400,
            Self::RequestTooLarge => 413,
            Self::ProofMissing => 401,
            Self::ProofInvalid => 401,
            Self::ProofRequired => 406,
            Self::PolicyBlocked => 403,
            Self::PolicyJwksHostForbidden => 403,
            Self::TenantQuotaExceeded => 429,
            Self::TranslateInputInvalid
            | Self::TranslateOutputInvalid
            | Self::TranslateEnumViolation
            | Self::TranslateRequiredMissing
            | Self::TranslateInsufficientCoverage
            | Self::SftInvalid => 422,
            Self::TranslateMapNotFound => 404,
            Self::SignStreamError => 500,
            Self::CanonUnsupportedAlg | Self::CanonCycle => 422,
            Self::ConfigInvalid | Self::ConfigInvalidRedactionPath => 500,
            Self::StorageFailed | Self::LedgerFailed => 502,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Violation
// ---------------------------------------------------------------------------

/// A single field-level or rule-level violation, as emitted by
/// `TranslationEngine` and `HELPolicyEngine`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Stable violation code, e.g. `"intent.denied"` or `"field.missing"`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// JSON-Pointer-like path the violation occurred at, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Violation {
    /// Construct a violation with no associated path.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            path: None,
        }
    }

    /// Attach a JSON-Pointer-like path to this violation.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

// ---------------------------------------------------------------------------
// OdinError
// ---------------------------------------------------------------------------

/// Unified ODIN error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, zero or more
/// [`Violation`]s, an optional source error for cause-chaining, and
/// arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use odin_error::{OdinError, ErrorCode};
///
/// let err = OdinError::new(ErrorCode::ProofInvalid, "cid mismatch")
///     .with_context("kid", "active")
///     .with_context("reason", "cid_mismatch");
/// ```
pub struct OdinError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Field-level violations, if any.
    pub violations: Vec<Violation>,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl OdinError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            violations: Vec::new(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Attach one violation.
    pub fn with_violation(mut self, violation: Violation) -> Self {
        self.violations.push(violation);
        self
    }

    /// Replace the full violation list.
    pub fn with_violations(mut self, violations: Vec<Violation>) -> Self {
        self.violations = violations;
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.http_status()`.
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Debug for OdinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("OdinError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if !self.violations.is_empty() {
            d.field("violations", &self.violations);
        }
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for OdinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for OdinError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Wire response shape
// ---------------------------------------------------------------------------

/// The wire-level error response body: `{error, message, detail?, violations?}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// Stable error code string.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Arbitrary structured detail, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
    /// Field-level violations, if any.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub violations: Vec<Violation>,
}

impl From<&OdinError> for ErrorResponse {
    fn from(err: &OdinError) -> Self {
        let detail = if err.context.is_empty() {
            None
        } else {
            serde_json::to_value(&err.context).ok()
        };
        Self {
            error: err.code.as_str().to_string(),
            message: err.message.clone(),
            detail,
            violations: err.violations.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serialization support (DTO without the opaque source)
// ---------------------------------------------------------------------------

/// Serialisable snapshot of an [`OdinError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OdinErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Field-level violations.
    #[serde(default)]
    pub violations: Vec<Violation>,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&OdinError> for OdinErrorDto {
    fn from(err: &OdinError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            violations: err.violations.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<OdinErrorDto> for OdinError {
    fn from(dto: OdinErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            violations: dto.violations,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io;

    /// All error codes for exhaustive iteration in tests.
    const ALL_CODES: &[ErrorCode] = &[
        ErrorCode::RequestInvalidJson,
        ErrorCode::RequestTooLarge,
        ErrorCode::ProofMissing,
        ErrorCode::ProofInvalid,
        ErrorCode::ProofRequired,
        ErrorCode::PolicyBlocked,
        ErrorCode::PolicyJwksHostForbidden,
        ErrorCode::TenantQuotaExceeded,
        ErrorCode::TranslateInputInvalid,
        ErrorCode::TranslateOutputInvalid,
        ErrorCode::TranslateMapNotFound,
        ErrorCode::TranslateEnumViolation,
        ErrorCode::TranslateRequiredMissing,
        ErrorCode::TranslateInsufficientCoverage,
        ErrorCode::SftInvalid,
        ErrorCode::SignStreamError,
        ErrorCode::CanonUnsupportedAlg,
        ErrorCode::CanonCycle,
        ErrorCode::ConfigInvalid,
        ErrorCode::ConfigInvalidRedactionPath,
        ErrorCode::StorageFailed,
        ErrorCode::LedgerFailed,
        ErrorCode::Internal,
    ];

    // -- Construction & Display -----------------------------------------

    #[test]
    fn basic_construction() {
        let err = OdinError::new(ErrorCode::Internal, "boom");
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "boom");
        assert!(err.source.is_none());
        assert!(err.context.is_empty());
        assert!(err.violations.is_empty());
    }

    #[test]
    fn display_without_context() {
        let err = OdinError::new(ErrorCode::ProofMissing, "no envelope supplied");
        assert_eq!(err.to_string(), "[odin.proof.missing] no envelope supplied");
    }

    #[test]
    fn display_with_context() {
        let err = OdinError::new(ErrorCode::ProofInvalid, "verification failed")
            .with_context("reason", "cid_mismatch");
        let s = err.to_string();
        assert!(s.starts_with("[odin.proof.invalid] verification failed"));
        assert!(s.contains("cid_mismatch"));
    }

    #[test]
    fn debug_with_violations() {
        let err = OdinError::new(ErrorCode::TranslateEnumViolation, "bad enum")
            .with_violation(Violation::new("enum_violation", "not allowed").at("/model"));
        let dbg = format!("{err:?}");
        assert!(dbg.contains("violations"));
    }

    // -- Error code categorization --------------------------------------

    #[test]
    fn proof_codes_categorised() {
        assert_eq!(ErrorCode::ProofMissing.category(), ErrorCategory::Proof);
        assert_eq!(ErrorCode::ProofInvalid.category(), ErrorCategory::Proof);
        assert_eq!(ErrorCode::ProofRequired.category(), ErrorCategory::Proof);
    }

    #[test]
    fn translate_codes_categorised() {
        for code in [
            ErrorCode::TranslateInputInvalid,
            ErrorCode::TranslateOutputInvalid,
            ErrorCode::TranslateMapNotFound,
            ErrorCode::TranslateEnumViolation,
            ErrorCode::TranslateRequiredMissing,
            ErrorCode::TranslateInsufficientCoverage,
        ] {
            assert_eq!(code.category(), ErrorCategory::Translate);
        }
    }

    #[test]
    fn policy_codes_categorised() {
        assert_eq!(ErrorCode::PolicyBlocked.category(), ErrorCategory::Policy);
        assert_eq!(
            ErrorCode::PolicyJwksHostForbidden.category(),
            ErrorCategory::Policy
        );
    }

    // -- HTTP status mapping ---------------------------------------------

    #[test]
    fn proof_required_maps_to_406() {
        assert_eq!(ErrorCode::ProofRequired.http_status(), 406);
    }

    #[test]
    fn tenant_quota_exceeded_maps_to_429() {
        assert_eq!(ErrorCode::TenantQuotaExceeded.http_status(), 429);
    }

    #[test]
    fn request_too_large_maps_to_413() {
        assert_eq!(ErrorCode::RequestTooLarge.http_status(), 413);
    }

    #[test]
    fn translate_map_not_found_maps_to_404() {
        assert_eq!(ErrorCode::TranslateMapNotFound.http_status(), 404);
    }

    #[test]
    fn enum_violation_maps_to_422() {
        assert_eq!(ErrorCode::TranslateEnumViolation.http_status(), 422);
    }

    // -- Wire response shape ----------------------------------------------

    #[test]
    fn error_response_wire_shape() {
        let err = OdinError::new(ErrorCode::TranslateEnumViolation, "bad enum")
            .with_violation(Violation::new("enum_violation", "not allowed").at("/model"));
        let resp: ErrorResponse = (&err).into();
        assert_eq!(resp.error, "odin.translate.enum_violation");
        assert_eq!(resp.violations.len(), 1);
        assert_eq!(resp.violations[0].path.as_deref(), Some("/model"));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error"], "odin.translate.enum_violation");
    }

    // -- Builder pattern ------------------------------------------------

    #[test]
    fn builder_with_source() {
        let src = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = OdinError::new(ErrorCode::PolicyBlocked, "denied").with_source(src);
        assert!(err.source.is_some());
        let displayed = err.source.as_ref().unwrap().to_string();
        assert_eq!(displayed, "access denied");
    }

    // -- Serialization / Deserialization --------------------------------

    #[test]
    fn error_code_serde_roundtrip() {
        let code = ErrorCode::ProofMissing;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, r#""odin.proof.missing""#);
        let back: ErrorCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);
    }

    #[test]
    fn dto_roundtrip_without_source() {
        let err = OdinError::new(ErrorCode::SftInvalid, "bad value")
            .with_context("field", "intent");
        let dto: OdinErrorDto = (&err).into();
        let json = serde_json::to_string(&dto).unwrap();
        let back: OdinErrorDto = serde_json::from_str(&json).unwrap();
        assert_eq!(dto, back);
        assert!(back.source_message.is_none());
    }

    #[test]
    fn dto_to_odin_error_drops_source() {
        let dto = OdinErrorDto {
            code: ErrorCode::ConfigInvalid,
            message: "bad".into(),
            violations: Vec::new(),
            context: BTreeMap::new(),
            source_message: Some("inner".into()),
        };
        let err: OdinError = dto.into();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
        assert!(err.source.is_none());
    }

    // -- Unique string representations ----------------------------------

    #[test]
    fn all_codes_have_unique_as_str() {
        let mut seen = HashSet::new();
        for code in ALL_CODES {
            let s = code.as_str();
            assert!(seen.insert(s), "duplicate as_str value: {s}");
        }
        assert_eq!(seen.len(), ALL_CODES.len());
    }

    #[test]
    fn all_codes_display_matches_as_str() {
        for code in ALL_CODES {
            assert_eq!(code.to_string(), code.as_str());
        }
    }

    #[test]
    fn error_code_count() {
        // Ensure we don't silently drop a variant from ALL_CODES.
        assert_eq!(ALL_CODES.len(), 23);
    }
}
