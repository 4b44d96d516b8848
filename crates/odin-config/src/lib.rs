// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the ODIN gateway.
//!
//! This crate provides [`OdinConfig`] — the top-level runtime settings named
//! in the gateway's external-interfaces config surface — together with
//! helpers for loading from TOML files, merging overlays, applying
//! `ODIN_*` environment variable overrides, and producing advisory
//! [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },

    /// A redaction path entry could not be parsed. Per the gateway's
    /// strict-parse decision, this is a hard error, not a silent
    /// passthrough (see `DESIGN.md`'s Open Question resolution).
    #[error("invalid redaction path '{path}': {reason}")]
    InvalidRedactionPath {
        /// The offending path string.
        path: String,
        /// Why it failed to parse.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A timeout or retry budget is unusually large.
    LargeTimeout {
        /// Field name.
        field: String,
        /// Value in milliseconds.
        ms: u64,
    },
    /// `dynamic_enable` is true but `dynamic_ttl_s` is very small, which will
    /// cause excessive asset re-fetches.
    AggressiveReloadTtl {
        /// Configured TTL in seconds.
        ttl_s: u64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeTimeout { field, ms } => {
                write!(f, "'{field}' has an unusually large value ({ms}ms)")
            }
            ConfigWarning::AggressiveReloadTtl { ttl_s } => {
                write!(f, "dynamic_ttl_s={ttl_s} is very small; expect frequent asset refetches")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    /// In-memory storage (development/testing only; not persistent).
    #[default]
    Memory,
    /// Local filesystem rooted at `data_dir`.
    LocalFs,
    /// Object-store-like backend (illustrative only; see `odin-storage`).
    ObjectStore,
}

/// Top-level runtime configuration for the ODIN gateway.
///
/// Field names match the config surface enumerated in the gateway's
/// external-interfaces documentation one-for-one.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct OdinConfig {
    /// Root directory for persisted artifacts (receipts, OML blobs) when
    /// `storage_backend == local_fs`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Which storage backend to use.
    #[serde(default)]
    pub storage_backend: StorageBackendKind,

    /// Path to the on-disk persistent keystore file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore_path: Option<String>,

    /// Directory containing declarative SftMap assets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sft_maps_dir: Option<String>,

    /// Source (file path or URL) for the HEL policy document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_source: Option<String>,

    /// Route globs that require proof envelope verification on the way in.
    #[serde(default)]
    pub enforce_routes: Vec<String>,

    /// Route globs whose responses should be considered for signing.
    #[serde(default)]
    pub sign_routes: Vec<String>,

    /// Whether a client's `Accept-Proof: required` must be honored even
    /// when the route is not otherwise configured to sign.
    #[serde(default)]
    pub sign_require: bool,

    /// Whether signed responses embed `{payload, proof}` in the body
    /// (`true`) or rely solely on proof headers (`false`).
    #[serde(default)]
    pub sign_embed: bool,

    /// Whether signing is mandatory for any HTTP response at all (a global
    /// override above per-route `sign_routes`).
    #[serde(default)]
    pub http_sign_require: bool,

    /// Outbound bridge/forwarding timeout in milliseconds.
    #[serde(default = "default_bridge_timeout_ms")]
    pub bridge_timeout_ms: u64,

    /// Outbound bridge retry budget.
    #[serde(default = "default_bridge_retries")]
    pub bridge_retries: u32,

    /// Outbound bridge retry backoff, milliseconds.
    #[serde(default = "default_bridge_retry_backoff_ms")]
    pub bridge_retry_backoff_ms: u64,

    /// Per-tenant monthly request cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_quota_monthly_requests: Option<u64>,

    /// Per-tenant token-bucket rate limit, requests per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_rate_limit_qps: Option<f64>,

    /// Whether the DynamicReloader is active at all.
    #[serde(default = "default_dynamic_enable")]
    pub dynamic_enable: bool,

    /// DynamicReloader cache TTL, seconds.
    #[serde(default = "default_dynamic_ttl_s")]
    pub dynamic_ttl_s: u64,

    /// Public base URL used to make relative JWKS/discovery URLs absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,

    /// Comma-separated list of JSON-Pointer-like field paths to redact from
    /// persisted receipts. Parsed strictly: an unparseable entry is a hard
    /// config-load error, never a silent passthrough.
    #[serde(default)]
    pub redact_fields: Vec<String>,

    /// Maximum accepted request body size, bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

fn default_data_dir() -> String {
    "tmp/odin".to_string()
}
fn default_bridge_timeout_ms() -> u64 {
    10_000
}
fn default_bridge_retries() -> u32 {
    2
}
fn default_bridge_retry_backoff_ms() -> u64 {
    250
}
fn default_dynamic_enable() -> bool {
    true
}
fn default_dynamic_ttl_s() -> u64 {
    60
}
fn default_max_body_bytes() -> u64 {
    10 * 1024 * 1024
}

impl Default for OdinConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            storage_backend: StorageBackendKind::default(),
            keystore_path: None,
            sft_maps_dir: None,
            policy_source: None,
            enforce_routes: Vec::new(),
            sign_routes: Vec::new(),
            sign_require: false,
            sign_embed: true,
            http_sign_require: false,
            bridge_timeout_ms: default_bridge_timeout_ms(),
            bridge_retries: default_bridge_retries(),
            bridge_retry_backoff_ms: default_bridge_retry_backoff_ms(),
            tenant_quota_monthly_requests: None,
            tenant_rate_limit_qps: None,
            dynamic_enable: default_dynamic_enable(),
            dynamic_ttl_s: default_dynamic_ttl_s(),
            public_base_url: None,
            redact_fields: Vec::new(),
            max_body_bytes: default_max_body_bytes(),
            log_level: Some("info".into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Recognised log levels.
const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Threshold above which a bridge timeout generates a warning.
const LARGE_TIMEOUT_MS_THRESHOLD: u64 = 120_000;

/// Threshold below which `dynamic_ttl_s` generates a warning.
const AGGRESSIVE_TTL_THRESHOLD_S: u64 = 1;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load an [`OdinConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`OdinConfig::default()`].
///
/// `ODIN_*` environment variable overrides are applied on top in both
/// cases.
pub fn load_config(path: Option<&Path>) -> Result<OdinConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => OdinConfig::default(),
    };
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Parse a TOML string into an [`OdinConfig`].
pub fn parse_toml(content: &str) -> Result<OdinConfig, ConfigError> {
    toml::from_str::<OdinConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply `ODIN_*` environment variable overrides, grounded on the original
/// gateway's `ODIN_DATA_DIR`/`ODIN_KEYSTORE_PATH`/etc. naming convention.
///
/// Recognised variables: `ODIN_DATA_DIR`, `ODIN_STORAGE_BACKEND`,
/// `ODIN_KEYSTORE_PATH`, `ODIN_SFT_MAPS_DIR`, `ODIN_POLICY_SOURCE`,
/// `ODIN_PUBLIC_BASE_URL`, `ODIN_LOG_LEVEL`, `ODIN_REDACT_FIELDS`
/// (comma-separated, parsed strictly — see [`ConfigError::InvalidRedactionPath`]).
pub fn apply_env_overrides(config: &mut OdinConfig) -> Result<(), ConfigError> {
    if let Ok(val) = std::env::var("ODIN_DATA_DIR") {
        config.data_dir = val;
    }
    if let Ok(val) = std::env::var("ODIN_STORAGE_BACKEND") {
        config.storage_backend = match val.as_str() {
            "memory" => StorageBackendKind::Memory,
            "local_fs" => StorageBackendKind::LocalFs,
            "object_store" => StorageBackendKind::ObjectStore,
            other => {
                return Err(ConfigError::ValidationError {
                    reasons: vec![format!("unknown ODIN_STORAGE_BACKEND '{other}'")],
                });
            }
        };
    }
    if let Ok(val) = std::env::var("ODIN_KEYSTORE_PATH") {
        config.keystore_path = Some(val);
    }
    if let Ok(val) = std::env::var("ODIN_SFT_MAPS_DIR") {
        config.sft_maps_dir = Some(val);
    }
    if let Ok(val) = std::env::var("ODIN_POLICY_SOURCE") {
        config.policy_source = Some(val);
    }
    if let Ok(val) = std::env::var("ODIN_PUBLIC_BASE_URL") {
        config.public_base_url = Some(val);
    }
    if let Ok(val) = std::env::var("ODIN_LOG_LEVEL") {
        config.log_level = Some(val);
    }
    if let Ok(val) = std::env::var("ODIN_REDACT_FIELDS") {
        config.redact_fields = parse_redact_fields(&val)?;
    }
    Ok(())
}

/// Parse a comma-separated redaction-path list strictly: empty entries from
/// stray commas are dropped, but a non-empty entry that is not a valid
/// JSON-Pointer-like path (must start with `/` or contain no whitespace
/// when dotted) is a hard error. This resolves the Open Question in
/// `DESIGN.md` in favor of fail-loud over silent passthrough.
pub fn parse_redact_fields(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut out = Vec::new();
    for entry in raw.split(',') {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidRedactionPath {
                path: trimmed.to_string(),
                reason: "path must not contain whitespace".to_string(),
            });
        }
        out.push(trimmed.to_string());
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (invalid log level, zero/negative-equivalent timeouts,
/// out-of-range rate limits) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &OdinConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if let Some(ref level) = config.log_level
        && !VALID_LOG_LEVELS.contains(&level.as_str())
    {
        errors.push(format!("invalid log_level '{level}'"));
    }

    if config.bridge_timeout_ms == 0 {
        errors.push("bridge_timeout_ms must be greater than zero".into());
    } else if config.bridge_timeout_ms > LARGE_TIMEOUT_MS_THRESHOLD {
        warnings.push(ConfigWarning::LargeTimeout {
            field: "bridge_timeout_ms".into(),
            ms: config.bridge_timeout_ms,
        });
    }

    if let Some(qps) = config.tenant_rate_limit_qps
        && qps <= 0.0
    {
        errors.push("tenant_rate_limit_qps must be positive".into());
    }

    if config.dynamic_enable && config.dynamic_ttl_s < AGGRESSIVE_TTL_THRESHOLD_S {
        warnings.push(ConfigWarning::AggressiveReloadTtl {
            ttl_s: config.dynamic_ttl_s,
        });
    }

    if matches!(config.storage_backend, StorageBackendKind::LocalFs) && config.data_dir.is_empty()
    {
        errors.push("data_dir must not be empty when storage_backend = local_fs".into());
    }

    if config.keystore_path.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "keystore_path".into(),
            hint: "an ephemeral, non-persistent keypair will be generated at startup".into(),
        });
    }
    if config.policy_source.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "policy_source".into(),
            hint: "HEL policy defaults to allow-all".into(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values in `overlay` take precedence over
/// `base`; vector-valued fields (`enforce_routes`, `sign_routes`,
/// `redact_fields`) are extended rather than replaced when the overlay's
/// list is non-empty, matching the teacher's backend-map merge convention.
pub fn merge_configs(base: OdinConfig, overlay: OdinConfig) -> OdinConfig {
    let mut enforce_routes = base.enforce_routes;
    enforce_routes.extend(overlay.enforce_routes);
    let mut sign_routes = base.sign_routes;
    sign_routes.extend(overlay.sign_routes);
    let mut redact_fields = base.redact_fields;
    redact_fields.extend(overlay.redact_fields);

    OdinConfig {
        data_dir: if overlay.data_dir != default_data_dir() {
            overlay.data_dir
        } else {
            base.data_dir
        },
        storage_backend: overlay.storage_backend,
        keystore_path: overlay.keystore_path.or(base.keystore_path),
        sft_maps_dir: overlay.sft_maps_dir.or(base.sft_maps_dir),
        policy_source: overlay.policy_source.or(base.policy_source),
        enforce_routes,
        sign_routes,
        sign_require: overlay.sign_require || base.sign_require,
        sign_embed: overlay.sign_embed,
        http_sign_require: overlay.http_sign_require || base.http_sign_require,
        bridge_timeout_ms: overlay.bridge_timeout_ms,
        bridge_retries: overlay.bridge_retries,
        bridge_retry_backoff_ms: overlay.bridge_retry_backoff_ms,
        tenant_quota_monthly_requests: overlay
            .tenant_quota_monthly_requests
            .or(base.tenant_quota_monthly_requests),
        tenant_rate_limit_qps: overlay.tenant_rate_limit_qps.or(base.tenant_rate_limit_qps),
        dynamic_enable: overlay.dynamic_enable,
        dynamic_ttl_s: overlay.dynamic_ttl_s,
        public_base_url: overlay.public_base_url.or(base.public_base_url),
        redact_fields,
        max_body_bytes: overlay.max_body_bytes,
        log_level: overlay.log_level.or(base.log_level),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // -- 1. Default config is valid ------------------------------------------

    #[test]
    fn default_config_is_valid() {
        let cfg = OdinConfig::default();
        let warnings = validate_config(&cfg).expect("default config should be valid");
        assert!(!warnings.is_empty(), "should have advisory warnings");
    }

    // -- 2. Default config has sensible defaults -----------------------------

    #[test]
    fn default_config_has_sensible_defaults() {
        let cfg = OdinConfig::default();
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
        assert_eq!(cfg.bridge_retries, 2);
        assert_eq!(cfg.bridge_retry_backoff_ms, 250);
        assert!(cfg.dynamic_enable);
        assert_eq!(cfg.dynamic_ttl_s, 60);
    }

    // -- 3. Load from valid TOML string --------------------------------------

    #[test]
    fn parse_valid_toml_string() {
        let toml_str = r#"
            data_dir = "/tmp/odin"
            storage_backend = "local_fs"
            keystore_path = "/tmp/odin/keystore.json"
            enforce_routes = ["/v1/translate"]
        "#;
        let cfg = parse_toml(toml_str).unwrap();
        assert_eq!(cfg.data_dir, "/tmp/odin");
        assert_eq!(cfg.storage_backend, StorageBackendKind::LocalFs);
        assert_eq!(cfg.enforce_routes, vec!["/v1/translate".to_string()]);
    }

    // -- 4. Load from invalid TOML produces ParseError -----------------------

    #[test]
    fn parse_invalid_toml_gives_parse_error() {
        let bad = "this is [not valid toml =";
        let err = parse_toml(bad).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    // -- 5. Validation catches invalid log level -----------------------------

    #[test]
    fn validation_catches_invalid_log_level() {
        let cfg = OdinConfig {
            log_level: Some("verbose".into()),
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    // -- 6. Validation catches zero bridge timeout ---------------------------

    #[test]
    fn validation_catches_zero_bridge_timeout() {
        let cfg = OdinConfig {
            bridge_timeout_ms: 0,
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    // -- 7. Large bridge timeout produces warning ----------------------------

    #[test]
    fn large_bridge_timeout_produces_warning() {
        let cfg = OdinConfig {
            bridge_timeout_ms: 200_000,
            keystore_path: Some("/tmp/k.json".into()),
            policy_source: Some("/tmp/policy.json".into()),
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, ConfigWarning::LargeTimeout { .. }))
        );
    }

    // -- 8. Aggressive reload ttl warning -------------------------------------

    #[test]
    fn aggressive_reload_ttl_warns() {
        let cfg = OdinConfig {
            dynamic_enable: true,
            dynamic_ttl_s: 0,
            keystore_path: Some("/tmp/k.json".into()),
            policy_source: Some("/tmp/policy.json".into()),
            ..Default::default()
        };
        let warnings = validate_config(&cfg).unwrap();
        assert!(
            warnings
                .iter()
                .any(|w| matches!(w, ConfigWarning::AggressiveReloadTtl { .. }))
        );
    }

    // -- 9. Negative-equivalent qps rejected ----------------------------------

    #[test]
    fn non_positive_rate_limit_rejected() {
        let cfg = OdinConfig {
            tenant_rate_limit_qps: Some(0.0),
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    // -- 10. Merge overlay overrides base values -----------------------------

    #[test]
    fn merge_overlay_overrides_base() {
        let base = OdinConfig {
            sign_embed: false,
            ..Default::default()
        };
        let overlay = OdinConfig {
            sign_embed: true,
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert!(merged.sign_embed);
    }

    // -- 11. Merge extends route lists ---------------------------------------

    #[test]
    fn merge_extends_route_lists() {
        let base = OdinConfig {
            enforce_routes: vec!["/a".into()],
            ..Default::default()
        };
        let overlay = OdinConfig {
            enforce_routes: vec!["/b".into()],
            ..Default::default()
        };
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.enforce_routes, vec!["/a".to_string(), "/b".to_string()]);
    }

    // -- 12. Merge keeps base when overlay is None/default -------------------

    #[test]
    fn merge_preserves_base_keystore_path_when_overlay_absent() {
        let base = OdinConfig {
            keystore_path: Some("/base/keystore.json".into()),
            ..Default::default()
        };
        let overlay = OdinConfig::default();
        let merged = merge_configs(base, overlay);
        assert_eq!(merged.keystore_path.as_deref(), Some("/base/keystore.json"));
    }

    // -- 13. Redact fields: empty entries dropped ----------------------------

    #[test]
    fn redact_fields_drops_empty_entries() {
        let parsed = parse_redact_fields("/a/b,,/c").unwrap();
        assert_eq!(parsed, vec!["/a/b".to_string(), "/c".to_string()]);
    }

    // -- 14. Redact fields: whitespace is a hard error -----------------------

    #[test]
    fn redact_fields_rejects_whitespace() {
        let err = parse_redact_fields("/a b").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRedactionPath { .. }));
    }

    // -- 15. Empty string TOML parses to defaults -----------------------------

    #[test]
    fn empty_string_toml_parses_to_defaults() {
        let cfg = parse_toml("").unwrap();
        assert_eq!(cfg.data_dir, default_data_dir());
        assert!(cfg.enforce_routes.is_empty());
    }

    // -- 16. Roundtrip serialize / deserialize -------------------------------

    #[test]
    fn toml_roundtrip() {
        let cfg = OdinConfig {
            keystore_path: Some("/ks".into()),
            sft_maps_dir: Some("/maps".into()),
            ..Default::default()
        };
        let serialized = toml::to_string(&cfg).unwrap();
        let deserialized: OdinConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }

    // -- 17. Load from file on disk ------------------------------------------

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odin.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "data_dir = \"/tmp/odin\"\nlog_level = \"warn\"").unwrap();
        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.data_dir, "/tmp/odin");
        assert_eq!(cfg.log_level.as_deref(), Some("warn"));
    }

    // -- 18. Load missing file gives FileNotFound ----------------------------

    #[test]
    fn load_missing_file_gives_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/odin.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    // -- 19. Load None path returns default config ---------------------------

    #[test]
    fn load_none_returns_default() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg.log_level.as_deref(), Some("info"));
    }

    // -- 20. ConfigError Display trait ----------------------------------------

    #[test]
    fn config_error_display() {
        let e = ConfigError::FileNotFound {
            path: "/foo".into(),
        };
        assert!(e.to_string().contains("/foo"));

        let e = ConfigError::InvalidRedactionPath {
            path: "/a b".into(),
            reason: "whitespace".into(),
        };
        assert!(e.to_string().contains("/a b"));
    }
}
