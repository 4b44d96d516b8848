// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative `SftMap` translation engine.
//!
//! Grounded directly on spec.md §4.5's twelve-step algorithm (no ambiguity
//! to resolve against `original_source/`, since no matching translation
//! engine module was present in the retrieved index) and on
//! `abp-mapping::Fidelity`/`MappingRule`'s tagged-enum style for expressing
//! per-field provenance.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use odin_codec::cid_of;
use odin_error::{ErrorCode, OdinError, Violation};
use odin_sft::SftRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A declarative mapping from one SFT dialect to another.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SftMap {
    /// Unique identifier for this map, used in [`TranslationReceipt`] and
    /// as the registry lookup key.
    pub id: String,
    /// Source SFT id.
    pub from_sft: String,
    /// Target SFT id.
    pub to_sft: String,
    /// Field names to delete unconditionally.
    #[serde(default)]
    pub drop: Vec<String>,
    /// `(source_field, target_field)` renames, applied in order.
    #[serde(default)]
    pub fields: Vec<(String, String)>,
    /// Intent value remapping: old intent string → new intent string.
    #[serde(default)]
    pub intents: BTreeMap<String, String>,
    /// Constant fields to set unconditionally (overwrite semantics).
    #[serde(default)]
    pub r#const: BTreeMap<String, Value>,
    /// Default fields to set only when missing or null.
    #[serde(default)]
    pub defaults: BTreeMap<String, Value>,
    /// Enum constraints: field → allowed values.
    #[serde(default)]
    pub enum_constraints: BTreeMap<String, Vec<Value>>,
    /// Fields that must be present and non-null in the output.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Minimum coverage percentage required for this map's
    /// `(from_sft, to_sft)` pair. `None` disables the coverage gate.
    #[serde(default)]
    pub min_coverage_percent: Option<f64>,
}

/// A single provenance entry describing one field-level operation applied
/// during translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    /// Field name in the input, if applicable.
    pub source_field: Option<String>,
    /// Field name in the output, if applicable.
    pub target_field: Option<String>,
    /// What kind of operation this entry records.
    pub operation: String,
    /// The value before the operation, if applicable.
    pub source_value: Option<Value>,
    /// The value after the operation, if applicable.
    pub target_value: Option<Value>,
    /// Wall-clock timestamp in nanoseconds since the Unix epoch.
    pub timestamp_ns: u128,
}

impl ProvenanceEntry {
    fn now(
        operation: &str,
        source_field: Option<&str>,
        target_field: Option<&str>,
        source_value: Option<Value>,
        target_value: Option<Value>,
    ) -> Self {
        Self {
            source_field: source_field.map(str::to_string),
            target_field: target_field.map(str::to_string),
            operation: operation.to_string(),
            source_value,
            target_value,
            timestamp_ns: now_ns(),
        }
    }
}

fn now_ns() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}

/// Receipt describing a single translation run: what SFTs were involved,
/// the content identifiers of input/output, and the full provenance trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationReceipt {
    /// Source SFT id.
    pub from_sft: String,
    /// Target SFT id.
    pub to_sft: String,
    /// Content identifier of the canonicalized input.
    pub input_cid: String,
    /// Content identifier of the canonicalized output.
    pub output_cid: String,
    /// Per-field provenance trail, in application order.
    pub provenance: Vec<ProvenanceEntry>,
    /// Key-coverage percentage, 0-100.
    pub coverage_percent: f64,
    /// Whether every `required_fields` entry ended up present and non-null.
    pub required_fields_met: bool,
    /// Number of fields touched by a non-passthrough operation.
    pub transformation_count: usize,
    /// Canonicalization algorithm identifier used for `input_cid`/`output_cid`.
    pub canon_alg: String,
}

/// Translate `payload` through `map`, validating against `registry` at the
/// input and output boundaries.
///
/// # Errors
///
/// Returns, in order of possible failure: [`ErrorCode::TranslateInputInvalid`],
/// [`ErrorCode::TranslateEnumViolation`], [`ErrorCode::TranslateRequiredMissing`],
/// [`ErrorCode::TranslateInsufficientCoverage`], or
/// [`ErrorCode::TranslateOutputInvalid`].
pub fn translate(
    payload: &Value,
    map: &SftMap,
    registry: &SftRegistry,
) -> Result<(Value, TranslationReceipt), OdinError> {
    // Step 1: validate input.
    let input_check = registry.validate(payload, &map.from_sft);
    if !input_check.ok {
        return Err(
            OdinError::new(ErrorCode::TranslateInputInvalid, "input failed SFT validation")
                .with_violations(input_check.violations),
        );
    }

    // Step 2: deep copy.
    let mut obj = payload.clone();
    let mut provenance = Vec::new();
    let input_keys: Vec<String> = obj
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();

    let map_obj = obj.as_object_mut().ok_or_else(|| {
        OdinError::new(
            ErrorCode::TranslateInputInvalid,
            "payload must be a JSON object",
        )
    })?;

    // Step 3: drops.
    for key in &map.drop {
        if let Some(v) = map_obj.remove(key) {
            provenance.push(ProvenanceEntry::now(
                "drop",
                Some(key),
                None,
                Some(v),
                None,
            ));
        }
    }

    // Step 4: renames.
    for (src, dst) in &map.fields {
        if let Some(v) = map_obj.remove(src) {
            let overwritten = map_obj.insert(dst.clone(), v.clone());
            provenance.push(ProvenanceEntry::now(
                "rename",
                Some(src),
                Some(dst),
                Some(v.clone()),
                Some(v),
            ));
            if overwritten.is_some() {
                provenance.push(ProvenanceEntry::now(
                    "overwrite",
                    Some(src),
                    Some(dst),
                    overwritten,
                    None,
                ));
            }
        }
    }

    // Step 5: intent remap.
    if let Some(Value::String(intent)) = map_obj.get("intent").cloned().as_ref() {
        if let Some(mapped) = map.intents.get(intent) {
            map_obj.insert("intent".to_string(), Value::String(mapped.clone()));
            provenance.push(ProvenanceEntry::now(
                "intent",
                Some("intent"),
                Some("intent"),
                Some(Value::String(intent.clone())),
                Some(Value::String(mapped.clone())),
            ));
        }
    }

    // Step 6: constants.
    for (k, v) in &map.r#const {
        let prior = map_obj.insert(k.clone(), v.clone());
        provenance.push(ProvenanceEntry::now(
            "const",
            None,
            Some(k),
            prior,
            Some(v.clone()),
        ));
    }

    // Step 7: defaults.
    for (k, v) in &map.defaults {
        let missing_or_null = map_obj.get(k).is_none_or(Value::is_null);
        if missing_or_null {
            map_obj.insert(k.clone(), v.clone());
            provenance.push(ProvenanceEntry::now(
                "default",
                None,
                Some(k),
                None,
                Some(v.clone()),
            ));
        }
    }

    // Step 8: enum constraints.
    let mut enum_violations = Vec::new();
    for (field_name, allowed) in &map.enum_constraints {
        if let Some(v) = map_obj.get(field_name) {
            if !allowed.contains(v) {
                enum_violations.push(
                    Violation::new(
                        "enum_violation",
                        format!("'{field_name}' value is not in the allowed set"),
                    )
                    .at(format!("/{field_name}")),
                );
            }
        }
    }
    if !enum_violations.is_empty() {
        return Err(
            OdinError::new(ErrorCode::TranslateEnumViolation, "enum constraint violated")
                .with_violations(enum_violations),
        );
    }

    // Step 9: required fields.
    let mut missing = Vec::new();
    for field_name in &map.required_fields {
        if map_obj.get(field_name).is_none_or(Value::is_null) {
            missing.push(
                Violation::new("required_missing", format!("'{field_name}' is required"))
                    .at(format!("/{field_name}")),
            );
        }
    }
    let required_fields_met = missing.is_empty();
    if !required_fields_met {
        return Err(OdinError::new(
            ErrorCode::TranslateRequiredMissing,
            "required output field missing",
        )
        .with_violations(missing));
    }

    // Step 10: coverage.
    let output_keys: Vec<String> = map_obj.keys().cloned().collect();
    let coverage_percent = compute_coverage(&input_keys, &output_keys);
    if let Some(min) = map.min_coverage_percent {
        if coverage_percent < min {
            return Err(OdinError::new(
                ErrorCode::TranslateInsufficientCoverage,
                format!(
                    "coverage {coverage_percent:.2}% is below the required {min:.2}% for {}->{}",
                    map.from_sft, map.to_sft
                ),
            )
            .with_context("coverage_percent", coverage_percent)
            .with_context("min_coverage_percent", min));
        }
    }

    // Step 11: validate output.
    let output_check = registry.validate(&obj, &map.to_sft);
    if !output_check.ok {
        return Err(
            OdinError::new(ErrorCode::TranslateOutputInvalid, "output failed SFT validation")
                .with_violations(output_check.violations),
        );
    }

    // Step 12: passthrough provenance for untouched keys, then assemble receipt.
    let touched: std::collections::HashSet<&str> = provenance
        .iter()
        .flat_map(|p| {
            [p.source_field.as_deref(), p.target_field.as_deref()]
                .into_iter()
                .flatten()
        })
        .collect();
    let transformation_count = provenance.len();
    for key in &output_keys {
        if !touched.contains(key.as_str()) {
            let v = obj.as_object().and_then(|m| m.get(key)).cloned();
            provenance.push(ProvenanceEntry::now(
                "passthrough",
                Some(key),
                Some(key),
                v.clone(),
                v,
            ));
        }
    }

    let input_cid = cid_of(payload)?;
    let output_cid = cid_of(&obj)?;

    let receipt = TranslationReceipt {
        from_sft: map.from_sft.clone(),
        to_sft: map.to_sft.clone(),
        input_cid,
        output_cid,
        provenance,
        coverage_percent,
        required_fields_met,
        transformation_count,
        canon_alg: odin_codec::DEFAULT_CANON_ALG.to_string(),
    };

    Ok((obj, receipt))
}

fn compute_coverage(input_keys: &[String], output_keys: &[String]) -> f64 {
    if input_keys.is_empty() {
        return 100.0;
    }
    let output: std::collections::HashSet<&str> =
        output_keys.iter().map(String::as_str).collect();
    let intersect = input_keys
        .iter()
        .filter(|k| output.contains(k.as_str()))
        .count();
    (intersect as f64 / input_keys.len() as f64) * 100.0
}

/// Registry of named [`SftMap`]s, keyed by [`SftMap::id`].
#[derive(Debug, Clone, Default)]
pub struct SftMapRegistry {
    maps: BTreeMap<String, SftMap>,
}

impl SftMapRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a map under its own `id`.
    pub fn insert(&mut self, map: SftMap) {
        self.maps.insert(map.id.clone(), map);
    }

    /// Look up a map by id.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::TranslateMapNotFound`] if no map with that id
    /// is registered.
    pub fn get(&self, id: &str) -> Result<&SftMap, OdinError> {
        self.maps.get(id).ok_or_else(|| {
            OdinError::new(ErrorCode::TranslateMapNotFound, format!("no SftMap named '{id}'"))
                .with_context("map_id", id)
        })
    }

    /// Number of registered maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    /// True if no maps are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity_map() -> SftMap {
        SftMap {
            id: "identity".into(),
            from_sft: "core@v0.1".into(),
            to_sft: "core@v0.1".into(),
            ..Default::default()
        }
    }

    #[test]
    fn identity_translation_always_emits_a_receipt() {
        let registry = SftRegistry::new();
        let payload = json!({"intent": "echo"});
        let (output, receipt) = translate(&payload, &identity_map(), &registry).unwrap();
        assert_eq!(output, payload);
        assert_eq!(receipt.coverage_percent, 100.0);
        assert!(receipt.provenance.iter().any(|p| p.operation == "passthrough"));
    }

    #[test]
    fn rename_records_provenance_and_moves_value() {
        let registry = SftRegistry::new();
        let map = SftMap {
            id: "m1".into(),
            from_sft: "core@v0.1".into(),
            to_sft: "core@v0.1".into(),
            fields: vec![("amount".into(), "value".into())],
            ..Default::default()
        };
        let payload = json!({"intent": "echo", "amount": 5});
        let (output, receipt) = translate(&payload, &map, &registry).unwrap();
        assert_eq!(output.get("value"), Some(&json!(5)));
        assert!(output.get("amount").is_none());
        assert!(receipt.provenance.iter().any(|p| p.operation == "rename"));
    }

    #[test]
    fn rename_onto_existing_field_records_overwrite() {
        let registry = SftRegistry::new();
        let map = SftMap {
            id: "m1".into(),
            from_sft: "core@v0.1".into(),
            to_sft: "core@v0.1".into(),
            fields: vec![("a".into(), "b".into())],
            ..Default::default()
        };
        let payload = json!({"a": 1, "b": 2});
        let (output, receipt) = translate(&payload, &map, &registry).unwrap();
        assert_eq!(output.get("b"), Some(&json!(1)));
        assert!(receipt.provenance.iter().any(|p| p.operation == "overwrite"));
    }

    #[test]
    fn intent_remap_applies() {
        let registry = SftRegistry::new();
        let mut intents = BTreeMap::new();
        intents.insert("echo".to_string(), "ping".to_string());
        let map = SftMap {
            id: "m1".into(),
            from_sft: "core@v0.1".into(),
            to_sft: "core@v0.1".into(),
            intents,
            ..Default::default()
        };
        let payload = json!({"intent": "echo"});
        let (output, _) = translate(&payload, &map, &registry).unwrap();
        assert_eq!(output.get("intent"), Some(&json!("ping")));
    }

    #[test]
    fn defaults_only_apply_when_missing_or_null() {
        let registry = SftRegistry::new();
        let mut defaults = BTreeMap::new();
        defaults.insert("units".to_string(), json!("usd"));
        let map = SftMap {
            id: "m1".into(),
            from_sft: "core@v0.1".into(),
            to_sft: "core@v0.1".into(),
            defaults,
            ..Default::default()
        };
        let payload = json!({"units": null});
        let (output, _) = translate(&payload, &map, &registry).unwrap();
        assert_eq!(output.get("units"), Some(&json!("usd")));
    }

    #[test]
    fn enum_violation_fails_fast_with_all_violations() {
        let registry = SftRegistry::new();
        let mut enums = BTreeMap::new();
        enums.insert("intent".to_string(), vec![json!("echo")]);
        let map = SftMap {
            id: "m1".into(),
            from_sft: "core@v0.1".into(),
            to_sft: "core@v0.1".into(),
            enum_constraints: enums,
            ..Default::default()
        };
        let payload = json!({"intent": "transfer"});
        let err = translate(&payload, &map, &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::TranslateEnumViolation);
        assert_eq!(err.violations.len(), 1);
    }

    #[test]
    fn required_missing_fails() {
        let registry = SftRegistry::new();
        let map = SftMap {
            id: "m1".into(),
            from_sft: "core@v0.1".into(),
            to_sft: "core@v0.1".into(),
            required_fields: vec!["trace_id".into()],
            ..Default::default()
        };
        let err = translate(&json!({}), &map, &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::TranslateRequiredMissing);
    }

    #[test]
    fn insufficient_coverage_fails() {
        let registry = SftRegistry::new();
        let map = SftMap {
            id: "m1".into(),
            from_sft: "core@v0.1".into(),
            to_sft: "core@v0.1".into(),
            drop: vec!["a".into(), "b".into(), "c".into()],
            min_coverage_percent: Some(90.0),
            ..Default::default()
        };
        let payload = json!({"a": 1, "b": 2, "c": 3, "d": 4});
        let err = translate(&payload, &map, &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::TranslateInsufficientCoverage);
    }

    #[test]
    fn input_validation_failure_short_circuits() {
        let registry = SftRegistry::new();
        let map = SftMap {
            id: "m1".into(),
            from_sft: "core@v0.1".into(),
            to_sft: "core@v0.1".into(),
            ..Default::default()
        };
        let err = translate(&json!({"intent": "bogus"}), &map, &registry).unwrap_err();
        assert_eq!(err.code, ErrorCode::TranslateInputInvalid);
    }

    #[test]
    fn map_registry_reports_not_found() {
        let reg = SftMapRegistry::new();
        let err = reg.get("missing").unwrap_err();
        assert_eq!(err.code, ErrorCode::TranslateMapNotFound);
    }

    #[test]
    fn map_registry_round_trips() {
        let mut reg = SftMapRegistry::new();
        reg.insert(identity_map());
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("identity").unwrap().id, "identity");
    }
}
