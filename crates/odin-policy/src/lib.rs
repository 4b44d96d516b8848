// SPDX-License-Identifier: MIT OR Apache-2.0
//! HEL (Host Egress Limitation) policy engine for the ODIN gateway.
//!
//! Evaluation happens in two independent stages:
//!
//! * the **metadata stage** ([`HELPolicyEngine::kid_allowed`],
//!   [`HELPolicyEngine::host_allowed`]) gates on the signing `kid` and the
//!   host serving a JWKS, before any payload bytes are inspected;
//! * the **content stage** ([`HELPolicyEngine::evaluate`]) walks a
//!   translated payload's intent graph and checks declarative field
//!   constraints, returning every violation rather than failing fast.
//!
//! Both stages reuse [`abp_glob::IncludeExcludeGlobs`] for glob matching:
//! an empty pattern list means "no constraint", and an exclude match always
//! beats an include match.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use abp_glob::IncludeExcludeGlobs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod audit;
pub use audit::{AuditEntry, AuditSummary, PolicyAuditor};

// ---------------------------------------------------------------------------
// Policy document
// ---------------------------------------------------------------------------

/// One declarative content-stage constraint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldConstraint {
    /// Only applied when the payload's top-level `intent` matches this glob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when_intent: Option<String>,
    /// JSON-Pointer-like path (`/a/b`) or dotted path (`a.b`) into the payload.
    pub path: String,
    /// One of `present`, `absent`, `min_len`, `max_len`, `==`, `!=`, `<`,
    /// `<=`, `>`, `>=`.
    pub op: String,
    /// Comparison operand for length and relational operators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Declarative HEL policy document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct HELPolicy {
    /// Kid globs allowed to sign/verify. Empty means allow-all.
    #[serde(default)]
    pub allow_kids: Vec<String>,
    /// Kid globs denied regardless of `allow_kids`.
    #[serde(default)]
    pub deny_kids: Vec<String>,
    /// Host globs a JWKS may be fetched from. Empty means allow-all.
    #[serde(default)]
    pub allowed_jwks_hosts: Vec<String>,
    /// Intent globs allowed in the payload graph. Empty means allow-all.
    #[serde(default)]
    pub allow_intents: Vec<String>,
    /// Intent globs denied regardless of `allow_intents`.
    #[serde(default)]
    pub deny_intents: Vec<String>,
    /// Intent globs that require a non-empty `reason` or `why` field.
    #[serde(default)]
    pub require_reason_for_intents: Vec<String>,
    /// Declarative field-level constraints.
    #[serde(default)]
    pub field_constraints: Vec<FieldConstraint>,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A single policy violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Violation {
    /// Stable dotted violation code, e.g. `intent.denied`.
    pub code: String,
    /// Human-readable explanation.
    pub message: String,
    /// JSON-Pointer-like location of the offending node.
    pub path: String,
}

impl Violation {
    fn new(code: &str, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            path: path.into(),
        }
    }
}

/// Outcome of [`HELPolicyEngine::evaluate`].
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PolicyResult {
    /// `true` iff `violations` is empty.
    pub allowed: bool,
    /// Every violation found; the engine never short-circuits.
    pub violations: Vec<Violation>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Compiled, reusable HEL policy evaluator.
#[derive(Debug, Clone)]
pub struct HELPolicyEngine {
    kid_globs: IncludeExcludeGlobs,
    host_globs: IncludeExcludeGlobs,
    policy: HELPolicy,
}

impl HELPolicyEngine {
    /// Compile a [`HELPolicy`] document into an evaluator.
    pub fn new(policy: HELPolicy) -> anyhow::Result<Self> {
        Ok(Self {
            kid_globs: IncludeExcludeGlobs::new(&policy.allow_kids, &policy.deny_kids)?,
            host_globs: IncludeExcludeGlobs::new(&policy.allowed_jwks_hosts, &[])?,
            policy,
        })
    }

    /// The policy document this engine was compiled from.
    pub fn policy(&self) -> &HELPolicy {
        &self.policy
    }

    // -- Metadata stage ---------------------------------------------------

    /// `true` unless `kid` matches `deny_kids`, or `allow_kids` is non-empty
    /// and `kid` matches none of it.
    pub fn kid_allowed(&self, kid: &str) -> bool {
        self.kid_globs.decide_str(kid).is_allowed()
    }

    /// `true` unless `allowed_jwks_hosts` is non-empty and `host` matches
    /// none of it.
    pub fn host_allowed(&self, host: &str) -> bool {
        self.host_globs.decide_str(host).is_allowed()
    }

    // -- Content stage ------------------------------------------------------

    /// Evaluate the content stage against a translated payload.
    ///
    /// Never mutates `payload`. Accumulates every violation rather than
    /// stopping at the first one.
    pub fn evaluate(&self, payload: &Value) -> PolicyResult {
        let mut violations = Vec::new();
        let top_intent = payload.get("intent").and_then(Value::as_str);
        let intents = collect_intents(payload, "");

        if !self.policy.deny_intents.is_empty() {
            for occ in &intents {
                if glob_any(&self.policy.deny_intents, occ.intent) {
                    violations.push(Violation::new(
                        "intent.denied",
                        format!("intent '{}' is denied", occ.intent),
                        format!("{}/intent", occ.path),
                    ));
                }
            }
        }

        if !self.policy.allow_intents.is_empty() {
            for occ in &intents {
                if !glob_any(&self.policy.allow_intents, occ.intent) {
                    violations.push(Violation::new(
                        "intent.not_allowed",
                        format!("intent '{}' not in allowlist", occ.intent),
                        format!("{}/intent", occ.path),
                    ));
                }
            }
        }

        if !self.policy.require_reason_for_intents.is_empty() {
            for occ in &intents {
                if glob_any(&self.policy.require_reason_for_intents, occ.intent) {
                    let has_reason = non_empty_str_field(occ.node, "reason");
                    let has_why = non_empty_str_field(occ.node, "why");
                    if !(has_reason || has_why) {
                        violations.push(Violation::new(
                            "reason.required",
                            "reason/why required for this intent",
                            format!("{}/reason", occ.path),
                        ));
                    }
                }
            }
        }

        for rule in &self.policy.field_constraints {
            if let Some(when) = &rule.when_intent {
                let matches = top_intent.is_some_and(|i| glob_any(std::slice::from_ref(when), i));
                if !matches {
                    continue;
                }
            }
            evaluate_field_constraint(payload, rule, &mut violations);
        }

        PolicyResult {
            allowed: violations.is_empty(),
            violations,
        }
    }
}

fn glob_any(patterns: &[String], candidate: &str) -> bool {
    patterns.iter().any(|pat| glob_match(pat, candidate))
}

/// Shell-style glob match (`*`, `?`) over a single segment, mirroring the
/// gateway's `fnmatch`-based intent matching. Not path-aware: `*` crosses
/// no separators because intents have none.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    fn helper(p: &[char], c: &[char]) -> bool {
        match p.first() {
            None => c.is_empty(),
            Some('*') => helper(&p[1..], c) || (!c.is_empty() && helper(p, &c[1..])),
            Some('?') => !c.is_empty() && helper(&p[1..], &c[1..]),
            Some(ch) => c.first() == Some(ch) && helper(&p[1..], &c[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let c: Vec<char> = candidate.chars().collect();
    helper(&p, &c)
}

struct IntentOccurrence<'a> {
    path: String,
    intent: &'a str,
    node: &'a Value,
}

/// Recursively walk `obj`, recording every object that carries a string
/// `intent` field, alongside its JSON-Pointer-like path.
fn collect_intents<'a>(obj: &'a Value, base_path: &str) -> Vec<IntentOccurrence<'a>> {
    let mut found = Vec::new();
    walk_intents(obj, base_path, &mut found);
    found
}

fn walk_intents<'a>(value: &'a Value, path: &str, out: &mut Vec<IntentOccurrence<'a>>) {
    match value {
        Value::Object(map) => {
            if let Some(intent) = map.get("intent").and_then(Value::as_str) {
                out.push(IntentOccurrence {
                    path: path.to_string(),
                    intent,
                    node: value,
                });
            }
            for (k, v) in map {
                walk_intents(v, &join_pointer(path, k), out);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk_intents(item, &join_pointer(path, &i.to_string()), out);
            }
        }
        _ => {}
    }
}

fn join_pointer(base: &str, key: &str) -> String {
    format!("{base}/{key}")
}

fn non_empty_str_field(node: &Value, field: &str) -> bool {
    node.get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

/// Resolve a JSON-Pointer (`/a/b`) or dotted (`a.b`) path into `obj`.
/// Returns `None` when any intermediate segment is missing or not an object.
fn get_at_path<'a>(obj: &'a Value, pointer: &str) -> Option<&'a Value> {
    if pointer.is_empty() || pointer == "/" {
        return Some(obj);
    }
    let parts: Vec<&str> = if let Some(stripped) = pointer.strip_prefix('/') {
        stripped.split('/').filter(|p| !p.is_empty()).collect()
    } else {
        pointer.split('.').filter(|p| !p.is_empty()).collect()
    };
    let mut cur = obj;
    for part in parts {
        cur = cur.as_object()?.get(part)?;
    }
    Some(cur)
}

fn is_number(v: &Value) -> bool {
    v.is_number()
}

fn evaluate_field_constraint(payload: &Value, rule: &FieldConstraint, out: &mut Vec<Violation>) {
    let path = rule.path.as_str();
    let got = get_at_path(payload, path);

    match rule.op.as_str() {
        "present" | "absent" => {
            let present = matches!(got, Some(v) if !matches!(v, Value::String(s) if s.is_empty()));
            if rule.op == "present" && !present {
                out.push(Violation::new(
                    "field.missing",
                    format!("field required at {path}"),
                    path,
                ));
            }
            if rule.op == "absent" && present {
                out.push(Violation::new(
                    "field.forbidden",
                    format!("field forbidden at {path}"),
                    path,
                ));
            }
        }
        "min_len" | "max_len" => {
            let Some(got) = got else {
                out.push(Violation::new(
                    "field.missing",
                    format!("field required at {path}"),
                    path,
                ));
                return;
            };
            let len = match got {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                _ => {
                    out.push(Violation::new(
                        "type.mismatch",
                        format!("expected string or list at {path}"),
                        path,
                    ));
                    return;
                }
            };
            let Some(n) = rule.value.as_ref().and_then(Value::as_i64) else {
                out.push(Violation::new(
                    "constraint.bad_value",
                    format!("invalid value for {} at {path}", rule.op),
                    path,
                ));
                return;
            };
            let (ok, cmp) = if rule.op == "min_len" {
                (len as i64 >= n, ">=")
            } else {
                (len as i64 <= n, "<=")
            };
            if !ok {
                out.push(Violation::new(
                    "constraint.failed",
                    format!("len({path}) {cmp} {n} failed (got {len})"),
                    path,
                ));
            }
        }
        "<" | "<=" | ">" | ">=" | "==" | "!=" => {
            let want = rule.value.clone().unwrap_or(Value::Null);
            if is_number(&want) && got.is_none_or(|v| !is_number(v)) {
                out.push(Violation::new(
                    "type.mismatch",
                    format!("expected number at {path}"),
                    path,
                ));
                return;
            }
            let got_val = got.cloned().unwrap_or(Value::Null);
            let ok = match rule.op.as_str() {
                "==" => got_val == want,
                "!=" => got_val != want,
                order_op => {
                    let (Some(g), Some(w)) = (got_val.as_f64(), want.as_f64()) else {
                        out.push(Violation::new(
                            "type.mismatch",
                            format!("expected number at {path}"),
                            path,
                        ));
                        return;
                    };
                    match order_op {
                        "<" => g < w,
                        "<=" => g <= w,
                        ">" => g > w,
                        ">=" => g >= w,
                        _ => unreachable!(),
                    }
                }
            };
            if !ok {
                out.push(Violation::new(
                    "constraint.failed",
                    format!("{path} {} {want} failed (got {got_val})", rule.op),
                    path,
                ));
            }
        }
        other if !other.is_empty() => {
            out.push(Violation::new(
                "constraint.unknown_op",
                format!("unknown op '{other}' at {path}"),
                path,
            ));
        }
        _ => {}
    }
}
