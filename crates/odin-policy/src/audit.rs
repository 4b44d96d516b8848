// SPDX-License-Identifier: MIT OR Apache-2.0
//! Audit trail for HEL policy decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{HELPolicyEngine, PolicyResult};

/// A single recorded policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the evaluation happened.
    pub timestamp: DateTime<Utc>,
    /// Caller-supplied label for what was evaluated (route, map id, ...).
    pub subject: String,
    /// Whether the payload was allowed through.
    pub allowed: bool,
    /// Violation codes found, if any.
    pub violation_codes: Vec<String>,
}

/// Aggregate counts of policy decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuditSummary {
    /// Evaluations that produced no violations.
    pub allowed: usize,
    /// Evaluations that produced at least one violation.
    pub denied: usize,
}

/// Wraps a [`HELPolicyEngine`] and records every content-stage decision for
/// later inspection (e.g. surfacing through an admin/debug endpoint).
pub struct PolicyAuditor {
    engine: HELPolicyEngine,
    log: Vec<AuditEntry>,
}

impl PolicyAuditor {
    /// Create a new auditor around the given engine.
    #[must_use]
    pub fn new(engine: HELPolicyEngine) -> Self {
        Self {
            engine,
            log: Vec::new(),
        }
    }

    /// Evaluate `payload` under `subject`'s label, recording the result.
    pub fn evaluate(&mut self, subject: &str, payload: &Value) -> PolicyResult {
        let result = self.engine.evaluate(payload);
        self.log.push(AuditEntry {
            timestamp: Utc::now(),
            subject: subject.to_string(),
            allowed: result.allowed,
            violation_codes: result.violations.iter().map(|v| v.code.clone()).collect(),
        });
        result
    }

    /// All recorded entries in chronological order.
    #[must_use]
    pub fn entries(&self) -> &[AuditEntry] {
        &self.log
    }

    /// Produce an aggregate summary of all recorded decisions.
    #[must_use]
    pub fn summary(&self) -> AuditSummary {
        let mut s = AuditSummary::default();
        for e in &self.log {
            if e.allowed {
                s.allowed += 1;
            } else {
                s.denied += 1;
            }
        }
        s
    }
}
