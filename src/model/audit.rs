use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::DecisionKind;

/// Append-only, one per `Evaluate` call. Written before `Evaluate` returns,
/// even on failsafe (invariant I2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: String,
    pub event_id: String,
    pub user_id: String,
    pub event_type: String,
    pub decision: DecisionKind,
    pub score: u8,
    pub reason: String,
    pub stages: HashMap<String, String>,
    pub rules_matched: Vec<String>,
    pub schedule_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
