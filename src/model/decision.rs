use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionKind {
    Now,
    Later,
    Never,
}

/// The caller-facing outcome of `Evaluate`. Invariant: `schedule_at` is
/// non-null iff `decision == Later` (a failsafe may still emit `Now` with
/// a null `schedule_at`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub decision: DecisionKind,
    pub score: u8,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule_at: Option<DateTime<Utc>>,
    pub audit_id: String,
}

impl Decision {
    pub fn now(score: u8, reason: impl Into<String>, audit_id: impl Into<String>) -> Self {
        Self {
            decision: DecisionKind::Now,
            score,
            reason: reason.into(),
            schedule_at: None,
            audit_id: audit_id.into(),
        }
    }

    pub fn later(
        score: u8,
        reason: impl Into<String>,
        audit_id: impl Into<String>,
        schedule_at: DateTime<Utc>,
    ) -> Self {
        Self {
            decision: DecisionKind::Later,
            score,
            reason: reason.into(),
            schedule_at: Some(schedule_at),
            audit_id: audit_id.into(),
        }
    }

    pub fn never(score: u8, reason: impl Into<String>, audit_id: impl Into<String>) -> Self {
        Self {
            decision: DecisionKind::Never,
            score,
            reason: reason.into(),
            schedule_at: None,
            audit_id: audit_id.into(),
        }
    }
}
