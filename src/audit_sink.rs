//! Audit record persistence interface (`spec.md` §6). Must never propagate
//! failure into the caller's result — the core logs and continues if the
//! write fails.

use async_trait::async_trait;
use tracing::info;

use crate::error::CoreError;
use crate::model::AuditRecord;

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn write(&self, record: &AuditRecord) -> Result<(), CoreError>;
}

/// Default sink: logs the audit record as a structured `tracing` event
/// rather than persisting it. A real deployment backs this with a
/// database or log-shipping pipeline behind the same trait — persistence
/// of audit records is an external collaborator per §1.
#[derive(Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn write(&self, record: &AuditRecord) -> Result<(), CoreError> {
        info!(
            audit_id = %record.audit_id,
            user_id = %record.user_id,
            event_type = %record.event_type,
            decision = ?record.decision,
            score = record.score,
            reason = %record.reason,
            rules_matched = ?record.rules_matched,
            "audit record"
        );
        Ok(())
    }
}
