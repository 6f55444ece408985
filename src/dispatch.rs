//! Deferred-dispatch interface (`spec.md` §6). Failure is logged but not
//! surfaced — `LATER` is returned to the caller regardless of whether the
//! submission succeeded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::CoreError;
use crate::model::Event;

#[async_trait]
pub trait DeferredDispatch: Send + Sync {
    async fn schedule(
        &self,
        event: &Event,
        schedule_at: DateTime<Utc>,
        audit_id: &str,
    ) -> Result<(), CoreError>;
}

/// Default dispatcher: logs the deferred submission rather than enqueuing
/// onto a broker. Durable queueing of deferred events is explicitly a
/// Non-goal (§1) — the core only needs to produce the scheduled timestamp
/// and hand it to this interface.
#[derive(Default)]
pub struct TracingDispatch;

#[async_trait]
impl DeferredDispatch for TracingDispatch {
    async fn schedule(
        &self,
        event: &Event,
        schedule_at: DateTime<Utc>,
        audit_id: &str,
    ) -> Result<(), CoreError> {
        info!(
            audit_id,
            user_id = %event.user_id,
            event_type = %event.event_type,
            %schedule_at,
            "deferred dispatch scheduled"
        );
        Ok(())
    }
}
