use thiserror::Error;

/// Typed fault taxonomy for the core's external collaborators. Every
/// variant here maps to a documented disposition in `spec.md` §7 — most
/// are caught and turned into a soft fallback by the component that
/// produced them, and only truly unexpected pipeline faults escape
/// `Orchestrator::evaluate` as an error (and even those are swallowed into
/// a synthetic `NOW` for `CRITICAL` events, per invariant I4).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("kv read fault: {0}")]
    KvRead(String),
    #[error("kv write fault: {0}")]
    KvWrite(String),
    #[error("ai enrichment timed out after {0}ms")]
    AiTimeout(u64),
    #[error("ai enrichment http fault: {0}")]
    AiHttp(String),
    #[error("rules backing store load fault: {0}")]
    RulesLoad(String),
    #[error("audit write fault: {0}")]
    AuditWrite(String),
    #[error("deferred dispatch fault: {0}")]
    Dispatch(String),
    #[error("unexpected pipeline fault: {0}")]
    Pipeline(String),
}
