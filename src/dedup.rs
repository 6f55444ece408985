//! Exact-plus-near-duplicate detector (`spec.md` §4.2).

use std::sync::Arc;

use tracing::warn;

use crate::clock::Clock;
use crate::hashing::{build_fingerprint, hamming_distance, simhash};
use crate::kv::KvStore;
use crate::model::Event;

/// 10-minute sliding window for near-duplicate SimHash lookups. The
/// original source computed the prune cutoff as
/// `now - NEAR_DUP_WINDOW_SECS * 1000`, i.e. treating an already-in-seconds
/// constant as milliseconds again — a ~7-day cutoff that effectively
/// disabled pruning. This reimplementation keeps the intended 10-minute
/// window; see DESIGN.md for the preserved-vs-fixed distinction.
const NEAR_DUP_WINDOW_SECS: i64 = 600;
const HAMMING_THRESHOLD: u32 = 5;
const MIN_MESSAGE_LEN_FOR_NEAR_DUP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKind {
    ExactKey,
    ExactFingerprint,
    NearDuplicate,
}

impl DuplicateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateKind::ExactKey => "EXACT_KEY",
            DuplicateKind::ExactFingerprint => "EXACT_FINGERPRINT",
            DuplicateKind::NearDuplicate => "NEAR_DUPLICATE",
        }
    }
}

pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub kind: Option<DuplicateKind>,
    pub detail: String,
}

impl DuplicateCheck {
    fn clean() -> Self {
        Self {
            is_duplicate: false,
            kind: None,
            detail: "no duplicate found".to_string(),
        }
    }
}

pub struct Deduplicator {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl Deduplicator {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { kv, clock }
    }

    /// Three checks in order: exact dedupe key, exact fingerprint, near
    /// duplicate via SimHash. Any KV fault during a read is treated as
    /// "not a duplicate" (fail-open on read).
    pub async fn check_duplicate(&self, event: &Event) -> DuplicateCheck {
        if let Some(key) = &event.dedupe_key {
            let probe_key = format!("dedup:key:{key}");
            match self.kv.get(&probe_key).await {
                Ok(Some(_)) => {
                    return DuplicateCheck {
                        is_duplicate: true,
                        kind: Some(DuplicateKind::ExactKey),
                        detail: format!("Duplicate: dedupe_key '{key}' seen before"),
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "dedup key probe failed, failing open");
                }
            }
        }

        let fingerprint =
            build_fingerprint(&event.user_id, &event.event_type, &event.message, &event.source);
        let fp_key = format!("dedup:fp:{fingerprint}");
        match self.kv.get(&fp_key).await {
            Ok(Some(_)) => {
                return DuplicateCheck {
                    is_duplicate: true,
                    kind: Some(DuplicateKind::ExactFingerprint),
                    detail: format!("Duplicate: fingerprint {fingerprint} seen before"),
                };
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "dedup fingerprint probe failed, failing open");
            }
        }

        if event.message.len() < MIN_MESSAGE_LEN_FOR_NEAR_DUP {
            return DuplicateCheck::clean();
        }

        let current_hash = simhash(&event.message);
        let sim_key = format!("sim:{}:{}", event.user_id, event.event_type);
        match self.kv.zrange_all(&sim_key).await {
            Ok(stored) => {
                for member in stored {
                    if let Ok(stored_hash) = member.parse::<u64>() {
                        if hamming_distance(current_hash, stored_hash) < HAMMING_THRESHOLD {
                            return DuplicateCheck {
                                is_duplicate: true,
                                kind: Some(DuplicateKind::NearDuplicate),
                                detail: format!(
                                    "Duplicate: near-duplicate message (hamming < {HAMMING_THRESHOLD})"
                                ),
                            };
                        }
                    }
                }
                DuplicateCheck::clean()
            }
            Err(e) => {
                warn!(error = %e, "near-duplicate probe failed, failing open");
                DuplicateCheck::clean()
            }
        }
    }

    /// Stores the fingerprint, dedupe key, and SimHash used for future
    /// duplicate checks. Called only on non-suppressed outcomes. Any KV
    /// fault here is logged and swallowed — the pipeline does not retry.
    pub async fn store_fingerprint(&self, event: &Event) {
        let ttl_seconds: u64 = if event.is_promo() { 86_400 } else { 600 };

        let fingerprint =
            build_fingerprint(&event.user_id, &event.event_type, &event.message, &event.source);
        let fp_key = format!("dedup:fp:{fingerprint}");
        if let Err(e) = self.kv.set(&fp_key, "1", ttl_seconds).await {
            warn!(error = %e, "failed to store fingerprint, swallowing");
        }

        if let Some(dedupe_key) = &event.dedupe_key {
            let key_key = format!("dedup:key:{dedupe_key}");
            if let Err(e) = self.kv.set(&key_key, "1", ttl_seconds).await {
                warn!(error = %e, "failed to store dedupe key, swallowing");
            }
        }

        let now_ms = self.clock.now_ms();
        let sim_key = format!("sim:{}:{}", event.user_id, event.event_type);
        let current_hash = simhash(&event.message);
        if let Err(e) = self
            .kv
            .zadd(&sim_key, now_ms, &current_hash.to_string())
            .await
        {
            warn!(error = %e, "failed to store simhash, swallowing");
            return;
        }
        if let Err(e) = self.kv.expire(&sim_key, 600).await {
            warn!(error = %e, "failed to set simhash ttl, swallowing");
        }
        let cutoff = now_ms - NEAR_DUP_WINDOW_SECS * 1000;
        if let Err(e) = self.kv.zrem_by_score(&sim_key, i64::MIN, cutoff).await {
            warn!(error = %e, "failed to prune simhash window, swallowing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::kv::MemoryKv;
    use crate::model::{Channel, PriorityHint};
    use chrono::Utc;

    fn make_event(message: &str) -> Event {
        Event {
            user_id: "u1".to_string(),
            event_type: "promotion".to_string(),
            message: message.to_string(),
            source: "mkt".to_string(),
            priority_hint: PriorityHint::Medium,
            channel: Channel::Push,
            timestamp: Utc::now(),
            dedupe_key: None,
            expires_at: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn exact_fingerprint_duplicate_is_detected() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let dedup = Deduplicator::new(kv, clock);

        let event = make_event("Big sale today across the whole store!");
        let first = dedup.check_duplicate(&event).await;
        assert!(!first.is_duplicate);
        dedup.store_fingerprint(&event).await;

        let second = dedup.check_duplicate(&event).await;
        assert!(second.is_duplicate);
        assert_eq!(second.kind, Some(DuplicateKind::ExactFingerprint));
    }

    #[tokio::test]
    async fn dedupe_key_duplicate_short_circuits_before_fingerprint() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let dedup = Deduplicator::new(kv, clock);

        let mut event = make_event("hello there friend");
        event.dedupe_key = Some("idem-1".to_string());
        dedup.store_fingerprint(&event).await;

        let result = dedup.check_duplicate(&event).await;
        assert!(result.is_duplicate);
        assert_eq!(result.kind, Some(DuplicateKind::ExactKey));
    }

    #[tokio::test]
    async fn short_messages_skip_near_duplicate_check() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let dedup = Deduplicator::new(kv, clock);

        let event = make_event("hi ok");
        let result = dedup.check_duplicate(&event).await;
        assert!(!result.is_duplicate);
    }

    #[tokio::test]
    async fn near_duplicate_messages_are_flagged() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let dedup = Deduplicator::new(kv, clock);

        let mut first = make_event("Your order has shipped and will arrive soon");
        first.event_type = "reminder".to_string();
        dedup.store_fingerprint(&first).await;

        let mut second = first.clone();
        second.message = "Your order has shipped and will arrive tomorrow".to_string();
        let result = dedup.check_duplicate(&second).await;
        assert!(result.is_duplicate);
        assert_eq!(result.kind, Some(DuplicateKind::NearDuplicate));
    }
}
