//! Sliding-window fatigue accounting (`spec.md` §4.6).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock::Clock;
use crate::kv::KvStore;
use crate::model::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FatigueLevel {
    Low,
    Medium,
    High,
    Maxed,
    Unknown,
}

impl FatigueLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueLevel::Low => "LOW",
            FatigueLevel::Medium => "MEDIUM",
            FatigueLevel::High => "HIGH",
            FatigueLevel::Maxed => "MAXED",
            FatigueLevel::Unknown => "UNKNOWN",
        }
    }

    fn from_penalty(penalty: u8) -> Self {
        match penalty {
            0 => FatigueLevel::Low,
            p if p <= 10 => FatigueLevel::Medium,
            p if p <= 20 => FatigueLevel::High,
            _ => FatigueLevel::Maxed,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FatigueState {
    pub count: u64,
    pub penalty: u8,
    pub level: FatigueLevel,
}

/// Cap + window configuration. All three caps are independently
/// configurable; defaults match `spec.md` §4.6.
#[derive(Debug, Clone)]
pub struct FatigueCaps {
    pub total_count: u32,
    pub total_window_ms: i64,
    pub per_source_count: u32,
    pub per_source_window_ms: i64,
    pub promo_count: u32,
    pub promo_window_ms: i64,
}

impl Default for FatigueCaps {
    fn default() -> Self {
        Self {
            total_count: 5,
            total_window_ms: 3_600_000,
            per_source_count: 2,
            per_source_window_ms: 3_600_000,
            promo_count: 1,
            promo_window_ms: 14_400_000,
        }
    }
}

/// Counter entries are kept alive for 4 hours regardless of window, so a
/// counter that has just fallen out of its own sliding window is still
/// available for diagnostics/replay before it's pruned on next write.
const COUNTER_TTL_SECONDS: u64 = 4 * 60 * 60;

pub struct FatigueAccountant {
    kv: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    caps: FatigueCaps,
}

fn penalty_for_ratio(count: u64, cap_total: u32) -> u8 {
    let ratio = if cap_total == 0 {
        f64::INFINITY
    } else {
        count as f64 / cap_total as f64
    };

    // Non-mutually-exclusive branches, evaluated highest-ratio-first per
    // spec.md §9's design note — do not reorder.
    if ratio >= 1.0 {
        30
    } else if ratio >= 0.8 {
        20
    } else if ratio >= 0.5 {
        10
    } else if count >= 2 {
        5
    } else {
        0
    }
}

impl FatigueAccountant {
    pub fn new(kv: Arc<dyn KvStore>, clock: Arc<dyn Clock>, caps: FatigueCaps) -> Self {
        Self { kv, clock, caps }
    }

    fn total_key(user_id: &str) -> String {
        format!("freq:{user_id}:total")
    }

    fn source_key(user_id: &str, source: &str) -> String {
        format!("freq:{user_id}:{source}")
    }

    fn promo_key(user_id: &str) -> String {
        format!("freq:{user_id}:promo")
    }

    /// Reads the total-counter window only; the penalty curve is derived
    /// from `total` alone even though per-source/promo counters are
    /// tracked independently (per §4.6).
    pub async fn read_fatigue(&self, user_id: &str) -> FatigueState {
        let now_ms = self.clock.now_ms();
        let cutoff = now_ms - self.caps.total_window_ms;
        let key = Self::total_key(user_id);

        match self.kv.zrange_by_score_count(&key, cutoff, now_ms).await {
            Ok(count) => {
                let penalty = penalty_for_ratio(count, self.caps.total_count);
                FatigueState {
                    count,
                    penalty,
                    level: FatigueLevel::from_penalty(penalty),
                }
            }
            Err(e) => {
                warn!(error = %e, "fatigue counter read failed, failing open");
                FatigueState {
                    count: 0,
                    penalty: 0,
                    level: FatigueLevel::Unknown,
                }
            }
        }
    }

    /// Writes counter entries for the total key, the per-source key, and
    /// (for promo event types) the promo key. Called only on NOW/LATER
    /// outcomes and the CRITICAL short-circuit. Write failures are logged
    /// and swallowed.
    pub async fn record(&self, event: &Event) {
        let now_ms = self.clock.now_ms();
        let member = format!("{now_ms}:{}", event.event_type);

        self.bump_window(
            &Self::total_key(&event.user_id),
            now_ms,
            &member,
            self.caps.total_window_ms,
        )
        .await;

        self.bump_window(
            &Self::source_key(&event.user_id, &event.source),
            now_ms,
            &member,
            self.caps.per_source_window_ms,
        )
        .await;

        if event.is_promo() {
            self.bump_window(
                &Self::promo_key(&event.user_id),
                now_ms,
                &member,
                self.caps.promo_window_ms,
            )
            .await;
        }
    }

    async fn bump_window(&self, key: &str, now_ms: i64, member: &str, window_ms: i64) {
        if let Err(e) = self.kv.zadd(key, now_ms, member).await {
            warn!(error = %e, key, "fatigue counter write failed, swallowing");
            return;
        }
        if let Err(e) = self.kv.expire(key, COUNTER_TTL_SECONDS).await {
            warn!(error = %e, key, "fatigue counter ttl write failed, swallowing");
        }
        let cutoff = now_ms - window_ms;
        if let Err(e) = self.kv.zrem_by_score(key, i64::MIN, cutoff).await {
            warn!(error = %e, key, "fatigue counter prune failed, swallowing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::kv::MemoryKv;
    use crate::model::{Channel, PriorityHint};
    use chrono::Utc;

    fn make_event(source: &str) -> Event {
        Event {
            user_id: "u1".to_string(),
            event_type: "system_update".to_string(),
            message: "hi".to_string(),
            source: source.to_string(),
            priority_hint: PriorityHint::Medium,
            channel: Channel::Push,
            timestamp: Utc::now(),
            dedupe_key: None,
            expires_at: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn penalty_curve_thresholds() {
        assert_eq!(penalty_for_ratio(5, 5), 30); // ratio 1.0
        assert_eq!(penalty_for_ratio(4, 5), 20); // ratio 0.8
        assert_eq!(penalty_for_ratio(3, 6), 10); // ratio 0.5
        assert_eq!(penalty_for_ratio(2, 10), 5); // count >= 2, low ratio
        assert_eq!(penalty_for_ratio(1, 10), 0);
    }

    #[tokio::test]
    async fn five_events_in_an_hour_maxes_out_fatigue() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let accountant = FatigueAccountant::new(kv, clock.clone(), FatigueCaps::default());

        for _ in 0..5 {
            let event = make_event("svc-a");
            accountant.record(&event).await;
            clock.advance(chrono::Duration::seconds(1));
        }

        let state = accountant.read_fatigue("u1").await;
        assert_eq!(state.count, 5);
        assert_eq!(state.penalty, 30);
        assert_eq!(state.level, FatigueLevel::Maxed);
    }

    #[tokio::test]
    async fn counters_outside_window_are_pruned() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let clock = Arc::new(FixedClock::new(Utc::now()));
        let accountant = FatigueAccountant::new(kv, clock.clone(), FatigueCaps::default());

        accountant.record(&make_event("svc-a")).await;
        clock.advance(chrono::Duration::hours(2));
        accountant.record(&make_event("svc-a")).await;

        let state = accountant.read_fatigue("u1").await;
        assert_eq!(state.count, 1);
    }
}
