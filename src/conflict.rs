//! Urgency-vs-fatigue arbitration (`spec.md` §4.8). Applied after the
//! final score is computed but before the threshold boundary. A pure
//! function of `(priority_hint, fatigue_level, source, final_score)` —
//! design intent is that important traffic colliding with fatigue is
//! deferred, never dropped, and unimportant traffic that scores high
//! under fatigue is also deferred rather than sent.

use chrono::{DateTime, Duration, Utc};

use crate::fatigue::FatigueLevel;
use crate::model::{DecisionKind, PriorityHint};

pub const NOISY_SOURCES: &[&str] = &[
    "marketing-svc",
    "promo-service",
    "analytics-alerts",
    "noisy-svc",
    "bulk-sender",
];

const SHORT_DEFER_MINUTES: i64 = 15;

pub struct ConflictOutcome {
    pub decision: DecisionKind,
    pub reason: String,
    pub schedule_at: Option<DateTime<Utc>>,
}

/// Returns `Some(outcome)` if one of the four documented conflict rules
/// applies (first match wins), `None` if the threshold boundary should
/// decide instead.
pub fn resolve(
    priority_hint: PriorityHint,
    fatigue_level: FatigueLevel,
    source: &str,
    final_score: u8,
    now: DateTime<Utc>,
) -> Option<ConflictOutcome> {
    let short_defer = || now + Duration::minutes(SHORT_DEFER_MINUTES);

    if priority_hint == PriorityHint::High && fatigue_level == FatigueLevel::Maxed {
        return Some(ConflictOutcome {
            decision: DecisionKind::Later,
            reason: "CONFLICT: HIGH priority colliding with MAXED fatigue, deferred 15m"
                .to_string(),
            schedule_at: Some(short_defer()),
        });
    }

    if priority_hint == PriorityHint::High
        && fatigue_level == FatigueLevel::High
        && NOISY_SOURCES.contains(&source)
    {
        return Some(ConflictOutcome {
            decision: DecisionKind::Later,
            reason: format!(
                "CONFLICT: HIGH priority from noisy source '{source}' colliding with HIGH fatigue, deferred 15m"
            ),
            schedule_at: Some(short_defer()),
        });
    }

    if priority_hint == PriorityHint::Medium && fatigue_level == FatigueLevel::Maxed {
        return Some(ConflictOutcome {
            decision: DecisionKind::Never,
            reason: "CONFLICT: MEDIUM priority suppressed under MAXED fatigue".to_string(),
            schedule_at: None,
        });
    }

    if priority_hint == PriorityHint::Low && final_score >= 60 && fatigue_level == FatigueLevel::Maxed {
        return Some(ConflictOutcome {
            decision: DecisionKind::Later,
            reason: "CONFLICT: LOW priority scored high under MAXED fatigue, deferred 15m"
                .to_string(),
            schedule_at: Some(short_defer()),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn high_priority_maxed_fatigue_defers() {
        let outcome = resolve(PriorityHint::High, FatigueLevel::Maxed, "any-svc", 70, t()).unwrap();
        assert_eq!(outcome.decision, DecisionKind::Later);
        assert_eq!(outcome.schedule_at.unwrap(), t() + Duration::minutes(15));
    }

    #[test]
    fn high_priority_high_fatigue_from_noisy_source_defers() {
        let outcome =
            resolve(PriorityHint::High, FatigueLevel::High, "marketing-svc", 70, t()).unwrap();
        assert_eq!(outcome.decision, DecisionKind::Later);
    }

    #[test]
    fn high_priority_high_fatigue_from_normal_source_does_not_resolve() {
        assert!(resolve(PriorityHint::High, FatigueLevel::High, "app-svc", 70, t()).is_none());
    }

    #[test]
    fn medium_priority_maxed_fatigue_is_suppressed() {
        let outcome = resolve(PriorityHint::Medium, FatigueLevel::Maxed, "svc", 50, t()).unwrap();
        assert_eq!(outcome.decision, DecisionKind::Never);
    }

    #[test]
    fn low_priority_high_score_maxed_fatigue_defers() {
        let outcome = resolve(PriorityHint::Low, FatigueLevel::Maxed, "svc", 65, t()).unwrap();
        assert_eq!(outcome.decision, DecisionKind::Later);
    }

    #[test]
    fn low_priority_low_score_maxed_fatigue_does_not_resolve() {
        assert!(resolve(PriorityHint::Low, FatigueLevel::Maxed, "svc", 40, t()).is_none());
    }

    #[test]
    fn unaffected_combination_does_not_resolve() {
        assert!(resolve(PriorityHint::Medium, FatigueLevel::Low, "svc", 80, t()).is_none());
    }
}
