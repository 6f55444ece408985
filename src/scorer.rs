//! Composite scoring function (`spec.md` §4.5).

use chrono::{DateTime, Utc};

use crate::model::{Channel, Event, PriorityHint};

fn priority_score(priority: PriorityHint) -> i32 {
    match priority {
        PriorityHint::Critical => 40,
        PriorityHint::High => 25,
        PriorityHint::Medium => 15,
        PriorityHint::Low => 5,
    }
}

fn event_type_score(event_type: &str) -> i32 {
    match event_type {
        "security_alert" => 30,
        "direct_message" => 25,
        "payment_alert" => 28,
        "reminder" => 20,
        "system_alert" => 18,
        "system_update" => 10,
        "promotion" => 5,
        "low_value_promo" => 2,
        "digest" => 3,
        _ => 5,
    }
}

fn channel_score(channel: Channel) -> i32 {
    match channel {
        Channel::Sms => 10,
        Channel::Push => 8,
        Channel::Email => 5,
        Channel::InApp => 3,
    }
}

/// Freshness points by age in minutes since `event.timestamp`.
fn freshness_score(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    let age_minutes = (now - timestamp).num_minutes();
    if age_minutes < 1 {
        10
    } else if age_minutes < 5 {
        8
    } else if age_minutes < 15 {
        5
    } else if age_minutes < 60 {
        2
    } else {
        0
    }
}

/// `base = priority + event_type + channel + freshness`, clamped to
/// `[0, 75]`.
pub fn compute_base(event: &Event, now: DateTime<Utc>) -> u8 {
    let base = priority_score(event.priority_hint)
        + event_type_score(&event.event_type)
        + channel_score(event.channel)
        + freshness_score(event.timestamp, now);
    base.clamp(0, 75) as u8
}

/// `final = clamp(0, 100, base - fatigue_penalty + ai_adjustment)`.
pub fn compute_final_score(base: u8, fatigue_penalty: u8, ai_adjustment: i32) -> u8 {
    let score = base as i32 - fatigue_penalty as i32 + ai_adjustment;
    score.clamp(0, 100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, Event, PriorityHint};

    fn make_event(priority: PriorityHint, event_type: &str, channel: Channel) -> Event {
        Event {
            user_id: "u1".to_string(),
            event_type: event_type.to_string(),
            message: String::new(),
            source: "svc".to_string(),
            priority_hint: priority,
            channel,
            timestamp: Utc::now(),
            dedupe_key: None,
            expires_at: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn base_score_is_bounded_at_75() {
        let event = make_event(PriorityHint::Critical, "security_alert", Channel::Sms);
        let base = compute_base(&event, Utc::now());
        assert_eq!(base, 75); // 40 + 30 + 10 + 10 = 90, clamped to 75
    }

    #[test]
    fn stale_low_priority_event_scores_low() {
        let mut event = make_event(PriorityHint::Low, "digest", Channel::InApp);
        event.timestamp = Utc::now() - chrono::Duration::hours(3);
        let base = compute_base(&event, Utc::now());
        assert_eq!(base, 5 + 3 + 3 + 0);
    }

    #[test]
    fn final_score_clamps_to_0_and_100() {
        assert_eq!(compute_final_score(10, 30, -10), 0);
        assert_eq!(compute_final_score(75, 0, 15), 90);
        assert_eq!(compute_final_score(75, 0, 100), 100);
    }
}
