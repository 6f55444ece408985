//! Timeout-capped AI enrichment client (`spec.md` §4.7).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;
use crate::model::Event;

pub const AI_DEADLINE: Duration = Duration::from_millis(200);

#[async_trait]
pub trait AiClient: Send + Sync {
    /// Returns an adjustment in `[-10, +15]`. Implementations are expected
    /// to respect the 200ms deadline themselves when they can (e.g. an HTTP
    /// client setting its own request timeout); the orchestrator also
    /// wraps every call in `tokio::time::timeout` as a backstop.
    async fn get_ai_score(&self, event: &Event, now: DateTime<Utc>) -> Result<i32, CoreError>;
}

/// Runs `client.get_ai_score` under the 200ms deadline. On timeout or HTTP
/// fault, returns `(0, "SKIPPED (<reason>)")` rather than propagating —
/// per §4.7 and §7, AI faults are soft.
pub async fn get_ai_score_with_deadline(
    client: &dyn AiClient,
    event: &Event,
    now: DateTime<Utc>,
) -> (i32, Option<String>) {
    match tokio::time::timeout(AI_DEADLINE, client.get_ai_score(event, now)).await {
        Ok(Ok(adjustment)) => (adjustment.clamp(-10, 15), None),
        Ok(Err(e)) => {
            warn!(error = %e, "ai enrichment call failed, skipping");
            (0, Some(format!("SKIPPED ({e})")))
        }
        Err(_) => {
            warn!("ai enrichment call timed out, skipping");
            (0, Some("SKIPPED (timeout)".to_string()))
        }
    }
}

fn mock_base_adjustment(event_type: &str) -> i32 {
    match event_type {
        "security_alert" => 12,
        "direct_message" => 10,
        "payment_alert" => 11,
        "reminder" => 8,
        "system_update" => 2,
        "promotion" => -5,
        "low_value_promo" => -8,
        _ => 0,
    }
}

/// Deterministic-ish mock used when no AI endpoint is configured: a base
/// per event type plus uniform noise in `[-3, +2]`, clamped to
/// `[-10, +15]`.
pub struct MockAiClient;

#[async_trait]
impl AiClient for MockAiClient {
    async fn get_ai_score(&self, event: &Event, _now: DateTime<Utc>) -> Result<i32, CoreError> {
        let base = mock_base_adjustment(&event.event_type);
        let noise = rand::thread_rng().gen_range(-3..=2);
        Ok((base + noise).clamp(-10, 15))
    }
}

#[derive(Debug, Serialize)]
struct AiRequest<'a> {
    user_id: &'a str,
    event_type: &'a str,
    channel: &'a str,
    source: &'a str,
    hour_of_day: u32,
}

#[derive(Debug, Deserialize)]
struct AiResponse {
    score_adjustment: i32,
}

/// HTTP-backed `AiClient` per §6's endpoint contract.
pub struct HttpAiClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAiClient {
    pub fn new(endpoint: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(AI_DEADLINE)
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl AiClient for HttpAiClient {
    async fn get_ai_score(&self, event: &Event, now: DateTime<Utc>) -> Result<i32, CoreError> {
        let body = AiRequest {
            user_id: &event.user_id,
            event_type: &event.event_type,
            channel: event.channel.as_str(),
            source: &event.source,
            hour_of_day: now.hour(),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::AiHttp(e.to_string()))?
            .json::<AiResponse>()
            .await
            .map_err(|e| CoreError::AiHttp(e.to_string()))?;
        Ok(response.score_adjustment.clamp(-10, 15))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, PriorityHint};

    fn make_event(event_type: &str) -> Event {
        Event {
            user_id: "u1".to_string(),
            event_type: event_type.to_string(),
            message: String::new(),
            source: "svc".to_string(),
            priority_hint: PriorityHint::Medium,
            channel: Channel::Push,
            timestamp: Utc::now(),
            dedupe_key: None,
            expires_at: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn mock_client_stays_within_bounds() {
        let client = MockAiClient;
        for event_type in ["security_alert", "promotion", "low_value_promo", "unknown"] {
            let (adj, skipped) =
                get_ai_score_with_deadline(&client, &make_event(event_type), Utc::now()).await;
            assert!(skipped.is_none());
            assert!((-10..=15).contains(&adj));
        }
    }

    struct SlowClient;

    #[async_trait]
    impl AiClient for SlowClient {
        async fn get_ai_score(&self, _event: &Event, _now: DateTime<Utc>) -> Result<i32, CoreError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(15)
        }
    }

    #[tokio::test]
    async fn slow_client_is_skipped_with_zero_adjustment() {
        let client = SlowClient;
        let (adj, skipped) =
            get_ai_score_with_deadline(&client, &make_event("reminder"), Utc::now()).await;
        assert_eq!(adj, 0);
        assert!(skipped.unwrap().contains("SKIPPED"));
    }
}
