use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied urgency hint. Defaults to `Medium` when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityHint {
    Critical,
    High,
    Medium,
    Low,
}

impl Default for PriorityHint {
    fn default() -> Self {
        PriorityHint::Medium
    }
}

/// Delivery channel the event was submitted for. Defaults to `push`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Push,
    Email,
    Sms,
    #[serde(rename = "in-app")]
    InApp,
}

impl Default for Channel {
    fn default() -> Self {
        Channel::Push
    }
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Push => "push",
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::InApp => "in-app",
        }
    }
}

fn default_source() -> String {
    "unknown".to_string()
}

fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// The input to the pipeline. See `spec.md` §3 for field semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub user_id: String,
    pub event_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub priority_hint: PriorityHint,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default = "now_utc")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub dedupe_key: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Pre-core validation. This is the 400-class boundary check called by
    /// the HTTP adapter before an event ever reaches `Orchestrator::evaluate`
    /// — the core itself assumes well-formed input.
    pub fn validate(&self) -> Result<(), String> {
        if self.user_id.trim().is_empty() {
            return Err("user_id is required".to_string());
        }
        if self.event_type.trim().is_empty() {
            return Err("event_type is required".to_string());
        }
        Ok(())
    }

    pub fn is_promo(&self) -> bool {
        matches!(self.event_type.as_str(), "promotion" | "low_value_promo")
    }
}
