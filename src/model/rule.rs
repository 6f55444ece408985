use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleAction {
    Defer,
    Suppress,
    SendNow,
    Cap,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

impl RuleCondition {
    /// Wildcard `"*"` or an absent field matches any value; otherwise
    /// field-by-field equality (`spec.md` §4.3) — no case-folding.
    fn field_matches(condition: Option<&str>, actual: &str) -> bool {
        match condition {
            None => true,
            Some(c) if c == "*" => true,
            Some(c) => c == actual,
        }
    }

    pub fn matches(&self, event_type: &str, channel: &str, source: &str, priority: &str) -> bool {
        Self::field_matches(self.event_type.as_deref(), event_type)
            && Self::field_matches(self.channel.as_deref(), channel)
            && Self::field_matches(self.source.as_deref(), source)
            && Self::field_matches(self.priority.as_deref(), priority)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMaxPer {
    pub count: u32,
    /// Window in seconds.
    pub window: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub rule_id: String,
    #[serde(default)]
    pub condition: RuleCondition,
    pub action: RuleAction,
    #[serde(default)]
    pub max_per: Option<RuleMaxPer>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_action_wire_tokens_match_spec() {
        assert_eq!(serde_json::to_string(&RuleAction::Defer).unwrap(), "\"DEFER\"");
        assert_eq!(serde_json::to_string(&RuleAction::Suppress).unwrap(), "\"SUPPRESS\"");
        assert_eq!(serde_json::to_string(&RuleAction::SendNow).unwrap(), "\"SEND_NOW\"");
        assert_eq!(serde_json::to_string(&RuleAction::Cap).unwrap(), "\"CAP\"");

        assert_eq!(
            serde_json::from_str::<RuleAction>("\"SEND_NOW\"").unwrap(),
            RuleAction::SendNow
        );
        assert_eq!(serde_json::from_str::<RuleAction>("\"DEFER\"").unwrap(), RuleAction::Defer);
        assert_eq!(
            serde_json::from_str::<RuleAction>("\"SUPPRESS\"").unwrap(),
            RuleAction::Suppress
        );
        assert_eq!(serde_json::from_str::<RuleAction>("\"CAP\"").unwrap(), RuleAction::Cap);
    }

    #[test]
    fn condition_matching_is_exact_equality_not_case_insensitive() {
        let condition = RuleCondition {
            source: Some("marketing-svc".to_string()),
            ..Default::default()
        };
        assert!(condition.matches("promotion", "push", "marketing-svc", "MEDIUM"));
        assert!(!condition.matches("promotion", "push", "Marketing-Svc", "MEDIUM"));
        assert!(!condition.matches("promotion", "push", "MARKETING-SVC", "MEDIUM"));
    }

    #[test]
    fn wildcard_and_absent_condition_fields_match_anything() {
        let condition = RuleCondition::default();
        assert!(condition.matches("anything", "push", "any-source", "LOW"));

        let wildcard = RuleCondition {
            event_type: Some("*".to_string()),
            ..Default::default()
        };
        assert!(wildcard.matches("security_alert", "sms", "auth-svc", "CRITICAL"));
    }
}
