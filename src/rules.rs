//! Hot-reloaded rules matcher (`spec.md` §4.3).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{Event, Rule};

/// A rules backing store — a file or equivalent returning the list of
/// `Rule` records described in `spec.md` §3.
#[async_trait]
pub trait RulesStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Rule>, CoreError>;
}

/// JSON-file-backed rules store. Parse failure is the caller's problem to
/// fall back on (the matcher keeps its last snapshot); this store just
/// reports the fault.
pub struct FileRulesStore {
    path: PathBuf,
}

impl FileRulesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RulesStore for FileRulesStore {
    async fn load(&self) -> Result<Vec<Rule>, CoreError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CoreError::RulesLoad(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str::<Vec<Rule>>(&contents)
            .map_err(|e| CoreError::RulesLoad(format!("{}: {e}", self.path.display())))
    }
}

/// Hot-reloaded, process-wide rules cache. The snapshot is swapped
/// atomically by a background reload task (§5's "Shared state" note) —
/// readers always see either the old or the new snapshot, never a torn
/// one.
pub struct RulesMatcher {
    snapshot: ArcSwap<Vec<Rule>>,
}

impl Default for RulesMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RulesMatcher {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Rule>> {
        self.snapshot.load_full()
    }

    /// Reloads from the backing store. On failure, logs and leaves the
    /// previous snapshot in effect.
    pub async fn reload(&self, store: &dyn RulesStore) {
        match store.load().await {
            Ok(rules) => {
                debug!(count = rules.len(), "rules snapshot reloaded");
                self.snapshot.store(Arc::new(rules));
            }
            Err(e) => {
                warn!(error = %e, "rules reload failed, retaining previous snapshot");
            }
        }
    }

    /// Returns the subset of enabled rules whose conditions all match,
    /// sorted by priority descending, stable on ties.
    pub fn match_rules(&self, event: &Event) -> Vec<Rule> {
        let snapshot = self.snapshot.load();
        let mut matched: Vec<Rule> = snapshot
            .iter()
            .filter(|r| r.enabled)
            .filter(|r| {
                r.condition.matches(
                    &event.event_type,
                    event.channel.as_str(),
                    &event.source,
                    priority_str(event.priority_hint),
                )
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.priority.cmp(&a.priority));
        matched
    }
}

fn priority_str(priority: crate::model::PriorityHint) -> &'static str {
    use crate::model::PriorityHint::*;
    match priority {
        Critical => "CRITICAL",
        High => "HIGH",
        Medium => "MEDIUM",
        Low => "LOW",
    }
}

/// Spawns the 30-second reload loop (§4.3, §6). Returns the `JoinHandle`
/// so callers can abort it on shutdown.
pub fn spawn_reload_task(
    matcher: Arc<RulesMatcher>,
    store: Arc<dyn RulesStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            matcher.reload(store.as_ref()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Channel, PriorityHint, RuleAction, RuleCondition};
    use chrono::Utc;

    fn make_event(event_type: &str, source: &str) -> Event {
        Event {
            user_id: "u1".to_string(),
            event_type: event_type.to_string(),
            message: String::new(),
            source: source.to_string(),
            priority_hint: PriorityHint::Medium,
            channel: Channel::Push,
            timestamp: Utc::now(),
            dedupe_key: None,
            expires_at: None,
            metadata: Default::default(),
        }
    }

    struct StaticStore(Vec<Rule>);

    #[async_trait]
    impl RulesStore for StaticStore {
        async fn load(&self) -> Result<Vec<Rule>, CoreError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn wildcard_conditions_match_anything() {
        let matcher = RulesMatcher::new();
        let rule = Rule {
            rule_id: "r1".to_string(),
            condition: RuleCondition {
                event_type: Some("*".to_string()),
                channel: None,
                source: Some("noisy-svc".to_string()),
                priority: None,
            },
            action: RuleAction::Suppress,
            max_per: None,
            priority: 10,
            enabled: true,
        };
        matcher.reload(&StaticStore(vec![rule])).await;

        let matched = matcher.match_rules(&make_event("promotion", "noisy-svc"));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].rule_id, "r1");

        let no_match = matcher.match_rules(&make_event("promotion", "other-svc"));
        assert!(no_match.is_empty());
    }

    #[tokio::test]
    async fn matches_are_sorted_by_priority_descending() {
        let matcher = RulesMatcher::new();
        let low = Rule {
            rule_id: "low".to_string(),
            condition: RuleCondition::default(),
            action: RuleAction::Defer,
            max_per: None,
            priority: 1,
            enabled: true,
        };
        let high = Rule {
            rule_id: "high".to_string(),
            condition: RuleCondition::default(),
            action: RuleAction::Cap,
            max_per: None,
            priority: 5,
            enabled: true,
        };
        matcher
            .reload(&StaticStore(vec![low.clone(), high.clone()]))
            .await;

        let matched = matcher.match_rules(&make_event("anything", "anywhere"));
        assert_eq!(matched[0].rule_id, "high");
        assert_eq!(matched[1].rule_id, "low");
    }

    #[tokio::test]
    async fn disabled_rules_never_match() {
        let matcher = RulesMatcher::new();
        let rule = Rule {
            rule_id: "r1".to_string(),
            condition: RuleCondition::default(),
            action: RuleAction::Suppress,
            max_per: None,
            priority: 10,
            enabled: false,
        };
        matcher.reload(&StaticStore(vec![rule])).await;
        assert!(matcher.match_rules(&make_event("x", "y")).is_empty());
    }

    #[tokio::test]
    async fn reload_failure_keeps_previous_snapshot() {
        struct FailingStore;
        #[async_trait]
        impl RulesStore for FailingStore {
            async fn load(&self) -> Result<Vec<Rule>, CoreError> {
                Err(CoreError::RulesLoad("boom".to_string()))
            }
        }

        let matcher = RulesMatcher::new();
        let rule = Rule {
            rule_id: "keep-me".to_string(),
            condition: RuleCondition::default(),
            action: RuleAction::Suppress,
            max_per: None,
            priority: 1,
            enabled: true,
        };
        matcher.reload(&StaticStore(vec![rule])).await;
        matcher.reload(&FailingStore).await;

        let matched = matcher.match_rules(&make_event("x", "y"));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].rule_id, "keep-me");
    }

    #[tokio::test]
    async fn file_rules_store_loads_valid_json() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"[{"rule_id": "r1", "condition": {"source": "noisy-svc"}, "action": "SUPPRESS", "priority": 5, "enabled": true}]"#,
        )
        .unwrap();

        let store = FileRulesStore::new(file.path());
        let rules = store.load().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_id, "r1");
    }

    #[tokio::test]
    async fn file_rules_store_reports_fault_on_malformed_json() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "not json").unwrap();

        let store = FileRulesStore::new(file.path());
        assert!(store.load().await.is_err());
    }

    #[tokio::test]
    async fn matcher_reload_from_file_retains_previous_snapshot_on_later_parse_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"[{"rule_id": "keep-me", "condition": {}, "action": "SUPPRESS", "priority": 1, "enabled": true}]"#,
        )
        .unwrap();
        let store: Arc<dyn RulesStore> = Arc::new(FileRulesStore::new(file.path()));

        let matcher = RulesMatcher::new();
        matcher.reload(store.as_ref()).await;
        assert_eq!(matcher.match_rules(&make_event("x", "y")).len(), 1);

        std::fs::write(file.path(), "{ broken").unwrap();
        matcher.reload(store.as_ref()).await;
        let matched = matcher.match_rules(&make_event("x", "y"));
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].rule_id, "keep-me");
    }
}
