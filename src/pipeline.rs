//! The nine-stage pipeline orchestrator (`spec.md` §4.1, §4.10).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

use crate::ai::{self, AiClient};
use crate::audit_sink::AuditSink;
use crate::clock::Clock;
use crate::conflict;
use crate::dedup::Deduplicator;
use crate::dispatch::DeferredDispatch;
use crate::dnd::DndGate;
use crate::error::CoreError;
use crate::fatigue::FatigueAccountant;
use crate::kv::KvStore;
use crate::model::{AuditRecord, Decision, DecisionKind, Event, PriorityHint, RuleAction};
use crate::rules::RulesMatcher;
use crate::scorer;

fn generate_audit_id() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("aud_{}", &raw[0..8])
}

/// Uniform deferral window per §4.9: `[2h, 5h]` for promo-ish event types,
/// `[15min, 45min]` otherwise.
fn optimal_window(event: &Event, now: DateTime<Utc>) -> DateTime<Utc> {
    let mut rng = rand::thread_rng();
    let minutes = if event.is_promo() || event.event_type == "system_update" {
        rng.gen_range(120..=300)
    } else {
        rng.gen_range(15..=45)
    };
    now + Duration::minutes(minutes)
}

/// Bundle of per-evaluate collaborators, cheap to clone (everything inside
/// is an `Arc` or a small value type) so it can move into a spawned task.
#[derive(Clone)]
struct Collaborators {
    clock: Arc<dyn Clock>,
    dedup: Arc<Deduplicator>,
    fatigue: Arc<FatigueAccountant>,
    rules: Arc<RulesMatcher>,
    dnd: DndGate,
    ai_client: Arc<dyn AiClient>,
    audit_sink: Arc<dyn AuditSink>,
    dispatch: Arc<dyn DeferredDispatch>,
}

/// Builds the audit record, writes it (swallowing failure), submits to the
/// deferred-dispatch interface when `decision == LATER` (swallowing
/// failure), and returns the decision. Every early-exit path in
/// `run_pipeline` funnels through here (§4.1).
async fn finalize(
    collab: &Collaborators,
    event: &Event,
    decision: Decision,
    stages: HashMap<String, String>,
    rules_matched: Vec<String>,
) -> Decision {
    let record = AuditRecord {
        audit_id: decision.audit_id.clone(),
        event_id: event
            .dedupe_key
            .clone()
            .unwrap_or_else(|| decision.audit_id.clone()),
        user_id: event.user_id.clone(),
        event_type: event.event_type.clone(),
        decision: decision.decision,
        score: decision.score,
        reason: decision.reason.clone(),
        stages,
        rules_matched,
        schedule_at: decision.schedule_at,
        created_at: collab.clock.now(),
    };

    if let Err(e) = collab.audit_sink.write(&record).await {
        warn!(error = %e, "audit write failed, swallowing");
    }

    if decision.decision == DecisionKind::Later {
        if let Some(at) = decision.schedule_at {
            if let Err(e) = collab.dispatch.schedule(event, at, &decision.audit_id).await {
                warn!(error = %e, "deferred dispatch failed, swallowing");
            }
        }
    }

    decision
}

/// Stages 2-9: dedup guard, CRITICAL short-circuit, rule match + SUPPRESS,
/// DND gate, scoring, fatigue, AI enrichment, conflict resolution, and the
/// decision boundary. Everything here runs inside a spawned task so an
/// unexpected panic surfaces as a `JoinError` the caller can apply the
/// failsafe policy to (§4.1, §9).
async fn run_pipeline(
    collab: Collaborators,
    event: Event,
    now: DateTime<Utc>,
    audit_id: String,
) -> Decision {
    let mut stages: HashMap<String, String> = HashMap::new();

    // Stage 2: dedup guard. CRITICAL bypasses dedup entirely (spec.md §9,
    // open question 4) — a duplicate CRITICAL event still sends.
    let dup = collab.dedup.check_duplicate(&event).await;
    if event.priority_hint != PriorityHint::Critical {
        stages.insert("dedup".to_string(), dup.detail.clone());
        if dup.is_duplicate {
            stages.insert("decision".to_string(), "NEVER (duplicate)".to_string());
            let kind = dup.kind.map(|k| k.as_str()).unwrap_or("");
            let decision = Decision::never(
                0,
                format!("Duplicate ({kind}): {}", dup.detail),
                audit_id.clone(),
            );
            return finalize(&collab, &event, decision, stages, Vec::new()).await;
        }
    } else {
        stages.insert("dedup".to_string(), "BYPASSED (critical)".to_string());
    }

    // Stage 3: CRITICAL short-circuit.
    if event.priority_hint == PriorityHint::Critical {
        collab.dedup.store_fingerprint(&event).await;
        collab.fatigue.record(&event).await;
        stages.insert("rules".to_string(), "SKIPPED (critical)".to_string());
        stages.insert("dnd".to_string(), "SKIPPED (critical)".to_string());
        stages.insert("scorer".to_string(), "SKIPPED (critical)".to_string());
        stages.insert("fatigue".to_string(), "SKIPPED (critical)".to_string());
        stages.insert("ai".to_string(), "SKIPPED (critical)".to_string());
        stages.insert("conflict".to_string(), "SKIPPED (critical)".to_string());
        stages.insert("decision".to_string(), "NOW (critical)".to_string());
        let decision = Decision::now(
            97,
            "CRITICAL priority event always sent NOW",
            audit_id.clone(),
        );
        return finalize(
            &collab,
            &event,
            decision,
            stages,
            vec!["critical-always-now".to_string()],
        )
        .await;
    }

    // Stage 4: rule match + SUPPRESS short-circuit.
    let matched = collab.rules.match_rules(&event);
    let rules_matched: Vec<String> = matched.iter().map(|r| r.rule_id.clone()).collect();
    stages.insert("rules".to_string(), format!("{} matched", matched.len()));
    if let Some(suppress_rule) = matched.iter().find(|r| r.action == RuleAction::Suppress) {
        stages.insert("decision".to_string(), "NEVER (rule suppress)".to_string());
        let decision = Decision::never(
            0,
            format!("Suppressed by rule '{}'", suppress_rule.rule_id),
            audit_id.clone(),
        );
        return finalize(&collab, &event, decision, stages, rules_matched).await;
    }
    // TODO: DEFER/SEND_NOW/CAP rule actions are only annotated in
    // `rules_matched`, never enforced as short-circuits or caps. Whether
    // that's intentional is an open question carried from the original
    // behavior (spec.md §9) — this is the gap, not a bug in this port.

    // Stage 5: DND gate.
    let dnd_result = collab.dnd.check(now);
    stages.insert(
        "dnd".to_string(),
        format!("in_dnd={} window={}", dnd_result.in_dnd, dnd_result.window),
    );
    if dnd_result.in_dnd {
        let schedule_at = collab.dnd.next_boundary(now);
        collab.dedup.store_fingerprint(&event).await;
        collab.fatigue.record(&event).await;
        stages.insert("decision".to_string(), "LATER (dnd)".to_string());
        let decision = Decision::later(
            35,
            format!("Deferred: inside do-not-disturb window {}", dnd_result.window),
            audit_id.clone(),
            schedule_at,
        );
        return finalize(&collab, &event, decision, stages, rules_matched).await;
    }

    // Stage 6: base score.
    let base = scorer::compute_base(&event, now);
    stages.insert("scorer".to_string(), format!("base={base}"));

    // Stage 7: fatigue penalty (read only; counters are written later).
    let fatigue_state = collab.fatigue.read_fatigue(&event.user_id).await;
    stages.insert(
        "fatigue".to_string(),
        format!(
            "count={} penalty={} level={}",
            fatigue_state.count,
            fatigue_state.penalty,
            fatigue_state.level.as_str()
        ),
    );

    // Stage 8: AI adjustment, timeout-bounded.
    let (ai_adjustment, ai_skip_reason) =
        ai::get_ai_score_with_deadline(collab.ai_client.as_ref(), &event, now).await;
    stages.insert(
        "ai".to_string(),
        ai_skip_reason.unwrap_or_else(|| format!("adjustment={ai_adjustment}")),
    );

    let final_score = scorer::compute_final_score(base, fatigue_state.penalty, ai_adjustment);

    // Stage 9: conflict resolver.
    if let Some(outcome) = conflict::resolve(
        event.priority_hint,
        fatigue_state.level,
        &event.source,
        final_score,
        now,
    ) {
        stages.insert("conflict".to_string(), outcome.reason.clone());
        collab.dedup.store_fingerprint(&event).await;
        collab.fatigue.record(&event).await;
        let decision = match outcome.decision {
            DecisionKind::Later => Decision::later(
                final_score,
                outcome.reason,
                audit_id.clone(),
                outcome.schedule_at.expect("LATER conflict outcome carries a schedule"),
            ),
            DecisionKind::Never => Decision::never(final_score, outcome.reason, audit_id.clone()),
            DecisionKind::Now => Decision::now(final_score, outcome.reason, audit_id.clone()),
        };
        stages.insert(
            "decision".to_string(),
            format!("{:?} (conflict)", decision.decision),
        );
        return finalize(&collab, &event, decision, stages, rules_matched).await;
    }
    stages.insert("conflict".to_string(), "no conflict".to_string());

    // Stage 10: decision boundary.
    let decision = if final_score >= 60 {
        Decision::now(final_score, "Score at or above the NOW threshold", audit_id.clone())
    } else if final_score >= 30 {
        let schedule_at = optimal_window(&event, now);
        Decision::later(
            final_score,
            "Score in the deferred band, scheduled for the optimal window",
            audit_id.clone(),
            schedule_at,
        )
    } else {
        Decision::never(final_score, "Score below the deferred threshold", audit_id.clone())
    };
    stages.insert(
        "decision".to_string(),
        format!("{:?} (boundary)", decision.decision),
    );
    collab.dedup.store_fingerprint(&event).await;
    collab.fatigue.record(&event).await;
    finalize(&collab, &event, decision, stages, rules_matched).await
}

/// The pipeline's single entry point: `Evaluate(event) -> Decision`.
pub struct Orchestrator {
    clock: Arc<dyn Clock>,
    dedup: Arc<Deduplicator>,
    fatigue: Arc<FatigueAccountant>,
    rules: Arc<RulesMatcher>,
    dnd: DndGate,
    ai_client: Arc<dyn AiClient>,
    audit_sink: Arc<dyn AuditSink>,
    dispatch: Arc<dyn DeferredDispatch>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kv: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        rules: Arc<RulesMatcher>,
        dnd: DndGate,
        fatigue_caps: crate::fatigue::FatigueCaps,
        ai_client: Arc<dyn AiClient>,
        audit_sink: Arc<dyn AuditSink>,
        dispatch: Arc<dyn DeferredDispatch>,
    ) -> Self {
        Self {
            dedup: Arc::new(Deduplicator::new(kv.clone(), clock.clone())),
            fatigue: Arc::new(FatigueAccountant::new(kv, clock.clone(), fatigue_caps)),
            clock,
            rules,
            dnd,
            ai_client,
            audit_sink,
            dispatch,
        }
    }

    fn collaborators(&self) -> Collaborators {
        Collaborators {
            clock: self.clock.clone(),
            dedup: self.dedup.clone(),
            fatigue: self.fatigue.clone(),
            rules: self.rules.clone(),
            dnd: self.dnd.clone(),
            ai_client: self.ai_client.clone(),
            audit_sink: self.audit_sink.clone(),
            dispatch: self.dispatch.clone(),
        }
    }

    /// Runs the nine-stage pipeline for a single event. Returns an error
    /// only for a genuinely unexpected pipeline fault on a non-CRITICAL
    /// event (§7) — every documented soft failure (KV, AI, rules, audit,
    /// dispatch) is already absorbed by its owning component.
    pub async fn evaluate(&self, event: Event) -> Result<Decision, CoreError> {
        let now = self.clock.now();
        let audit_id = generate_audit_id();
        let span = info_span!("evaluate", audit_id = %audit_id, user_id = %event.user_id, event_type = %event.event_type);

        // Stage 1: expiry guard. Expiry precedence is stronger than even
        // CRITICAL (§4.10, P7) and is evaluated outside the failsafe
        // envelope since it can't fault.
        if let Some(expires_at) = event.expires_at {
            if expires_at < now {
                let mut stages = HashMap::new();
                stages.insert("expiry".to_string(), "EXPIRED".to_string());
                stages.insert("decision".to_string(), "NEVER (expired)".to_string());
                let decision =
                    Decision::never(0, "EXPIRED: expires_at is in the past", audit_id.clone());
                let collab = self.collaborators();
                return Ok(finalize(&collab, &event, decision, stages, Vec::new())
                    .instrument(span)
                    .await);
            }
        }

        let collab = self.collaborators();
        let event_for_failsafe = event.clone();
        let priority_hint = event.priority_hint;
        let audit_id_for_failsafe = audit_id.clone();
        let inner = run_pipeline(collab, event, now, audit_id).instrument(span);

        match tokio::spawn(inner).await {
            Ok(decision) => Ok(decision),
            Err(join_err) if priority_hint == PriorityHint::Critical => {
                warn!(error = %join_err, "pipeline fault on CRITICAL event, invoking failsafe");
                let collab = self.collaborators();
                collab.dedup.store_fingerprint(&event_for_failsafe).await;
                collab.fatigue.record(&event_for_failsafe).await;
                let mut stages = HashMap::new();
                stages.insert("failsafe".to_string(), "true".to_string());
                stages.insert("decision".to_string(), "NOW (failsafe)".to_string());
                let decision = Decision::now(
                    90,
                    "FAILSAFE: pipeline error — CRITICAL sent NOW",
                    audit_id_for_failsafe,
                );
                Ok(finalize(&collab, &event_for_failsafe, decision, stages, Vec::new()).await)
            }
            Err(join_err) => Err(CoreError::Pipeline(join_err.to_string())),
        }
    }
}
