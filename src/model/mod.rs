mod audit;
mod decision;
mod event;
mod rule;

pub use audit::AuditRecord;
pub use decision::{Decision, DecisionKind};
pub use event::{Channel, Event, PriorityHint};
pub use rule::{Rule, RuleAction, RuleCondition, RuleMaxPer};
