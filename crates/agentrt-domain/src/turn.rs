use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::Message;

/// A Turn's lifecycle status. FAILED is reachable from any non-terminal
/// state; COMPLETED and FAILED are the only terminal states, and a Turn
/// transitions into exactly one of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TurnStatus {
    Pending,
    Planning,
    Executing,
    Completed,
    Failed,
}

impl TurnStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnStatus::Completed | TurnStatus::Failed)
    }
}

/// Normalized failure recorded on a terminal FAILED turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// Additive roll-up of per-step metrics, owned exclusively by TurnManager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnMetrics {
    pub latency_ms: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost_usd: f64,
    pub llm_calls: u32,
}

impl TurnMetrics {
    /// Fold one step's metrics into the turn-level roll-up. Cost is summed
    /// unconditionally; callers that want to skip steps with no recorded
    /// cost should filter before calling.
    pub fn accumulate(&mut self, step: &crate::step::StepMetrics) {
        self.latency_ms += step.latency_ms;
        self.prompt_tokens += step.prompt_tokens as u64;
        self.completion_tokens += step.completion_tokens as u64;
        self.cost_usd += step.cost_usd;
    }
}

/// One user request and all state accumulated planning and executing its
/// response. Mutated only by TurnManager, which holds the per-turn lock
/// for the duration of any mutation (see `agentrt-core::context`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: Uuid,
    pub trace_id: Uuid,
    pub status: TurnStatus,
    pub user_input: Message,
    pub personality_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub plan_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub final_response: Option<Message>,
    #[serde(default)]
    pub error_info: Option<ErrorInfo>,
    #[serde(default)]
    pub metrics: TurnMetrics,
    /// step_ids already merged into this turn's metrics, keyed by step_id
    /// string — guards duplicate `step.result` deliveries against
    /// double-aggregation.
    #[serde(default)]
    pub merged_step_ids: Vec<Uuid>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Turn {
    pub fn new(
        user_input: Message,
        personality_id: impl Into<String>,
        session_id: Option<String>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            turn_id: Uuid::new_v4(),
            trace_id: Uuid::new_v4(),
            status: TurnStatus::Pending,
            user_input,
            personality_id: personality_id.into(),
            session_id,
            plan_id: None,
            created_at: now,
            updated_at: now,
            final_response: None,
            error_info: None,
            metrics: TurnMetrics::default(),
            merged_step_ids: Vec::new(),
            metadata,
        }
    }

    /// Override the server-generated `turn_id` with a caller-supplied one.
    /// Used by `TurnManager::start_turn` so a client retrying a `POST
    /// /v1/turns` call with the same `turn_id` can be deduped against the
    /// turn already created for the first attempt.
    pub fn with_turn_id(mut self, turn_id: Uuid) -> Self {
        self.turn_id = turn_id;
        self
    }

    /// CAS-style terminal transition to COMPLETED. Returns `false` (and
    /// leaves the turn untouched) if it was already terminal — the caller
    /// lost the race and must not publish `turn.completed`.
    pub fn try_complete(&mut self, final_response: Message) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TurnStatus::Completed;
        self.final_response = Some(final_response);
        self.updated_at = Utc::now();
        true
    }

    /// CAS-style terminal transition to FAILED. Returns `false` if the turn
    /// was already terminal.
    pub fn try_fail(&mut self, code: impl Into<String>, message: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = TurnStatus::Failed;
        self.error_info = Some(ErrorInfo {
            code: code.into(),
            message: message.into(),
        });
        self.updated_at = Utc::now();
        true
    }

    /// Idempotently merges a step's metrics into the turn roll-up. Returns
    /// `true` if this was a new step_id (first delivery), `false` if it was
    /// already merged (duplicate delivery — no-op).
    pub fn merge_step(&mut self, step_id: Uuid, metrics: &crate::step::StepMetrics) -> bool {
        if self.merged_step_ids.contains(&step_id) {
            return false;
        }
        self.merged_step_ids.push(step_id);
        self.metrics.accumulate(metrics);
        self.updated_at = Utc::now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_turn() -> Turn {
        Turn::new(Message::user("hi"), "default", None, HashMap::new())
    }

    #[test]
    fn new_turn_is_pending_with_equal_timestamps() {
        let t = sample_turn();
        assert_eq!(t.status, TurnStatus::Pending);
        assert_eq!(t.created_at, t.updated_at);
        assert!(t.final_response.is_none());
        assert!(t.error_info.is_none());
    }

    #[test]
    fn try_complete_sets_final_response_once() {
        let mut t = sample_turn();
        assert!(t.try_complete(Message::assistant("4")));
        assert_eq!(t.status, TurnStatus::Completed);
        assert!(t.final_response.is_some());
        // Losing a race: second CAS attempt is a no-op.
        assert!(!t.try_complete(Message::assistant("again")));
        assert_eq!(t.final_response.unwrap().content.text(), Some("4"));
    }

    #[test]
    fn try_fail_after_complete_loses_cas() {
        let mut t = sample_turn();
        assert!(t.try_complete(Message::assistant("ok")));
        assert!(!t.try_fail("StepExecutionFailure", "boom"));
        assert_eq!(t.status, TurnStatus::Completed);
        assert!(t.error_info.is_none());
    }

    #[test]
    fn merge_step_is_idempotent() {
        let mut t = sample_turn();
        let step_id = Uuid::new_v4();
        let metrics = crate::step::StepMetrics {
            latency_ms: 100,
            prompt_tokens: 10,
            completion_tokens: 5,
            cost_usd: 0.01,
            provider: Some("openai".into()),
            model: Some("gpt-4o".into()),
            error_kind: None,
            ..Default::default()
        };
        assert!(t.merge_step(step_id, &metrics));
        assert!(!t.merge_step(step_id, &metrics));
        assert_eq!(t.metrics.cost_usd, 0.01);
        assert_eq!(t.metrics.prompt_tokens, 10);
    }
}
