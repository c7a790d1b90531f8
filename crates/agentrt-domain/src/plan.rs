use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// The ordered sequence of Steps derived from a user request. Owned
/// exclusively by PlanExecutor until its steps are published; never
/// mutated afterward — step order is total and fixed at publish time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: Uuid,
    pub turn_id: Uuid,
    pub step_ids: Vec<Uuid>,
    pub status: PlanStatus,
}

impl Plan {
    pub fn new(turn_id: Uuid, step_ids: Vec<Uuid>) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            turn_id,
            step_ids,
            status: PlanStatus::Pending,
        }
    }

    pub fn len(&self) -> usize {
        self.step_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.step_ids.is_empty()
    }

    pub fn last_index(&self) -> Option<u32> {
        self.step_ids.len().checked_sub(1).map(|n| n as u32)
    }
}

/// One element of the JSON plan an LLM is prompted to produce. Validated
/// by PlanExecutor before being turned into a `Step`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStepSpec {
    pub step_type: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub description: Option<String>,
}

/// The raw JSON object an LLM is expected to return when prompted with
/// `response_format='json'` during plan generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPlan {
    pub steps: Vec<PlanStepSpec>,
}
