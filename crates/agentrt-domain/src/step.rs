use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// The three kinds of work a Step can dispatch, matching the three
/// StepProcessor handler methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepType {
    LlmCall,
    ToolCall,
    MemoryOp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

/// Normalized failure recorded on a FAILED step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    pub kind: String,
    pub detail: String,
}

impl From<&Error> for StepError {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind().to_string(),
            detail: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepMetrics {
    pub latency_ms: u64,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost_usd: f64,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub error_kind: Option<String>,
    /// Names of requested generation options the provider could not honor
    /// (e.g. `"stream"` on a provider with `supports_streaming: false`).
    #[serde(default)]
    pub dropped_options: Vec<String>,
}

/// One action within a Plan — an LLM call, tool call, or memory operation.
/// Owned exclusively by StepProcessor during execution; the result is
/// published as an immutable `StepResult` once done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub step_id: Uuid,
    pub plan_id: Uuid,
    pub turn_id: Uuid,
    pub step_index: u32,
    pub step_type: StepType,
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub description: Option<String>,
    pub status: StepStatus,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<StepError>,
    #[serde(default)]
    pub metrics: Option<StepMetrics>,
}

impl Step {
    pub fn new(
        plan_id: Uuid,
        turn_id: Uuid,
        step_index: u32,
        step_type: StepType,
        parameters: serde_json::Value,
        description: Option<String>,
    ) -> Self {
        Self {
            step_id: Uuid::new_v4(),
            plan_id,
            turn_id,
            step_index,
            step_type,
            parameters,
            description,
            status: StepStatus::Pending,
            result: None,
            error: None,
            metrics: None,
        }
    }

    pub fn succeed(&mut self, result: serde_json::Value, metrics: StepMetrics) {
        self.status = StepStatus::Succeeded;
        self.result = Some(result);
        self.metrics = Some(metrics);
    }

    pub fn fail(&mut self, error: &Error, metrics: Option<StepMetrics>) {
        self.status = StepStatus::Failed;
        self.error = Some(StepError::from(error));
        self.metrics = metrics;
    }
}

/// Published by StepProcessor once a step reaches a terminal per-step
/// status; consumed by TurnManager's aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step: Step,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_step_starts_pending_with_no_result() {
        let step = Step::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            0,
            StepType::ToolCall,
            serde_json::json!({"tool_name": "get_weather", "arguments": {}}),
            None,
        );
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.result.is_none());
        assert!(step.error.is_none());
    }

    #[test]
    fn fail_records_normalized_error_kind() {
        let mut step = Step::new(Uuid::new_v4(), Uuid::new_v4(), 0, StepType::ToolCall, serde_json::json!({}), None);
        let err = Error::ToolExecution {
            tool_name: "get_weather".into(),
            message: "network down".into(),
        };
        step.fail(&err, None);
        assert_eq!(step.status, StepStatus::Failed);
        assert_eq!(step.error.unwrap().kind, "ToolExecutionError");
    }

    #[test]
    fn step_type_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&StepType::LlmCall).unwrap();
        assert_eq!(json, "\"LLM_CALL\"");
        let json = serde_json::to_string(&StepType::ToolCall).unwrap();
        assert_eq!(json, "\"TOOL_CALL\"");
    }
}
