//! Owns turn lifecycle: accepts user input, bootstraps a Turn, kicks off
//! planning, aggregates step results, and emits the one terminal event
//! every accepted turn is guaranteed to produce.
//!
//! Grounded on the gateway's `RunStatus::is_terminal`/`Run::finish`
//! compare-and-set shape (`crates/gateway/src/runtime/runs.rs`) for the
//! terminal-transition discipline, and on `finalize_run_success`
//! (`crates/gateway/src/runtime/turn.rs`) for assembling the final
//! response once the last unit of work completes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentrt_domain::config::CoreRuntimeConfig;
use agentrt_domain::error::{Error, Result};
use agentrt_domain::event::{EventEnvelope, EventPayload};
use agentrt_domain::step::{Step, StepStatus};
use agentrt_domain::tool::Message;
use agentrt_domain::turn::TurnStatus;
use agentrt_eventbus::{EventBus, Handler};
use agentrt_personality::PersonalityPackManager;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::context::ContextManager;

pub struct TurnManager {
    context: Arc<ContextManager>,
    personalities: Arc<PersonalityPackManager>,
    bus: Arc<EventBus>,
    config: CoreRuntimeConfig,
}

impl TurnManager {
    pub fn new(
        context: Arc<ContextManager>,
        personalities: Arc<PersonalityPackManager>,
        bus: Arc<EventBus>,
        config: CoreRuntimeConfig,
    ) -> Self {
        Self {
            context,
            personalities,
            bus,
            config,
        }
    }

    /// Validate, create, and kick off a new turn. Returns the ids the
    /// caller hands back to its client for later `GET /v1/turns/{turn_id}`
    /// polling and log correlation.
    ///
    /// When `turn_id` names a turn already created by an earlier call (a
    /// client retrying the same `POST /v1/turns` body), that turn's
    /// existing `(turn_id, trace_id)` is returned as-is and no second turn
    /// is created or started.
    pub async fn start_turn(
        &self,
        user_input: Message,
        personality_id: impl Into<String>,
        session_id: Option<String>,
        metadata: HashMap<String, Value>,
        turn_id: Option<Uuid>,
    ) -> Result<(Uuid, Uuid)> {
        let personality_id = personality_id.into();

        if self.personalities.get(&personality_id).is_none() {
            return Err(Error::PersonalityNotFound(personality_id));
        }
        if user_input.content.extract_all_text().trim().is_empty() {
            return Err(Error::Validation("user_input content must not be empty".into()));
        }

        let mut metadata = metadata;
        if let Some(session_id) = &session_id {
            let history = self
                .context
                .history_for_session(session_id, self.config.max_conversation_history_turns)
                .await;
            if !history.is_empty() {
                metadata.insert("history".to_string(), Value::Array(condense_history(&history)));
            }
        }

        let mut turn = agentrt_domain::turn::Turn::new(user_input, personality_id, session_id, metadata);
        if let Some(requested_id) = turn_id {
            turn = turn.with_turn_id(requested_id);
        }
        let turn_id = turn.turn_id;
        let trace_id = turn.trace_id;

        if !self.context.create_turn_if_absent(turn.clone()) {
            let existing = self
                .context
                .get_turn(turn_id)
                .await
                .expect("create_turn_if_absent reported an occupied entry");
            return Ok((existing.turn_id, existing.trace_id));
        }

        self.spawn_timeout_watchdog(turn_id, trace_id);
        self.bus.publish(EventEnvelope::new(
            trace_id,
            turn_id,
            None,
            None,
            EventPayload::TurnStart { turn },
        ));

        Ok((turn_id, trace_id))
    }

    fn spawn_timeout_watchdog(&self, turn_id: Uuid, trace_id: Uuid) {
        let context = self.context.clone();
        let bus = self.bus.clone();
        let timeout = Duration::from_secs(self.config.max_turn_duration_seconds);

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let updated = context
                .update_turn(turn_id, |t| {
                    t.try_fail("TurnTimeout", format!("turn exceeded {}s", timeout.as_secs()));
                })
                .await;

            let Some(turn) = updated else { return };
            let timed_out = turn.status == TurnStatus::Failed
                && turn.error_info.as_ref().map(|e| e.code.as_str()) == Some("TurnTimeout");
            if timed_out {
                bus.publish(EventEnvelope::new(
                    trace_id,
                    turn_id,
                    turn.plan_id,
                    None,
                    EventPayload::TurnFailed { turn },
                ));
            }
        });
    }

    async fn handle_step_result(&self, step: Step, trace_id: Uuid) {
        let turn_id = step.turn_id;
        let step_id = step.step_id;
        let metrics = step.metrics.clone().unwrap_or_default();
        let succeeded = step.status == StepStatus::Succeeded;
        let failed = step.status == StepStatus::Failed;
        let fail_fast = self.config.fail_fast;
        let is_last = self
            .context
            .get_plan(step.plan_id)
            .and_then(|p| p.last_index())
            .map(|last| last == step.step_index)
            .unwrap_or(false);
        let error_detail = step.error.as_ref().map(|e| e.detail.clone()).unwrap_or_default();
        let final_message = final_response_from(&step);

        let transitioned = Arc::new(AtomicBool::new(false));
        let transitioned_write = transitioned.clone();

        let updated = self
            .context
            .update_turn(turn_id, move |t| {
                if t.status.is_terminal() {
                    return;
                }
                t.merge_step(step_id, &metrics);

                if failed && (fail_fast || is_last) {
                    if t.try_fail("StepExecutionFailure", error_detail) {
                        transitioned_write.store(true, Ordering::SeqCst);
                    }
                } else if succeeded && is_last {
                    if t.try_complete(final_message) {
                        transitioned_write.store(true, Ordering::SeqCst);
                    }
                }
            })
            .await;

        if !transitioned.load(Ordering::SeqCst) {
            return;
        }
        let Some(turn) = updated else { return };
        match turn.status {
            TurnStatus::Completed => {
                self.bus.publish(EventEnvelope::new(
                    trace_id,
                    turn_id,
                    turn.plan_id,
                    None,
                    EventPayload::TurnCompleted { turn },
                ));
            }
            TurnStatus::Failed => {
                self.bus.publish(EventEnvelope::new(
                    trace_id,
                    turn_id,
                    turn.plan_id,
                    None,
                    EventPayload::TurnFailed { turn },
                ));
            }
            _ => {}
        }
    }
}

fn condense_history(history: &[agentrt_domain::turn::Turn]) -> Vec<Value> {
    history
        .iter()
        .flat_map(|t| {
            let mut msgs = vec![serde_json::json!({
                "role": "user",
                "content": t.user_input.content.extract_all_text(),
            })];
            if let Some(resp) = &t.final_response {
                msgs.push(serde_json::json!({
                    "role": "assistant",
                    "content": resp.content.extract_all_text(),
                }));
            }
            msgs
        })
        .collect()
}

/// Derive the turn's final response from its last step's result. LLM_CALL
/// results carry `{"content": "..."}`; any other shape is rendered as its
/// JSON text so a TOOL_CALL- or MEMORY_OP-terminated plan still produces a
/// non-empty response.
fn final_response_from(step: &Step) -> Message {
    let text = step
        .result
        .as_ref()
        .and_then(|v| v.get("content").and_then(|c| c.as_str()).map(str::to_string))
        .or_else(|| step.result.as_ref().map(|v| v.to_string()))
        .unwrap_or_default();
    Message::assistant(text)
}

#[async_trait]
impl Handler for TurnManager {
    async fn handle(&self, envelope: EventEnvelope) {
        if let EventPayload::StepResult { step } = envelope.payload {
            self.handle_step_result(step, envelope.trace_id).await;
        }
    }
}
