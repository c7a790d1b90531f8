//! Subscribes to `turn.start`; prompts an LLM for the ordered plan and
//! publishes one `step.execute` event per step, in index order.
//!
//! Grounded on the gateway's `prepare_turn_context`/`build_system_context`
//! shape (`crates/gateway/src/runtime/turn.rs`, `mod.rs`): resolve the
//! provider, assemble a system-context prompt from the active personality,
//! and make one generation call before anything else proceeds. The
//! reference behavior publishes every step event up front; sequencing
//! among them is StepProcessor's job (see `step_processor.rs`).

use std::sync::Arc;

use agentrt_domain::config::CoreRuntimeConfig;
use agentrt_domain::event::{EventEnvelope, EventPayload};
use agentrt_domain::personality::PersonalityInstance;
use agentrt_domain::plan::{Plan, PlanStatus, RawPlan};
use agentrt_domain::step::{Step, StepType};
use agentrt_domain::tool::{Message, ToolDefinition};
use agentrt_domain::turn::{Turn, TurnStatus};
use agentrt_eventbus::{EventBus, Handler};
use agentrt_personality::PersonalityPackManager;
use agentrt_providers::{GenerateRequest, ProviderRegistry};
use async_trait::async_trait;
use uuid::Uuid;

use crate::context::ContextManager;

pub struct PlanExecutor {
    context: Arc<ContextManager>,
    personalities: Arc<PersonalityPackManager>,
    providers: Arc<ProviderRegistry>,
    bus: Arc<EventBus>,
    config: CoreRuntimeConfig,
}

impl PlanExecutor {
    pub fn new(
        context: Arc<ContextManager>,
        personalities: Arc<PersonalityPackManager>,
        providers: Arc<ProviderRegistry>,
        bus: Arc<EventBus>,
        config: CoreRuntimeConfig,
    ) -> Self {
        Self {
            context,
            personalities,
            providers,
            bus,
            config,
        }
    }

    async fn execute(&self, turn: Turn) {
        let turn_id = turn.turn_id;
        let trace_id = turn.trace_id;

        let Some(personality) = self.personalities.get(&turn.personality_id) else {
            self.fail_turn(
                turn_id,
                trace_id,
                "ValidationError",
                format!("unknown personality: {}", turn.personality_id),
            )
            .await;
            return;
        };

        let provider = match self.providers.default_provider(personality.default_provider.as_deref()) {
            Ok(p) => p,
            Err(e) => {
                self.fail_turn(turn_id, trace_id, "PlanGenerationError", e.to_string()).await;
                return;
            }
        };

        self.context.update_turn(turn_id, |t| t.status = TurnStatus::Planning).await;

        let tool_defs = self.personalities.tool_definitions(&personality.id);
        let mut last_error = String::new();
        let max_attempts = self.config.max_plan_generation_retries + 1;

        for attempt in 1..=max_attempts {
            let messages = self.build_planning_prompt(&personality, &turn, &tool_defs, &last_error);
            let mut req = GenerateRequest {
                messages,
                tools: Vec::new(),
                temperature: Some(0.0),
                max_tokens: None,
                json_mode: true,
                model: personality.default_model.clone(),
                ..Default::default()
            };
            let dropped = req.apply_capabilities(provider.capabilities());
            if !dropped.is_empty() {
                tracing::debug!(%trace_id, ?dropped, "dropped unsupported plan generation options");
            }

            let content = match provider.generate(req).await {
                Ok(resp) => resp.content,
                Err(e) => {
                    tracing::warn!(%trace_id, attempt, error = %e, "plan generation call failed");
                    last_error = e.to_string();
                    continue;
                }
            };

            match self.validate_plan(&content, &tool_defs, &personality, turn_id) {
                Ok(specs) if specs.is_empty() => {
                    last_error = "plan must contain at least one step".into();
                }
                Ok(specs) if specs.len() as u32 > self.config.max_steps_per_plan => {
                    last_error = format!(
                        "plan has {} steps, exceeding max_steps_per_plan ({})",
                        specs.len(),
                        self.config.max_steps_per_plan
                    );
                }
                Ok(specs) => {
                    self.publish_plan(turn_id, trace_id, specs).await;
                    return;
                }
                Err(message) => {
                    last_error = message;
                }
            }
            tracing::warn!(%trace_id, attempt, error = %last_error, "rejected plan, re-prompting");
        }

        self.fail_turn(
            turn_id,
            trace_id,
            "PlanGenerationError",
            format!("failed after {max_attempts} attempts: {last_error}"),
        )
        .await;
    }

    fn build_planning_prompt(
        &self,
        personality: &PersonalityInstance,
        turn: &Turn,
        tools: &[ToolDefinition],
        last_error: &str,
    ) -> Vec<Message> {
        let mut tool_lines = String::new();
        for tool in tools {
            tool_lines.push_str(&format!("- {}: {}\n", tool.name, tool.description));
        }
        if tool_lines.is_empty() {
            tool_lines.push_str("(no tools available)\n");
        }

        let planning_instructions = format!(
            "You are planning the execution of a user request as an ordered list \
             of steps. Available step types: LLM_CALL, TOOL_CALL, MEMORY_OP.\n\n\
             Available tools:\n{tool_lines}\n\
             Available memory operations: search(query, limit?, filter?), \
             retrieve(id), store(text, metadata?).\n\n\
             Respond with a JSON object of the exact shape:\n\
             {{\"steps\": [{{\"step_type\": \"LLM_CALL\", \"parameters\": {{...}}, \"description\": \"...\"}}]}}\n\
             TOOL_CALL parameters must be {{\"tool_name\": \"...\", \"arguments\": {{...}}}}.\n\
             MEMORY_OP parameters must be {{\"operation\": \"search|retrieve|store\", \"payload\": {{...}}}}."
        );

        let mut messages = vec![
            Message::system(personality.system_prompt_text.clone()),
            Message::system(planning_instructions),
        ];

        if !last_error.is_empty() {
            messages.push(Message::system(format!(
                "Your previous plan was rejected: {last_error}. Produce a corrected plan."
            )));
        }

        messages.push(turn.user_input.clone());
        messages
    }

    fn validate_plan(
        &self,
        content: &str,
        tools: &[ToolDefinition],
        personality: &PersonalityInstance,
        turn_id: Uuid,
    ) -> Result<Vec<Step>, String> {
        let raw: RawPlan = serde_json::from_str(content.trim())
            .map_err(|e| format!("plan is not valid JSON: {e}"))?;

        let plan_id = Uuid::new_v4();
        let mut steps = Vec::with_capacity(raw.steps.len());
        for (index, spec) in raw.steps.into_iter().enumerate() {
            let step_type = match spec.step_type.as_str() {
                "LLM_CALL" => StepType::LlmCall,
                "TOOL_CALL" => StepType::ToolCall,
                "MEMORY_OP" => StepType::MemoryOp,
                other => return Err(format!("unknown step_type: {other}")),
            };

            if step_type == StepType::ToolCall {
                let tool_name = spec
                    .parameters
                    .get("tool_name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "TOOL_CALL step missing parameters.tool_name".to_string())?;
                if !personality.has_tool(tool_name) || !tools.iter().any(|t| t.name == tool_name) {
                    return Err(format!("plan references unknown tool: {tool_name}"));
                }
            }

            steps.push(Step::new(
                plan_id,
                turn_id,
                index as u32,
                step_type,
                spec.parameters,
                spec.description,
            ));
        }

        Ok(steps)
    }

    async fn publish_plan(&self, turn_id: Uuid, trace_id: Uuid, steps: Vec<Step>) {
        let plan_id = steps.first().map(|s| s.plan_id).unwrap_or_else(Uuid::new_v4);
        let step_ids: Vec<Uuid> = steps.iter().map(|s| s.step_id).collect();
        let plan = Plan {
            plan_id,
            turn_id,
            step_ids,
            status: PlanStatus::InProgress,
        };
        self.context.save_plan(plan);

        self.context
            .update_turn(turn_id, |t| {
                t.plan_id = Some(plan_id);
                t.status = TurnStatus::Executing;
            })
            .await;

        for step in steps {
            let step_id = step.step_id;
            let envelope = EventEnvelope::new(
                trace_id,
                turn_id,
                Some(plan_id),
                Some(step_id),
                EventPayload::StepExecute { step },
            );
            self.bus.publish(envelope);
        }
    }

    async fn fail_turn(&self, turn_id: Uuid, trace_id: Uuid, code: &str, message: String) {
        let updated = self
            .context
            .update_turn(turn_id, |t| {
                t.try_fail(code, message.clone());
            })
            .await;

        if let Some(turn) = updated {
            if turn.status == TurnStatus::Failed {
                self.bus.publish(EventEnvelope::new(
                    trace_id,
                    turn_id,
                    turn.plan_id,
                    None,
                    EventPayload::TurnFailed { turn },
                ));
            }
        }
    }
}

#[async_trait]
impl Handler for PlanExecutor {
    async fn handle(&self, envelope: EventEnvelope) {
        if let EventPayload::TurnStart { turn } = envelope.payload {
            self.execute(turn).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_domain::tool::Message as Msg;
    use std::collections::HashMap;

    fn sample_personality() -> PersonalityInstance {
        PersonalityInstance {
            id: "default".into(),
            version: "1".into(),
            system_prompt_text: "You are helpful.".into(),
            traits: HashMap::new(),
            tools_module_ref: "default".into(),
            available_tool_names: vec!["get_weather".into()],
            default_provider: None,
            default_model: None,
        }
    }

    fn sample_turn() -> Turn {
        Turn::new(Msg::user("what's 2+2?"), "default", None, HashMap::new())
    }

    fn executor_for_validation() -> PlanExecutor {
        let memory = Arc::new(agentrt_memory::MemoryManager::disabled());
        let context = Arc::new(ContextManager::new(memory));
        let personalities_root = tempfile::tempdir().unwrap();
        let personalities = Arc::new(PersonalityPackManager::load(personalities_root.path(), HashMap::new()).unwrap());
        let providers = Arc::new(ProviderRegistry::from_config(&HashMap::new()));
        let bus = Arc::new(EventBus::new());
        PlanExecutor::new(context, personalities, providers, bus, CoreRuntimeConfig::default())
    }

    #[test]
    fn validate_plan_rejects_malformed_json() {
        let exec = executor_for_validation();
        let err = exec
            .validate_plan("not json", &[], &sample_personality(), Uuid::new_v4())
            .unwrap_err();
        assert!(err.contains("not valid JSON"));
    }

    #[test]
    fn validate_plan_rejects_unknown_step_type() {
        let exec = executor_for_validation();
        let json = r#"{"steps":[{"step_type":"DO_MAGIC","parameters":{}}]}"#;
        let err = exec
            .validate_plan(json, &[], &sample_personality(), Uuid::new_v4())
            .unwrap_err();
        assert!(err.contains("unknown step_type"));
    }

    #[test]
    fn validate_plan_rejects_tool_call_for_unavailable_tool() {
        let exec = executor_for_validation();
        let json = r#"{"steps":[{"step_type":"TOOL_CALL","parameters":{"tool_name":"nope","arguments":{}}}]}"#;
        let err = exec
            .validate_plan(json, &[], &sample_personality(), Uuid::new_v4())
            .unwrap_err();
        assert!(err.contains("unknown tool"));
    }

    #[test]
    fn validate_plan_accepts_single_llm_call_step() {
        let exec = executor_for_validation();
        let json = r#"{"steps":[{"step_type":"LLM_CALL","parameters":{"prompt":"answer"}}]}"#;
        let steps = exec
            .validate_plan(json, &[], &sample_personality(), Uuid::new_v4())
            .unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_type, StepType::LlmCall);
        assert_eq!(steps[0].step_index, 0);
    }

    #[test]
    fn build_planning_prompt_includes_user_message_last() {
        let exec = executor_for_validation();
        let turn = sample_turn();
        let messages = exec.build_planning_prompt(&sample_personality(), &turn, &[], "");
        let last = messages.last().unwrap();
        assert_eq!(last.content.text(), Some("what's 2+2?"));
    }
}
