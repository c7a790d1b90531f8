//! Subscribes to `step.execute`; dispatches LLM_CALL, TOOL_CALL, and
//! MEMORY_OP steps and publishes a `step.result` for each.
//!
//! Grounded on the gateway's `run_turn_inner` dispatch loop
//! (`crates/gateway/src/runtime/turn.rs`): one processor, three kinds of
//! work, a concurrency cap over in-flight work. Per-turn ordering is
//! enforced the same way `session_lock.rs`'s `SessionLockMap` enforces
//! per-session exclusivity — a keyed map of lightweight synchronization
//! primitives, one entry created lazily per turn.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use agentrt_domain::config::CoreRuntimeConfig;
use agentrt_domain::error::Error;
use agentrt_domain::event::{EventEnvelope, EventPayload};
use agentrt_domain::step::{Step, StepMetrics, StepStatus, StepType};
use agentrt_domain::tool::Message;
use agentrt_eventbus::{EventBus, Handler};
use agentrt_personality::PersonalityPackManager;
use agentrt_providers::{GenerateRequest, ProviderRegistry};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

use crate::context::ContextManager;

/// Per-turn sequencing gate: steps of a turn were all published up front by
/// PlanExecutor, but must still execute in `step_index` order. Each step
/// task waits here until its index is next, then bumps the counter and
/// wakes the rest.
struct TurnSequencer {
    next_index: AtomicU32,
    notify: Notify,
}

impl TurnSequencer {
    fn new() -> Self {
        Self {
            next_index: AtomicU32::new(0),
            notify: Notify::new(),
        }
    }

    async fn wait_turn(&self, step_index: u32) {
        while self.next_index.load(Ordering::SeqCst) != step_index {
            self.notify.notified().await;
        }
    }

    fn advance(&self) {
        self.next_index.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

pub struct StepProcessor {
    context: Arc<ContextManager>,
    personalities: Arc<PersonalityPackManager>,
    providers: Arc<ProviderRegistry>,
    bus: Arc<EventBus>,
    semaphore: Arc<Semaphore>,
    sequencers: RwLock<HashMap<Uuid, Arc<TurnSequencer>>>,
}

impl StepProcessor {
    pub fn new(
        context: Arc<ContextManager>,
        personalities: Arc<PersonalityPackManager>,
        providers: Arc<ProviderRegistry>,
        bus: Arc<EventBus>,
        config: &CoreRuntimeConfig,
    ) -> Self {
        Self {
            context,
            personalities,
            providers,
            bus,
            semaphore: Arc::new(Semaphore::new(config.max_in_flight_steps)),
            sequencers: RwLock::new(HashMap::new()),
        }
    }

    fn sequencer_for(&self, turn_id: Uuid) -> Arc<TurnSequencer> {
        if let Some(seq) = self.sequencers.read().get(&turn_id) {
            return seq.clone();
        }
        self.sequencers
            .write()
            .entry(turn_id)
            .or_insert_with(|| Arc::new(TurnSequencer::new()))
            .clone()
    }

    async fn process(&self, mut step: Step, trace_id: Uuid) {
        let Some(turn) = self.context.get_turn(step.turn_id).await else {
            tracing::warn!(turn_id = %step.turn_id, "step.execute for unknown turn, dropping");
            return;
        };
        if turn.status.is_terminal() {
            tracing::debug!(turn_id = %step.turn_id, "turn already terminal, dropping step");
            return;
        }

        let _permit = self.semaphore.acquire().await.expect("semaphore never closed");
        let sequencer = self.sequencer_for(step.turn_id);
        sequencer.wait_turn(step.step_index).await;

        // Re-check after waiting: a timeout or an earlier failure may have
        // terminated the turn while this step queued.
        if let Some(turn) = self.context.get_turn(step.turn_id).await {
            if turn.status.is_terminal() {
                sequencer.advance();
                return;
            }
        }

        step.status = StepStatus::Running;
        let started = Instant::now();

        let dispatch_result = match step.step_type {
            StepType::LlmCall => self.handle_llm_call(&turn.personality_id, &step.parameters).await,
            StepType::ToolCall => self.handle_tool_call(&turn.personality_id, &step.parameters).await,
            StepType::MemoryOp => self.handle_memory_op(&step.parameters).await,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match dispatch_result {
            Ok((result, mut metrics)) => {
                metrics.latency_ms = elapsed_ms;
                step.succeed(result, metrics);
            }
            Err(e) => {
                let metrics = StepMetrics {
                    latency_ms: elapsed_ms,
                    error_kind: Some(e.kind().to_string()),
                    ..Default::default()
                };
                step.fail(&e, Some(metrics));
            }
        }

        sequencer.advance();

        let envelope = EventEnvelope::new(
            trace_id,
            step.turn_id,
            Some(step.plan_id),
            Some(step.step_id),
            EventPayload::StepResult { step },
        );
        self.bus.publish(envelope);
    }

    async fn handle_llm_call(
        &self,
        personality_id: &str,
        parameters: &Value,
    ) -> Result<(Value, StepMetrics), Error> {
        let params: LlmCallParams = serde_json::from_value(parameters.clone())
            .map_err(|e| Error::Validation(format!("invalid LLM_CALL parameters: {e}")))?;

        let personality = self
            .personalities
            .get(personality_id)
            .ok_or_else(|| Error::PersonalityNotFound(personality_id.to_string()))?;

        let provider_id = params.provider.as_deref().or(personality.default_provider.as_deref());
        let provider = self.providers.default_provider(provider_id)?;
        let model = params.model.clone().or_else(|| personality.default_model.clone());

        let mut req = GenerateRequest {
            messages: vec![Message::user(params.prompt)],
            tools: Vec::new(),
            temperature: params.options.temperature,
            max_tokens: params.options.max_tokens,
            top_p: params.options.top_p,
            stop: params.options.stop,
            stream: params.options.stream,
            json_mode: false,
            model: model.clone(),
        };
        let dropped_options: Vec<String> = req
            .apply_capabilities(provider.capabilities())
            .into_iter()
            .map(str::to_string)
            .collect();
        if !dropped_options.is_empty() {
            tracing::debug!(provider_id = %provider.provider_id(), ?dropped_options, "dropped unsupported generate options");
        }

        let resp = provider.generate(req).await?;
        let usage = resp.usage.unwrap_or_default();
        let effective_model = model.unwrap_or(resp.model);
        let cost_usd = self.providers.estimate_cost(
            provider.provider_id(),
            &effective_model,
            usage.prompt_tokens,
            usage.completion_tokens,
        );

        let metrics = StepMetrics {
            latency_ms: 0,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            cost_usd,
            provider: Some(provider.provider_id().to_string()),
            model: Some(effective_model),
            error_kind: None,
            dropped_options,
        };

        Ok((serde_json::json!({"content": resp.content}), metrics))
    }

    async fn handle_tool_call(
        &self,
        personality_id: &str,
        parameters: &Value,
    ) -> Result<(Value, StepMetrics), Error> {
        let params: ToolCallParams = serde_json::from_value(parameters.clone())
            .map_err(|e| Error::Validation(format!("invalid TOOL_CALL parameters: {e}")))?;

        let result = self
            .personalities
            .execute_tool(personality_id, &params.tool_name, params.arguments)
            .await?;

        Ok((result, StepMetrics::default()))
    }

    async fn handle_memory_op(&self, parameters: &Value) -> Result<(Value, StepMetrics), Error> {
        let params: MemoryOpParams = serde_json::from_value(parameters.clone())
            .map_err(|e| Error::Validation(format!("invalid MEMORY_OP parameters: {e}")))?;
        let memory = self.context.get_memory_manager();

        let result = match params.operation.as_str() {
            "search" => {
                let payload: MemorySearchPayload = serde_json::from_value(params.payload)
                    .map_err(|e| Error::Validation(format!("invalid search payload: {e}")))?;
                let records = memory.search(payload.query, payload.limit, payload.filter).await;
                serde_json::to_value(records).map_err(Error::from)?
            }
            "retrieve" => {
                let payload: MemoryRetrievePayload = serde_json::from_value(params.payload)
                    .map_err(|e| Error::Validation(format!("invalid retrieve payload: {e}")))?;
                let record = memory.retrieve(&payload.id).await?;
                serde_json::to_value(record).map_err(Error::from)?
            }
            "store" => {
                let payload: MemoryStorePayload = serde_json::from_value(params.payload)
                    .map_err(|e| Error::Validation(format!("invalid store payload: {e}")))?;
                let id = memory.store(payload.text, payload.metadata).await?;
                serde_json::json!({"id": id})
            }
            other => return Err(Error::Validation(format!("unknown memory operation: {other}"))),
        };

        Ok((result, StepMetrics::default()))
    }
}

#[derive(Debug, Deserialize)]
struct LlmCallParams {
    prompt: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    provider: Option<String>,
    #[serde(default)]
    options: LlmCallOptions,
}

#[derive(Debug, Default, Deserialize)]
struct LlmCallOptions {
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default)]
    max_tokens: Option<u32>,
    #[serde(default)]
    top_p: Option<f32>,
    #[serde(default)]
    stop: Vec<String>,
    #[serde(default)]
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    tool_name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct MemoryOpParams {
    operation: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Debug, Deserialize)]
struct MemorySearchPayload {
    query: String,
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    filter: Option<HashMap<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct MemoryRetrievePayload {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MemoryStorePayload {
    text: String,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

#[async_trait]
impl Handler for StepProcessor {
    async fn handle(&self, envelope: EventEnvelope) {
        if let EventPayload::StepExecute { step } = envelope.payload {
            self.process(step, envelope.trace_id).await;
        }
    }
}
