//! Shared application state passed to every API handler.
//!
//! Grounded on the gateway's `AppState` (`crates/gateway/src/state.rs`):
//! a flat `Clone` struct of `Arc` handles, built once at startup and
//! handed to axum via `.with_state`. Everything on the teacher's
//! `AppState` outside this runtime's scope — sessions, nodes, mcp,
//! schedules, approvals, deliveries, dashboard, admin auth, quota — has
//! no counterpart here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use agentrt_core::{ContextManager, PlanExecutor, StepProcessor, TurnManager};
use agentrt_domain::config::Config;
use agentrt_domain::error::Result;
use agentrt_domain::event::EventType;
use agentrt_eventbus::EventBus;
use agentrt_memory::MemoryManager;
use agentrt_personality::PersonalityPackManager;
use agentrt_providers::ProviderRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub bus: Arc<EventBus>,
    pub context: Arc<ContextManager>,
    pub turn_manager: Arc<TurnManager>,
    pub personalities: Arc<PersonalityPackManager>,
}

impl AppState {
    /// Wire every component together and subscribe them to the bus.
    /// `PlanExecutor` and `StepProcessor` are kept alive only via their bus
    /// subscription — callers never need to reach them directly, so they
    /// aren't stored on `AppState`.
    pub fn bootstrap(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let bus = Arc::new(EventBus::new());

        let memory = Arc::new(MemoryManager::from_config(&config.memory)?);
        let context = Arc::new(ContextManager::new(memory));
        let providers = Arc::new(ProviderRegistry::from_config(&config.providers));

        let personalities_root = Path::new(&config.personalities.directory);
        let personalities = Arc::new(PersonalityPackManager::load(personalities_root, HashMap::new())?);

        let plan_executor = Arc::new(PlanExecutor::new(
            context.clone(),
            personalities.clone(),
            providers.clone(),
            bus.clone(),
            config.core_runtime.clone(),
        ));
        let step_processor = Arc::new(StepProcessor::new(
            context.clone(),
            personalities.clone(),
            providers.clone(),
            bus.clone(),
            &config.core_runtime,
        ));
        let turn_manager = Arc::new(TurnManager::new(
            context.clone(),
            personalities.clone(),
            bus.clone(),
            config.core_runtime.clone(),
        ));

        bus.subscribe(EventType::TurnStart, plan_executor);
        bus.subscribe(EventType::StepExecute, step_processor);
        bus.subscribe(EventType::StepResult, turn_manager.clone());

        Ok(Self {
            config,
            bus,
            context,
            turn_manager,
            personalities,
        })
    }
}
