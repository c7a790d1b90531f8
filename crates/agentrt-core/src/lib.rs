//! The four components that carry a turn from acceptance to a terminal
//! event: [`TurnManager`] owns lifecycle and aggregation, [`PlanExecutor`]
//! turns a user request into an ordered plan, [`StepProcessor`] executes
//! each step, and [`ContextManager`] is the shared per-turn state store
//! wired between all three.

pub mod context;
pub mod plan_executor;
pub mod step_processor;
pub mod turn_manager;

pub use context::ContextManager;
pub use plan_executor::PlanExecutor;
pub use step_processor::StepProcessor;
pub use turn_manager::TurnManager;
