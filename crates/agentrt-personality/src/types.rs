use agentrt_domain::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// A callable bound to one personality pack. `execute` is invoked by
/// `PersonalityPackManager::execute_tool` when a `TOOL_CALL` step names a
/// tool the active pack declares in `available_tool_names`.
///
/// Binding is a name-keyed table built at load time (see `registry.rs`),
/// not true dynamic code loading — a pack cannot introduce a tool this
/// process doesn't already know how to construct.
#[async_trait]
pub trait PersonalityTool: Send + Sync {
    async fn execute(&self, arguments: Value) -> Result<Value>;

    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for `arguments`, surfaced to the LLM during plan
    /// generation via `ToolDefinition`.
    fn parameters_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
}
