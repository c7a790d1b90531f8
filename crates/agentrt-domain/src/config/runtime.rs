use serde::{Deserialize, Serialize};

/// `[core_runtime]` — bounds enforced by PlanExecutor, StepProcessor, and
/// TurnManager. Field names match the base spec's recognized config keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreRuntimeConfig {
    #[serde(default = "d_turn_seconds")]
    pub max_turn_duration_seconds: u64,
    #[serde(default = "d_steps_per_plan")]
    pub max_steps_per_plan: u32,
    #[serde(default = "d_plan_retries")]
    pub max_plan_generation_retries: u32,
    #[serde(default = "d_step_retries")]
    pub max_step_execution_retries: u32,
    #[serde(default = "d_history_turns")]
    pub max_conversation_history_turns: u32,
    #[serde(default = "d_context_tokens")]
    pub max_context_tokens_for_llm: u32,
    /// Max in-flight steps across the process (StepProcessor semaphore).
    #[serde(default = "d_max_in_flight_steps")]
    pub max_in_flight_steps: usize,
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for CoreRuntimeConfig {
    fn default() -> Self {
        Self {
            max_turn_duration_seconds: d_turn_seconds(),
            max_steps_per_plan: d_steps_per_plan(),
            max_plan_generation_retries: d_plan_retries(),
            max_step_execution_retries: d_step_retries(),
            max_conversation_history_turns: d_history_turns(),
            max_context_tokens_for_llm: d_context_tokens(),
            max_in_flight_steps: d_max_in_flight_steps(),
            fail_fast: false,
        }
    }
}

fn d_turn_seconds() -> u64 {
    120
}
fn d_steps_per_plan() -> u32 {
    16
}
fn d_plan_retries() -> u32 {
    2
}
fn d_step_retries() -> u32 {
    2
}
fn d_history_turns() -> u32 {
    20
}
fn d_context_tokens() -> u32 {
    8_000
}
fn d_max_in_flight_steps() -> usize {
    16
}

/// `[general]`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub current_provider: Option<String>,
}

/// `[personalities]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalitiesConfig {
    #[serde(default = "d_personalities_dir")]
    pub directory: String,
    #[serde(default = "d_default_personality")]
    pub default_personality_id: String,
}

impl Default for PersonalitiesConfig {
    fn default() -> Self {
        Self {
            directory: d_personalities_dir(),
            default_personality_id: d_default_personality(),
        }
    }
}

fn d_personalities_dir() -> String {
    "personalities".into()
}
fn d_default_personality() -> String {
    "default".into()
}

/// `[memory]` and `[memory.lancedb]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub redis_enabled: bool,
    #[serde(default)]
    pub vector_store_enabled: bool,
    #[serde(default)]
    pub lancedb: Option<LanceDbConfig>,
    /// Base URL of the REST-backed Memory Service the core's
    /// `MemoryManager` facade talks to. Absent means memory is disabled;
    /// `MemoryManager` then answers every call in degraded mode.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "d_memory_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "d_memory_max_retries")]
    pub max_retries: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            redis_enabled: false,
            vector_store_enabled: false,
            lancedb: None,
            base_url: None,
            api_key: None,
            api_key_env: None,
            timeout_ms: d_memory_timeout_ms(),
            max_retries: d_memory_max_retries(),
        }
    }
}

fn d_memory_timeout_ms() -> u64 {
    5_000
}
fn d_memory_max_retries() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanceDbConfig {
    pub uri: String,
    pub table_name: String,
    #[serde(default)]
    pub embedding_function_name: Option<String>,
    #[serde(default)]
    pub embedding_model_name: Option<String>,
}

/// `[redis]`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RedisConfig {
    #[serde(default)]
    pub url: Option<String>,
}

/// `[logging]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "d_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: d_log_level(),
        }
    }
}

fn d_log_level() -> String {
    "info".into()
}
