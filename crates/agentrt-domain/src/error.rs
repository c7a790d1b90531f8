use serde::Serialize;

/// The full error taxonomy shared by every core runtime component.
///
/// Each variant corresponds to one of the error kinds a Step or Turn can
/// record in its `error_info`/`error` field. `kind()` yields the stable
/// wire-level string (`error.kind` in API responses); `is_retryable()`
/// drives the retry drivers in `agentrt-providers` and the StepProcessor.
#[derive(thiserror::Error, Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum Error {
    #[error("validation: {0}")]
    Validation(String),

    #[error("provider {provider} auth failed: {message}")]
    ProviderAuth { provider: String, message: String },

    #[error("provider {provider} rejected request: {message}")]
    ProviderBadRequest { provider: String, message: String },

    #[error("provider {provider} rate limited")]
    ProviderRateLimit {
        provider: String,
        retry_after_ms: Option<u64>,
    },

    #[error("provider {provider} timed out after {elapsed_ms}ms")]
    ProviderTimeout { provider: String, elapsed_ms: u64 },

    #[error("provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error("provider {provider}: {message}")]
    ProviderApi { provider: String, message: String },

    #[error("tool {tool_name} raised: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("personality not found: {0}")]
    PersonalityNotFound(String),

    #[error("memory backend error: {0}")]
    MemoryBackend(String),

    #[error("plan generation failed after {attempts} attempts: {message}")]
    PlanGeneration { attempts: u32, message: String },

    #[error("step {step_id} execution failed: {message}")]
    StepExecutionFailure { step_id: String, message: String },

    #[error("turn {turn_id} exceeded {limit_seconds}s")]
    TurnTimeout { turn_id: String, limit_seconds: u64 },

    #[error("config: {0}")]
    Config(String),

    #[error("io: {0}")]
    Io(String),

    #[error("json: {0}")]
    Json(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl Error {
    /// Stable wire-level kind string matching the base spec's `error.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::ProviderAuth { .. } => "ProviderAuthError",
            Error::ProviderBadRequest { .. } => "ProviderBadRequest",
            Error::ProviderRateLimit { .. } => "ProviderRateLimitError",
            Error::ProviderTimeout { .. } => "ProviderTimeoutError",
            Error::ProviderUnavailable { .. } => "ProviderUnavailableError",
            Error::ProviderApi { .. } => "ProviderAPIError",
            Error::ToolExecution { .. } => "ToolExecutionError",
            Error::ToolNotFound(_) => "ToolNotFoundError",
            Error::PersonalityNotFound(_) => "ValidationError",
            Error::MemoryBackend(_) => "MemoryBackendError",
            Error::PlanGeneration { .. } => "PlanGenerationError",
            Error::StepExecutionFailure { .. } => "StepExecutionFailure",
            Error::TurnTimeout { .. } => "TurnTimeout",
            Error::Config(_) => "InternalError",
            Error::Io(_) => "InternalError",
            Error::Json(_) => "InternalError",
            Error::Internal(_) => "InternalError",
        }
    }

    /// Whether a retry driver should attempt this operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ProviderRateLimit { .. }
                | Error::ProviderTimeout { .. }
                | Error::ProviderUnavailable { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_retryable() {
        let e = Error::ProviderRateLimit {
            provider: "openai".into(),
            retry_after_ms: Some(500),
        };
        assert!(e.is_retryable());
        assert_eq!(e.kind(), "ProviderRateLimitError");
    }

    #[test]
    fn auth_error_not_retryable() {
        let e = Error::ProviderAuth {
            provider: "openai".into(),
            message: "bad key".into(),
        };
        assert!(!e.is_retryable());
        assert_eq!(e.kind(), "ProviderAuthError");
    }

    #[test]
    fn tool_not_found_not_retryable() {
        let e = Error::ToolNotFound("get_weather".into());
        assert!(!e.is_retryable());
        assert_eq!(e.kind(), "ToolNotFoundError");
    }

    #[test]
    fn kind_is_stable_across_clone() {
        let e = Error::TurnTimeout {
            turn_id: "t1".into(),
            limit_seconds: 30,
        };
        assert_eq!(e.clone().kind(), e.kind());
    }
}
