use agentrt_domain::capability::{LlmCapabilities, ToolSupport};
use agentrt_domain::error::Result;
use agentrt_domain::tool::{Message, ToolCall, ToolDefinition};

/// A provider-agnostic request to generate a completion.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// The conversation messages to send.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature (0.0 - 2.0). `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response. `None` lets the provider choose.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling threshold. `None` lets the provider choose.
    pub top_p: Option<f32>,
    /// Sequences that stop generation when produced.
    pub stop: Vec<String>,
    /// When `true`, request an incremental token stream instead of one
    /// complete response.
    pub stream: bool,
    /// When `true`, request the model to respond with valid JSON only.
    pub json_mode: bool,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

impl GenerateRequest {
    /// Drop any option the target's capabilities can't honor, returning the
    /// name of each dropped option so the caller can record it in metrics.
    /// `temperature`/`max_tokens`/`top_p`/`stop` are recognized uniformly by
    /// every adapter and are never dropped here.
    pub fn apply_capabilities(&mut self, capabilities: &LlmCapabilities) -> Vec<&'static str> {
        let mut dropped = Vec::new();

        if !self.tools.is_empty() && capabilities.supports_tools == ToolSupport::None {
            self.tools.clear();
            dropped.push("tools");
        }
        if self.json_mode && !capabilities.supports_json_mode {
            self.json_mode = false;
            dropped.push("response_format");
        }
        if self.stream && !capabilities.supports_streaming {
            self.stream = false;
            dropped.push("stream");
        }

        dropped
    }
}

/// A provider-agnostic completion response.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub model: String,
    pub finish_reason: Option<String>,
}

/// Token usage reported by a provider for one call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct EmbedRequest {
    pub input: Vec<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmbedResponse {
    pub embeddings: Vec<Vec<f32>>,
}

/// A moderation check on a single piece of text.
#[derive(Debug, Clone)]
pub struct ModerateRequest {
    pub input: String,
}

#[derive(Debug, Clone)]
pub struct ModerateResponse {
    pub flagged: bool,
    pub categories: Vec<String>,
}

/// Implemented by every LLM adapter (`OpenAiCompatProvider`, `AnthropicProvider`, ...).
/// `generate`/`embed`/`moderate` are the only operations a PlanExecutor or
/// StepProcessor may call; no streaming delta surface is exposed here.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse>;

    async fn embed(&self, req: EmbedRequest) -> Result<EmbedResponse>;

    /// Default implementation reports nothing flagged; most providers do
    /// not expose a distinct moderation endpoint. `OpenAiCompatProvider`
    /// and `AnthropicProvider` both rely on this default.
    async fn moderate(&self, _req: ModerateRequest) -> Result<ModerateResponse> {
        Ok(ModerateResponse {
            flagged: false,
            categories: Vec::new(),
        })
    }

    fn capabilities(&self) -> &LlmCapabilities;

    fn provider_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_capabilities_drops_unsupported_stream_and_json_mode() {
        let caps = LlmCapabilities {
            supports_tools: ToolSupport::None,
            supports_streaming: false,
            supports_json_mode: false,
            ..Default::default()
        };
        let mut req = GenerateRequest {
            tools: vec![ToolDefinition {
                name: "get_weather".into(),
                description: "".into(),
                parameters: serde_json::json!({}),
            }],
            json_mode: true,
            stream: true,
            ..Default::default()
        };

        let mut dropped = req.apply_capabilities(&caps);
        dropped.sort_unstable();
        assert_eq!(dropped, vec!["response_format", "stream", "tools"]);
        assert!(req.tools.is_empty());
        assert!(!req.json_mode);
        assert!(!req.stream);
    }

    #[test]
    fn apply_capabilities_keeps_supported_options() {
        let caps = LlmCapabilities {
            supports_tools: ToolSupport::Basic,
            supports_streaming: true,
            supports_json_mode: true,
            ..Default::default()
        };
        let mut req = GenerateRequest {
            tools: vec![ToolDefinition {
                name: "get_weather".into(),
                description: "".into(),
                parameters: serde_json::json!({}),
            }],
            json_mode: true,
            stream: true,
            ..Default::default()
        };

        let dropped = req.apply_capabilities(&caps);
        assert!(dropped.is_empty());
        assert_eq!(req.tools.len(), 1);
        assert!(req.json_mode);
        assert!(req.stream);
    }
}
