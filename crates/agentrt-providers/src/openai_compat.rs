//! OpenAI-wire-compatible adapter.
//!
//! Serves both OpenAI itself and Groq (and any other provider that speaks
//! the `/chat/completions` wire format) — the two are distinguished purely
//! by `base_url`/`model`, not a separate hand-written client.

use crate::retry::{with_retry, RetryPolicy};
use crate::traits::{
    EmbedRequest, EmbedResponse, GenerateRequest, GenerateResponse, ProviderAdapter, Usage,
};
use crate::util::{from_http_status, from_reqwest, resolve_api_key};
use agentrt_domain::capability::{LlmCapabilities, ToolSupport};
use agentrt_domain::config::ProviderConfig;
use agentrt_domain::error::{Error, Result};
use agentrt_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use serde_json::Value;

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    capabilities: LlmCapabilities,
    retry_policy: RetryPolicy,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(id: &str, cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(cfg)?;
        let default_model = cfg.model.clone().unwrap_or_else(|| "gpt-4o-mini".into());

        let capabilities = LlmCapabilities {
            supports_tools: ToolSupport::Basic,
            supports_streaming: false,
            supports_json_mode: true,
            supports_vision: false,
            context_window_tokens: Some(128_000),
            max_output_tokens: Some(4_096),
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| from_reqwest(id, e))?;

        Ok(Self {
            id: id.to_string(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            capabilities,
            retry_policy: RetryPolicy::from_provider_config(cfg),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    fn effective_model(&self, req: &GenerateRequest) -> String {
        req.model.clone().unwrap_or_else(|| self.default_model.clone())
    }

    fn build_chat_body(&self, req: &GenerateRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max_tokens) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if req.json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        body
    }

    async fn send_chat(&self, body: &Value) -> Result<GenerateResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .authed_post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| from_reqwest(&self.id, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| from_reqwest(&self.id, e))?;

        if !status.is_success() {
            return Err(from_http_status(&self.id, status, &text));
        }

        let parsed: Value = serde_json::from_str(&text).map_err(Error::from)?;
        parse_chat_response(&parsed)
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => tool_result_to_openai(msg),
        Role::Assistant => assistant_to_openai(msg),
        _ => serde_json::json!({
            "role": role_to_str(msg.role),
            "content": msg.content.extract_all_text(),
        }),
    }
}

fn assistant_to_openai(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({
            "role": "assistant",
            "content": t,
        }),
        MessageContent::Parts(parts) => {
            let text = msg.content.extract_all_text();
            let tool_calls: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::ToolUse { id, name, input } => Some(serde_json::json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string(),
                        }
                    })),
                    _ => None,
                })
                .collect();
            let mut v = serde_json::json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            });
            if !tool_calls.is_empty() {
                v["tool_calls"] = Value::Array(tool_calls);
            }
            v
        }
    }
}

fn tool_result_to_openai(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Parts(parts) => parts
            .iter()
            .find_map(|p| match p {
                ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => Some(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": content,
                })),
                _ => None,
            })
            .unwrap_or_else(|| serde_json::json!({"role": "tool", "content": ""})),
        MessageContent::Text(t) => serde_json::json!({"role": "tool", "content": t}),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

fn parse_chat_response(body: &Value) -> Result<GenerateResponse> {
    let choice = body
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| Error::ProviderApi {
            provider: "openai_compat".into(),
            message: "response contained no choices".into(),
        })?;

    let message = choice.get("message").cloned().unwrap_or(Value::Null);
    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let tool_calls = parse_openai_tool_calls(&message);
    let finish_reason = choice
        .get("finish_reason")
        .and_then(|v| v.as_str())
        .map(String::from);
    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();
    let usage = body.get("usage").and_then(parse_openai_usage);

    Ok(GenerateResponse {
        content,
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

fn parse_openai_tool_calls(message: &Value) -> Vec<ToolCall> {
    message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let call_id = tc.get("id")?.as_str()?.to_string();
                    let function = tc.get("function")?;
                    let tool_name = function.get("name")?.as_str()?.to_string();
                    let raw_args = function.get("arguments").and_then(|v| v.as_str()).unwrap_or("{}");
                    let arguments: Value =
                        serde_json::from_str(raw_args).unwrap_or(Value::Object(Default::default()));
                    Some(ToolCall {
                        call_id,
                        tool_name,
                        arguments,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    let prompt_tokens = v.get("prompt_tokens")?.as_u64()? as u32;
    let completion_tokens = v.get("completion_tokens")?.as_u64()? as u32;
    let total_tokens = v
        .get("total_tokens")
        .and_then(|v| v.as_u64())
        .map(|n| n as u32)
        .unwrap_or(prompt_tokens + completion_tokens);
    Some(Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens,
    })
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiCompatProvider {
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse> {
        let body = self.build_chat_body(&req);
        tracing::debug!(provider = %self.id, model = %self.effective_model(&req), "openai-compat generate");
        with_retry(&self.retry_policy, &self.id, || self.send_chat(&body)).await
    }

    async fn embed(&self, req: EmbedRequest) -> Result<EmbedResponse> {
        let url = format!("{}/embeddings", self.base_url);
        let model = req.model.clone().unwrap_or_else(|| "text-embedding-3-small".into());
        let body = serde_json::json!({
            "model": model,
            "input": req.input,
        });

        let send = || async {
            let resp = self
                .authed_post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| from_reqwest(&self.id, e))?;
            let status = resp.status();
            let text = resp.text().await.map_err(|e| from_reqwest(&self.id, e))?;
            if !status.is_success() {
                return Err(from_http_status(&self.id, status, &text));
            }
            let parsed: Value = serde_json::from_str(&text).map_err(Error::from)?;
            let embeddings = parsed
                .get("data")
                .and_then(|v| v.as_array())
                .map(|arr| {
                    arr.iter()
                        .filter_map(|item| {
                            item.get("embedding")?.as_array().map(|v| {
                                v.iter().filter_map(|n| n.as_f64().map(|f| f as f32)).collect()
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(EmbedResponse { embeddings })
        };

        with_retry(&self.retry_policy, &self.id, send).await
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_chat_body_includes_json_mode() {
        let req = GenerateRequest {
            json_mode: true,
            ..Default::default()
        };
        let provider = test_provider();
        let body = provider.build_chat_body(&req);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn msg_to_openai_renders_tool_result_role() {
        let msg = Message::tool_result("call-1", "42");
        let v = tool_result_to_openai(&msg);
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "call-1");
        assert_eq!(v["content"], "42");
    }

    #[test]
    fn parse_chat_response_extracts_content_and_usage() {
        let body = serde_json::json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {"role": "assistant", "content": "hello"},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.content, "hello");
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_chat_response_extracts_tool_calls() {
        let body = serde_json::json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call-1",
                        "type": "function",
                        "function": {"name": "lookup", "arguments": "{\"q\":\"x\"}"}
                    }]
                },
                "finish_reason": "tool_calls",
            }],
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].tool_name, "lookup");
    }

    fn test_provider() -> OpenAiCompatProvider {
        use agentrt_domain::config::ProviderKind;
        let cfg = ProviderConfig {
            kind: ProviderKind::OpenaiCompat,
            base_url: "https://api.openai.com/v1".into(),
            model: Some("gpt-4o-mini".into()),
            api_key: Some("test-key".into()),
            api_key_env: None,
            max_retries: 2,
            base_backoff_ms: 200,
            request_timeout_ms: 30_000,
            pricing: Default::default(),
        };
        OpenAiCompatProvider::from_config("openai", &cfg).unwrap()
    }
}
