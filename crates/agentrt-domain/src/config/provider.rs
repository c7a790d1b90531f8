use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Dollars per 1 million input (prompt) tokens.
    pub input_per_1m: f64,
    /// Dollars per 1 million output (completion) tokens.
    pub output_per_1m: f64,
}

impl ModelPricing {
    /// `cost = in_tokens * in_price + out_tokens * out_price`, scaled from
    /// per-million to per-token pricing.
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_1m + output_tokens as f64 * self.output_per_1m)
            / 1_000_000.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI and any OpenAI-wire-compatible provider (Groq included —
    /// distinguished only by `base_url`/`model`, not a separate client).
    OpenaiCompat,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Literal key (dev convenience); prefer `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// `${VAR_NAME}`-style placeholder resolved against the environment
    /// during config load (see `agentrt-config::loader`).
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    #[serde(default = "d_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub pricing: HashMap<String, ModelPricing>,
}

fn d_max_retries() -> u32 {
    2
}
fn d_base_backoff_ms() -> u64 {
    200
}
fn d_request_timeout_ms() -> u64 {
    30_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_cost_matches_linear_formula() {
        let pricing = ModelPricing {
            input_per_1m: 2.50,
            output_per_1m: 10.00,
        };
        let cost = pricing.estimate_cost(1000, 500);
        assert!((cost - 0.0075).abs() < 1e-10);
    }

    #[test]
    fn estimate_cost_zero_tokens_is_zero() {
        let pricing = ModelPricing {
            input_per_1m: 5.0,
            output_per_1m: 15.0,
        };
        assert_eq!(pricing.estimate_cost(0, 0), 0.0);
    }

    #[test]
    fn provider_config_deserializes_with_defaults() {
        let json = r#"{"kind":"openai_compat","base_url":"https://api.openai.com/v1"}"#;
        let cfg: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.max_retries, 2);
        assert_eq!(cfg.base_backoff_ms, 200);
        assert!(cfg.pricing.is_empty());
    }
}
