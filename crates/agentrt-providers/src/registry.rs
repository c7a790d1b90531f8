//! Provider registry.
//!
//! Constructs and holds every configured [`ProviderAdapter`]. At startup
//! the registry instantiates one adapter per entry in `[providers.*]`,
//! resolving auth eagerly. A provider that fails to initialize is logged
//! and skipped rather than aborting the whole process — callers discover
//! the gap when they look it up by id and get `None`.

use std::collections::HashMap;
use std::sync::Arc;

use agentrt_domain::config::{ModelPricing, ProviderConfig, ProviderKind};
use agentrt_domain::error::{Error, Result};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::ProviderAdapter;

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    pricing: HashMap<String, HashMap<String, ModelPricing>>,
    init_errors: Vec<ProviderInitError>,
}

#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub error: String,
}

impl ProviderRegistry {
    /// Build the registry from the `[providers.*]` table. Providers that
    /// fail to initialize are recorded in `init_errors` rather than
    /// aborting startup, so a config with partially-broken credentials
    /// still boots.
    pub fn from_config(configs: &HashMap<String, ProviderConfig>) -> Self {
        let mut providers: HashMap<String, Arc<dyn ProviderAdapter>> = HashMap::new();
        let mut pricing = HashMap::new();
        let mut init_errors = Vec::new();

        for (id, cfg) in configs {
            let built: Result<Arc<dyn ProviderAdapter>> = match cfg.kind {
                ProviderKind::OpenaiCompat => OpenAiCompatProvider::from_config(id, cfg)
                    .map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>),
                ProviderKind::Anthropic => AnthropicProvider::from_config(id, cfg)
                    .map(|p| Arc::new(p) as Arc<dyn ProviderAdapter>),
            };

            match built {
                Ok(provider) => {
                    tracing::info!(provider_id = %id, kind = ?cfg.kind, "registered provider");
                    providers.insert(id.clone(), provider);
                    pricing.insert(id.clone(), cfg.pricing.clone());
                }
                Err(e) => {
                    tracing::warn!(provider_id = %id, error = %e, "failed to initialize provider, skipping");
                    init_errors.push(ProviderInitError {
                        provider_id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Self { providers, pricing, init_errors }
    }

    /// `cost = in_tokens * in_price + out_tokens * out_price` using the
    /// configured per-model price table; `0.0` when the provider/model pair
    /// has no configured pricing.
    pub fn estimate_cost(&self, provider_id: &str, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.pricing
            .get(provider_id)
            .and_then(|models| models.get(model))
            .map(|p| p.estimate_cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn ProviderAdapter>> {
        self.providers.get(provider_id).cloned()
    }

    /// Look up the configured default provider, falling back to the sole
    /// registered provider when `current_provider` is unset and exactly one
    /// provider is registered.
    pub fn default_provider(&self, current_provider: Option<&str>) -> Result<Arc<dyn ProviderAdapter>> {
        if let Some(id) = current_provider {
            return self.get(id).ok_or_else(|| Error::Config(format!("unknown provider: {id}")));
        }
        if self.providers.len() == 1 {
            return Ok(self.providers.values().next().unwrap().clone());
        }
        Err(Error::Config(
            "no current_provider configured and more than one provider is registered".into(),
        ))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(kind: ProviderKind) -> ProviderConfig {
        ProviderConfig {
            kind,
            base_url: "https://example.test/v1".into(),
            model: Some("m".into()),
            api_key: Some("k".into()),
            api_key_env: None,
            max_retries: 1,
            base_backoff_ms: 10,
            request_timeout_ms: 1000,
            pricing: Default::default(),
        }
    }

    #[test]
    fn builds_registry_from_config_map() {
        let mut configs = HashMap::new();
        configs.insert("openai".to_string(), cfg(ProviderKind::OpenaiCompat));
        let registry = ProviderRegistry::from_config(&configs);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("openai").is_some());
        assert!(registry.init_errors().is_empty());
    }

    #[test]
    fn default_provider_falls_back_when_single_registered() {
        let mut configs = HashMap::new();
        configs.insert("anthropic".to_string(), cfg(ProviderKind::Anthropic));
        let registry = ProviderRegistry::from_config(&configs);
        let provider = registry.default_provider(None).unwrap();
        assert_eq!(provider.provider_id(), "anthropic");
    }

    #[test]
    fn default_provider_errors_when_ambiguous() {
        let mut configs = HashMap::new();
        configs.insert("openai".to_string(), cfg(ProviderKind::OpenaiCompat));
        configs.insert("anthropic".to_string(), cfg(ProviderKind::Anthropic));
        let registry = ProviderRegistry::from_config(&configs);
        assert!(registry.default_provider(None).is_err());
    }

    #[test]
    fn get_missing_provider_returns_none() {
        let registry = ProviderRegistry::from_config(&HashMap::new());
        assert!(registry.get("missing").is_none());
    }
}
