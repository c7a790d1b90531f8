mod provider;
mod runtime;

pub use provider::*;
pub use runtime::*;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Typed view of configuration, assembled once at process construction
/// time and handed by reference to every other component.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub personalities: PersonalitiesConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub core_runtime: CoreRuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_providers() {
        let cfg = Config::default();
        assert!(cfg.providers.is_empty());
        assert_eq!(cfg.core_runtime.max_steps_per_plan, 16);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let toml_src = r#"
            [general]
            current_provider = "openai"

            [providers.openai]
            kind = "openai_compat"
            base_url = "https://api.openai.com/v1"
            api_key_env = "OPENAI_API_KEY"

            [core_runtime]
            max_turn_duration_seconds = 60
        "#;
        let cfg: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.general.current_provider.as_deref(), Some("openai"));
        assert_eq!(cfg.core_runtime.max_turn_duration_seconds, 60);
        let openai = cfg.providers.get("openai").unwrap();
        assert_eq!(openai.api_key_env.as_deref(), Some("OPENAI_API_KEY"));

        let serialized = toml::to_string(&cfg).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(
            reparsed.core_runtime.max_turn_duration_seconds,
            cfg.core_runtime.max_turn_duration_seconds
        );
    }
}
