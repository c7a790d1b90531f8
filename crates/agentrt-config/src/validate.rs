//! Cross-field invariants a single sub-struct's `Default` can't express.

use agentrt_domain::config::Config;
use agentrt_domain::error::{Error, Result};

pub fn validate(config: &Config) -> Result<()> {
    if let Some(current) = &config.general.current_provider {
        if !config.providers.contains_key(current) {
            return Err(Error::Config(format!(
                "general.current_provider '{current}' has no matching [providers.{current}] entry"
            )));
        }
    }

    if config.core_runtime.max_steps_per_plan == 0 {
        return Err(Error::Config("core_runtime.max_steps_per_plan must be > 0".into()));
    }
    if config.core_runtime.max_in_flight_steps == 0 {
        return Err(Error::Config("core_runtime.max_in_flight_steps must be > 0".into()));
    }
    if config.core_runtime.max_turn_duration_seconds == 0 {
        return Err(Error::Config("core_runtime.max_turn_duration_seconds must be > 0".into()));
    }

    for (name, provider) in &config.providers {
        if provider.base_url.trim().is_empty() {
            return Err(Error::Config(format!("providers.{name}.base_url must not be empty")));
        }
    }

    Ok(())
}
