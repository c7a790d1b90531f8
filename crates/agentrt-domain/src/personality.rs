use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Immutable snapshot of a loaded personality pack. Reloading the registry
/// replaces the whole instance; in-flight turns that captured a reference
/// before reload keep using it (weak-reference / snapshot semantics — a
/// reload never mutates a `PersonalityInstance` already held by a Turn).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityInstance {
    pub id: String,
    pub version: String,
    pub system_prompt_text: String,
    #[serde(default)]
    pub traits: HashMap<String, serde_json::Value>,
    pub tools_module_ref: String,
    pub available_tool_names: Vec<String>,
    #[serde(default)]
    pub default_provider: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
}

impl PersonalityInstance {
    pub fn has_tool(&self, name: &str) -> bool {
        self.available_tool_names.iter().any(|t| t == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PersonalityInstance {
        PersonalityInstance {
            id: "default".into(),
            version: "1".into(),
            system_prompt_text: "You are helpful.".into(),
            traits: HashMap::new(),
            tools_module_ref: "tools/mod".into(),
            available_tool_names: vec!["get_weather".into()],
            default_provider: Some("openai".into()),
            default_model: Some("gpt-4o".into()),
        }
    }

    #[test]
    fn has_tool_checks_available_names() {
        let p = sample();
        assert!(p.has_tool("get_weather"));
        assert!(!p.has_tool("does_not_exist"));
    }
}
