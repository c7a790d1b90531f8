//! `personality.toml` manifest format.
//!
//! Each personality pack is a directory containing `personality.toml` plus
//! the system prompt file it references. Required fields:
//! ```toml
//! id = "researcher"
//! name = "Researcher"
//! version = "1"
//! system_prompt_file = "system_prompt.md"
//! tools_module = "tools"
//!
//! [traits]
//! tone = "analytical"
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Validates a personality id: `^[a-z0-9]+(-[a-z0-9]+)*$`, matching the
/// naming rule used for skill ids.
pub fn is_valid_personality_id(id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    let mut expect_alnum = true;
    for ch in id.chars() {
        if expect_alnum {
            if !ch.is_ascii_lowercase() && !ch.is_ascii_digit() {
                return false;
            }
            expect_alnum = false;
        } else if ch == '-' {
            expect_alnum = true;
        } else if !ch.is_ascii_lowercase() && !ch.is_ascii_digit() {
            return false;
        }
    }
    !expect_alnum
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalityManifest {
    pub id: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub system_prompt_file: String,
    #[serde(default)]
    pub traits: HashMap<String, serde_json::Value>,
    pub tools_module: String,
    #[serde(default)]
    pub default_provider: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
}
