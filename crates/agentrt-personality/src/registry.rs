//! `PersonalityPackManager` — the runtime's view of loaded personality packs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use agentrt_domain::error::{Error, Result};
use agentrt_domain::personality::PersonalityInstance;
use agentrt_domain::tool::ToolDefinition;
use parking_lot::RwLock;
use serde_json::Value;

use crate::loader;
use crate::types::PersonalityTool;

/// Holds every loaded [`PersonalityInstance`] plus the tool tables bound to
/// each `tools_module`. Packs are stored behind an `RwLock<Vec<...>>` and
/// `reload` atomically swaps the whole vector — in-flight turns that
/// captured an `Arc<PersonalityInstance>` before a reload keep using the
/// pre-reload snapshot.
pub struct PersonalityPackManager {
    packs: RwLock<Vec<Arc<PersonalityInstance>>>,
    tool_modules: HashMap<String, HashMap<String, Arc<dyn PersonalityTool>>>,
    personalities_root: PathBuf,
}

impl PersonalityPackManager {
    /// Build a manager from a `tools_module -> tool table` map and load
    /// every pack found under `personalities_root`.
    pub fn load(
        personalities_root: &Path,
        tool_modules: HashMap<String, HashMap<String, Arc<dyn PersonalityTool>>>,
    ) -> Result<Self> {
        let modules = tool_modules.clone();
        let instances = loader::scan_personalities(personalities_root, move |module_ref| {
            modules
                .get(module_ref)
                .map(|tools| tools.keys().cloned().collect())
                .unwrap_or_default()
        })?;

        tracing::info!(pack_count = instances.len(), "personality packs loaded");

        Ok(Self {
            packs: RwLock::new(instances.into_iter().map(Arc::new).collect()),
            tool_modules,
            personalities_root: personalities_root.to_path_buf(),
        })
    }

    pub fn list(&self) -> Vec<Arc<PersonalityInstance>> {
        self.packs.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<PersonalityInstance>> {
        self.packs.read().iter().find(|p| p.id == id).cloned()
    }

    /// Machine-readable enumeration of the tools `personality_id` exposes,
    /// for PlanExecutor's planning prompt. Empty if the personality or its
    /// tools module is unknown.
    pub fn tool_definitions(&self, personality_id: &str) -> Vec<ToolDefinition> {
        let Some(instance) = self.get(personality_id) else {
            return Vec::new();
        };
        let Some(table) = self.tool_modules.get(&instance.tools_module_ref) else {
            return Vec::new();
        };
        instance
            .available_tool_names
            .iter()
            .filter_map(|name| {
                table.get(name).map(|tool| ToolDefinition {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: tool.parameters_schema(),
                })
            })
            .collect()
    }

    /// Invoke a tool bound to `personality_id`'s `tools_module`. Returns
    /// `Error::ToolNotFound` if the personality doesn't advertise the tool
    /// or `Error::PersonalityNotFound` if the id is unknown.
    pub async fn execute_tool(&self, personality_id: &str, tool_name: &str, arguments: Value) -> Result<Value> {
        let instance = self
            .get(personality_id)
            .ok_or_else(|| Error::PersonalityNotFound(personality_id.to_string()))?;

        if !instance.has_tool(tool_name) {
            return Err(Error::ToolNotFound(tool_name.to_string()));
        }

        let tool = self
            .tool_modules
            .get(&instance.tools_module_ref)
            .and_then(|table| table.get(tool_name))
            .ok_or_else(|| Error::ToolNotFound(tool_name.to_string()))?;

        tool.execute(arguments).await
    }

    /// Re-scan `personalities_root` and atomically replace the pack list.
    /// A pack with a load error is dropped from the new set but does not
    /// abort the reload of the others.
    pub fn reload(&self) -> Result<usize> {
        let modules = self.tool_modules.clone();
        let instances = loader::scan_personalities(&self.personalities_root, move |module_ref| {
            modules
                .get(module_ref)
                .map(|tools| tools.keys().cloned().collect())
                .unwrap_or_default()
        })?;
        let count = instances.len();
        *self.packs.write() = instances.into_iter().map(Arc::new).collect();
        tracing::info!(pack_count = count, "personality packs reloaded");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::fs;

    struct EchoTool;

    #[async_trait]
    impl PersonalityTool for EchoTool {
        async fn execute(&self, arguments: Value) -> Result<Value> {
            Ok(arguments)
        }
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes its arguments"
        }
    }

    fn write_pack(root: &Path, id: &str, tools_module: &str) {
        let dir = root.join(id);
        fs::create_dir(&dir).unwrap();
        fs::write(
            dir.join("personality.toml"),
            format!(
                r#"
                    id = "{id}"
                    name = "{id}"
                    version = "1"
                    system_prompt_file = "prompt.md"
                    tools_module = "{tools_module}"
                "#
            ),
        )
        .unwrap();
        fs::write(dir.join("prompt.md"), "be helpful").unwrap();
    }

    fn tool_modules() -> HashMap<String, HashMap<String, Arc<dyn PersonalityTool>>> {
        let mut table: HashMap<String, Arc<dyn PersonalityTool>> = HashMap::new();
        table.insert("echo".into(), Arc::new(EchoTool));
        let mut modules = HashMap::new();
        modules.insert("default".to_string(), table);
        modules
    }

    #[tokio::test]
    async fn execute_tool_dispatches_to_bound_tool() {
        let root = tempfile::tempdir().unwrap();
        write_pack(root.path(), "default", "default");
        let manager = PersonalityPackManager::load(root.path(), tool_modules()).unwrap();

        let result = manager
            .execute_tool("default", "echo", serde_json::json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn execute_tool_unknown_personality_errors() {
        let root = tempfile::tempdir().unwrap();
        let manager = PersonalityPackManager::load(root.path(), tool_modules()).unwrap();
        let err = manager.execute_tool("missing", "echo", Value::Null).await.unwrap_err();
        assert!(matches!(err, Error::PersonalityNotFound(_)));
    }

    #[tokio::test]
    async fn tool_definitions_lists_bound_tools() {
        let root = tempfile::tempdir().unwrap();
        write_pack(root.path(), "default", "default");
        let manager = PersonalityPackManager::load(root.path(), tool_modules()).unwrap();
        let defs = manager.tool_definitions("default");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
        assert_eq!(defs[0].description, "echoes its arguments");
    }

    #[test]
    fn tool_definitions_unknown_personality_is_empty() {
        let root = tempfile::tempdir().unwrap();
        let manager = PersonalityPackManager::load(root.path(), tool_modules()).unwrap();
        assert!(manager.tool_definitions("missing").is_empty());
    }

    #[test]
    fn reload_picks_up_new_packs() {
        let root = tempfile::tempdir().unwrap();
        write_pack(root.path(), "default", "default");
        let manager = PersonalityPackManager::load(root.path(), tool_modules()).unwrap();
        assert_eq!(manager.list().len(), 1);

        write_pack(root.path(), "second", "default");
        let count = manager.reload().unwrap();
        assert_eq!(count, 2);
        assert!(manager.get("second").is_some());
    }
}
