use std::path::Path;

use agentrt_domain::error::{Error, Result};
use agentrt_domain::personality::PersonalityInstance;

use crate::manifest::{is_valid_personality_id, PersonalityManifest};

/// Load one personality pack directory into a [`PersonalityInstance`].
pub fn load_personality(pack_dir: &Path, available_tool_names: Vec<String>) -> Result<PersonalityInstance> {
    let manifest_path = pack_dir.join("personality.toml");
    let content = std::fs::read_to_string(&manifest_path)?;
    let manifest: PersonalityManifest = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {e}", manifest_path.display())))?;

    if !is_valid_personality_id(&manifest.id) {
        return Err(Error::Validation(format!("invalid personality id: {}", manifest.id)));
    }

    let prompt_path = pack_dir.join(&manifest.system_prompt_file);
    let system_prompt_text = std::fs::read_to_string(&prompt_path)?;

    Ok(PersonalityInstance {
        id: manifest.id,
        version: manifest.version,
        system_prompt_text,
        traits: manifest.traits,
        tools_module_ref: manifest.tools_module,
        available_tool_names,
        default_provider: manifest.default_provider,
        default_model: manifest.default_model,
    })
}

/// Scan a personalities directory and load every subdirectory containing a
/// `personality.toml`. A pack that fails to load (missing file, bad TOML,
/// invalid id) is logged and skipped — it never aborts the whole load.
pub fn scan_personalities(
    personalities_root: &Path,
    tools_for_module: impl Fn(&str) -> Vec<String>,
) -> Result<Vec<PersonalityInstance>> {
    let mut instances = Vec::new();
    if !personalities_root.exists() {
        return Ok(instances);
    }

    for entry in std::fs::read_dir(personalities_root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if !path.join("personality.toml").exists() {
            continue;
        }

        match load_personality(&path, Vec::new()) {
            Ok(mut instance) => {
                instance.available_tool_names = tools_for_module(&instance.tools_module_ref);
                instances.push(instance);
            }
            Err(e) => {
                tracing::warn!(
                    pack_dir = %path.display(),
                    error = %e,
                    "skipping personality pack directory"
                );
            }
        }
    }

    instances.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_a_valid_pack() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("personality.toml"),
            r#"
                id = "researcher"
                name = "Researcher"
                version = "1"
                system_prompt_file = "prompt.md"
                tools_module = "research"
            "#,
        )
        .unwrap();
        fs::write(dir.path().join("prompt.md"), "You are a careful researcher.").unwrap();

        let instance = load_personality(dir.path(), vec!["web_search".into()]).unwrap();
        assert_eq!(instance.id, "researcher");
        assert_eq!(instance.system_prompt_text, "You are a careful researcher.");
        assert_eq!(instance.available_tool_names, vec!["web_search".to_string()]);
    }

    #[test]
    fn load_rejects_invalid_personality_id() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("personality.toml"),
            r#"
                id = "Not Valid"
                name = "Invalid"
                version = "1"
                system_prompt_file = "prompt.md"
                tools_module = "none"
            "#,
        )
        .unwrap();
        fs::write(dir.path().join("prompt.md"), "irrelevant").unwrap();

        let err = load_personality(dir.path(), Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn scan_skips_directory_with_invalid_id() {
        let root = tempfile::tempdir().unwrap();
        let pack_dir = root.path().join("Bad_Id");
        fs::create_dir(&pack_dir).unwrap();
        fs::write(
            pack_dir.join("personality.toml"),
            r#"
                id = "Bad_Id"
                name = "Bad"
                version = "1"
                system_prompt_file = "prompt.md"
                tools_module = "none"
            "#,
        )
        .unwrap();
        fs::write(pack_dir.join("prompt.md"), "irrelevant").unwrap();

        let instances = scan_personalities(root.path(), |_| Vec::new()).unwrap();
        assert!(instances.is_empty());
    }

    #[test]
    fn scan_skips_directory_with_missing_prompt_file() {
        let root = tempfile::tempdir().unwrap();
        let pack_dir = root.path().join("broken");
        fs::create_dir(&pack_dir).unwrap();
        fs::write(
            pack_dir.join("personality.toml"),
            r#"
                id = "broken"
                name = "Broken"
                version = "1"
                system_prompt_file = "missing.md"
                tools_module = "none"
            "#,
        )
        .unwrap();

        let instances = scan_personalities(root.path(), |_| Vec::new()).unwrap();
        assert!(instances.is_empty());
    }

    #[test]
    fn scan_returns_empty_for_missing_root() {
        let instances = scan_personalities(Path::new("/nonexistent/path/xyz"), |_| Vec::new()).unwrap();
        assert!(instances.is_empty());
    }
}
