//! Reads the TOML config file, resolves `${VAR_NAME}` environment
//! placeholders, and validates the typed result before any other
//! component is constructed.
//!
//! Grounded on the teacher's `Config::load`/`load_or_default`
//! (`src/config.rs`) for the read-then-parse shape, generalized with a
//! placeholder-substitution pass and a cross-field validator neither of
//! which the teacher's single-tenant config needed.

mod placeholder;
mod validate;

use std::path::Path;

use agentrt_domain::error::{Error, Result};
use agentrt_domain::config::Config;

pub use validate::validate;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Read `path`, substitute `${VAR_NAME}` placeholders against the
    /// process environment, and parse the result into a [`Config`].
    pub fn load(path: &Path) -> Result<Config> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;
        let resolved = placeholder::substitute(&raw)?;
        toml::from_str(&resolved).map_err(|e| Error::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Load from `path` if it exists, otherwise fall back to
    /// [`Config::default`]. Used for local development where a config file
    /// is optional.
    pub fn load_or_default(path: &Path) -> Config {
        if path.exists() {
            Self::load(path).unwrap_or_default()
        } else {
            Config::default()
        }
    }

    /// Enforce the cross-field invariants a single sub-struct's `Default`
    /// can't express on its own.
    pub fn validate(config: &Config) -> Result<()> {
        validate::validate(config)
    }
}
