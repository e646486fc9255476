//! Configuration types for `bodygen.toml` and the replay override table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Deserialize;

/// Root configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Path to the API description TOML, resolved relative to the config
    /// file's directory.
    pub api_description: PathBuf,
    /// Optional path to the replay override table. Absent means no function
    /// is overridden.
    pub overrides: Option<PathBuf>,
    pub output: OutputConfig,
}

/// Output file and scaffolding settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Generated source file path (e.g. `generated_replay_consumer.cpp`).
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
    /// Consumer class the generated member definitions belong to.
    pub class: String,
    /// Include directives emitted at the top of the file, in order.
    #[serde(default)]
    pub includes: Vec<String>,
    /// Nested namespaces wrapping the generated definitions, outermost first.
    #[serde(default)]
    pub namespaces: Vec<String>,
}

fn default_output_file() -> PathBuf {
    PathBuf::from("generated_replay_consumer.cpp")
}

/// Load and parse a `bodygen.toml` configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}

/// Replay override table: function name → hand-written replacement.
///
/// Loaded once before generation and read-only for the rest of the run. A
/// function is either entirely delegated to its override or entirely
/// generated; there are no partial overrides. Whether the override target
/// actually exists is not validated here — a bad name surfaces when the
/// generated source is compiled.
#[derive(Debug, Default, Deserialize)]
pub struct Overrides {
    #[serde(default)]
    functions: HashMap<String, String>,
}

impl Overrides {
    /// Load and parse an override table TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("failed to read override table {}: {}", path.display(), e)
        })?;
        let overrides: Overrides = toml::from_str(&content).map_err(|e| {
            anyhow::anyhow!("failed to parse override table {}: {}", path.display(), e)
        })?;
        Ok(overrides)
    }

    pub fn is_overridden(&self, function: &str) -> bool {
        self.functions.contains_key(function)
    }

    /// The override function name, when one is registered.
    pub fn name_for(&self, function: &str) -> Option<&str> {
        self.functions.get(function).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
