//! replay-bodygen — API description → replay consumer bodies.
//!
//! Reads a TOML description of an API's functions and structures and emits
//! the C++ member definitions that turn decoded capture-file parameters back
//! into live API calls: handle remapping, output allocation, external-object
//! resolution, and dispatch-table routing.
//!
//! # Quick start
//!
//! Generate the consumer source from a config (suitable for a build step):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads config TOML, loads the API description, writes the source file.
//! replay_bodygen::run(Path::new("bodygen.toml"), None).unwrap();
//! ```
//!
//! Or get the generated text without writing to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let source = replay_bodygen::generate(Path::new("bodygen.toml")).unwrap();
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

pub mod assemble;
pub mod config;
pub mod emit;
pub mod index;
pub mod marshal;
pub mod model;

/// Run the full pipeline: load config, load the API description and override
/// table, generate the consumer source, and write the output file.
///
/// `config_path` is the path to a `bodygen.toml` configuration file.
/// `output` optionally overrides the output file path from the config.
///
/// Returns the path the source file was written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let source = generate_from_config(&cfg, base_dir)?;

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(&cfg.output.file),
    };
    std::fs::write(&output_path, &source)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        size = source.len(),
        "wrote replay consumer source"
    );

    Ok(output_path)
}

/// Parse a `bodygen.toml` config file and return the generated consumer
/// source without writing to disk.
pub fn generate(config_path: &Path) -> Result<String> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    generate_from_config(&cfg, base_dir)
}

/// Generate the consumer source from an already-loaded [`config::Config`].
///
/// `base_dir` is the directory relative to which the API description and
/// override table paths are resolved (typically the parent directory of the
/// TOML file).
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Result<String> {
    let description_path = base_dir.join(&cfg.api_description);
    let api = model::load_description(&description_path)
        .with_context(|| format!("loading api description {}", description_path.display()))?;

    info!(
        functions = api.functions.len(),
        structs = api.structs.len(),
        handle_types = api.handle_types.len(),
        "loaded api description"
    );

    // Phase 1: whole-description struct indexes. A call body may reference a
    // struct declared after the functions that use it, so both indexes are
    // complete before any body is generated.
    let indexes = index::StructIndexes::build(&api);

    let overrides = match &cfg.overrides {
        Some(p) => {
            let path = base_dir.join(p);
            let overrides = config::Overrides::load(&path)
                .with_context(|| format!("loading override table {}", path.display()))?;
            info!(overrides = overrides.len(), "loaded override table");
            overrides
        }
        None => config::Overrides::default(),
    };

    // Phase 2: generate every call body against the read-only indexes.
    let mut generator = emit::ReplayBodyGenerator::new(&api, &indexes, &overrides, &cfg.output);
    let source = emit::generate_source(&api, &mut generator);

    info!(size = source.len(), "generated replay consumer source");

    Ok(source)
}
