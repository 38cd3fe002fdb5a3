//! Configuration file and transformation profiles.

use kgx_core::{FilterSet, TransformConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default CLI options.
    pub defaults: Defaults,
    /// User-defined profiles: named transformation configs.
    #[serde(default)]
    pub profiles: HashMap<String, TransformConfig>,
}

/// Default CLI options.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Enable verbose output by default.
    pub verbose: bool,
    /// Enable quiet output by default.
    pub quiet: bool,
    /// Stream records straight to the output by default.
    pub stream: bool,
    /// Profile applied when `--profile` is not given.
    pub profile: Option<String>,
    /// Separator for multivalued cells in TSV/CSV files.
    pub list_delimiter: Option<char>,
}

impl Config {
    /// Load config from the default location (~/.config/kgx/config.toml).
    pub fn load() -> Self {
        Self::load_from_path(Self::default_path())
    }

    /// Load config from a specific path.
    pub fn load_from_path(path: Option<PathBuf>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kgx").join("config.toml"))
    }

    /// Get a profile by name (user-defined or built-in).
    pub fn get_profile(&self, name: &str) -> Option<TransformConfig> {
        if let Some(profile) = self.profiles.get(name) {
            return Some(profile.clone());
        }

        builtin_profile(name)
    }
}

/// Built-in profiles.
fn builtin_profile(name: &str) -> Option<TransformConfig> {
    match name {
        "prune" => Some(TransformConfig::new().prune_dangling_edges(true)),
        "gene-disease" => Some(
            TransformConfig::new()
                .with_node_filters(
                    FilterSet::new().allow("category", ["biolink:Gene", "biolink:Disease"]),
                )
                .prune_dangling_edges(true),
        ),
        "stream-store" => {
            let mut config = TransformConfig::new();
            config.store_while_streaming = true;
            Some(config)
        }
        _ => None,
    }
}

/// List the built-in profiles.
pub fn list_profiles() -> Vec<(&'static str, &'static str)> {
    vec![
        ("prune", "Drop edges whose endpoints were filtered out"),
        ("gene-disease", "Keep genes and diseases only, pruning dangling edges"),
        ("stream-store", "Keep records in memory while streaming"),
    ]
}
