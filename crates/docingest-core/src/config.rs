//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

/// Settings of the bulk indexing pipeline, read from the `[indexer]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Initial chunk size; `None` sends the whole batch in one call first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_batch_size: Option<usize>,
    /// Largest bulk call body the reference store accepts.
    pub max_payload_bytes: usize,
    pub index_dir: String,
    pub write_alias: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            output_batch_size: None,
            max_payload_bytes: 10 * 1024 * 1024,
            index_dir: "./data/index".to_string(),
            write_alias: "messages_deflector".to_string(),
        }
    }
}

impl IndexerConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.output_batch_size == Some(0) {
            return Err(Error::InvalidConfig("indexer.output_batch_size must be at least 1".into()));
        }
        if self.max_payload_bytes == 0 {
            return Err(Error::InvalidConfig("indexer.max_payload_bytes must be at least 1".into()));
        }
        if self.write_alias.trim().is_empty() {
            return Err(Error::InvalidConfig("indexer.write_alias must not be empty".into()));
        }
        Ok(())
    }

    pub fn index_path(&self) -> PathBuf {
        expand_path(&self.index_dir)
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[indexer]` table layered over [`IndexerConfig::default`].
    pub fn indexer(&self) -> anyhow::Result<IndexerConfig> {
        let indexer: IndexerConfig = Figment::from(Serialized::defaults(IndexerConfig::default()))
            .merge(self.figment.focus("indexer"))
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read 'indexer': {}", e))?;
        Ok(indexer)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.indexer()?.validate()?;
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
