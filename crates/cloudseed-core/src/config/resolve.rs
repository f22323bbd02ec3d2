use std::fmt;
use std::path::{Path, PathBuf};

use cloudseed_types::error::{Result, SeedError};

use super::types::{ConfigOverrides, MigrationConfig};

pub const CONFIG_ENV_VAR: &str = "CLOUDSEED_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Explicitly passed via `--config`.
    CliArg(PathBuf),
    /// Set via the `CLOUDSEED_CONFIG` env var.
    EnvVar(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::CliArg(p) => p,
            ConfigSource::EnvVar(p) => p,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CliArg(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::EnvVar(p) => write!(f, "{} ({CONFIG_ENV_VAR})", p.display()),
        }
    }
}

/// A config file is optional: flags alone are enough to run.
pub fn resolve_config_path(cli_config: Option<&str>) -> Option<ConfigSource> {
    resolve_config_path_with(cli_config, |k| std::env::var(k).ok())
}

fn resolve_config_path_with(
    cli_config: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Option<ConfigSource> {
    if let Some(path) = cli_config {
        return Some(ConfigSource::CliArg(PathBuf::from(path)));
    }
    env(CONFIG_ENV_VAR)
        .filter(|v| !v.is_empty())
        .map(|v| ConfigSource::EnvVar(PathBuf::from(v)))
}

/// Load and parse a YAML config file.
pub fn load_config(path: &Path) -> Result<MigrationConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| SeedError::Config(format!("cannot read '{}': {e}", path.display())))?;
    serde_yaml::from_str(&contents)
        .map_err(|e| SeedError::Config(format!("invalid config '{}': {e}", path.display())))
}

/// Config file (if any), then flag overrides, then env credentials.
pub fn resolve_config(
    cli_config: Option<&str>,
    overrides: ConfigOverrides,
) -> Result<(Option<ConfigSource>, MigrationConfig)> {
    resolve_config_with(cli_config, overrides, |k| std::env::var(k).ok())
}

fn resolve_config_with(
    cli_config: Option<&str>,
    overrides: ConfigOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> Result<(Option<ConfigSource>, MigrationConfig)> {
    let source = resolve_config_path_with(cli_config, &env);
    let mut config = match &source {
        Some(src) => load_config(src.path())?,
        None => MigrationConfig::default(),
    };
    config.apply_overrides(overrides);
    config.normalize();
    config.apply_env_credentials(&env);
    Ok((source, config))
}
