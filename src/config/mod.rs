mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable forcing the container engine.
pub const ENGINE_ENV: &str = "FRAMESENSE_CONTAINER_ENGINE";

/// Environment variable enabling command tracing.
pub const DEBUG_ENV: &str = "FRAMESENSE_DEBUG";

/// Environment variable pointing at the collections manifest.
pub const COLLECTIONS_ENV: &str = "FRAMESENSE_COLLECTIONS";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./framesense.toml",
        "~/.config/framesense/config.toml",
        "/etc/framesense/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {}", path.display());
            return load_config(path);
        }
    }

    let mut config = Config::default();
    expand_paths(&mut config);
    Ok(config)
}

/// Let environment variables override file settings.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(engine) = env_value(ENGINE_ENV) {
        config.engine.engine = Some(engine);
    }
}

/// Whether `FRAMESENSE_DEBUG` asks for command tracing.
pub fn debug_from_env() -> bool {
    env_value(DEBUG_ENV).is_some_and(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false"))
}

/// Collections manifest named by `FRAMESENSE_COLLECTIONS`.
pub fn collections_from_env() -> Option<PathBuf> {
    env_value(COLLECTIONS_ENV).map(PathBuf::from)
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn expand_paths(config: &mut Config) {
    config.engine.image_cache_dir = expand(&config.engine.image_cache_dir);
    config.operators.dir = expand(&config.operators.dir);
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if let Some(engine) = &config.engine.engine {
        engine
            .parse::<framesense_container::ContainerEngine>()
            .with_context(|| format!("Invalid [engine] engine: {engine:?}"))?;
    }

    if config.engine.image_namespace.is_empty() {
        anyhow::bail!("[engine] image_namespace cannot be empty");
    }

    if config.service.host_port == 0 || config.service.container_port == 0 {
        anyhow::bail!("Service ports cannot be 0");
    }

    if config.service.ready_marker.is_empty() {
        anyhow::bail!("[service] ready_marker cannot be empty");
    }

    if config.service.startup_timeout_secs == 0 {
        anyhow::bail!("[service] startup_timeout_secs must be positive");
    }

    if config.service.name_prefix.is_empty() {
        anyhow::bail!("[service] name_prefix cannot be empty");
    }

    if !config.operators.dir.exists() {
        tracing::warn!("Operators directory does not exist: {:?}", config.operators.dir);
    }

    Ok(())
}
