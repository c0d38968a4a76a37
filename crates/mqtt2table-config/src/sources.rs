// Configuration source loading.
//
// Layer order (lowest to highest):
// 1. Built-in defaults
// 2. Environment variables (MQTT2TABLE_* prefix, conventional MQTT_* names)
// 3. Config file path from MQTT2TABLE_CONFIG
// 4. Inline config content from MQTT2TABLE_CONFIG_CONTENT
// 5. Default config files (./config.toml, ./.mqtt2table.toml)

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::{ConfigOverlay, ConnectorConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

/// Load configuration from default locations and the environment.
pub fn load_config() -> Result<ConnectorConfig> {
    let mut config = ConnectorConfig::default();

    let env_source = StdEnvSource;
    env_overrides::apply_env_overrides(&mut config, &env_source)?;

    if let Some(overlay) = load_overlay_from_default_locations()? {
        config.apply_overlay(overlay);
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file path (for the CLI --config flag).
/// Returns an error if the file doesn't exist or can't be parsed. Environment
/// overrides are still applied underneath the file layer.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<ConnectorConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let overlay: ConfigOverlay = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

    let mut config = ConnectorConfig::default();
    let env_source = StdEnvSource;
    env_overrides::apply_env_overrides(&mut config, &env_source)?;
    config.apply_overlay(overlay);

    config.validate()?;
    Ok(config)
}

fn load_overlay_from_default_locations() -> Result<Option<ConfigOverlay>> {
    if let Ok(path) = env::var(format!("{}CONFIG", ENV_PREFIX)) {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let overlay: ConfigOverlay = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;
        return Ok(Some(overlay));
    }

    if let Ok(content) = env::var(format!("{}CONFIG_CONTENT", ENV_PREFIX)) {
        let overlay: ConfigOverlay = toml::from_str(&content)
            .context("Failed to parse inline config from MQTT2TABLE_CONFIG_CONTENT")?;
        return Ok(Some(overlay));
    }

    for path in &["./config.toml", "./.mqtt2table.toml"] {
        if Path::new(path).exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path))?;
            let overlay: ConfigOverlay = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path))?;
            return Ok(Some(overlay));
        }
    }

    Ok(None)
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}
