use crate::{ConnectorConfig, LogFormat, SinkBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "MQTT2TABLE_";

/// Abstraction over environment-variable lookups so tests (and runtimes
/// without `std::env`) can supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the MQTT2TABLE_ prefix.
    /// Used for the conventional broker variables (MQTT_HOST, MQTT_PORT, TOPIC).
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides to the connector config.
/// Prefixed variables win over the conventional unprefixed names.
pub fn apply_env_overrides<E: EnvSource>(config: &mut ConnectorConfig, env: &E) -> Result<()> {
    // Broker
    if let Some(host) = get_env_string(env, "BROKER_HOST")? {
        config.broker.host = host;
    } else if let Some(host) = get_raw_env_string(env, "MQTT_HOST")? {
        config.broker.host = host;
    }
    if let Some(port) = get_env_u16(env, "BROKER_PORT")? {
        config.broker.port = port;
    } else if let Some(port) = get_raw_env_u16(env, "MQTT_PORT")? {
        config.broker.port = port;
    }
    if let Some(username) = get_env_string(env, "BROKER_USERNAME")? {
        config.broker.username = Some(username);
    }
    if let Some(password) = get_env_string(env, "BROKER_PASSWORD")? {
        config.broker.password = Some(password);
    }
    if let Some(client_id) = get_env_string(env, "CLIENT_ID")? {
        config.broker.client_id = client_id;
    }
    if let Some(val) = get_env_u64(env, "KEEP_ALIVE_SECS")? {
        config.broker.keep_alive_secs = val;
    }
    if let Some(val) = get_env_u64(env, "CONNECT_TIMEOUT_SECS")? {
        config.broker.connect_timeout_secs = val;
    }

    // Subscription
    if let Some(topic) = get_env_string(env, "TOPIC")? {
        config.subscription.topic = topic;
    } else if let Some(topic) = get_raw_env_string(env, "TOPIC")? {
        config.subscription.topic = topic;
    }
    if let Some(qos) = get_env_u8(env, "QOS")? {
        config.subscription.qos = qos;
    }
    if let Some(field) = get_env_string(env, "TIMESTAMP_FIELD")? {
        config.subscription.timestamp_field = field;
    }

    // Window
    if let Some(val) = get_env_u64(env, "WINDOW_MAX_WAIT_SECS")? {
        config.window.max_wait_secs = val;
    }
    if let Some(val) = get_env_usize(env, "WINDOW_MAX_RECORDS")? {
        config.window.max_records = val;
    }

    // Sink
    if let Some(backend) = get_env_string(env, "SINK_BACKEND")? {
        config.sink.backend = backend
            .parse::<SinkBackend>()
            .context("Invalid MQTT2TABLE_SINK_BACKEND value")?;
    }
    if let Some(table) = get_env_string(env, "DESTINATION_TABLE")? {
        config.sink.destination_table = table;
    }
    if let Some(dir) = get_env_string(env, "SINK_DIR")? {
        config.sink.dir = dir;
    }

    // Checkpoint
    if let Some(path) = get_env_string(env, "CHECKPOINT_PATH")? {
        config.checkpoint.path = path;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u16<E: EnvSource>(env: &E, key: &str) -> Result<Option<u16>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u16>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u8<E: EnvSource>(env: &E, key: &str) -> Result<Option<u8>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u8>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_raw_env_u16<E: EnvSource>(env: &E, key: &str) -> Result<Option<u16>> {
    match get_raw_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u16>()
                .map_err(|e| anyhow!("Failed to parse {}: {}", key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
