// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &ConnectorConfig) -> Result<()> {
    validate_broker_config(&config.broker)?;
    validate_subscription_config(&config.subscription)?;
    validate_window_config(&config.window)?;
    validate_sink_config(&config.sink)?;
    validate_checkpoint_config(&config.checkpoint)?;
    Ok(())
}

fn validate_broker_config(config: &BrokerConfig) -> Result<()> {
    if config.host.is_empty() {
        bail!(
            "Broker host is required\n\n\
            How to fix:\n\
              • Environment: export {}BROKER_HOST=127.0.0.1\n\
              • TOML: [broker]\n        host = \"127.0.0.1\"",
            ENV_PREFIX
        );
    }

    if config.client_id.is_empty() {
        bail!("broker.client_id must not be empty");
    }

    if config.connect_timeout_secs == 0 {
        bail!("broker.connect_timeout_secs must be greater than 0");
    }

    if config.username.is_some() != config.password.is_some() {
        bail!("broker credentials require both username and password");
    }

    Ok(())
}

fn validate_subscription_config(config: &SubscriptionConfig) -> Result<()> {
    if config.topic.is_empty() {
        bail!(
            "Topic pattern is required\n\n\
            How to fix:\n\
              • Environment: export {}TOPIC=factory/demo/hello\n\
              • TOML: [subscription]\n        topic = \"factory/demo/hello\"",
            ENV_PREFIX
        );
    }

    if config.qos > 2 {
        bail!(
            "subscription.qos must be 0, 1 or 2 (got {})",
            config.qos
        );
    }

    if config.timestamp_field.is_empty() {
        bail!("subscription.timestamp_field must not be empty");
    }

    Ok(())
}

fn validate_window_config(config: &WindowConfig) -> Result<()> {
    if config.max_wait_secs == 0 {
        bail!("window.max_wait_secs must be greater than 0");
    }

    if config.max_records == 0 {
        bail!("window.max_records must be greater than 0");
    }

    if config.max_records > 1_000_000 {
        warn!(
            max_records = config.max_records,
            "window.max_records is very large; may cause memory issues"
        );
    }

    Ok(())
}

fn validate_sink_config(config: &SinkConfig) -> Result<()> {
    if config.destination_table.is_empty() {
        bail!(
            "Destination table name is required\n\n\
            How to fix:\n\
              • Environment: export {}DESTINATION_TABLE=hello_messages\n\
              • TOML: [sink]\n        destination_table = \"hello_messages\"",
            ENV_PREFIX
        );
    }

    if config.backend == SinkBackend::Jsonl && config.dir.is_empty() {
        bail!("jsonl sink backend requires sink.dir");
    }

    Ok(())
}

fn validate_checkpoint_config(config: &CheckpointConfig) -> Result<()> {
    if config.path.is_empty() {
        bail!("checkpoint.path must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ConnectorConfig::default()).is_ok());
    }

    #[test]
    fn zero_window_bounds_are_rejected() {
        let mut config = ConnectorConfig::default();
        config.window.max_wait_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = ConnectorConfig::default();
        config.window.max_records = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn out_of_range_qos_is_rejected() {
        let mut config = ConnectorConfig::default();
        config.subscription.qos = 3;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("qos"));
    }

    #[test]
    fn half_configured_credentials_are_rejected() {
        let mut config = ConnectorConfig::default();
        config.broker.username = Some("factory".to_string());
        assert!(validate_config(&config).is_err());

        config.broker.password = Some("secret".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_topic_and_table_are_rejected() {
        let mut config = ConnectorConfig::default();
        config.subscription.topic = String::new();
        assert!(validate_config(&config).is_err());

        let mut config = ConnectorConfig::default();
        config.sink.destination_table = String::new();
        assert!(validate_config(&config).is_err());
    }
}
