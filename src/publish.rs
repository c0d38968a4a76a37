// Demo publisher
//
// Emits a small JSON payload on the configured topic at a fixed period so a
// local sync run has something to collect.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde_json::json;
use tracing::{debug, info, warn};

use mqtt2table_config::ConnectorConfig;

pub struct PublishOptions {
    pub period: Duration,
    pub count: Option<u64>,
}

pub async fn run(config: &ConnectorConfig, options: PublishOptions) -> Result<()> {
    let broker = &config.broker;
    // Distinct client id so the publisher can run beside a sync session.
    let client_id = format!("{}-pub-{:04x}", broker.client_id, rand::random::<u16>());

    let mut mqtt_options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
    mqtt_options.set_keep_alive(broker.keep_alive());
    if let (Some(username), Some(password)) = (&broker.username, &broker.password) {
        mqtt_options.set_credentials(username.clone(), password.clone());
    }

    let (client, mut eventloop) = AsyncClient::new(mqtt_options, 16);
    let pump = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => debug!("publisher connected"),
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "publisher connection lost");
                    break;
                }
            }
        }
    });

    let topic = &config.subscription.topic;
    info!(
        topic = %topic,
        period_secs = options.period.as_secs_f64(),
        "publishing demo messages, Ctrl+C to stop"
    );

    let mut seq: u64 = 0;
    let mut ticker = tokio::time::interval(options.period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                seq += 1;
                let payload = demo_payload(seq);
                client
                    .publish(topic.clone(), QoS::AtMostOnce, false, payload.to_string())
                    .await
                    .context("publish failed")?;
                debug!(seq, "published");
                if options.count.is_some_and(|count| seq >= count) {
                    break;
                }
            }
            _ = crate::shutdown_signal() => break,
        }
    }

    if let Err(e) = client.disconnect().await {
        debug!(error = %e, "disconnect failed");
    }
    pump.abort();
    info!(published = seq, "publisher stopped");
    Ok(())
}

fn demo_payload(seq: u64) -> serde_json::Value {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    json!({ "msg": "hello world", "seq": seq, "ts": ts })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_payload_carries_sequence_and_timestamp() {
        let payload = demo_payload(7);
        assert_eq!(payload["msg"], "hello world");
        assert_eq!(payload["seq"], 7);
        assert!(payload["ts"].as_f64().unwrap() > 1.0e9);
    }
}
