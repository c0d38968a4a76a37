// Broker session: connect, subscribe, pump publish payloads into a channel.
//
// The event pump runs on a background task; the collection loop only ever
// sees a bounded channel of raw payloads.

use std::time::Duration;

use bytes::Bytes;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mqtt2table_config::{BrokerConfig, SubscriptionConfig};

/// Capacity of the channel between the event pump and the collection loop.
/// A full channel applies backpressure to the pump rather than growing
/// memory under a message flood.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("connection to {addr} failed: {reason}")]
    Connect { addr: String, reason: String },

    #[error("connection to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("subscribe to '{topic}' failed: {reason}")]
    Subscribe { topic: String, reason: String },

    #[error("quality-of-service level {0} is not valid (expected 0, 1 or 2)")]
    InvalidQos(u8),
}

pub(crate) fn qos_from_level(level: u8) -> Result<QoS, BrokerError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(BrokerError::InvalidQos(other)),
    }
}

/// An established, subscribed broker connection.
///
/// Publish payloads arrive on [`BrokerSession::messages`] until the window
/// ends or the broker drops; in the latter case the channel closes and the
/// collection loop terminates early.
pub struct BrokerSession {
    client: AsyncClient,
    topic: String,
    messages: mpsc::Receiver<Bytes>,
    pump: JoinHandle<()>,
}

impl BrokerSession {
    /// Connect, wait for the broker's acknowledgement, and subscribe.
    ///
    /// The connect step is bounded by `broker.connect_timeout()`; an
    /// unreachable broker fails the run instead of hanging it.
    pub async fn connect(
        broker: &BrokerConfig,
        subscription: &SubscriptionConfig,
    ) -> Result<Self, BrokerError> {
        let qos = qos_from_level(subscription.qos)?;
        let addr = broker.addr();

        let mut options = MqttOptions::new(
            broker.client_id.clone(),
            broker.host.clone(),
            broker.port,
        );
        options.set_keep_alive(broker.keep_alive());
        if let (Some(username), Some(password)) = (&broker.username, &broker.password) {
            options.set_credentials(username.clone(), password.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, CHANNEL_CAPACITY);

        let timeout = broker.connect_timeout();
        match tokio::time::timeout(timeout, await_connack(&mut eventloop)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(BrokerError::Connect {
                    addr,
                    reason: e.to_string(),
                })
            }
            Err(_) => return Err(BrokerError::ConnectTimeout { addr, timeout }),
        }

        debug!(addr = %broker.addr(), topic = %subscription.topic, qos = subscription.qos, "connected, subscribing");
        client
            .subscribe(subscription.topic.clone(), qos)
            .await
            .map_err(|e| BrokerError::Subscribe {
                topic: subscription.topic.clone(),
                reason: e.to_string(),
            })?;

        let (tx, messages) = mpsc::channel(CHANNEL_CAPACITY);
        let pump = tokio::spawn(pump_events(eventloop, tx));

        Ok(Self {
            client,
            topic: subscription.topic.clone(),
            messages,
            pump,
        })
    }

    pub fn messages(&mut self) -> &mut mpsc::Receiver<Bytes> {
        &mut self.messages
    }

    /// Tear the session down: unsubscribe, disconnect, stop the pump.
    ///
    /// Consuming `self` makes teardown run exactly once. Failures here are
    /// logged and swallowed; they never mask the run's primary result.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.client.unsubscribe(self.topic.clone()).await {
            debug!(error = %e, "unsubscribe failed during teardown");
        }
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "disconnect failed during teardown");
        }
        if tokio::time::timeout(Duration::from_secs(1), &mut self.pump)
            .await
            .is_err()
        {
            self.pump.abort();
        }
    }
}

async fn await_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => {}
            Err(e) => return Err(e),
        }
    }
}

async fn pump_events(mut eventloop: EventLoop, tx: mpsc::Sender<Bytes>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if tx.send(publish.payload).await.is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "broker connection lost, ending window early");
                break;
            }
        }
    }
}
