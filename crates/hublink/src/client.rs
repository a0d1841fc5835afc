use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::AsyncClient;
use rumqttc::Event;
use rumqttc::LastWill;
use rumqttc::MqttOptions;
use rumqttc::Packet;
use rumqttc::QoS;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use tracing::warn;

use crate::config::Config;

/// MQTT message received from a subscription
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    #[allow(dead_code)]
    pub retain: bool,
}

/// Event surfaced from the bus connection to the manager loop
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// The broker acknowledged a connection. Emitted on every reconnect, so
    /// subscriptions and discovery documents can be replayed.
    Connected,

    /// A message arrived on a subscribed topic.
    Message(MqttMessage),
}

/// Errors from the rumqttc-backed client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("MQTT client not connected. Call connect() first.")]
    NotConnected,

    #[error("MQTT request failed: {0}")]
    Request(#[from] rumqttc::ClientError),
}

/// Trait for MQTT client operations
///
/// This trait allows for mocking the MQTT client for testing purposes
#[async_trait]
pub trait MqttClient: Send + Sync {
    /// Connect to the MQTT broker
    async fn connect(&mut self) -> Result<(), Box<dyn Error + Send>>;

    /// Subscribe to an MQTT topic pattern
    async fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn Error + Send>>;

    /// Publish a message to an MQTT topic
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Box<dyn Error + Send>>;

    /// Poll for the next bus event
    ///
    /// Returns None once the connection task has gone away for good.
    async fn poll_event(&mut self) -> Option<BusEvent>;
}

/// Everything a mock client saw, shared with the test through a handle
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>, bool)>,
    pub is_connected: bool,
}

/// Mock MQTT client for testing
///
/// Queued events are replayed in order; once the queue is dry, `poll_event`
/// returns None and a manager loop driving this client runs to completion.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MockMqttClient {
    pub events: std::collections::VecDeque<BusEvent>,
    state: std::sync::Arc<std::sync::Mutex<MockState>>,
}

#[cfg(test)]
#[async_trait]
impl MqttClient for MockMqttClient {
    async fn connect(&mut self) -> Result<(), Box<dyn Error + Send>> {
        self.state.lock().unwrap().is_connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn Error + Send>> {
        self.state.lock().unwrap().subscriptions.push(topic.to_string());
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Box<dyn Error + Send>> {
        self.state
            .lock()
            .unwrap()
            .published
            .push((topic.to_string(), payload.to_vec(), retain));
        Ok(())
    }

    async fn poll_event(&mut self) -> Option<BusEvent> {
        self.events.pop_front()
    }
}

#[cfg(test)]
impl MockMqttClient {
    /// Create a new mock MQTT client
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the recorded traffic, usable after the client is consumed
    pub fn handle(&self) -> std::sync::Arc<std::sync::Mutex<MockState>> {
        self.state.clone()
    }

    /// Queue a connection acknowledgement
    pub fn push_connected(&mut self) {
        self.events.push_back(BusEvent::Connected);
    }

    /// Queue an inbound message
    pub fn push_message(&mut self, topic: &str, payload: &[u8]) {
        self.events.push_back(BusEvent::Message(MqttMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            retain: false,
        }));
    }
}

/// Real MQTT client implementation using rumqttc
pub struct RumqttcClient {
    /// MQTT connection options (stored for lazy initialization)
    mqtt_options: MqttOptions,

    /// AsyncClient (created in connect())
    client: Option<AsyncClient>,

    /// Event receiver (created in connect())
    event_rx: Option<mpsc::UnboundedReceiver<BusEvent>>,

    /// Background event loop task handle
    event_loop_task: Option<JoinHandle<()>>,
}

impl RumqttcClient {
    /// Create a new RumqttcClient from configuration
    ///
    /// A retained `offline` last-will is registered on `availability_topic`
    /// before any connection is attempted.
    pub fn new(config: &Config, client_id: &str, availability_topic: &str) -> anyhow::Result<Self> {
        let mut mqtt_options = MqttOptions::new(client_id, config.broker.clone(), config.port);

        // Set keep-alive interval
        mqtt_options.set_keep_alive(Duration::from_secs(30));

        // Allow large MQTT packets (2 MiB) for discovery payloads
        mqtt_options.set_max_packet_size(2 * 1024 * 1024, 2 * 1024 * 1024);

        mqtt_options.set_last_will(LastWill::new(
            availability_topic,
            "offline",
            QoS::AtMostOnce,
            true,
        ));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mqtt_options.set_credentials(username, password);
        } else if config.username.is_some() || config.password.is_some() {
            warn!("Misconfigured credentials, check that both username and password are set");
        }

        Ok(Self {
            mqtt_options,
            client: None,
            event_rx: None,
            event_loop_task: None,
        })
    }
}

#[async_trait]
impl MqttClient for RumqttcClient {
    async fn connect(&mut self) -> Result<(), Box<dyn Error + Send>> {
        // Create client and event loop
        let (client, mut event_loop) = AsyncClient::new(self.mqtt_options.clone(), 10);

        // Create channel for events
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        // Spawn background task to poll the event loop. rumqttc reconnects
        // internally, so each successful (re)connection surfaces as a fresh
        // ConnAck here.
        let task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        if event_tx.send(BusEvent::Connected).is_err() {
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let msg = MqttMessage {
                            topic: publish.topic.to_string(),
                            payload: publish.payload.to_vec(),
                            retain: publish.retain,
                        };

                        // Send to channel; if receiver dropped, exit
                        if event_tx.send(BusEvent::Message(msg)).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {
                        // Ignore other events (puback, pingresp, etc.)
                    }
                    Err(e) => {
                        warn!("MQTT event loop error: {}", e);
                        // Sleep briefly before retrying
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            info!("MQTT event loop task exiting");
        });

        self.client = Some(client);
        self.event_rx = Some(event_rx);
        self.event_loop_task = Some(task);

        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Box<dyn Error + Send>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Box::new(ClientError::NotConnected) as Box<dyn Error + Send>)?;

        client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| Box::new(ClientError::Request(e)) as Box<dyn Error + Send>)?;

        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Box<dyn Error + Send>> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| Box::new(ClientError::NotConnected) as Box<dyn Error + Send>)?;

        client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .await
            .map_err(|e| Box::new(ClientError::Request(e)) as Box<dyn Error + Send>)?;

        Ok(())
    }

    async fn poll_event(&mut self) -> Option<BusEvent> {
        match &mut self.event_rx {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl Drop for RumqttcClient {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop_task.take() {
            task.abort();
        }
    }
}
