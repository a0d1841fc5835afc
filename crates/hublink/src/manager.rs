//! Discovery and routing over one bus connection.
//!
//! The manager owns the transport, aggregates things (optionally grouped by
//! physical device), replays every discovery document on each (re)connect,
//! and routes inbound command messages to the owning thing.

use std::collections::HashMap;
use std::collections::HashSet;
use std::error::Error;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::BusEvent;
use crate::client::MqttClient;
use crate::client::MqttMessage;
use crate::client::RumqttcClient;
use crate::config::Config;
use crate::device::DeviceInfo;
use crate::mac;
use crate::things::OutboundMessage;
use crate::things::OutboundReceiver;
use crate::things::OutboundSender;
use crate::things::SharedThing;
use crate::things::Thing;
use crate::things::ThingLink;
use crate::topic;

/// Identity fields resolved once, before any connection is attempted
struct Identity {
    node_id: String,
    base_topic: String,
    name: String,
    discovery_prefix: String,
    client_id: String,
    unique_identifier: String,
    mac: String,
}

impl Identity {
    fn resolve(config: &Config) -> Self {
        let node_id = config.node_id.clone().unwrap_or_else(local_hostname);
        let base_topic = config.base_topic.clone().unwrap_or_else(|| node_id.clone());
        let name = config.name.clone().unwrap_or_else(|| node_id.clone());
        let client_id = config.client_id.clone().unwrap_or_else(|| node_id.clone());
        let mac = mac::host_mac();
        let unique_identifier = config
            .unique_identifier
            .clone()
            .unwrap_or_else(|| mac.clone());

        Self {
            node_id,
            base_topic,
            name,
            discovery_prefix: config.discovery_prefix.clone(),
            client_id,
            unique_identifier,
            mac,
        }
    }
}

/// What the run loop should do next
enum Step {
    Outbound(OutboundMessage),
    Bus(Option<BusEvent>),
}

/// Aggregation root for a set of things sharing one bus connection.
///
/// Things are registered before [`run`] is called; the run loop then owns the
/// connection for the rest of the process lifetime. Host tasks keep the
/// `Arc<Mutex<T>>` handles returned at registration and mutate things through
/// them at any time.
///
/// [`run`]: Manager::run
pub struct Manager<C: MqttClient> {
    client: C,
    node_id: String,
    base_topic: String,
    discovery_prefix: String,
    unique_identifier: String,
    device_info: DeviceInfo,

    /// Things in registration order, grouped by origin device. `None` is the
    /// manager's own device.
    groups: Vec<(Option<DeviceInfo>, Vec<SharedThing>)>,

    /// Full command topic to owning thing, rebuilt on every connect
    routes: HashMap<String, SharedThing>,

    /// Short ids seen so far, to warn about topic collisions
    short_ids: HashSet<String>,

    outbound_tx: OutboundSender,
    outbound_rx: OutboundReceiver,
}

impl Manager<RumqttcClient> {
    /// Create a manager backed by a real broker connection.
    ///
    /// Identity defaults are resolved here: hostname for the node id, the
    /// node id for the base topic, name and client id, and the host hardware
    /// address for the unique identifier.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let identity = Identity::resolve(config);
        let client = RumqttcClient::new(
            config,
            &identity.client_id,
            &topic::availability(&identity.base_topic),
        )?;
        Ok(Self::from_parts(client, identity))
    }
}

impl<C: MqttClient> Manager<C> {
    /// Create a manager over an already-built transport.
    pub fn with_client(client: C, config: &Config) -> Self {
        Self::from_parts(client, Identity::resolve(config))
    }

    fn from_parts(client: C, identity: Identity) -> Self {
        info!(
            node_id = %identity.node_id,
            base_topic = %identity.base_topic,
            discovery_prefix = %identity.discovery_prefix,
            "Initializing manager"
        );

        let device_info = DeviceInfo {
            name: Some(identity.name.clone()),
            identifiers: vec![format!(
                "{}_{}",
                identity.name, identity.unique_identifier
            )],
            connections: vec![("mac".to_string(), identity.mac)],
            sw_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            ..DeviceInfo::default()
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Self {
            client,
            node_id: identity.node_id,
            base_topic: identity.base_topic,
            discovery_prefix: identity.discovery_prefix,
            unique_identifier: identity.unique_identifier,
            device_info,
            groups: Vec::new(),
            routes: HashMap::new(),
            short_ids: HashSet::new(),
            outbound_tx,
            outbound_rx,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn base_topic(&self) -> &str {
        &self.base_topic
    }

    pub fn availability_topic(&self) -> String {
        topic::availability(&self.base_topic)
    }

    /// The manager's own device block, as sent in discovery documents.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// Register a thing under the manager's own device.
    ///
    /// Returns the shared handle host code uses to reach the thing once the
    /// run loop has started. Registering after [`run`] is undefined.
    ///
    /// [`run`]: Manager::run
    pub fn add_thing<T: Thing + 'static>(&mut self, thing: T) -> Arc<Mutex<T>> {
        self.register(None, thing)
    }

    /// Register a thing presented to the hub as part of a separate physical
    /// device.
    ///
    /// Things sharing an equal `origin` become sub-entities of one device,
    /// linked back to the manager's own device.
    pub fn add_thing_on<T: Thing + 'static>(
        &mut self,
        origin: DeviceInfo,
        thing: T,
    ) -> Arc<Mutex<T>> {
        self.register(Some(origin), thing)
    }

    /// Register several things of one kind under the manager's own device.
    pub fn add_things<T: Thing + 'static>(&mut self, things: Vec<T>) -> Vec<Arc<Mutex<T>>> {
        things
            .into_iter()
            .map(|thing| self.register(None, thing))
            .collect()
    }

    /// Register several things of one kind under a separate physical device.
    pub fn add_things_on<T: Thing + 'static>(
        &mut self,
        origin: DeviceInfo,
        things: Vec<T>,
    ) -> Vec<Arc<Mutex<T>>> {
        things
            .into_iter()
            .map(|thing| self.register(Some(origin.clone()), thing))
            .collect()
    }

    fn register<T: Thing + 'static>(
        &mut self,
        origin: Option<DeviceInfo>,
        mut thing: T,
    ) -> Arc<Mutex<T>> {
        if !self.short_ids.insert(thing.short_id().to_string()) {
            warn!(
                short_id = %thing.short_id(),
                "A thing with this short id is already registered, their topics will collide"
            );
        }

        thing.bind(ThingLink::new(
            self.base_topic.clone(),
            self.outbound_tx.clone(),
        ));

        let handle = Arc::new(Mutex::new(thing));
        self.group_entry(origin).push(handle.clone());
        handle
    }

    fn group_entry(&mut self, origin: Option<DeviceInfo>) -> &mut Vec<SharedThing> {
        let index = match self.groups.iter().position(|(o, _)| *o == origin) {
            Some(index) => index,
            None => {
                self.groups.push((origin, Vec::new()));
                self.groups.len() - 1
            }
        };
        &mut self.groups[index].1
    }

    /// Connect and service the bus until the transport goes away.
    ///
    /// This is the only task that invokes thing callbacks, so command-driven
    /// state mutation is serialized here. Outbound publishes queued by host
    /// tasks are drained before new inbound work.
    pub async fn run(mut self) -> Result<(), Box<dyn Error + Send>> {
        self.client.connect().await?;

        loop {
            let step = tokio::select! {
                biased;
                Some(message) = self.outbound_rx.recv() => Step::Outbound(message),
                event = self.client.poll_event() => Step::Bus(event),
            };

            match step {
                Step::Outbound(message) => {
                    if let Err(e) = self
                        .client
                        .publish(&message.topic, &message.payload, message.retain)
                        .await
                    {
                        warn!(topic = %message.topic, "Failed to publish queued message: {}", e);
                    }
                }
                Step::Bus(Some(BusEvent::Connected)) => self.on_connect().await,
                Step::Bus(Some(BusEvent::Message(message))) => self.dispatch(message).await,
                Step::Bus(None) => {
                    info!("Transport has gone away, stopping the manager loop");
                    return Ok(());
                }
            }
        }
    }

    /// Replay subscriptions, discovery documents and availability.
    ///
    /// Runs on every (re)connect: republishing is the only way the hub
    /// recovers thing registrations after a broker restart.
    async fn on_connect(&mut self) {
        info!("Connected to the broker, replaying discovery");

        for pattern in topic::command_wildcards(&self.base_topic) {
            if let Err(e) = self.client.subscribe(&pattern).await {
                warn!(pattern = %pattern, "Failed to subscribe to command pattern: {}", e);
            }
        }

        debug!(device = ?self.device_info, "Device information for this manager");

        for (origin, things) in &self.groups {
            let mut fragment = serde_json::Map::new();
            fragment.insert("~".to_string(), json!(self.base_topic));
            fragment.insert(
                "availability_topic".to_string(),
                json!(topic::availability(&self.base_topic)),
            );
            match origin {
                None => {
                    fragment.insert("device".to_string(), json!(self.device_info));
                }
                Some(origin) => {
                    fragment.insert("device".to_string(), json!(origin));
                    if let Some(identifier) = self.device_info.identifiers.first() {
                        fragment.insert("via".to_string(), json!(identifier));
                    }
                }
            }

            for thing_arc in things {
                let thing = thing_arc.lock().await;

                // Shared fragment plus manager-computed fields first, then the
                // thing's own config merged on top: a variant may override the
                // defaults at its own risk, never remove them.
                let mut document = fragment.clone();
                document.insert(
                    "unique_id".to_string(),
                    json!(format!("{}_{}", self.unique_identifier, thing.short_id())),
                );
                document.insert("name".to_string(), json!(thing.name()));
                document.insert(
                    "json_attributes_topic".to_string(),
                    json!(topic::relative(thing.short_id(), topic::ATTRS)),
                );
                for (key, value) in thing.config() {
                    document.insert(key, value);
                }

                let config_topic = topic::config(
                    &self.discovery_prefix,
                    thing.component(),
                    &self.node_id,
                    thing.short_id(),
                );
                info!(short_id = %thing.short_id(), "Publishing discovery document");

                let payload = serde_json::Value::Object(document).to_string();
                debug!(topic = %config_topic, payload = %payload, "Discovery payload");
                if let Err(e) = self
                    .client
                    .publish(&config_topic, payload.as_bytes(), true)
                    .await
                {
                    warn!(topic = %config_topic, "Failed to publish discovery document: {}", e);
                }

                for subtopic in thing.command_topics() {
                    self.routes.insert(
                        topic::thing(&self.base_topic, thing.short_id(), subtopic),
                        thing_arc.clone(),
                    );
                }
            }
        }

        let availability = topic::availability(&self.base_topic);
        if let Err(e) = self.client.publish(&availability, b"online", true).await {
            warn!("Failed to publish availability: {}", e);
        }
    }

    /// Hand an inbound message to the thing owning its topic.
    async fn dispatch(&mut self, message: MqttMessage) {
        let Some(thing_arc) = self.routes.get(&message.topic) else {
            debug!(topic = %message.topic, "No thing owns this topic, dropping the message");
            return;
        };

        let mut thing = thing_arc.lock().await;

        // A panicking host callback must not take the dispatch loop (and with
        // it every other thing) down.
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            thing.handle_message(&message.topic, &message.payload)
        }));
        if outcome.is_err() {
            warn!(topic = %message.topic, "A thing callback panicked while handling a message");
        }
    }
}

fn local_hostname() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("Failed to resolve the hostname, falling back to `localhost`: {}", e);
            "localhost".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::client::MockMqttClient;
    use crate::things::Button;
    use crate::things::OptimisticSwitch;
    use crate::things::Sensor;

    fn test_config() -> Config {
        Config::new("localhost")
            .with_node_id("node")
            .with_base_topic("home")
            .with_name("testhost")
            .with_unique_identifier("aa:bb:cc:dd:ee:ff")
    }

    #[tokio::test]
    async fn test_connect_publishes_discovery_then_online() {
        let mut client = MockMqttClient::new();
        client.push_connected();
        let recorded = client.handle();

        let mut manager = Manager::with_client(client, &test_config());
        manager.add_thing(OptimisticSwitch::new("Relay", "relay", |_| {}));
        manager.run().await.unwrap();

        let state = recorded.lock().unwrap();
        assert!(state.is_connected);
        assert_eq!(state.subscriptions, vec!["home/+/set", "home/+/press"]);
        assert_eq!(state.published.len(), 2);

        let (topic, payload, retain) = &state.published[0];
        assert_eq!(topic, "homeassistant/switch/node/relay/config");
        assert!(*retain);
        let document: serde_json::Value = serde_json::from_slice(payload).unwrap();
        assert_eq!(document["~"], "home");
        assert_eq!(document["availability_topic"], "home/availability");
        assert_eq!(document["name"], "Relay");
        assert_eq!(document["unique_id"], "aa:bb:cc:dd:ee:ff_relay");
        assert_eq!(document["json_attributes_topic"], "~/relay/attrs");
        assert_eq!(document["command_topic"], "~/relay/set");
        assert_eq!(document["state_topic"], "~/relay/main");
        assert_eq!(
            document["device"]["identifiers"][0],
            "testhost_aa:bb:cc:dd:ee:ff"
        );
        assert_eq!(document["device"]["name"], "testhost");
        assert!(document.get("via").is_none());

        assert_eq!(
            state.published[1],
            ("home/availability".to_string(), b"online".to_vec(), true)
        );
    }

    #[tokio::test]
    async fn test_reconnect_republishes_discovery_and_availability() {
        let mut client = MockMqttClient::new();
        client.push_connected();
        client.push_connected();
        let recorded = client.handle();

        let mut manager = Manager::with_client(client, &test_config());
        manager.add_thing(OptimisticSwitch::new("Relay", "relay", |_| {}));
        manager.run().await.unwrap();

        let state = recorded.lock().unwrap();
        let topics: Vec<&str> = state.published.iter().map(|(t, _, _)| t.as_str()).collect();
        assert_eq!(
            topics,
            vec![
                "homeassistant/switch/node/relay/config",
                "home/availability",
                "homeassistant/switch/node/relay/config",
                "home/availability",
            ]
        );

        // The replayed discovery document is byte-identical to the first.
        assert_eq!(state.published[0].1, state.published[2].1);
    }

    #[tokio::test]
    async fn test_commands_route_to_the_owning_thing() {
        let mut client = MockMqttClient::new();
        client.push_connected();
        client.push_message("home/relay/set", b"ON");
        client.push_message("home/elsewhere/set", b"ON");
        client.push_message("home/reboot/press", b"PRESS");
        let recorded = client.handle();

        let presses = Arc::new(AtomicUsize::new(0));
        let counter = presses.clone();

        let mut manager = Manager::with_client(client, &test_config());
        let relay = manager.add_thing(OptimisticSwitch::new("Relay", "relay", |_| {}));
        manager.add_thing(Button::new("Reboot", "reboot", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        manager.run().await.unwrap();

        assert!(relay.lock().await.state());
        assert_eq!(presses.load(Ordering::SeqCst), 1);

        let state = recorded.lock().unwrap();
        assert!(
            state
                .published
                .contains(&("home/relay/main".to_string(), b"ON".to_vec(), false))
        );
    }

    #[tokio::test]
    async fn test_grouped_things_carry_their_device_and_via() {
        let mut client = MockMqttClient::new();
        client.push_connected();
        let recorded = client.handle();

        let origin = DeviceInfo {
            name: Some("Bridge".to_string()),
            identifiers: vec!["bridge_01".to_string()],
            ..DeviceInfo::default()
        };

        let mut manager = Manager::with_client(client, &test_config());
        manager.add_thing(OptimisticSwitch::new("Own", "own", |_| {}));
        manager.add_thing_on(origin, OptimisticSwitch::new("Remote", "remote", |_| {}));
        manager.run().await.unwrap();

        let state = recorded.lock().unwrap();

        // Group registration order decides publish order.
        let topics: Vec<&str> = state.published.iter().map(|(t, _, _)| t.as_str()).collect();
        assert_eq!(
            topics,
            vec![
                "homeassistant/switch/node/own/config",
                "homeassistant/switch/node/remote/config",
                "home/availability",
            ]
        );

        let document: serde_json::Value = serde_json::from_slice(&state.published[1].1).unwrap();
        assert_eq!(document["device"]["name"], "Bridge");
        assert_eq!(document["device"]["identifiers"][0], "bridge_01");
        assert_eq!(document["via"], "testhost_aa:bb:cc:dd:ee:ff");
    }

    #[tokio::test]
    async fn test_write_only_things_get_no_routes() {
        let mut client = MockMqttClient::new();
        client.push_connected();
        // Nothing owns this topic; the message must be dropped quietly.
        client.push_message("home/temp/set", b"21.5");
        let recorded = client.handle();

        let mut manager = Manager::with_client(client, &test_config());
        let sensor = manager.add_thing(Sensor::new("Temperature", "temp"));
        manager.run().await.unwrap();

        sensor.lock().await.publish_state(21.5f64);

        let state = recorded.lock().unwrap();
        let topics: Vec<&str> = state.published.iter().map(|(t, _, _)| t.as_str()).collect();
        assert_eq!(
            topics,
            vec!["homeassistant/sensor/node/temp/config", "home/availability"]
        );
    }

    #[tokio::test]
    async fn test_host_publishes_are_drained_by_the_loop() {
        let client = MockMqttClient::new();
        let recorded = client.handle();

        let mut manager = Manager::with_client(client, &test_config());
        let relay = manager.add_thing(OptimisticSwitch::new("Relay", "relay", |_| {}));

        relay.lock().await.set_state(true);
        manager.run().await.unwrap();

        let state = recorded.lock().unwrap();
        assert_eq!(
            state.published,
            vec![("home/relay/main".to_string(), b"ON".to_vec(), false)]
        );
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_kill_dispatch() {
        let mut client = MockMqttClient::new();
        client.push_connected();
        client.push_message("home/moody/set", b"ON");
        client.push_message("home/relay/set", b"ON");
        let recorded = client.handle();

        let mut manager = Manager::with_client(client, &test_config());
        manager.add_thing(OptimisticSwitch::new("Moody", "moody", |on| {
            if on {
                panic!("host callback exploded");
            }
        }));
        let relay = manager.add_thing(OptimisticSwitch::new("Relay", "relay", |_| {}));
        manager.run().await.unwrap();

        // The second command was still dispatched.
        assert!(relay.lock().await.state());
        let state = recorded.lock().unwrap();
        assert!(
            state
                .published
                .contains(&("home/relay/main".to_string(), b"ON".to_vec(), false))
        );
    }

    #[tokio::test]
    async fn test_duplicate_short_ids_still_register() {
        let client = MockMqttClient::new();
        let mut manager = Manager::with_client(client, &test_config());

        manager.add_thing(OptimisticSwitch::new("One", "twin", |_| {}));
        manager.add_thing(OptimisticSwitch::new("Two", "twin", |_| {}));

        assert_eq!(manager.groups.len(), 1);
        assert_eq!(manager.groups[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_add_things_returns_typed_handles() {
        let client = MockMqttClient::new();
        let mut manager = Manager::with_client(client, &test_config());

        let switches = manager.add_things(vec![
            OptimisticSwitch::new("s0", "s0", |_| {}),
            OptimisticSwitch::new("s1", "s1", |_| {}),
        ]);

        assert_eq!(switches.len(), 2);
        assert_eq!(switches[1].lock().await.short_id(), "s1");
    }
}
