//! Thing abstraction and the concrete thing variants.
//!
//! A thing is one controllable or observable unit exposed to the hub. Each
//! variant composes a [`ThingCore`] (identity plus publish capability) with
//! its own state-tracking policy and typed command callback.

mod button;
mod fan;
mod light;
mod number;
mod sensor;
mod switch;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

pub use button::Button;
pub use fan::BinaryOptimisticFan;
pub use fan::PercentageOptimisticFan;
pub use light::DimmableLight;
pub use number::OptimisticNumber;
pub use sensor::BinarySensor;
pub use sensor::Sensor;
pub use switch::ExplicitSwitch;
pub use switch::OptimisticSwitch;
pub use switch::StatelessSwitch;

use crate::state::StateValue;
use crate::topic;

/// A thing shared between the manager's dispatch loop and host tasks
pub type SharedThing = Arc<Mutex<dyn Thing>>;

/// Message queued by a thing for publication by the manager loop
#[derive(Debug, Clone)]
pub(crate) struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

pub(crate) type OutboundSender = mpsc::UnboundedSender<OutboundMessage>;
pub(crate) type OutboundReceiver = mpsc::UnboundedReceiver<OutboundMessage>;

/// Component tag fixed per variant
///
/// Selects the discovery-prefix path segment and thus how the hub renders the
/// thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Switch,
    Light,
    Fan,
    Sensor,
    BinarySensor,
    Number,
    Button,
}

impl Component {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Light => "light",
            Self::Fan => "fan",
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Number => "number",
            Self::Button => "button",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific discovery fields, merged over the manager's shared config
/// fragment
pub type ConfigFields = serde_json::Map<String, serde_json::Value>;

/// Base trait implemented by every thing variant
pub trait Thing: Send {
    /// Identity and publish capability shared by every variant
    fn core(&self) -> &ThingCore;

    fn core_mut(&mut self) -> &mut ThingCore;

    /// Component tag; immutable for the lifetime of the thing
    fn component(&self) -> Component;

    /// The variant's own discovery fields
    ///
    /// Only fields the variant declares (and that are set) are emitted; the
    /// manager supplies `name`, `unique_id`, `json_attributes_topic` and the
    /// shared fragment around them.
    fn config(&self) -> ConfigFields;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn short_id(&self) -> &str {
        self.core().short_id()
    }

    /// Subtopics (relative to `{base_topic}/{short_id}`) to route to this
    /// thing; empty for write-only things
    fn command_topics(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Decode an inbound command payload and invoke the typed callback
    ///
    /// Decoding failures are logged and dropped, never raised to the manager.
    fn handle_message(&mut self, _topic: &str, _payload: &[u8]) {}

    /// Assign the manager back-reference; called exactly once, at
    /// registration
    fn bind(&mut self, link: ThingLink) {
        self.core_mut().bind(link);
    }
}

/// Back-reference from a thing to its owning manager: the base topic plus the
/// manager's outbound publish queue
#[derive(Debug, Clone)]
pub struct ThingLink {
    base_topic: String,
    tx: OutboundSender,
}

impl ThingLink {
    pub(crate) fn new(base_topic: String, tx: OutboundSender) -> Self {
        Self { base_topic, tx }
    }

    pub(crate) fn base_topic(&self) -> &str {
        &self.base_topic
    }

    fn publish(&self, topic: String, payload: Vec<u8>, retain: bool) {
        if self
            .tx
            .send(OutboundMessage {
                topic,
                payload,
                retain,
            })
            .is_err()
        {
            warn!("Manager loop has gone away, dropping outbound message");
        }
    }
}

/// Identity and publish capability composed into every thing variant
#[derive(Debug)]
pub struct ThingCore {
    name: String,
    short_id: String,
    link: Option<ThingLink>,
}

impl ThingCore {
    pub fn new(name: impl Into<String>, short_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_id: short_id.into(),
            link: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_id(&self) -> &str {
        &self.short_id
    }

    pub(crate) fn bind(&mut self, link: ThingLink) {
        if self.link.is_some() {
            warn!(
                short_id = %self.short_id,
                "Thing is already registered with a manager, replacing the link"
            );
        }
        self.link = Some(link);
    }

    /// Whether `topic` addresses the given subtopic of this thing
    pub(crate) fn matches(&self, topic: &str, subtopic: &str) -> bool {
        match &self.link {
            Some(link) => topic == topic::thing(link.base_topic(), &self.short_id, subtopic),
            None => false,
        }
    }

    /// Queue a raw payload for `{base_topic}/{short_id}/{subtopic}`
    pub fn publish_message(&self, subtopic: &str, payload: Vec<u8>) {
        let Some(link) = &self.link else {
            warn!(
                short_id = %self.short_id,
                "Publish before registration with a manager, dropping message"
            );
            return;
        };

        let topic = topic::thing(link.base_topic(), &self.short_id, subtopic);
        link.publish(topic, payload, false);
    }

    /// Publish a value to the state topic
    ///
    /// Encoding rule: `true`/`false` become `ON`/`OFF`, raw bytes pass
    /// through, everything else is stringified.
    pub fn publish_state(&self, value: impl Into<StateValue>) {
        self.publish_message(topic::STATE, value.into().encode());
    }

    /// JSON-encode an arbitrary attribute map to the attributes topic
    pub fn publish_attributes<T: Serialize>(&self, attributes: &T) {
        match serde_json::to_vec(attributes) {
            Ok(payload) => self.publish_message(topic::ATTRS, payload),
            Err(e) => warn!(
                short_id = %self.short_id,
                "Failed to encode attributes, dropping them: {}", e
            ),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::bound;
    use super::test_support::drain;
    use super::*;

    struct Probe {
        core: ThingCore,
    }

    impl Thing for Probe {
        fn core(&self) -> &ThingCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut ThingCore {
            &mut self.core
        }

        fn component(&self) -> Component {
            Component::Sensor
        }

        fn config(&self) -> ConfigFields {
            ConfigFields::new()
        }
    }

    #[test]
    fn test_component_path_segments() {
        assert_eq!(Component::Switch.as_str(), "switch");
        assert_eq!(Component::BinarySensor.as_str(), "binary_sensor");
        assert_eq!(Component::Button.to_string(), "button");
    }

    #[test]
    fn test_publish_before_bind_is_dropped() {
        let probe = Probe {
            core: ThingCore::new("Probe", "probe"),
        };
        // No panic, nowhere for the message to go.
        probe.core().publish_state(true);
    }

    #[test]
    fn test_publish_state_routes_to_main() {
        let (probe, mut rx) = bound(Probe {
            core: ThingCore::new("Probe", "probe"),
        });

        probe.core().publish_state(true);
        probe.core().publish_state(12.5f64);

        let messages = drain(&mut rx);
        assert_eq!(
            messages,
            vec![
                ("home/probe/main".to_string(), b"ON".to_vec()),
                ("home/probe/main".to_string(), b"12.5".to_vec()),
            ]
        );
    }

    #[test]
    fn test_publish_attributes_is_json_encoded() {
        let (probe, mut rx) = bound(Probe {
            core: ThingCore::new("Probe", "probe"),
        });

        probe
            .core()
            .publish_attributes(&serde_json::json!({"battery": 93}));

        let messages = drain(&mut rx);
        assert_eq!(
            messages,
            vec![("home/probe/attrs".to_string(), b"{\"battery\":93}".to_vec())]
        );
    }

    #[test]
    fn test_matches_full_topics() {
        let (probe, _rx) = bound(Probe {
            core: ThingCore::new("Probe", "probe"),
        });

        assert!(probe.core().matches("home/probe/set", crate::topic::SET));
        assert!(!probe.core().matches("home/other/set", crate::topic::SET));
        assert!(!probe.core().matches("home/probe/set", crate::topic::PRESS));
    }
}
