use serde_json::json;
use tracing::warn;

use super::Component;
use super::ConfigFields;
use super::Thing;
use super::ThingCore;
use crate::topic;

type Callback = Box<dyn FnMut(bool) + Send>;

/// Decode an `ON`/`OFF` command payload.
pub(crate) fn parse_on_off(payload: &[u8]) -> Option<bool> {
    match payload {
        b"ON" => Some(true),
        b"OFF" => Some(false),
        _ => None,
    }
}

/// A switch that tracks its state optimistically.
///
/// "Optimistically" means that whatever the switch is told (by the hub or by
/// host code) becomes its state, without confirming the physical effect.
/// Every transition is published to the state topic.
pub struct OptimisticSwitch {
    core: ThingCore,
    state: bool,
    optimistic: Option<bool>,
    on_command: Callback,
}

impl OptimisticSwitch {
    /// `on_command` fires whenever the hub sends an `ON`/`OFF` command, after
    /// the new state has been cached and published.
    pub fn new(
        name: impl Into<String>,
        short_id: impl Into<String>,
        on_command: impl FnMut(bool) + Send + 'static,
    ) -> Self {
        Self {
            core: ThingCore::new(name, short_id),
            state: false,
            optimistic: None,
            on_command: Box::new(on_command),
        }
    }

    /// Emit an explicit `optimistic` flag in the discovery document.
    pub fn with_optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = Some(optimistic);
        self
    }

    /// Last known state.
    pub fn state(&self) -> bool {
        self.state
    }

    /// Set and publish the new state.
    pub fn set_state(&mut self, on: bool) {
        self.state = on;
        self.core.publish_state(on);
    }
}

impl Thing for OptimisticSwitch {
    fn core(&self) -> &ThingCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ThingCore {
        &mut self.core
    }

    fn component(&self) -> Component {
        Component::Switch
    }

    fn config(&self) -> ConfigFields {
        let mut config = ConfigFields::new();
        config.insert(
            "command_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::SET)),
        );
        config.insert(
            "state_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::STATE)),
        );
        if let Some(optimistic) = self.optimistic {
            config.insert("optimistic".to_string(), json!(optimistic));
        }
        config
    }

    fn command_topics(&self) -> Vec<&'static str> {
        vec![topic::SET]
    }

    fn handle_message(&mut self, _topic: &str, payload: &[u8]) {
        let Some(on) = parse_on_off(payload) else {
            warn!(short_id = %self.core.short_id(), "Ignoring unrecognized switch command");
            return;
        };
        self.set_state(on);
        (self.on_command)(on);
    }
}

/// A switch whose reported state is tied to explicit host observations.
///
/// Inbound commands only fire the callback; nothing is published until host
/// code calls [`set_state`]. Use this for mechanisms with a slow or fuzzy
/// cause/effect chain: a garage door's state belongs to its endstop, not to
/// the activation trigger.
///
/// [`set_state`]: ExplicitSwitch::set_state
pub struct ExplicitSwitch {
    core: ThingCore,
    optimistic: Option<bool>,
    on_command: Callback,
}

impl ExplicitSwitch {
    pub fn new(
        name: impl Into<String>,
        short_id: impl Into<String>,
        on_command: impl FnMut(bool) + Send + 'static,
    ) -> Self {
        Self {
            core: ThingCore::new(name, short_id),
            optimistic: None,
            on_command: Box::new(on_command),
        }
    }

    /// Emit an explicit `optimistic` flag in the discovery document.
    pub fn with_optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = Some(optimistic);
        self
    }

    /// Publish an observed state. Nothing is cached.
    pub fn set_state(&self, on: bool) {
        self.core.publish_state(on);
    }
}

impl Thing for ExplicitSwitch {
    fn core(&self) -> &ThingCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ThingCore {
        &mut self.core
    }

    fn component(&self) -> Component {
        Component::Switch
    }

    fn config(&self) -> ConfigFields {
        let mut config = ConfigFields::new();
        config.insert(
            "command_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::SET)),
        );
        config.insert(
            "state_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::STATE)),
        );
        if let Some(optimistic) = self.optimistic {
            config.insert("optimistic".to_string(), json!(optimistic));
        }
        config
    }

    fn command_topics(&self) -> Vec<&'static str> {
        vec![topic::SET]
    }

    fn handle_message(&mut self, _topic: &str, payload: &[u8]) {
        let Some(on) = parse_on_off(payload) else {
            warn!(short_id = %self.core.short_id(), "Ignoring unrecognized switch command");
            return;
        };
        (self.on_command)(on);
    }
}

/// A switch that does not track its state at all.
///
/// The hub makes no assumption about the state and always offers both
/// actions; commands only fire the callback.
pub struct StatelessSwitch {
    core: ThingCore,
    on_command: Callback,
}

impl StatelessSwitch {
    pub fn new(
        name: impl Into<String>,
        short_id: impl Into<String>,
        on_command: impl FnMut(bool) + Send + 'static,
    ) -> Self {
        Self {
            core: ThingCore::new(name, short_id),
            on_command: Box::new(on_command),
        }
    }
}

impl Thing for StatelessSwitch {
    fn core(&self) -> &ThingCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ThingCore {
        &mut self.core
    }

    fn component(&self) -> Component {
        Component::Switch
    }

    fn config(&self) -> ConfigFields {
        let mut config = ConfigFields::new();
        config.insert(
            "command_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::SET)),
        );
        config
    }

    fn command_topics(&self) -> Vec<&'static str> {
        vec![topic::SET]
    }

    fn handle_message(&mut self, _topic: &str, payload: &[u8]) {
        let Some(on) = parse_on_off(payload) else {
            warn!(short_id = %self.core.short_id(), "Ignoring unrecognized switch command");
            return;
        };
        (self.on_command)(on);
    }
}
