use serde_json::json;
use tracing::warn;

use super::Component;
use super::ConfigFields;
use super::Thing;
use super::ThingCore;
use super::switch::parse_on_off;
use crate::topic;

/// A fan that tracks its own on/off state optimistically.
pub struct BinaryOptimisticFan {
    core: ThingCore,
    state: bool,
    optimistic: Option<bool>,
    on_command: Box<dyn FnMut(bool) + Send>,
}

impl BinaryOptimisticFan {
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

    pub fn state(&self) -> bool {
        self.state
    }

    /// Set and publish the new state.
    pub fn set_state(&mut self, on: bool) {
        self.state = on;
        self.core.publish_state(on);
    }
}

impl Thing for BinaryOptimisticFan {
    fn core(&self) -> &ThingCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ThingCore {
        &mut self.core
    }

    fn component(&self) -> Component {
        Component::Fan
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
            warn!(
                short_id = %self.core.short_id(),
                "Ignoring unrecognized command: `{}`",
                String::from_utf8_lossy(payload)
            );
            return;
        };
        self.set_state(on);
        (self.on_command)(on);
    }
}

/// A fan with regulable speed.
///
/// Speed commands arrive on a separate `speed/set` topic as decimal ASCII
/// integers within the configured range. Speed zero turns the fan off but
/// keeps the previous speed as the "last known speed", so a later
/// unconditional turn-on restores it.
pub struct PercentageOptimisticFan {
    core: ThingCore,
    state: bool,
    speed: u32,
    speed_range_min: u32,
    speed_range_max: u32,
    optimistic: Option<bool>,
    on_command: Box<dyn FnMut(bool) + Send>,
    on_speed: Box<dyn FnMut(u32) + Send>,
}

impl PercentageOptimisticFan {
    /// `on_command` fires on inbound `ON`/`OFF` commands, `on_speed` on
    /// inbound speed commands, both after the transition has been applied and
    /// published.
    pub fn new(
        name: impl Into<String>,
        short_id: impl Into<String>,
        on_command: impl FnMut(bool) + Send + 'static,
        on_speed: impl FnMut(u32) + Send + 'static,
    ) -> Self {
        Self {
            core: ThingCore::new(name, short_id),
            state: false,
            speed: 1,
            speed_range_min: 1,
            speed_range_max: 100,
            optimistic: None,
            on_command: Box::new(on_command),
            on_speed: Box::new(on_speed),
        }
    }

    /// Advertise a speed range other than the default 1..=100.
    pub fn with_speed_range(mut self, min: u32, max: u32) -> Self {
        self.speed_range_min = min;
        self.speed_range_max = max;
        self
    }

    /// Emit an explicit `optimistic` flag in the discovery document.
    pub fn with_optimistic(mut self, optimistic: bool) -> Self {
        self.optimistic = Some(optimistic);
        self
    }

    pub fn state(&self) -> bool {
        self.state
    }

    /// Last known speed. Retained across speed-zero commands.
    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Set and publish the new state, leaving the speed untouched.
    pub fn set_state(&mut self, on: bool) {
        self.state = on;
        self.core.publish_state(on);
    }

    /// Apply a speed transition.
    ///
    /// Zero forces the state off without touching the cached speed. Anything
    /// else forces the state on, then publishes the speed and the state, in
    /// that order.
    pub fn set_speed(&mut self, speed: u32) {
        if speed == 0 {
            self.set_state(false);
        } else {
            self.set_state(true);
            self.speed = speed;
            self.core
                .publish_message(topic::SPEED_STATE, speed.to_string().into_bytes());
            self.core.publish_state(self.state);
        }
    }
}

impl Thing for PercentageOptimisticFan {
    fn core(&self) -> &ThingCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ThingCore {
        &mut self.core
    }

    fn component(&self) -> Component {
        Component::Fan
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
        config.insert(
            "percentage_command_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::SPEED_SET)),
        );
        config.insert(
            "percentage_state_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::SPEED_STATE)),
        );
        config.insert("speed_range_min".to_string(), json!(self.speed_range_min));
        config.insert("speed_range_max".to_string(), json!(self.speed_range_max));
        if let Some(optimistic) = self.optimistic {
            config.insert("optimistic".to_string(), json!(optimistic));
        }
        config
    }

    fn command_topics(&self) -> Vec<&'static str> {
        vec![topic::SET, topic::SPEED_SET]
    }

    fn handle_message(&mut self, topic: &str, payload: &[u8]) {
        if self.core.matches(topic, topic::SPEED_SET) {
            let speed = std::str::from_utf8(payload)
                .ok()
                .and_then(|s| s.trim().parse::<u32>().ok());
            match speed {
                Some(speed) => {
                    self.set_speed(speed);
                    (self.on_speed)(speed);
                }
                None => warn!(
                    short_id = %self.core.short_id(),
                    "Ignoring unrecognized speed command: `{}`",
                    String::from_utf8_lossy(payload)
                ),
            }
        } else {
            let Some(on) = parse_on_off(payload) else {
                warn!(
                    short_id = %self.core.short_id(),
                    "Ignoring unrecognized command: `{}`",
                    String::from_utf8_lossy(payload)
                );
                return;
            };
            self.set_state(on);
            (self.on_command)(on);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::bound;
    use super::super::test_support::drain;
    use super::*;

    fn quiet_fan() -> PercentageOptimisticFan {
        PercentageOptimisticFan::new("Ceiling Fan", "ceiling", |_| {}, |_| {})
    }

    #[test]
    fn test_binary_fan_tracks_commands() {
        let (mut fan, mut rx) = bound(BinaryOptimisticFan::new("Vent", "vent", |_| {}));

        fan.handle_message("home/vent/set", b"ON");
        assert!(fan.state());
        fan.handle_message("home/vent/set", b"whirr");
        assert!(fan.state());

        assert_eq!(
            drain(&mut rx),
            vec![("home/vent/main".to_string(), b"ON".to_vec())]
        );
    }

    #[test]
    fn test_positive_speed_publish_order() {
        let (mut fan, mut rx) = bound(quiet_fan());

        fan.set_speed(40);

        assert!(fan.state());
        assert_eq!(fan.speed(), 40);
        assert_eq!(
            drain(&mut rx),
            vec![
                ("home/ceiling/main".to_string(), b"ON".to_vec()),
                ("home/ceiling/speed/state".to_string(), b"40".to_vec()),
                ("home/ceiling/main".to_string(), b"ON".to_vec()),
            ]
        );
    }

    #[test]
    fn test_zero_speed_keeps_last_known_speed() {
        let (mut fan, mut rx) = bound(quiet_fan());

        fan.set_speed(40);
        drain(&mut rx);

        fan.set_speed(0);
        assert!(!fan.state());
        assert_eq!(fan.speed(), 40);
        assert_eq!(
            drain(&mut rx),
            vec![("home/ceiling/main".to_string(), b"OFF".to_vec())]
        );

        // An unconditional turn-on restores the remembered speed.
        fan.set_state(true);
        assert_eq!(fan.speed(), 40);
        assert_eq!(
            drain(&mut rx),
            vec![("home/ceiling/main".to_string(), b"ON".to_vec())]
        );
    }

    #[test]
    fn test_speed_command_routed_by_topic() {
        let (mut fan, mut rx) = bound(quiet_fan());

        fan.handle_message("home/ceiling/speed/set", b"3");
        assert_eq!(fan.speed(), 3);
        assert!(fan.state());

        fan.handle_message("home/ceiling/set", b"OFF");
        assert!(!fan.state());
        assert_eq!(fan.speed(), 3);

        let topics: Vec<String> = drain(&mut rx).into_iter().map(|(t, _)| t).collect();
        assert_eq!(
            topics,
            vec![
                "home/ceiling/main",
                "home/ceiling/speed/state",
                "home/ceiling/main",
                "home/ceiling/main",
            ]
        );
    }

    #[test]
    fn test_garbage_speed_is_dropped() {
        let (mut fan, mut rx) = bound(quiet_fan());

        fan.handle_message("home/ceiling/speed/set", b"fast");
        fan.handle_message("home/ceiling/speed/set", b"-1");

        assert_eq!(fan.speed(), 1);
        assert!(!fan.state());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_percentage_fan_config() {
        let fan = quiet_fan().with_speed_range(1, 5);
        let config = fan.config();
        assert_eq!(config["percentage_command_topic"], "~/ceiling/speed/set");
        assert_eq!(config["percentage_state_topic"], "~/ceiling/speed/state");
        assert_eq!(config["speed_range_min"], 1);
        assert_eq!(config["speed_range_max"], 5);
    }
}
