use serde_json::json;
use tracing::warn;

use super::Component;
use super::ConfigFields;
use super::Thing;
use super::ThingCore;
use crate::topic;

/// A numeric input that tracks its value optimistically.
///
/// Commands arrive as decimal ASCII floats; whatever the number is told (by
/// the hub or by host code) becomes its value and is republished.
pub struct OptimisticNumber {
    core: ThingCore,
    state: f64,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
    on_command: Box<dyn FnMut(f64) + Send>,
}

impl OptimisticNumber {
    /// `on_command` fires whenever the hub sends a value, after the value has
    /// been cached and published.
    pub fn new(
        name: impl Into<String>,
        short_id: impl Into<String>,
        on_command: impl FnMut(f64) + Send + 'static,
    ) -> Self {
        Self {
            core: ThingCore::new(name, short_id),
            state: 1.0,
            min: None,
            max: None,
            step: None,
            on_command: Box::new(on_command),
        }
    }

    /// Advertise the accepted range in the discovery document.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Advertise the value granularity in the discovery document.
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = Some(step);
        self
    }

    /// Last known value.
    pub fn state(&self) -> f64 {
        self.state
    }

    /// Set and publish the new value.
    pub fn set_state(&mut self, value: f64) {
        self.state = value;
        self.core.publish_state(value);
    }
}

impl Thing for OptimisticNumber {
    fn core(&self) -> &ThingCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ThingCore {
        &mut self.core
    }

    fn component(&self) -> Component {
        Component::Number
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
        if let Some(min) = self.min {
            config.insert("min".to_string(), json!(min));
        }
        if let Some(max) = self.max {
            config.insert("max".to_string(), json!(max));
        }
        if let Some(step) = self.step {
            config.insert("step".to_string(), json!(step));
        }
        config
    }

    fn command_topics(&self) -> Vec<&'static str> {
        vec![topic::SET]
    }

    fn handle_message(&mut self, _topic: &str, payload: &[u8]) {
        let value = std::str::from_utf8(payload)
            .ok()
            .and_then(|s| s.trim().parse::<f64>().ok());
        let Some(value) = value else {
            warn!(
                short_id = %self.core.short_id(),
                "Ignoring unrecognized number command: `{}`",
                String::from_utf8_lossy(payload)
            );
            return;
        };
        self.set_state(value);
        (self.on_command)(value);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use super::super::test_support::bound;
    use super::super::test_support::drain;
    use super::*;

    fn recording_number() -> (Arc<Mutex<Vec<f64>>>, OptimisticNumber) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let writer = seen.clone();
        let number = OptimisticNumber::new("Threshold", "threshold", move |value| {
            writer.lock().unwrap().push(value);
        });
        (seen, number)
    }

    #[test]
    fn test_command_caches_publishes_and_fires() {
        let (seen, number) = recording_number();
        let (mut number, mut rx) = bound(number);

        number.handle_message("home/threshold/set", b"12.5");

        assert_eq!(number.state(), 12.5);
        assert_eq!(*seen.lock().unwrap(), vec![12.5]);
        assert_eq!(
            drain(&mut rx),
            vec![("home/threshold/main".to_string(), b"12.5".to_vec())]
        );
    }

    #[test]
    fn test_host_assignment_publishes_without_callback() {
        let (seen, number) = recording_number();
        let (mut number, mut rx) = bound(number);

        number.set_state(3.0);

        assert_eq!(number.state(), 3.0);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![("home/threshold/main".to_string(), b"3".to_vec())]
        );
    }

    #[test]
    fn test_garbage_payload_is_dropped() {
        let (seen, number) = recording_number();
        let (mut number, mut rx) = bound(number);

        number.handle_message("home/threshold/set", b"twelve");
        number.handle_message("home/threshold/set", b"");

        assert_eq!(number.state(), 1.0);
        assert!(seen.lock().unwrap().is_empty());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_config_declares_range_when_set() {
        let (_, number) = recording_number();
        let config = number.config();
        assert_eq!(config["command_topic"], "~/threshold/set");
        assert_eq!(config["state_topic"], "~/threshold/main");
        assert!(!config.contains_key("min"));

        let (_, number) = recording_number();
        let config = number.with_range(0.0, 100.0).with_step(0.5).config();
        assert_eq!(config["min"], 0.0);
        assert_eq!(config["max"], 100.0);
        assert_eq!(config["step"], 0.5);
    }
}
