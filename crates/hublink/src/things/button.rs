use serde_json::json;
use tracing::warn;

use super::Component;
use super::ConfigFields;
use super::Thing;
use super::ThingCore;
use crate::topic;

/// A stateless thing that fires a side-effecting callback when pressed.
///
/// The only accepted command payload is `PRESS`; anything else is logged and
/// ignored.
pub struct Button {
    core: ThingCore,
    on_press: Box<dyn FnMut() + Send>,
}

impl Button {
    pub fn new(
        name: impl Into<String>,
        short_id: impl Into<String>,
        on_press: impl FnMut() + Send + 'static,
    ) -> Self {
        Self {
            core: ThingCore::new(name, short_id),
            on_press: Box::new(on_press),
        }
    }
}

impl Thing for Button {
    fn core(&self) -> &ThingCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ThingCore {
        &mut self.core
    }

    fn component(&self) -> Component {
        Component::Button
    }

    fn config(&self) -> ConfigFields {
        let mut config = ConfigFields::new();
        config.insert(
            "command_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::PRESS)),
        );
        config
    }

    fn command_topics(&self) -> Vec<&'static str> {
        vec![topic::PRESS]
    }

    fn handle_message(&mut self, _topic: &str, payload: &[u8]) {
        if payload == b"PRESS" {
            (self.on_press)();
        } else {
            warn!(
                short_id = %self.core.short_id(),
                "Received an unknown payload: '{}'. Ignoring",
                String::from_utf8_lossy(payload)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;

    use super::super::test_support::bound;
    use super::super::test_support::drain;
    use super::*;

    fn counting_button() -> (Arc<AtomicUsize>, Button) {
        let presses = Arc::new(AtomicUsize::new(0));
        let counter = presses.clone();
        let button = Button::new("Reboot", "reboot", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (presses, button)
    }

    #[test]
    fn test_press_fires_callback_exactly_once() {
        let (presses, button) = counting_button();
        let (mut button, mut rx) = bound(button);

        button.handle_message("home/reboot/press", b"PRESS");

        assert_eq!(presses.load(Ordering::SeqCst), 1);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_other_payloads_never_fire() {
        let (presses, button) = counting_button();
        let (mut button, _rx) = bound(button);

        button.handle_message("home/reboot/press", b"PUSH");
        button.handle_message("home/reboot/press", b"press");
        button.handle_message("home/reboot/press", b"");

        assert_eq!(presses.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_config_uses_press_topic() {
        let (_, button) = counting_button();
        assert_eq!(button.config()["command_topic"], "~/reboot/press");
        assert_eq!(button.command_topics(), vec![topic::PRESS]);
    }
}
