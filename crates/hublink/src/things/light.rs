use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use super::Component;
use super::ConfigFields;
use super::Thing;
use super::ThingCore;
use crate::topic;

const BRIGHTNESS_SCALE: u32 = 255;

/// Light command as the hub sends it with the JSON schema.
#[derive(Debug, Deserialize)]
struct LightCommand {
    state: String,

    #[serde(default)]
    brightness: Option<u8>,
}

/// An optimistic dimmable light with no additional features.
///
/// Commands arrive as JSON objects with a required `state` and an optional
/// `brightness` (0-255). The light itself never publishes; a concrete
/// application decides what, if anything, to report back.
pub struct DimmableLight {
    core: ThingCore,
    on_command: Box<dyn FnMut(bool, Option<u8>) + Send>,
}

impl DimmableLight {
    pub fn new(
        name: impl Into<String>,
        short_id: impl Into<String>,
        on_command: impl FnMut(bool, Option<u8>) + Send + 'static,
    ) -> Self {
        Self {
            core: ThingCore::new(name, short_id),
            on_command: Box::new(on_command),
        }
    }
}

impl Thing for DimmableLight {
    fn core(&self) -> &ThingCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ThingCore {
        &mut self.core
    }

    fn component(&self) -> Component {
        Component::Light
    }

    fn config(&self) -> ConfigFields {
        let mut config = ConfigFields::new();
        config.insert(
            "command_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::SET)),
        );
        config.insert("schema".to_string(), json!("json"));
        config.insert("optimistic".to_string(), json!(true));
        config.insert("color_mode".to_string(), json!(true));
        config.insert("brightness".to_string(), json!(true));
        config.insert("brightness_scale".to_string(), json!(BRIGHTNESS_SCALE));
        config.insert(
            "supported_color_modes".to_string(),
            json!(["brightness"]),
        );
        config
    }

    fn command_topics(&self) -> Vec<&'static str> {
        vec![topic::SET]
    }

    fn handle_message(&mut self, _topic: &str, payload: &[u8]) {
        let command: LightCommand = match serde_json::from_slice(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(
                    short_id = %self.core.short_id(),
                    "Ignoring undecodable light command: {}", e
                );
                return;
            }
        };

        (self.on_command)(command.state == "ON", command.brightness);
    }
}
