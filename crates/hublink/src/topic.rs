//! Topic derivation for the four topic families.
//!
//! Pure functions over a base topic, a thing's short id, and the discovery
//! prefix. Short ids are used verbatim: callers must supply bus-safe slugs
//! (no `/`, `+`, `#` or null bytes).

use crate::things::Component;

/// Command subtopic for most things.
pub const SET: &str = "set";

/// Command subtopic for buttons.
pub const PRESS: &str = "press";

/// State subtopic.
pub const STATE: &str = "main";

/// JSON attributes subtopic.
pub const ATTRS: &str = "attrs";

/// Speed command subtopic for fans with regulable speed.
pub const SPEED_SET: &str = "speed/set";

/// Speed state subtopic for fans with regulable speed.
pub const SPEED_STATE: &str = "speed/state";

/// Topic the hub watches for a thing's retained discovery document.
pub fn config(
    discovery_prefix: &str,
    component: Component,
    node_id: &str,
    short_id: &str,
) -> String {
    format!(
        "{}/{}/{}/{}/config",
        discovery_prefix, component, node_id, short_id
    )
}

/// Concrete topic for one of a thing's subtopics.
pub fn thing(base_topic: &str, short_id: &str, subtopic: &str) -> String {
    format!("{}/{}/{}", base_topic, short_id, subtopic)
}

/// `~`-relative form of a subtopic, as used inside discovery documents.
pub fn relative(short_id: &str, subtopic: &str) -> String {
    format!("~/{}/{}", short_id, subtopic)
}

/// Availability topic shared by every thing under one manager.
pub fn availability(base_topic: &str) -> String {
    format!("{}/availability", base_topic)
}

/// Wildcard patterns covering every command topic under `base_topic`.
pub fn command_wildcards(base_topic: &str) -> [String; 2] {
    [
        format!("{}/+/{}", base_topic, SET),
        format!("{}/+/{}", base_topic, PRESS),
    ]
}
