use serde::Serialize;
use serde_json::json;

use super::Component;
use super::ConfigFields;
use super::Thing;
use super::ThingCore;
use crate::state::StateValue;
use crate::topic;

/// A measurement source that only ever publishes.
///
/// Sensors have no command topic; the hub learns new readings when host code
/// calls [`publish_state`]. The optional fields are passed through to the
/// discovery document to control how the hub classifies and renders the
/// reading.
///
/// [`publish_state`]: Sensor::publish_state
pub struct Sensor {
    core: ThingCore,
    device_class: Option<String>,
    enabled_by_default: Option<bool>,
    encoding: Option<String>,
    entity_category: Option<String>,
    expire_after: Option<u32>,
    force_update: Option<bool>,
    icon: Option<String>,
    state_class: Option<String>,
    unit_of_measurement: Option<String>,
}

impl Sensor {
    pub fn new(name: impl Into<String>, short_id: impl Into<String>) -> Self {
        Self {
            core: ThingCore::new(name, short_id),
            device_class: None,
            enabled_by_default: None,
            encoding: None,
            entity_category: None,
            expire_after: None,
            force_update: None,
            icon: None,
            state_class: None,
            unit_of_measurement: None,
        }
    }

    pub fn with_device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    pub fn with_enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled_by_default = Some(enabled);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_entity_category(mut self, entity_category: impl Into<String>) -> Self {
        self.entity_category = Some(entity_category.into());
        self
    }

    /// Seconds after which the hub marks a stale reading unavailable.
    pub fn with_expire_after(mut self, seconds: u32) -> Self {
        self.expire_after = Some(seconds);
        self
    }

    pub fn with_force_update(mut self, force_update: bool) -> Self {
        self.force_update = Some(force_update);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_state_class(mut self, state_class: impl Into<String>) -> Self {
        self.state_class = Some(state_class.into());
        self
    }

    pub fn with_unit_of_measurement(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }

    /// Publish a new reading. Nothing is cached.
    pub fn publish_state(&self, value: impl Into<StateValue>) {
        self.core.publish_state(value);
    }

    /// Publish a JSON attribute map alongside the reading.
    pub fn publish_attributes<T: Serialize>(&self, attributes: &T) {
        self.core.publish_attributes(attributes);
    }
}

impl Thing for Sensor {
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
        let mut config = ConfigFields::new();
        config.insert(
            "state_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::STATE)),
        );
        if let Some(device_class) = &self.device_class {
            config.insert("device_class".to_string(), json!(device_class));
        }
        if let Some(enabled) = self.enabled_by_default {
            config.insert("enabled_by_default".to_string(), json!(enabled));
        }
        if let Some(encoding) = &self.encoding {
            config.insert("encoding".to_string(), json!(encoding));
        }
        if let Some(entity_category) = &self.entity_category {
            config.insert("entity_category".to_string(), json!(entity_category));
        }
        if let Some(expire_after) = self.expire_after {
            config.insert("expire_after".to_string(), json!(expire_after));
        }
        if let Some(force_update) = self.force_update {
            config.insert("force_update".to_string(), json!(force_update));
        }
        if let Some(icon) = &self.icon {
            config.insert("icon".to_string(), json!(icon));
        }
        if let Some(state_class) = &self.state_class {
            config.insert("state_class".to_string(), json!(state_class));
        }
        if let Some(unit) = &self.unit_of_measurement {
            config.insert("unit_of_measurement".to_string(), json!(unit));
        }
        config
    }
}

/// A sensor whose only reading is `ON`/`OFF`.
pub struct BinarySensor {
    core: ThingCore,
    device_class: Option<String>,
    enabled_by_default: Option<bool>,
    encoding: Option<String>,
    entity_category: Option<String>,
    expire_after: Option<u32>,
    force_update: Option<bool>,
    icon: Option<String>,
}

impl BinarySensor {
    pub fn new(name: impl Into<String>, short_id: impl Into<String>) -> Self {
        Self {
            core: ThingCore::new(name, short_id),
            device_class: None,
            enabled_by_default: None,
            encoding: None,
            entity_category: None,
            expire_after: None,
            force_update: None,
            icon: None,
        }
    }

    pub fn with_device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    pub fn with_enabled_by_default(mut self, enabled: bool) -> Self {
        self.enabled_by_default = Some(enabled);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_entity_category(mut self, entity_category: impl Into<String>) -> Self {
        self.entity_category = Some(entity_category.into());
        self
    }

    /// Seconds after which the hub marks a stale reading unavailable.
    pub fn with_expire_after(mut self, seconds: u32) -> Self {
        self.expire_after = Some(seconds);
        self
    }

    pub fn with_force_update(mut self, force_update: bool) -> Self {
        self.force_update = Some(force_update);
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Publish a new on/off observation. Nothing is cached.
    pub fn publish_state(&self, on: bool) {
        self.core.publish_state(on);
    }

    /// Publish a JSON attribute map alongside the reading.
    pub fn publish_attributes<T: Serialize>(&self, attributes: &T) {
        self.core.publish_attributes(attributes);
    }
}

impl Thing for BinarySensor {
    fn core(&self) -> &ThingCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ThingCore {
        &mut self.core
    }

    fn component(&self) -> Component {
        Component::BinarySensor
    }

    fn config(&self) -> ConfigFields {
        let mut config = ConfigFields::new();
        config.insert(
            "state_topic".to_string(),
            json!(topic::relative(self.core.short_id(), topic::STATE)),
        );
        if let Some(device_class) = &self.device_class {
            config.insert("device_class".to_string(), json!(device_class));
        }
        if let Some(enabled) = self.enabled_by_default {
            config.insert("enabled_by_default".to_string(), json!(enabled));
        }
        if let Some(encoding) = &self.encoding {
            config.insert("encoding".to_string(), json!(encoding));
        }
        if let Some(entity_category) = &self.entity_category {
            config.insert("entity_category".to_string(), json!(entity_category));
        }
        if let Some(expire_after) = self.expire_after {
            config.insert("expire_after".to_string(), json!(expire_after));
        }
        if let Some(force_update) = self.force_update {
            config.insert("force_update".to_string(), json!(force_update));
        }
        if let Some(icon) = &self.icon {
            config.insert("icon".to_string(), json!(icon));
        }
        config
    }
}
