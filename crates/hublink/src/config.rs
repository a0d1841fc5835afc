use serde::Deserialize;

fn default_broker() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

/// Connection and identity configuration for a [`Manager`].
///
/// Only the broker address is usually worth setting; every identity field has
/// a host-derived default (hostname for `node_id`, the node id for
/// `base_topic`, `name` and `client_id`, and the host hardware address for
/// `unique_identifier`).
///
/// [`Manager`]: crate::Manager
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// MQTT broker hostname or IP address
    #[serde(default = "default_broker")]
    pub broker: String,

    /// MQTT broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional username for authentication
    pub username: Option<String>,

    /// Optional password for authentication
    pub password: Option<String>,

    /// Discovery prefix (default: "homeassistant")
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,

    /// MQTT client ID; the resolved node id when unset
    pub client_id: Option<String>,

    /// Node id used in discovery topic paths; the hostname when unset
    pub node_id: Option<String>,

    /// Root of the state/command topic tree; the node id when unset
    pub base_topic: Option<String>,

    /// Display name of the manager's own device; the node id when unset
    pub name: Option<String>,

    /// Stable identifier prefixed to every thing's `unique_id`; the host
    /// hardware address when unset. Override only on hosts whose MAC is
    /// erratic (containers, MACless single-board computers).
    pub unique_identifier: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            port: default_port(),
            username: None,
            password: None,
            discovery_prefix: default_discovery_prefix(),
            client_id: None,
            node_id: None,
            base_topic: None,
            name: None,
            unique_identifier: None,
        }
    }
}

impl Config {
    /// Configuration for an unauthenticated connection to `broker`.
    pub fn new(broker: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_discovery_prefix(mut self, discovery_prefix: impl Into<String>) -> Self {
        self.discovery_prefix = discovery_prefix.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_base_topic(mut self, base_topic: impl Into<String>) -> Self {
        self.base_topic = Some(base_topic.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_unique_identifier(mut self, unique_identifier: impl Into<String>) -> Self {
        self.unique_identifier = Some(unique_identifier.into());
        self
    }
}
