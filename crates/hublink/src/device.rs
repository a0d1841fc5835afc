use serde::Deserialize;
use serde::Serialize;

/// Metadata identifying a physical device that may host several things.
///
/// Things registered with the same `DeviceInfo` are presented to the hub as
/// sub-entities of one device. Empty fields are omitted from the discovery
/// document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Device display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Stable identifiers for this device
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<String>,

    /// `(connection type, value)` pairs, e.g. `("mac", "aa:bb:cc:dd:ee:ff")`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<(String, String)>,

    /// Manufacturer name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    /// Model name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Hardware version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hw_version: Option<String>,

    /// Software version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,

    /// Area suggested to the hub when the device is first registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_area: Option<String>,

    /// URL of the device's own configuration page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_url: Option<String>,

    /// Identifier of the device routing messages for this one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via_device: Option<String>,
}
