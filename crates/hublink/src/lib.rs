//! Expose controllable and observable things to a home-automation hub over
//! MQTT, using the hub's discovery protocol.
//!
//! Build a [`Manager`] from a [`Config`], register things with it, then hand
//! the connection over to [`Manager::run`]. Each thing self-describes through
//! a retained discovery document on every (re)connect, and exchanges state
//! and command messages on topics derived from its short id.
//!
//! ```no_run
//! use hublink::Config;
//! use hublink::Manager;
//! use hublink::things::OptimisticSwitch;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut manager = Manager::new(&Config::new("broker.local"))?;
//! let relay = manager.add_thing(OptimisticSwitch::new("Relay", "relay", |on| {
//!     println!("relay set to {on}");
//! }));
//! tokio::spawn(manager.run());
//!
//! relay.lock().await.set_state(true);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod device;
mod mac;
mod manager;
mod state;
pub mod things;
pub mod topic;

pub use client::MqttClient;
pub use client::RumqttcClient;
pub use config::Config;
pub use device::DeviceInfo;
pub use manager::Manager;
pub use state::StateValue;
