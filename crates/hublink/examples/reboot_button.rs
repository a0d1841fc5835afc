//! Trigger a host reboot from the hub with a button.
//!
//! Run this as a user with permission for `systemctl reboot`. The `echo` in
//! front of the command is a safety catch against accidents; remove it to
//! actually reboot.

use anyhow::Context;
use hublink::Config;
use hublink::Manager;
use hublink::things::Button;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let host = std::env::var("MQTT_HOST").context("MQTT_HOST is not set")?;
    let username = std::env::var("MQTT_USERNAME").context("MQTT_USERNAME is not set")?;
    let password = std::env::var("MQTT_PASSWORD").context("MQTT_PASSWORD is not set")?;

    let config = Config::new(host).with_credentials(username, password);
    let mut manager = Manager::new(&config)?;

    manager.add_thing(Button::new("Reboot button", "reboot_button", || {
        match std::process::Command::new("echo")
            .args(["systemctl", "reboot"])
            .status()
        {
            Ok(status) => println!("Reboot command exited with {status}"),
            Err(e) => eprintln!("Failed to run the reboot command: {e}"),
        }
    }));

    if let Err(e) = manager.run().await {
        anyhow::bail!("manager loop failed: {e}");
    }
    Ok(())
}
