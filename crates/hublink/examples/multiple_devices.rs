//! An application managing things on behalf of multiple devices.
//!
//! This is the typical bridge setup: one process speaks for several physical
//! devices, each presented to the hub with its own device block via the
//! `origin` parameter at registration.

use std::time::Duration;

use anyhow::Context;
use hublink::Config;
use hublink::DeviceInfo;
use hublink::Manager;
use hublink::things::OptimisticSwitch;

fn printing_switch(index: u32) -> OptimisticSwitch {
    OptimisticSwitch::new(
        format!("switch {index}"),
        format!("s{index}"),
        move |on| println!("The switch #{index} has been set to {on}"),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let host = std::env::var("MQTT_HOST").context("MQTT_HOST is not set")?;
    let username = std::env::var("MQTT_USERNAME").context("MQTT_USERNAME is not set")?;
    let password = std::env::var("MQTT_PASSWORD").context("MQTT_PASSWORD is not set")?;

    let config = Config::new(host).with_credentials(username, password);
    let mut manager = Manager::new(&config)?;

    // Three switches on the manager's own device...
    let mut switches = manager.add_things((0..3).map(|i| printing_switch(200 + i)).collect());

    // ...and three more per bridged device.
    for device_id in 0..3 {
        let origin = DeviceInfo {
            name: Some(format!("Device#{device_id}")),
            identifiers: vec![format!("device_testing_{device_id:02}")],
            connections: vec![("mac".to_string(), format!("eb:{device_id:02}:de:c3:e5:f0"))],
            hw_version: Some("1.0.0alpha".to_string()),
            sw_version: Some(format!("0.0.{device_id}beta")),
            ..DeviceInfo::default()
        };
        let group = manager.add_things_on(
            origin,
            (0..3)
                .map(|i| printing_switch(100 + 10 * device_id + i))
                .collect(),
        );
        switches.extend(group);
    }

    tokio::spawn(manager.run());

    println!("Toggling every switch in a loop, Ctrl+C to exit.");
    let mut state = false;
    loop {
        for switch in &switches {
            tokio::time::sleep(Duration::from_secs(1)).await;
            switch.lock().await.set_state(state);
        }
        state = !state;
    }
}
