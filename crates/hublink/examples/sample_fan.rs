//! The most simple usage of a fan with regulable speed.
//!
//! The fan has five speeds; the host loop cycles through them, including the
//! speed-zero stop, while the hub can intervene at any time.

use std::time::Duration;

use anyhow::Context;
use hublink::Config;
use hublink::Manager;
use hublink::things::PercentageOptimisticFan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let host = std::env::var("MQTT_HOST").context("MQTT_HOST is not set")?;
    let username = std::env::var("MQTT_USERNAME").context("MQTT_USERNAME is not set")?;
    let password = std::env::var("MQTT_PASSWORD").context("MQTT_PASSWORD is not set")?;

    let config = Config::new(host).with_credentials(username, password);
    let mut manager = Manager::new(&config)?;

    let fan = manager.add_thing(
        PercentageOptimisticFan::new(
            "Awesomest Fan",
            "moreawesome",
            |on| println!("The fan is set to {}", if on { "on" } else { "off" }),
            |speed| println!("The fan speed was set to {speed}"),
        )
        .with_speed_range(1, 5),
    );

    tokio::spawn(manager.run());

    println!("Cycling through the speeds, Ctrl+C to exit.");
    let mut next = 1;
    loop {
        tokio::time::sleep(Duration::from_secs(5)).await;

        let mut fan = fan.lock().await;
        println!("Previous speed: {}. New speed: {}", fan.speed(), next);
        fan.set_speed(next);

        next = if next >= 5 { 0 } else { next + 1 };
    }
}
