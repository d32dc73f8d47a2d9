//! List AV devices as they appear and disappear on the network.
//!
//! ```sh
//! cargo run --example discover
//! ```

use av_controlpoint::{ControlPoint, ControlPointConfig};
use upnp_discovery::DeviceEvent;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cp = ControlPoint::start(ControlPointConfig::default()).await?;
    println!("scanning, ctrl-c to stop");

    let mut events = cp.device_events();
    loop {
        match events.recv().await {
            Ok(DeviceEvent::Discovered(device)) => {
                println!(
                    "+ {} [{}] {} service(s) at {}",
                    device.friendly_name,
                    device.kind,
                    device.services.len(),
                    device.location
                );
            }
            Ok(DeviceEvent::Disappeared(device)) => {
                println!("- {}", device.friendly_name);
            }
            Err(_) => break,
        }
    }

    Ok(())
}
