//! Discover a media server and a renderer, then play the first playable
//! track found under the server's root container.

use std::time::Duration;

use av_controlpoint::{ControlPoint, ControlPointConfig};
use upnp_discovery::DeviceKind;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cp = ControlPoint::start(ControlPointConfig::default()).await?;
    println!("waiting for devices...");
    tokio::time::sleep(Duration::from_secs(6)).await;

    let devices = cp.devices();
    let server_device = devices
        .iter()
        .find(|d| d.kind == DeviceKind::MediaServer)
        .ok_or("no media server found")?;
    let renderer_device = devices
        .iter()
        .find(|d| d.kind == DeviceKind::MediaRenderer)
        .ok_or("no media renderer found")?;

    println!(
        "server: {} / renderer: {}",
        server_device.friendly_name, renderer_device.friendly_name
    );

    let server = cp.connect_server(server_device).await?;
    let renderer = cp.set_renderer(renderer_device).await?;
    renderer.activate_events().await?;

    let mut items = server.content_directory().all_in_container("0");
    while let Some(item) = items.next().await {
        let item = item?;
        if item.is_container() {
            continue;
        }
        if renderer.supports_playback(&item).is_some() {
            println!("playing {}", item.title);
            cp.play_item(&server, &item).await?;
            break;
        }
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
    if let Ok(info) = renderer.get_current_track_info().await {
        println!("at {} of {}", info.relative_time, info.track_duration);
    }

    renderer.deactivate_events().await?;
    cp.stop().await;
    Ok(())
}
