//! A UPnP/AV control point.
//!
//! [`ControlPoint`] wires the pieces together: the SSDP listener and device
//! scanner from `upnp-discovery`, the GENA event endpoint from
//! `gena-server`, and the typed service clients from `upnp-av`. On top of
//! those it exposes the two device-level aggregates:
//!
//! - [`MediaServer`]: ContentDirectory + ConnectionManager (+ optional
//!   AVTransport), with cached search/sort capabilities.
//! - [`MediaRenderer`]: ConnectionManager + RenderingControl (+ optional
//!   AVTransport), tracking the active connection and forwarding transport
//!   and volume operations through it.
//!
//! ```no_run
//! use av_controlpoint::{ControlPoint, ControlPointConfig};
//! use upnp_discovery::DeviceEvent;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), upnp_av::UpnpError> {
//!     let cp = ControlPoint::start(ControlPointConfig::default()).await?;
//!     let mut events = cp.device_events();
//!     while let Ok(event) = events.recv().await {
//!         if let DeviceEvent::Discovered(device) = event {
//!             println!("found {}", device.friendly_name);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod control_point;
mod media_renderer;
mod media_server;

pub use control_point::{ControlPoint, ControlPointConfig};
pub use media_renderer::MediaRenderer;
pub use media_server::MediaServer;
