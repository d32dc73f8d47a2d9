//! The control-point engine: one SSDP listener, one device scanner, one
//! event endpoint and one shared client context.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gena_server::GenaServer;
use tokio::sync::broadcast;
use tracing::info;
use upnp_av::avtransport::TransportState;
use upnp_av::{ClientContext, Result, UpnpError};
use upnp_discovery::{Device, DeviceEvent, DeviceKind, DeviceScanner, ServiceKind, SsdpClient};
use upnp_soap::{HttpClient, SoapClient};
use upnp_xml::Item;

use crate::media_renderer::MediaRenderer;
use crate::media_server::MediaServer;

/// Engine construction parameters.
///
/// The engine runs entirely on the tokio runtime it is started from; run it
/// inside a `current_thread` runtime (optionally on a dedicated thread) to
/// serialize all I/O and callbacks on a single executor.
#[derive(Debug, Clone)]
pub struct ControlPointConfig {
    /// Interface for the SSDP multicast join.
    pub bind_interface: Ipv4Addr,
    /// Local port for the SSDP socket; SSDP announcements are only received
    /// on 1900.
    pub ssdp_port: u16,
    /// Port range probed for the event callback listener.
    pub callback_port_range: (u16, u16),
    /// Device categories to track.
    pub targets: Vec<DeviceKind>,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
}

impl Default for ControlPointConfig {
    fn default() -> Self {
        Self {
            bind_interface: Ipv4Addr::UNSPECIFIED,
            ssdp_port: 1900,
            callback_port_range: (49200, 49400),
            targets: vec![DeviceKind::MediaServer, DeviceKind::MediaRenderer],
            http_timeout: Duration::from_secs(30),
        }
    }
}

/// The assembled control point.
pub struct ControlPoint {
    ssdp: SsdpClient,
    scanner: DeviceScanner,
    gena: GenaServer,
    context: ClientContext,
    renderer: Mutex<Option<Arc<MediaRenderer>>>,
}

impl ControlPoint {
    /// Start discovery and the event endpoint, then issue an initial search
    /// for the configured device kinds.
    pub async fn start(config: ControlPointConfig) -> Result<Self> {
        let http = HttpClient::with_timeout(config.http_timeout)?;
        let soap = SoapClient::new(http.clone());

        let gena = GenaServer::start(
            IpAddr::V4(config.bind_interface),
            config.callback_port_range,
        )
        .await
        .map_err(|e| UpnpError::Network(e.to_string()))?;

        let ssdp = SsdpClient::start(config.bind_interface, config.ssdp_port)
            .await
            .map_err(|e| UpnpError::Network(e.to_string()))?;

        let scanner = DeviceScanner::new(http, config.targets.clone());
        scanner.start(&ssdp);
        scanner
            .refresh(&ssdp)
            .await
            .map_err(|e| UpnpError::Network(e.to_string()))?;

        let context = ClientContext::new(soap, gena.router().clone(), gena.callback_url());
        info!(callback = %gena.callback_url(), "control point started");

        Ok(Self {
            ssdp,
            scanner,
            gena,
            context,
            renderer: Mutex::new(None),
        })
    }

    /// The shared client context for binding service clients manually.
    pub fn context(&self) -> &ClientContext {
        &self.context
    }

    pub fn scanner(&self) -> &DeviceScanner {
        &self.scanner
    }

    /// Discovered/Disappeared signals.
    pub fn device_events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.scanner.events()
    }

    /// Re-search the network for the configured device kinds.
    pub async fn refresh(&self) -> Result<()> {
        self.scanner
            .refresh(&self.ssdp)
            .await
            .map_err(|e| UpnpError::Network(e.to_string()))
    }

    /// Known live devices.
    pub fn devices(&self) -> Vec<Device> {
        self.scanner.devices()
    }

    /// Bind a discovered media server.
    pub async fn connect_server(&self, device: &Device) -> Result<MediaServer> {
        MediaServer::bind(&self.context, device).await
    }

    /// Bind a renderer and make it the active one, starting from the
    /// default connection.
    pub async fn set_renderer(&self, device: &Device) -> Result<Arc<MediaRenderer>> {
        let renderer = Arc::new(MediaRenderer::bind(&self.context, device).await?);
        renderer.use_default_connection();
        *self.renderer.lock().unwrap() = Some(renderer.clone());
        Ok(renderer)
    }

    pub fn active_renderer(&self) -> Option<Arc<MediaRenderer>> {
        self.renderer.lock().unwrap().clone()
    }

    /// Play an item from a server on the active renderer.
    ///
    /// Stops current playback when needed, negotiates a connection with
    /// `PrepareForConnection` when *both* sides support it (both fall back
    /// to the default connection otherwise), points the transports at the
    /// resource and starts playback.
    pub async fn play_item(&self, server: &MediaServer, item: &Item) -> Result<()> {
        let renderer = self
            .active_renderer()
            .ok_or_else(|| UpnpError::invalid_state("no renderer selected"))?;

        let resource = renderer
            .supports_playback(item)
            .ok_or_else(|| {
                UpnpError::invalid_argument("the renderer supports none of the item's resources")
            })?
            .clone();

        self.stop_playback_if_necessary(&renderer).await?;

        let both_support_prepare = renderer
            .connection_manager()
            .supports_action(upnp_av::connection_manager::Action::PrepareForConnection)
            && server
                .connection_manager()
                .supports_action(upnp_av::connection_manager::Action::PrepareForConnection);

        if both_support_prepare {
            let server_side = server
                .connection_manager()
                .prepare_for_connection(
                    &resource.protocol_info,
                    &connection_manager_id(renderer.device()),
                    -1,
                    upnp_av::connection_manager::Direction::Output,
                )
                .await?;
            renderer
                .prepare_connection(
                    &resource.protocol_info,
                    &connection_manager_id(server.device()),
                    server_side.connection_id,
                )
                .await?;
        } else {
            renderer.use_default_connection();
        }

        server.set_transport_item(&resource).await?;
        renderer.set_transport_item(&resource).await?;
        renderer.play().await
    }

    /// Shut everything down, releasing sockets and the event listener.
    pub async fn stop(self) {
        self.scanner.stop();
        self.ssdp.stop();
        self.gena.stop().await;
    }

    async fn stop_playback_if_necessary(&self, renderer: &MediaRenderer) -> Result<()> {
        if renderer.avtransport().is_none() {
            return Ok(());
        }
        let info = renderer.get_transport_info().await?;
        if matches!(
            info.state,
            TransportState::Playing | TransportState::PausedPlayback | TransportState::Recording
        ) {
            renderer.stop().await?;
        }
        Ok(())
    }
}

/// The peer id of a device's ConnectionManager: `<udn>/<service-id>`.
fn connection_manager_id(device: &Device) -> String {
    let service_id = device
        .service(ServiceKind::ConnectionManager)
        .map(|s| s.id.as_str())
        .unwrap_or_default();
    format!("{}/{}", device.udn, service_id)
}
