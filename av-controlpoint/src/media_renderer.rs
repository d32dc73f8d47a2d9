//! The MediaRenderer aggregate.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::debug;
use upnp_av::avtransport::{self, PositionInfo, SeekMode, TransportInfo};
use upnp_av::connection_manager::{
    Direction, DEFAULT_CONNECTION_ID, UNKNOWN_CONNECTION_ID,
};
use upnp_av::rendering_control::Channel;
use upnp_av::{
    AvTransportClient, ClientContext, ConnectionManagerClient, RenderingControlClient, Result,
    UpnpError,
};
use upnp_discovery::{Device, DeviceKind, ServiceKind};
use upnp_xml::{Item, ProtocolInfo, Resource};

/// Playlist format accepted by handing the renderer an m3u of the real
/// streams; always offered in addition to the device's sink protocols.
const PLAYLIST_PROTOCOL: &str = "http-get:*:audio/m3u:*";

#[derive(Debug, Clone, Copy)]
struct ActiveConnection {
    connection_id: i32,
    av_transport_id: i32,
    rendering_control_id: i32,
}

impl ActiveConnection {
    const UNKNOWN: ActiveConnection = ActiveConnection {
        connection_id: UNKNOWN_CONNECTION_ID,
        av_transport_id: 0,
        rendering_control_id: 0,
    };

    const DEFAULT: ActiveConnection = ActiveConnection {
        connection_id: DEFAULT_CONNECTION_ID,
        av_transport_id: 0,
        rendering_control_id: 0,
    };
}

/// A media renderer: ConnectionManager plus RenderingControl, with an
/// optional AVTransport, operating through one active connection.
///
/// After binding the renderer has *no* active connection: every transport
/// operation fails with [`UpnpError::InvalidState`] until
/// [`use_default_connection`](Self::use_default_connection) or
/// [`prepare_connection`](Self::prepare_connection) selects one.
pub struct MediaRenderer {
    device: Device,
    connection_manager: ConnectionManagerClient,
    rendering_control: RenderingControlClient,
    avtransport: Option<AvTransportClient>,
    sink_protocols: Vec<ProtocolInfo>,
    connection: Mutex<ActiveConnection>,
}

impl MediaRenderer {
    pub async fn bind(context: &ClientContext, device: &Device) -> Result<Self> {
        if device.kind != DeviceKind::MediaRenderer {
            return Err(UpnpError::invalid_argument(format!(
                "{} is not a media renderer",
                device.udn
            )));
        }

        let connection_manager = ConnectionManagerClient::bind(context, device).await?;
        let rendering_control = RenderingControlClient::bind(context, device).await?;
        let avtransport = if device.implements_service(ServiceKind::AVTransport) {
            Some(AvTransportClient::bind(context, device).await?)
        } else {
            None
        };

        let mut sink_protocols = connection_manager.get_protocol_info().await?;
        if let Ok(playlist) = ProtocolInfo::parse(PLAYLIST_PROTOCOL) {
            sink_protocols.push(playlist);
        }

        Ok(Self {
            device: device.clone(),
            connection_manager,
            rendering_control,
            avtransport,
            sink_protocols,
            connection: Mutex::new(ActiveConnection::UNKNOWN),
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn udn(&self) -> &str {
        &self.device.udn
    }

    pub fn friendly_name(&self) -> &str {
        &self.device.friendly_name
    }

    pub fn connection_manager(&self) -> &ConnectionManagerClient {
        &self.connection_manager
    }

    pub fn rendering_control(&self) -> &RenderingControlClient {
        &self.rendering_control
    }

    pub fn avtransport(&self) -> Option<&AvTransportClient> {
        self.avtransport.as_ref()
    }

    /// Everything the renderer claims to render, plus the playlist format.
    pub fn supported_protocols(&self) -> &[ProtocolInfo] {
        &self.sink_protocols
    }

    /// The first resource of `item` the renderer can play.
    pub fn supports_playback<'a>(&self, item: &'a Item) -> Option<&'a Resource> {
        item.resources.iter().find(|resource| {
            self.sink_protocols
                .iter()
                .any(|sink| sink.is_compatible_with(&resource.protocol_info))
        })
    }

    /// Route all operations over the publisher-guaranteed connection 0.
    pub fn use_default_connection(&self) {
        *self.connection.lock().unwrap() = ActiveConnection::DEFAULT;
    }

    pub fn connection_id(&self) -> i32 {
        self.connection.lock().unwrap().connection_id
    }

    /// Negotiate a dedicated connection for `protocol_info` with
    /// `PrepareForConnection` and make it the active one.
    pub async fn prepare_connection(
        &self,
        protocol_info: &ProtocolInfo,
        peer_connection_manager: &str,
        peer_connection_id: i32,
    ) -> Result<i32> {
        let prepared = self
            .connection_manager
            .prepare_for_connection(
                protocol_info,
                peer_connection_manager,
                peer_connection_id,
                Direction::Input,
            )
            .await?;

        debug!(
            connection = prepared.connection_id,
            avt = prepared.av_transport_id,
            rcs = prepared.rendering_control_service_id,
            "connection prepared"
        );
        *self.connection.lock().unwrap() = ActiveConnection {
            connection_id: prepared.connection_id,
            av_transport_id: prepared.av_transport_id,
            rendering_control_id: prepared.rendering_control_service_id,
        };
        Ok(prepared.connection_id)
    }

    /// Close a prepared connection and fall back to "no connection".
    /// Closing the default connection is a local no-op.
    pub async fn release_connection(&self) -> Result<()> {
        let connection = *self.connection.lock().unwrap();
        if connection.connection_id > DEFAULT_CONNECTION_ID {
            self.connection_manager
                .connection_complete(connection.connection_id)
                .await?;
        }
        *self.connection.lock().unwrap() = ActiveConnection::UNKNOWN;
        Ok(())
    }

    /// Subscribe to transport and rendering events.
    pub async fn activate_events(&self) -> Result<()> {
        if let Some(avtransport) = &self.avtransport {
            avtransport.subscribe().await?;
        }
        self.rendering_control.subscribe().await
    }

    pub async fn deactivate_events(&self) -> Result<()> {
        if let Some(avtransport) = &self.avtransport {
            avtransport.unsubscribe().await?;
        }
        self.rendering_control.unsubscribe().await
    }

    pub async fn set_transport_item(&self, resource: &Resource) -> Result<()> {
        let instance = self.transport_instance()?;
        self.avt()?
            .set_av_transport_uri(instance, &resource.url, "")
            .await
    }

    pub async fn set_next_transport_item(&self, resource: &Resource) -> Result<()> {
        let instance = self.transport_instance()?;
        self.avt()?
            .set_next_av_transport_uri(instance, &resource.url, "")
            .await
    }

    pub async fn play(&self) -> Result<()> {
        let instance = self.transport_instance()?;
        self.avt()?.play(instance, "1").await
    }

    pub async fn pause(&self) -> Result<()> {
        let instance = self.transport_instance()?;
        self.avt()?.pause(instance).await
    }

    pub async fn stop(&self) -> Result<()> {
        let instance = self.transport_instance()?;
        self.avt()?.stop(instance).await
    }

    pub async fn next(&self) -> Result<()> {
        let instance = self.transport_instance()?;
        self.avt()?.next(instance).await
    }

    pub async fn previous(&self) -> Result<()> {
        let instance = self.transport_instance()?;
        self.avt()?.previous(instance).await
    }

    pub async fn seek(&self, mode: SeekMode, target: &str) -> Result<()> {
        let instance = self.transport_instance()?;
        self.avt()?.seek(instance, mode, target).await
    }

    pub async fn get_transport_info(&self) -> Result<TransportInfo> {
        let instance = self.transport_instance()?;
        self.avt()?.get_transport_info(instance).await
    }

    /// Position and track metadata for the active connection.
    pub async fn get_current_track_info(&self) -> Result<PositionInfo> {
        let instance = self.transport_instance()?;
        self.avt()?.get_position_info(instance).await
    }

    /// Transport actions currently permitted, from the latest event.
    pub fn available_actions(&self) -> HashSet<avtransport::Action> {
        self.avtransport
            .as_ref()
            .map(|avt| avt.available_actions())
            .unwrap_or_default()
    }

    /// Evented `CurrentTrackURI` snapshot; readable from any thread.
    pub fn current_track_uri(&self) -> Option<String> {
        self.avtransport.as_ref().and_then(|avt| avt.current_track_uri())
    }

    pub async fn get_volume(&self) -> Result<u32> {
        let instance = self.rendering_instance()?;
        self.rendering_control.get_volume(instance, Channel::Master).await
    }

    pub async fn set_volume(&self, desired_volume: u32) -> Result<()> {
        let instance = self.rendering_instance()?;
        self.rendering_control
            .set_volume(instance, Channel::Master, desired_volume)
            .await
    }

    pub async fn set_mute(&self, mute: bool) -> Result<()> {
        let instance = self.rendering_instance()?;
        self.rendering_control
            .set_mute(instance, Channel::Master, mute)
            .await
    }

    fn avt(&self) -> Result<&AvTransportClient> {
        self.avtransport
            .as_ref()
            .ok_or_else(|| UpnpError::invalid_state("renderer has no AVTransport service"))
    }

    /// The AVTransport instance id of the active connection.
    fn transport_instance(&self) -> Result<u32> {
        let connection = *self.connection.lock().unwrap();
        if connection.connection_id == UNKNOWN_CONNECTION_ID {
            return Err(UpnpError::invalid_state("no active connection"));
        }
        Ok(connection.av_transport_id.max(0) as u32)
    }

    fn rendering_instance(&self) -> Result<u32> {
        let connection = *self.connection.lock().unwrap();
        if connection.connection_id == UNKNOWN_CONNECTION_ID {
            return Err(UpnpError::invalid_state("no active connection"));
        }
        Ok(connection.rendering_control_id.max(0) as u32)
    }
}
