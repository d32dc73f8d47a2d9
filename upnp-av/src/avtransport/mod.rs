//! AVTransport service client.

mod types;

use std::collections::HashSet;

use tokio::sync::broadcast;
use tracing::warn;
use upnp_discovery::{Device, ServiceKind};

use crate::client::{ClientContext, LastChangeEvent, ServiceClientBase, ServiceTraits};
use crate::response::{child_i32, child_text, child_u32};
use crate::Result;

pub use types::{
    Action, MediaInfo, PlayMode, PositionInfo, SeekMode, TransportInfo, TransportState,
    TransportStatus, Variable,
};

pub struct AvTransportTraits;

impl ServiceTraits for AvTransportTraits {
    type Action = Action;
    type Variable = Variable;

    const KIND: ServiceKind = ServiceKind::AVTransport;
    const LAST_CHANGE: Option<Variable> = Some(Variable::LastChange);

    fn action_from_str(name: &str) -> Result<Action> {
        Action::from_str(name)
    }

    fn action_name(action: Action) -> &'static str {
        action.name()
    }

    fn variable_from_str(name: &str) -> Result<Variable> {
        Variable::from_str(name)
    }

    fn variable_name(variable: Variable) -> &'static str {
        variable.name()
    }
}

/// Typed client for `urn:schemas-upnp-org:service:AVTransport`.
///
/// Every action carries `InstanceID` as its first argument; the instance id
/// is the connection id obtained from ConnectionManager (0 for the default
/// connection).
pub struct AvTransportClient {
    base: ServiceClientBase<AvTransportTraits>,
}

impl AvTransportClient {
    pub async fn bind(context: &ClientContext, device: &Device) -> Result<Self> {
        Ok(Self {
            base: ServiceClientBase::bind(context, device).await?,
        })
    }

    pub fn supports_action(&self, action: Action) -> bool {
        self.base.supports_action(action)
    }

    pub async fn subscribe(&self) -> Result<()> {
        self.base.subscribe().await
    }

    pub async fn unsubscribe(&self) -> Result<()> {
        self.base.unsubscribe().await
    }

    /// Republished LastChange payloads, decoded to typed variables.
    pub fn last_change_events(&self) -> broadcast::Receiver<LastChangeEvent<Variable>> {
        self.base.last_change_events()
    }

    pub async fn set_av_transport_uri(
        &self,
        instance_id: u32,
        uri: &str,
        uri_metadata: &str,
    ) -> Result<()> {
        self.base
            .execute(
                Action::SetAVTransportURI,
                &[
                    ("InstanceID", instance_id.to_string()),
                    ("CurrentURI", uri.to_string()),
                    ("CurrentURIMetaData", uri_metadata.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn set_next_av_transport_uri(
        &self,
        instance_id: u32,
        uri: &str,
        uri_metadata: &str,
    ) -> Result<()> {
        self.base
            .execute(
                Action::SetNextAVTransportURI,
                &[
                    ("InstanceID", instance_id.to_string()),
                    ("NextURI", uri.to_string()),
                    ("NextURIMetaData", uri_metadata.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    /// `Speed` is a free-form string on the wire; `"1"` is normal playback.
    pub async fn play(&self, instance_id: u32, speed: &str) -> Result<()> {
        self.base
            .execute(
                Action::Play,
                &[
                    ("InstanceID", instance_id.to_string()),
                    ("Speed", speed.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn pause(&self, instance_id: u32) -> Result<()> {
        self.simple(Action::Pause, instance_id).await
    }

    pub async fn stop(&self, instance_id: u32) -> Result<()> {
        self.simple(Action::Stop, instance_id).await
    }

    pub async fn next(&self, instance_id: u32) -> Result<()> {
        self.simple(Action::Next, instance_id).await
    }

    pub async fn previous(&self, instance_id: u32) -> Result<()> {
        self.simple(Action::Previous, instance_id).await
    }

    pub async fn seek(&self, instance_id: u32, unit: SeekMode, target: &str) -> Result<()> {
        self.base
            .execute(
                Action::Seek,
                &[
                    ("InstanceID", instance_id.to_string()),
                    ("Unit", unit.as_str().to_string()),
                    ("Target", target.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_transport_info(&self, instance_id: u32) -> Result<TransportInfo> {
        let response = self
            .base
            .execute_parsed(
                Action::GetTransportInfo,
                &[("InstanceID", instance_id.to_string())],
            )
            .await?;

        Ok(TransportInfo {
            state: TransportState::from_str(&child_text(&response, "CurrentTransportState"))?,
            status: TransportStatus::from_str(&child_text(&response, "CurrentTransportStatus"))?,
            speed: child_text(&response, "CurrentSpeed"),
        })
    }

    pub async fn get_position_info(&self, instance_id: u32) -> Result<PositionInfo> {
        let response = self
            .base
            .execute_parsed(
                Action::GetPositionInfo,
                &[("InstanceID", instance_id.to_string())],
            )
            .await?;

        Ok(PositionInfo {
            track: child_u32(&response, "Track"),
            track_duration: child_text(&response, "TrackDuration"),
            track_metadata: child_text(&response, "TrackMetaData"),
            track_uri: child_text(&response, "TrackURI"),
            relative_time: child_text(&response, "RelTime"),
            absolute_time: child_text(&response, "AbsTime"),
            relative_count: child_i32(&response, "RelCount"),
            absolute_count: child_i32(&response, "AbsCount"),
        })
    }

    pub async fn get_media_info(&self, instance_id: u32) -> Result<MediaInfo> {
        let response = self
            .base
            .execute_parsed(
                Action::GetMediaInfo,
                &[("InstanceID", instance_id.to_string())],
            )
            .await?;

        Ok(MediaInfo {
            number_of_tracks: child_u32(&response, "NrTracks"),
            media_duration: child_text(&response, "MediaDuration"),
            current_uri: child_text(&response, "CurrentURI"),
            current_uri_metadata: child_text(&response, "CurrentURIMetaData"),
            next_uri: child_text(&response, "NextURI"),
            next_uri_metadata: child_text(&response, "NextURIMetaData"),
            play_medium: child_text(&response, "PlayMedium"),
            record_medium: child_text(&response, "RecordMedium"),
            write_status: child_text(&response, "WriteStatus"),
        })
    }

    /// The set of actions currently permitted by the transport. Unknown
    /// names reported by the device are logged and dropped.
    pub async fn get_current_transport_actions(
        &self,
        instance_id: u32,
    ) -> Result<HashSet<Action>> {
        let response = self
            .base
            .execute_parsed(
                Action::GetCurrentTransportActions,
                &[("InstanceID", instance_id.to_string())],
            )
            .await?;
        Ok(parse_transport_actions(&child_text(&response, "Actions")))
    }

    /// Latest `CurrentTrackURI` carried by an event, without a round trip.
    pub fn current_track_uri(&self) -> Option<String> {
        self.base.state_variable_value(Variable::CurrentTrackURI)
    }

    /// Latest evented transport state, if it parsed.
    pub fn transport_state(&self) -> Option<TransportState> {
        self.base
            .state_variable_value(Variable::TransportState)
            .and_then(|v| TransportState::from_str(&v).ok())
    }

    /// Latest evented play mode, if it parsed.
    pub fn current_play_mode(&self) -> Option<PlayMode> {
        self.base
            .state_variable_value(Variable::CurrentPlayMode)
            .and_then(|v| PlayMode::from_str(&v).ok())
    }

    /// Latest evented `CurrentTransportActions` set.
    pub fn available_actions(&self) -> HashSet<Action> {
        self.base
            .state_variable_value(Variable::CurrentTransportActions)
            .map(|csv| parse_transport_actions(&csv))
            .unwrap_or_default()
    }

    async fn simple(&self, action: Action, instance_id: u32) -> Result<()> {
        self.base
            .execute(action, &[("InstanceID", instance_id.to_string())])
            .await?;
        Ok(())
    }
}

/// Split a `CurrentTransportActions` CSV into known actions.
pub fn parse_transport_actions(csv: &str) -> HashSet<Action> {
    let mut actions = HashSet::new();
    for token in csv.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match Action::from_str(token) {
            Ok(action) => {
                actions.insert(action);
            }
            Err(_) => warn!(action = %token, "unknown transport action dropped"),
        }
    }
    actions
}
