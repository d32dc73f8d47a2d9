//! RenderingControl service client.

mod types;

use tokio::sync::broadcast;
use upnp_discovery::{Device, ServiceKind};
use upnp_xml::ValueRange;

use crate::client::{ClientContext, LastChangeEvent, ServiceClientBase, ServiceTraits};
use crate::response::child_text;
use crate::Result;

pub use types::{Action, Channel, Variable};

/// RenderingControl defaults its volume range to `[0, 100]` when the SCPD
/// does not declare one.
const DEFAULT_VOLUME_RANGE: ValueRange = ValueRange {
    min: 0,
    max: 100,
    step: None,
};

pub struct RenderingControlTraits;

impl ServiceTraits for RenderingControlTraits {
    type Action = Action;
    type Variable = Variable;

    const KIND: ServiceKind = ServiceKind::RenderingControl;
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

/// Typed client for `urn:schemas-upnp-org:service:RenderingControl`.
pub struct RenderingControlClient {
    base: ServiceClientBase<RenderingControlTraits>,
}

impl RenderingControlClient {
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

    pub fn last_change_events(&self) -> broadcast::Receiver<LastChangeEvent<Variable>> {
        self.base.last_change_events()
    }

    /// The volume range declared by the device's `Volume` state variable.
    pub fn volume_range(&self) -> ValueRange {
        self.base
            .descriptor()
            .state_variable("Volume")
            .and_then(|v| v.range.clone())
            .unwrap_or(DEFAULT_VOLUME_RANGE)
    }

    /// Set the volume on a channel. The desired value is clamped to the
    /// device's declared range before it goes on the wire.
    pub async fn set_volume(
        &self,
        instance_id: u32,
        channel: Channel,
        desired_volume: u32,
    ) -> Result<()> {
        let clamped = self.volume_range().clamp(i64::from(desired_volume));
        self.base
            .execute(
                Action::SetVolume,
                &[
                    ("InstanceID", instance_id.to_string()),
                    ("Channel", channel.as_str().to_string()),
                    ("DesiredVolume", clamped.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_volume(&self, instance_id: u32, channel: Channel) -> Result<u32> {
        let response = self
            .base
            .execute_parsed(
                Action::GetVolume,
                &[
                    ("InstanceID", instance_id.to_string()),
                    ("Channel", channel.as_str().to_string()),
                ],
            )
            .await?;
        child_text(&response, "CurrentVolume")
            .parse()
            .map_err(|_| crate::UpnpError::Unexpected("non-numeric CurrentVolume".to_string()))
    }

    pub async fn set_mute(&self, instance_id: u32, channel: Channel, mute: bool) -> Result<()> {
        self.base
            .execute(
                Action::SetMute,
                &[
                    ("InstanceID", instance_id.to_string()),
                    ("Channel", channel.as_str().to_string()),
                    ("DesiredMute", if mute { "1" } else { "0" }.to_string()),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_mute(&self, instance_id: u32, channel: Channel) -> Result<bool> {
        let response = self
            .base
            .execute_parsed(
                Action::GetMute,
                &[
                    ("InstanceID", instance_id.to_string()),
                    ("Channel", channel.as_str().to_string()),
                ],
            )
            .await?;
        let current = child_text(&response, "CurrentMute");
        Ok(current == "1" || current.eq_ignore_ascii_case("true"))
    }

    /// Latest evented volume, if any.
    pub fn current_volume(&self) -> Option<u32> {
        self.base
            .state_variable_value(Variable::Volume)
            .and_then(|v| v.parse().ok())
    }
}
