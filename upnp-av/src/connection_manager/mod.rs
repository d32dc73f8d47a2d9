//! ConnectionManager service client.

mod types;

use tracing::warn;
use upnp_discovery::{Device, ServiceKind};
use upnp_xml::ProtocolInfo;

use crate::client::{ClientContext, ServiceClientBase, ServiceTraits};
use crate::error::{ConnectionFault, UpnpError};
use crate::response::{child_i32, child_text};
use crate::Result;

pub use types::{Action, ConnectionInfo, ConnectionStatus, Direction, PreparedConnection, Variable};

/// A renderer's default (always-present) connection.
pub const DEFAULT_CONNECTION_ID: i32 = 0;
/// Sentinel for "no active connection".
pub const UNKNOWN_CONNECTION_ID: i32 = -1;

pub struct ConnectionManagerTraits;

impl ServiceTraits for ConnectionManagerTraits {
    type Action = Action;
    type Variable = Variable;

    const KIND: ServiceKind = ServiceKind::ConnectionManager;

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

/// Typed client for `urn:schemas-upnp-org:service:ConnectionManager`.
///
/// Fault codes 701-707 surface as [`UpnpError::Connection`] with the
/// matching [`ConnectionFault`] kind.
pub struct ConnectionManagerClient {
    base: ServiceClientBase<ConnectionManagerTraits>,
}

impl ConnectionManagerClient {
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

    /// The formats the device can render, parsed from the `Sink` CSV.
    /// Malformed entries are skipped with a warning.
    pub async fn get_protocol_info(&self) -> Result<Vec<ProtocolInfo>> {
        let response = map_connection_fault(
            self.base.execute_parsed(Action::GetProtocolInfo, &[]).await,
        )?;
        Ok(parse_protocol_info_csv(&child_text(&response, "Sink")))
    }

    pub async fn prepare_for_connection(
        &self,
        remote_protocol_info: &ProtocolInfo,
        peer_connection_manager: &str,
        peer_connection_id: i32,
        direction: Direction,
    ) -> Result<PreparedConnection> {
        let response = map_connection_fault(
            self.base
                .execute_parsed(
                    Action::PrepareForConnection,
                    &[
                        ("RemoteProtocolInfo", remote_protocol_info.to_string()),
                        ("PeerConnectionManager", peer_connection_manager.to_string()),
                        ("PeerConnectionID", peer_connection_id.to_string()),
                        ("Direction", direction.as_str().to_string()),
                    ],
                )
                .await,
        )?;

        Ok(PreparedConnection {
            connection_id: child_i32(&response, "ConnectionID"),
            av_transport_id: child_i32(&response, "AVTransportID"),
            rendering_control_service_id: child_i32(&response, "RcsID"),
        })
    }

    pub async fn connection_complete(&self, connection_id: i32) -> Result<()> {
        map_connection_fault(
            self.base
                .execute(
                    Action::ConnectionComplete,
                    &[("ConnectionID", connection_id.to_string())],
                )
                .await,
        )?;
        Ok(())
    }

    pub async fn get_current_connection_ids(&self) -> Result<Vec<i32>> {
        let response = map_connection_fault(
            self.base
                .execute_parsed(Action::GetCurrentConnectionIDs, &[])
                .await,
        )?;
        Ok(child_text(&response, "ConnectionIDs")
            .split(',')
            .filter_map(|id| id.trim().parse().ok())
            .collect())
    }

    pub async fn get_current_connection_info(&self, connection_id: i32) -> Result<ConnectionInfo> {
        let response = map_connection_fault(
            self.base
                .execute_parsed(
                    Action::GetCurrentConnectionInfo,
                    &[("ConnectionID", connection_id.to_string())],
                )
                .await,
        )?;

        let protocol_info = {
            let raw = child_text(&response, "ProtocolInfo");
            if raw.is_empty() {
                None
            } else {
                ProtocolInfo::parse(&raw).ok()
            }
        };

        Ok(ConnectionInfo {
            connection_id,
            av_transport_id: child_i32(&response, "AVTransportID"),
            rendering_control_service_id: child_i32(&response, "RcsID"),
            protocol_info,
            peer_connection_manager: child_text(&response, "PeerConnectionManager"),
            peer_connection_id: child_i32(&response, "PeerConnectionID"),
            direction: Direction::from_str(&child_text(&response, "Direction")).ok(),
            status: ConnectionStatus::from_str(&child_text(&response, "Status")).ok(),
        })
    }
}

/// Translate 701-707 faults into their dedicated kinds.
fn map_connection_fault<T>(result: Result<T>) -> Result<T> {
    result.map_err(|e| match e {
        UpnpError::SoapFault { code, description } => match ConnectionFault::from_code(code) {
            Some(fault) => UpnpError::Connection(fault),
            None => UpnpError::SoapFault { code, description },
        },
        other => other,
    })
}

/// Parse a comma-separated protocol-info list, skipping malformed tokens.
pub fn parse_protocol_info_csv(csv: &str) -> Vec<ProtocolInfo> {
    let mut infos = Vec::new();
    for token in csv.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match ProtocolInfo::parse(token) {
            Ok(info) => infos.push(info),
            Err(e) => warn!(token = %token, "skipping malformed protocol info: {e}"),
        }
    }
    infos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_csv_preserves_order_and_skips_garbage() {
        let infos =
            parse_protocol_info_csv("http-get:*:audio/mpeg:*,garbage,http-get:*:audio/wav:*");
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].content_format, "audio/mpeg");
        assert_eq!(infos[1].content_format, "audio/wav");
    }

    #[test]
    fn fault_mapping_goes_through_connection_kinds() {
        let mapped: Result<()> = map_connection_fault(Err(UpnpError::SoapFault {
            code: 701,
            description: "Incompatible protocol info".to_string(),
        }));
        assert!(matches!(
            mapped,
            Err(UpnpError::Connection(ConnectionFault::IncompatibleProtocolInfo))
        ));

        let untouched: Result<()> = map_connection_fault(Err(UpnpError::SoapFault {
            code: 718,
            description: "ConflictInMappingEntry".to_string(),
        }));
        assert!(matches!(
            untouched,
            Err(UpnpError::SoapFault { code: 718, .. })
        ));
    }
}
