//! ConnectionManager name tables and connection data.

use upnp_xml::ProtocolInfo;

use crate::error::UpnpError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GetProtocolInfo,
    PrepareForConnection,
    ConnectionComplete,
    GetCurrentConnectionIDs,
    GetCurrentConnectionInfo,
}

const ACTION_NAMES: &[(&str, Action)] = &[
    ("GetProtocolInfo", Action::GetProtocolInfo),
    ("PrepareForConnection", Action::PrepareForConnection),
    ("ConnectionComplete", Action::ConnectionComplete),
    ("GetCurrentConnectionIDs", Action::GetCurrentConnectionIDs),
    ("GetCurrentConnectionInfo", Action::GetCurrentConnectionInfo),
];

impl Action {
    pub fn name(&self) -> &'static str {
        ACTION_NAMES
            .iter()
            .find(|(_, action)| action == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn from_str(name: &str) -> Result<Self> {
        ACTION_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, action)| *action)
            .ok_or_else(|| {
                UpnpError::invalid_argument(format!("unknown ConnectionManager action {name:?}"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    SourceProtocolInfo,
    SinkProtocolInfo,
    CurrentConnectionIDs,
}

const VARIABLE_NAMES: &[(&str, Variable)] = &[
    ("SourceProtocolInfo", Variable::SourceProtocolInfo),
    ("SinkProtocolInfo", Variable::SinkProtocolInfo),
    ("CurrentConnectionIDs", Variable::CurrentConnectionIDs),
];

impl Variable {
    pub fn name(&self) -> &'static str {
        VARIABLE_NAMES
            .iter()
            .find(|(_, variable)| variable == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn from_str(name: &str) -> Result<Self> {
        VARIABLE_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, variable)| *variable)
            .ok_or_else(|| {
                UpnpError::invalid_argument(format!("unknown ConnectionManager variable {name:?}"))
            })
    }
}

/// Stream direction relative to the answering device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "Input",
            Direction::Output => "Output",
        }
    }

    pub fn from_str(name: &str) -> Result<Self> {
        match name {
            "Input" => Ok(Direction::Input),
            "Output" => Ok(Direction::Output),
            other => Err(UpnpError::invalid_argument(format!(
                "unknown direction {other:?}"
            ))),
        }
    }
}

/// Connection status reported by `GetCurrentConnectionInfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Ok,
    ContentFormatMismatch,
    InsufficientBandwidth,
    UnreliableChannel,
    Unknown,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Ok => "OK",
            ConnectionStatus::ContentFormatMismatch => "ContentFormatMismatch",
            ConnectionStatus::InsufficientBandwidth => "InsufficientBandwidth",
            ConnectionStatus::UnreliableChannel => "UnreliableChannel",
            ConnectionStatus::Unknown => "Unknown",
        }
    }

    pub fn from_str(name: &str) -> Result<Self> {
        match name {
            "OK" => Ok(ConnectionStatus::Ok),
            "ContentFormatMismatch" => Ok(ConnectionStatus::ContentFormatMismatch),
            "InsufficientBandwidth" => Ok(ConnectionStatus::InsufficientBandwidth),
            "UnreliableChannel" => Ok(ConnectionStatus::UnreliableChannel),
            "Unknown" => Ok(ConnectionStatus::Unknown),
            other => Err(UpnpError::invalid_argument(format!(
                "unknown connection status {other:?}"
            ))),
        }
    }
}

/// Result of `PrepareForConnection`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparedConnection {
    pub connection_id: i32,
    pub av_transport_id: i32,
    pub rendering_control_service_id: i32,
}

/// Full connection record from `GetCurrentConnectionInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub connection_id: i32,
    pub av_transport_id: i32,
    pub rendering_control_service_id: i32,
    pub protocol_info: Option<ProtocolInfo>,
    pub peer_connection_manager: String,
    pub peer_connection_id: i32,
    pub direction: Option<Direction>,
    pub status: Option<ConnectionStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trip() {
        for (name, action) in ACTION_NAMES {
            assert_eq!(Action::from_str(name).unwrap(), *action);
            assert_eq!(action.name(), *name);
        }
        assert!(Action::from_str("GetFeatureList").is_err());
    }

    #[test]
    fn variable_round_trip() {
        for (name, variable) in VARIABLE_NAMES {
            assert_eq!(Variable::from_str(name).unwrap(), *variable);
            assert_eq!(variable.name(), *name);
        }
        assert!(Variable::from_str("LastChange").is_err());
    }

    #[test]
    fn direction_and_status_tables() {
        assert_eq!(Direction::from_str("Input").unwrap(), Direction::Input);
        assert_eq!(Direction::Output.as_str(), "Output");
        assert!(Direction::from_str("Both").is_err());

        assert_eq!(
            ConnectionStatus::from_str("ContentFormatMismatch").unwrap(),
            ConnectionStatus::ContentFormatMismatch
        );
        assert!(ConnectionStatus::from_str("BROKEN").is_err());
    }
}
