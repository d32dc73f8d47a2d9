use std::fmt;

use thiserror::Error;
use upnp_soap::SoapError;
use upnp_xml::ParseError;

/// The user-facing error taxonomy.
///
/// Every action-level and subscription-level operation resolves to either a
/// value or one of these. Event-delivery problems (malformed NOTIFY bodies,
/// unknown variables) are logged and dropped instead; they never disturb a
/// subscription.
#[derive(Debug, Error)]
pub enum UpnpError {
    /// Socket/connect/read/write failure.
    #[error("network error: {0}")]
    Network(String),

    /// A deadline elapsed.
    #[error("operation timed out")]
    Timeout,

    /// HTTP status outside {200, 206}.
    #[error("http status {status}: {reason}")]
    Http { status: u16, reason: String },

    /// A `<UPnPError>` fault from an HTTP 500 body.
    #[error("UPnP fault {code}: {description}")]
    SoapFault { code: u32, description: String },

    /// ConnectionManager-specific fault (codes 701-707).
    #[error("connection fault: {0}")]
    Connection(ConnectionFault),

    /// Caller precondition violated (unsupported search property, unknown
    /// enum string, ...). Raised before anything is sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted before its preconditions were established
    /// (no device bound, no active connection).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The transport worked but the payload was unrecognisable.
    #[error("unexpected response: {0}")]
    Unexpected(String),

    /// The pending operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl UpnpError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        UpnpError::InvalidArgument(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        UpnpError::InvalidState(message.into())
    }
}

impl From<SoapError> for UpnpError {
    fn from(e: SoapError) -> Self {
        match e {
            SoapError::Network(msg) => UpnpError::Network(msg),
            SoapError::Timeout => UpnpError::Timeout,
            SoapError::Http { status, reason } => UpnpError::Http { status, reason },
            SoapError::Unexpected(msg) => UpnpError::Unexpected(msg),
        }
    }
}

impl From<ParseError> for UpnpError {
    fn from(e: ParseError) -> Self {
        UpnpError::Unexpected(e.to_string())
    }
}

/// The dedicated fault kinds a ConnectionManager publisher can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFault {
    IncompatibleProtocolInfo,
    IncompatibleDirections,
    InsufficientResources,
    LocalRestrictions,
    AccessDenied,
    InvalidConnectionReference,
    NotInSameNetwork,
}

impl ConnectionFault {
    /// Map UPnP error codes 701-707.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            701 => ConnectionFault::IncompatibleProtocolInfo,
            702 => ConnectionFault::IncompatibleDirections,
            703 => ConnectionFault::InsufficientResources,
            704 => ConnectionFault::LocalRestrictions,
            705 => ConnectionFault::AccessDenied,
            706 => ConnectionFault::InvalidConnectionReference,
            707 => ConnectionFault::NotInSameNetwork,
            _ => return None,
        })
    }
}

impl fmt::Display for ConnectionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConnectionFault::IncompatibleProtocolInfo => "incompatible protocol info",
            ConnectionFault::IncompatibleDirections => "incompatible directions",
            ConnectionFault::InsufficientResources => "insufficient network resources",
            ConnectionFault::LocalRestrictions => "local restrictions",
            ConnectionFault::AccessDenied => "access denied",
            ConnectionFault::InvalidConnectionReference => "invalid connection reference",
            ConnectionFault::NotInSameNetwork => "peers are not in the same network",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soap_error_conversion_preserves_category() {
        assert!(matches!(
            UpnpError::from(SoapError::Timeout),
            UpnpError::Timeout
        ));
        assert!(matches!(
            UpnpError::from(SoapError::Http {
                status: 404,
                reason: "nope".into()
            }),
            UpnpError::Http { status: 404, .. }
        ));
    }

    #[test]
    fn connection_fault_mapping_covers_701_to_707() {
        assert_eq!(
            ConnectionFault::from_code(701),
            Some(ConnectionFault::IncompatibleProtocolInfo)
        );
        assert_eq!(
            ConnectionFault::from_code(707),
            Some(ConnectionFault::NotInSameNetwork)
        );
        assert_eq!(ConnectionFault::from_code(700), None);
        assert_eq!(ConnectionFault::from_code(708), None);
    }
}
