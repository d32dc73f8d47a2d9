use thiserror::Error;

/// Failures surfaced by the discovery layer.
///
/// Per-message problems (unparsable SSDP datagrams, descriptions that fail
/// validation) are logged and dropped rather than surfaced; these errors
/// cover the operations a caller explicitly initiates.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Socket setup, multicast join or send failure.
    #[error("network error: {0}")]
    Network(String),

    /// A device description could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for DiscoveryError {
    fn from(e: std::io::Error) -> Self {
        DiscoveryError::Network(e.to_string())
    }
}

impl From<upnp_soap::SoapError> for DiscoveryError {
    fn from(e: upnp_soap::SoapError) -> Self {
        DiscoveryError::Network(e.to_string())
    }
}
