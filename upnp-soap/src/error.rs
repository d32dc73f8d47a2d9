use thiserror::Error;

/// Transport-level failures shared by the HTTP and SOAP clients.
///
/// SOAP faults are *not* errors at this layer: a well-formed fault body is
/// returned as data inside [`crate::ActionResult`] so that callers can map
/// the numeric code to something meaningful for their service.
#[derive(Debug, Error)]
pub enum SoapError {
    /// Socket/connect/read/write failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request deadline elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// The peer answered with a status outside the accepted set {200, 206}.
    #[error("http status {status}: {reason}")]
    Http { status: u16, reason: String },

    /// The transport worked but the payload was not recognisable.
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl From<reqwest::Error> for SoapError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SoapError::Timeout
        } else {
            SoapError::Network(e.to_string())
        }
    }
}
