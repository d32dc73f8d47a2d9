use thiserror::Error;

/// Parsing failures for descriptions, listings and event payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document is not well-formed XML or does not deserialize.
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// Well-formed XML whose content violates the expected schema.
    #[error("{0}")]
    Invalid(String),
}
