//! Typed clients for the UPnP AV service family.
//!
//! [`ServiceClientBase`] carries everything the four services share: binding
//! to a discovered device, SCPD-driven action support, GENA subscription
//! lifecycle with timer renewal, SOAP action dispatch and decoding of
//! `LastChange` event payloads into typed state variables.
//!
//! The per-service clients ([`AvTransportClient`], [`RenderingControlClient`],
//! [`ConnectionManagerClient`], [`ContentDirectoryClient`]) are thin typed
//! wrappers: enum tables for action and variable names plus response
//! extraction.

pub mod avtransport;
mod client;
pub mod connection_manager;
pub mod content_directory;
mod error;
pub mod rendering_control;
mod response;

pub use avtransport::AvTransportClient;
pub use client::{
    ClientContext, LastChangeEvent, ServiceClientBase, ServiceTraits, StateVariableEvent,
};
pub use connection_manager::ConnectionManagerClient;
pub use content_directory::ContentDirectoryClient;
pub use error::{ConnectionFault, UpnpError};
pub use rendering_control::RenderingControlClient;

/// Convenience alias used across the service clients.
pub type Result<T> = std::result::Result<T, UpnpError>;
