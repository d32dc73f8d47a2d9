//! XML parsing for the UPnP/AV control point.
//!
//! Three families of documents are handled here:
//!
//! - Service descriptions (SCPD): action names and state-variable
//!   descriptors, see [`scpd`].
//! - DIDL-Lite content listings returned by ContentDirectory Browse/Search,
//!   see [`didl`].
//! - GENA event payloads: the `<e:propertyset>` wrapper and the nested
//!   `LastChange` document, see [`events`].
//!
//! Structured documents go through serde after a namespace-stripping
//! pre-pass ([`xml_decode`]); free-form ones (event payloads) are walked
//! with `xmltree`.

pub mod didl;
mod error;
pub mod events;
pub mod scpd;
pub mod xml_decode;

pub use didl::{Item, ItemClass, Property, ProtocolInfo, Resource};
pub use error::ParseError;
pub use events::{parse_last_change, parse_property_set, InstanceChanges};
pub use scpd::{ServiceDescriptor, StateVariableDescriptor, ValueRange};
