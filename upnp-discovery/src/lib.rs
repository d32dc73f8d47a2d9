//! SSDP discovery and device lifecycle tracking.
//!
//! Two layers live here:
//!
//! - [`SsdpClient`]: the raw multicast listener. It joins the SSDP group,
//!   emits [`SsdpEvent::Alive`]/[`SsdpEvent::ByeBye`] signals for every
//!   presence announcement it can parse, and sends active `M-SEARCH`
//!   queries.
//! - [`DeviceScanner`]: consumes those signals and maintains the device
//!   table: fetches and validates device descriptions, tracks cache-control
//!   TTLs, re-describes devices whose location moved, and emits
//!   [`DeviceEvent::Discovered`]/[`DeviceEvent::Disappeared`] exactly once
//!   per device lifetime.
//!
//! Callers receive cloned [`Device`] snapshots; the scanner owns the table.

pub mod device;
mod error;
pub mod scanner;
pub mod ssdp;

pub use device::{Device, DeviceKind, Service, ServiceKind};
pub use error::DiscoveryError;
pub use scanner::{DeviceEvent, DeviceScanner};
pub use ssdp::{SsdpClient, SsdpEvent, SsdpInfo};
