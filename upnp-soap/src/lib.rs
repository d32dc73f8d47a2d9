//! HTTP and SOAP plumbing for UPnP control points.
//!
//! This crate provides the two wire-level clients everything else builds on:
//!
//! - [`HttpClient`]: GET/POST plus the GENA extension verbs
//!   (SUBSCRIBE / renewal / UNSUBSCRIBE) with `TIMEOUT: Second-N` handling.
//! - [`SoapClient`]: turns an [`Action`] into a SOAP 1.1 envelope, POSTs it
//!   to a control URL and parses the result into an [`ActionResult`],
//!   including `<UPnPError>` fault bodies on HTTP 500.
//!
//! Neither client knows anything about specific UPnP services; typed
//! service clients live one layer up.

mod error;
mod http;
mod soap;

pub use error::SoapError;
pub use http::{HttpClient, HttpResponse, SubscriptionResponse, DEFAULT_TIMEOUT};
pub use soap::{escape_xml, Action, ActionResult, Fault, SoapClient};
