//! GENA event server: the locally hosted HTTP endpoint a UPnP control point
//! advertises in its `CALLBACK` header.
//!
//! Publishers deliver state-variable changes as `NOTIFY` requests carrying a
//! `SID` header; the server routes each notification to the channel that was
//! registered for that subscription id.
//!
//! - accepted notification → `200 OK`, empty body
//! - unknown `SID` → `412 Precondition Failed`
//! - missing/invalid GENA headers → `400 Bad Request`
//!
//! Routing happens on the server's executor; registered channels must be
//! consumed elsewhere and never block.

mod router;
mod server;

pub use router::{EventNotification, EventRouter};
pub use server::{GenaServer, GenaServerError};
