//! Subscription-id based routing of inbound notifications.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;

/// One delivered GENA notification.
#[derive(Debug, Clone)]
pub struct EventNotification {
    /// Subscription id from the `SID` header.
    pub sid: String,
    /// Event sequence number from the `SEQ` header (0 on the initial event).
    pub seq: u32,
    /// Raw `<e:propertyset>` body.
    pub body: String,
}

/// Maps subscription ids to the channels consuming their events.
///
/// Registration and routing are both cheap; the router never parses bodies.
/// Delivery order per subscription follows wire arrival order because each
/// notification is forwarded from the single server task.
#[derive(Clone, Default)]
pub struct EventRouter {
    subscriptions: Arc<RwLock<HashMap<String, mpsc::UnboundedSender<EventNotification>>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription id. Events arriving for `sid` are forwarded
    /// into `sender` until [`unregister`](Self::unregister) is called.
    ///
    /// Re-registering an id replaces the previous channel (this happens when
    /// a subscription is re-established from scratch after renewal failures).
    pub async fn register(&self, sid: String, sender: mpsc::UnboundedSender<EventNotification>) {
        self.subscriptions.write().await.insert(sid, sender);
    }

    pub async fn unregister(&self, sid: &str) {
        self.subscriptions.write().await.remove(sid);
    }

    pub async fn is_registered(&self, sid: &str) -> bool {
        self.subscriptions.read().await.contains_key(sid)
    }

    /// Forward a notification. Returns `false` when the sid is unknown, in
    /// which case the server answers 412 so a well-behaved publisher drops
    /// the stale subscription.
    pub async fn route(&self, notification: EventNotification) -> bool {
        let subscriptions = self.subscriptions.read().await;
        match subscriptions.get(&notification.sid) {
            Some(sender) => {
                debug!(sid = %notification.sid, seq = notification.seq, "event routed");
                // a dropped receiver is equivalent to an unregistered sid
                sender.send(notification).is_ok()
            }
            None => false,
        }
    }
}
