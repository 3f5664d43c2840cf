//! Event routing for HTTP callback notifications.
//!
//! The [`EventRouter`] keeps the set of subscription IDs that are allowed to
//! deliver events and forwards matching notifications to a channel. Events
//! for unknown subscription IDs are discarded at the door, before any
//! parsing happens.

use std::collections::HashSet;
use std::sync::RwLock;

use tokio::sync::mpsc;

/// An unparsed GENA event notification received via HTTP callback.
///
/// Carries only what the wire provided: the subscription ID, the event
/// sequence number, and the raw XML body. Parsing and sequence gating are
/// the subscription manager's job.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    /// The subscription ID from the SID header
    pub sid: String,
    /// The event sequence number from the SEQ header, if it parsed
    pub seq: Option<u32>,
    /// The raw XML property-set body
    pub body: String,
}

/// Routes events from HTTP callbacks to a channel.
///
/// The registered-SID set uses a std `RwLock` rather than an async one so a
/// synchronous caller (the engine facade) can register and unregister
/// without entering the runtime. Unregistration must take effect
/// immediately, even with notifications in flight.
pub struct EventRouter {
    /// Subscription IDs currently allowed to deliver
    subscriptions: RwLock<HashSet<String>>,
    /// Channel notifications are forwarded on
    event_sender: mpsc::UnboundedSender<NotificationPayload>,
}

impl EventRouter {
    /// Create a router forwarding to `event_sender`.
    pub fn new(event_sender: mpsc::UnboundedSender<NotificationPayload>) -> Self {
        Self {
            subscriptions: RwLock::new(HashSet::new()),
            event_sender,
        }
    }

    /// Allow a subscription ID to deliver events.
    pub fn register(&self, sid: &str) {
        if let Ok(mut subs) = self.subscriptions.write() {
            subs.insert(sid.to_string());
        }
    }

    /// Stop delivery for a subscription ID.
    ///
    /// Takes effect immediately: any notification routed after this call
    /// returns is discarded, including ones already accepted by the HTTP
    /// layer but not yet matched.
    pub fn unregister(&self, sid: &str) {
        if let Ok(mut subs) = self.subscriptions.write() {
            subs.remove(sid);
        }
    }

    /// Whether a subscription ID is currently registered.
    pub fn is_registered(&self, sid: &str) -> bool {
        self.subscriptions
            .read()
            .map(|subs| subs.contains(sid))
            .unwrap_or(false)
    }

    /// Route a notification if its subscription ID is registered.
    ///
    /// Returns `true` when the payload was forwarded, `false` when the SID
    /// was unknown and the notification dropped.
    pub fn route(&self, payload: NotificationPayload) -> bool {
        if !self.is_registered(&payload.sid) {
            tracing::debug!(sid = %payload.sid, "discarding event for unknown subscription");
            return false;
        }
        // Receiver dropped means the engine is shutting down; nothing to do.
        let _ = self.event_sender.send(payload);
        true
    }
}
