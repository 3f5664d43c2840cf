//! Subscription lifecycle management.
//!
//! The manager owns every live subscription, keyed by SID. It is internally
//! synchronized with a std `RwLock` so the engine's synchronous facade and
//! its background worker can share it directly; no network call ever happens
//! under the lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

use upnp_discovery::Service;

use crate::error::{Result, SubscriptionError};
use crate::event::{EventPayload, ServiceEvent};
use crate::gena::GenaClient;
use crate::parser::parse_property_set;
use crate::subscription::Subscription;

/// Manages GENA subscriptions for the engine.
pub struct SubscriptionManager {
    /// GENA wire client
    gena: GenaClient,
    /// Callback URL handed to services on SUBSCRIBE
    callback_url: String,
    /// Requested subscription timeout in seconds
    timeout_secs: u64,
    /// Live subscriptions by SID
    subscriptions: RwLock<HashMap<String, Subscription>>,
    /// Events delivered to callers
    delivered: AtomicU64,
    /// NOTIFY bodies dropped as unparsable
    malformed_events: AtomicU64,
    /// Events dropped by the sequence gate
    dropped_sequence: AtomicU64,
}

impl SubscriptionManager {
    /// Create a manager that subscribes with the given callback URL and
    /// requested timeout.
    pub fn new(callback_url: String, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            gena: GenaClient::new()?,
            callback_url,
            timeout_secs,
            subscriptions: RwLock::new(HashMap::new()),
            delivered: AtomicU64::new(0),
            malformed_events: AtomicU64::new(0),
            dropped_sequence: AtomicU64::new(0),
        })
    }

    /// Subscribe to a service's eventing.
    ///
    /// Sends SUBSCRIBE to the service's event URL and stores the granted
    /// subscription. Returns a snapshot of the new subscription; the caller
    /// must register its SID with the callback router to start delivery.
    pub fn subscribe(&self, service: &Service) -> Result<Subscription> {
        let response =
            self.gena
                .subscribe(&service.event_sub_url, &self.callback_url, self.timeout_secs)?;

        let subscription = Subscription::new(
            response.sid.clone(),
            service.clone(),
            response.timeout_secs,
            SystemTime::now(),
        );

        tracing::info!(
            sid = %subscription.sid,
            service = %service.service_id,
            granted = response.timeout_secs,
            "subscription established"
        );

        let mut subs = self
            .subscriptions
            .write()
            .map_err(|_| SubscriptionError::LockPoisoned)?;
        subs.insert(response.sid, subscription.clone());

        Ok(subscription)
    }

    /// Remove a subscription and send UNSUBSCRIBE best-effort.
    ///
    /// Local state goes first so no further events for the SID are
    /// deliverable even if the UNSUBSCRIBE request fails; a failure is
    /// logged, never retried. Returns whether the SID was known.
    pub fn unsubscribe(&self, sid: &str) -> bool {
        let removed = self
            .subscriptions
            .write()
            .ok()
            .and_then(|mut subs| subs.remove(sid));

        let Some(subscription) = removed else {
            return false;
        };

        if let Err(e) = self
            .gena
            .unsubscribe(&subscription.service.event_sub_url, sid)
        {
            tracing::warn!(%sid, "UNSUBSCRIBE failed (ignored): {e}");
        } else {
            tracing::debug!(%sid, "unsubscribed");
        }
        true
    }

    /// Renew every subscription whose renewal deadline has passed.
    ///
    /// A failed renewal (the service answering 412/404, any other error, or
    /// a timeout) demotes the subscription: it is removed and returned so
    /// the caller can surface `SubscriptionLost` and stop routing its SID.
    /// No further renewal is attempted for a lost subscription.
    pub fn check_renewals(&self) -> Vec<Subscription> {
        let now = SystemTime::now();
        let due: Vec<(String, String, u64)> = match self.subscriptions.read() {
            Ok(subs) => subs
                .values()
                .filter(|s| s.needs_renewal_at(now))
                .map(|s| {
                    (
                        s.sid.clone(),
                        s.service.event_sub_url.clone(),
                        s.granted_secs,
                    )
                })
                .collect(),
            Err(_) => return Vec::new(),
        };

        let mut lost = Vec::new();
        for (sid, event_url, granted) in due {
            match self.gena.renew(&event_url, &sid, granted) {
                Ok(new_granted) => {
                    if let Ok(mut subs) = self.subscriptions.write() {
                        if let Some(sub) = subs.get_mut(&sid) {
                            sub.refresh(new_granted, SystemTime::now());
                            tracing::debug!(%sid, granted = new_granted, "subscription renewed");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(%sid, "renewal failed, dropping subscription: {e}");
                    if let Ok(mut subs) = self.subscriptions.write() {
                        if let Some(sub) = subs.remove(&sid) {
                            lost.push(sub);
                        }
                    }
                }
            }
        }
        lost
    }

    /// Handle an incoming NOTIFY.
    ///
    /// Unknown SIDs are discarded. Bodies that fail to parse are counted as
    /// malformed and dropped. The sequence gate then drops duplicates and
    /// out-of-order numbers; a missing SEQ header counts as malformed,
    /// since ordering is meaningless without one. Surviving events are returned
    /// for delivery in arrival order.
    pub fn handle_notify(&self, sid: &str, seq: Option<u32>, body: &str) -> Option<ServiceEvent> {
        let service = {
            let subs = self.subscriptions.read().ok()?;
            let sub = subs.get(sid)?;
            sub.service.clone()
        };

        let Some(seq) = seq else {
            tracing::debug!(%sid, "dropping event without SEQ header");
            self.malformed_events.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        let variables = match parse_property_set(body) {
            Ok(vars) => vars,
            Err(e) => {
                tracing::debug!(%sid, seq, "dropping malformed event: {e}");
                self.malformed_events.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        {
            let mut subs = self.subscriptions.write().ok()?;
            let sub = subs.get_mut(sid)?;
            if !sub.accept_seq(seq) {
                tracing::debug!(
                    %sid,
                    seq,
                    last = ?sub.last_seq,
                    "dropping out-of-order event"
                );
                self.dropped_sequence.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        Some(ServiceEvent {
            sid: sid.to_string(),
            seq,
            payload: EventPayload::for_service_type(&service.service_type, variables),
            service,
        })
    }

    /// Snapshot of all live subscriptions.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .map(|subs| subs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Look up a subscription snapshot by SID.
    pub fn find(&self, sid: &str) -> Option<Subscription> {
        self.subscriptions.read().ok()?.get(sid).cloned()
    }

    /// Diagnostics counters.
    pub fn stats(&self) -> EventingStats {
        EventingStats {
            active_subscriptions: self
                .subscriptions
                .read()
                .map(|s| s.len())
                .unwrap_or(0),
            delivered: self.delivered.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
            dropped_sequence: self.dropped_sequence.load(Ordering::Relaxed),
        }
    }

    /// Unsubscribe everything, best-effort. Called on engine shutdown.
    pub fn shutdown(&self) {
        let drained: Vec<Subscription> = match self.subscriptions.write() {
            Ok(mut subs) => subs.drain().map(|(_, s)| s).collect(),
            Err(_) => return,
        };

        for subscription in drained {
            if let Err(e) = self
                .gena
                .unsubscribe(&subscription.service.event_sub_url, &subscription.sid)
            {
                tracing::debug!(sid = %subscription.sid, "shutdown UNSUBSCRIBE failed: {e}");
            }
        }
    }
}

/// Diagnostics snapshot of the eventing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventingStats {
    pub active_subscriptions: usize,
    pub delivered: u64,
    pub malformed_events: u64,
    pub dropped_sequence: u64,
}

impl std::fmt::Display for EventingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Eventing stats:")?;
        writeln!(f, "  Active subscriptions: {}", self.active_subscriptions)?;
        writeln!(f, "  Events delivered: {}", self.delivered)?;
        writeln!(f, "  Malformed events dropped: {}", self.malformed_events)?;
        write!(f, "  Out-of-order events dropped: {}", self.dropped_sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StateVariable;

    fn service(event_url: &str) -> Service {
        Service {
            service_type: "urn:schemas-upnp-org:service:AVTransport:1".to_string(),
            service_id: "urn:upnp-org:serviceId:AVTransport".to_string(),
            control_url: "http://10.0.0.5/av/control".to_string(),
            event_sub_url: event_url.to_string(),
            scpd_url: "http://10.0.0.5/av/scpd.xml".to_string(),
            device_udn: "uuid:device-1".to_string(),
        }
    }

    fn manager_with_sub(sid: &str) -> SubscriptionManager {
        let manager =
            SubscriptionManager::new("http://10.0.0.2:3400".to_string(), 1800).unwrap();
        // 127.0.0.1:1 refuses connections immediately, so the best-effort
        // UNSUBSCRIBE in these tests fails fast instead of timing out.
        let sub = Subscription::new(
            sid.to_string(),
            service("http://127.0.0.1:1/av/event"),
            1800,
            SystemTime::now(),
        );
        manager
            .subscriptions
            .write()
            .unwrap()
            .insert(sid.to_string(), sub);
        manager
    }

    const BODY: &str = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property><LastChange>&lt;Event&gt;&lt;InstanceID val="0"&gt;&lt;TransportState val="PLAYING"/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></e:property>
</e:propertyset>"#;

    #[test]
    fn test_notify_for_unknown_sid_is_discarded() {
        let manager = manager_with_sub("uuid:known");
        assert!(manager.handle_notify("uuid:unknown", Some(0), BODY).is_none());
        assert_eq!(manager.stats().delivered, 0);
    }

    #[test]
    fn test_notify_delivers_parsed_event() {
        let manager = manager_with_sub("uuid:sub-1");
        let event = manager.handle_notify("uuid:sub-1", Some(0), BODY).unwrap();

        assert_eq!(event.sid, "uuid:sub-1");
        assert_eq!(event.seq, 0);
        match &event.payload {
            EventPayload::AvTransport(vars) => {
                assert_eq!(vars, &vec![StateVariable::new("TransportState", "PLAYING")]);
            }
            other => panic!("expected AvTransport payload, got {other:?}"),
        }
        assert_eq!(manager.stats().delivered, 1);
    }

    #[test]
    fn test_sequence_gate_drops_duplicates_and_regressions() {
        let manager = manager_with_sub("uuid:sub-1");

        assert!(manager.handle_notify("uuid:sub-1", Some(0), BODY).is_some());
        assert!(manager.handle_notify("uuid:sub-1", Some(1), BODY).is_some());
        assert!(manager.handle_notify("uuid:sub-1", Some(1), BODY).is_none());
        assert!(manager.handle_notify("uuid:sub-1", Some(0), BODY).is_none());
        assert!(manager.handle_notify("uuid:sub-1", Some(5), BODY).is_some());

        let stats = manager.stats();
        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.dropped_sequence, 2);
    }

    #[test]
    fn test_missing_seq_counts_as_malformed() {
        let manager = manager_with_sub("uuid:sub-1");
        assert!(manager.handle_notify("uuid:sub-1", None, BODY).is_none());
        assert_eq!(manager.stats().malformed_events, 1);
    }

    #[test]
    fn test_malformed_body_is_counted_and_does_not_consume_seq() {
        let manager = manager_with_sub("uuid:sub-1");

        assert!(manager
            .handle_notify("uuid:sub-1", Some(0), "not xml at all")
            .is_none());
        assert_eq!(manager.stats().malformed_events, 1);

        // The failed event must not have burned sequence number 0.
        assert!(manager.handle_notify("uuid:sub-1", Some(0), BODY).is_some());
    }

    #[test]
    fn test_unsubscribe_removes_state_immediately() {
        let manager = manager_with_sub("uuid:sub-1");

        // The UNSUBSCRIBE request itself will fail (no server at the URL);
        // local removal must happen regardless.
        assert!(manager.unsubscribe("uuid:sub-1"));
        assert!(manager.find("uuid:sub-1").is_none());
        assert!(manager.handle_notify("uuid:sub-1", Some(0), BODY).is_none());

        // Unknown SIDs report false.
        assert!(!manager.unsubscribe("uuid:sub-1"));
    }

    #[test]
    fn test_stats_display() {
        let manager = manager_with_sub("uuid:sub-1");
        let rendered = manager.stats().to_string();
        assert!(rendered.contains("Active subscriptions: 1"));
        assert!(rendered.contains("Events delivered: 0"));
    }
}
