//! Subscription state and lifecycle bookkeeping.

use std::time::{Duration, SystemTime};

use upnp_discovery::Service;

/// Fraction of the granted timeout after which a renewal is due.
const RENEWAL_FRACTION: f64 = 0.8;

/// A live GENA subscription.
///
/// Owned by the [`SubscriptionManager`](crate::SubscriptionManager); callers
/// receive clones as snapshots. The renewal deadline sits at 80% of the
/// granted timeout so a renewal has the remaining 20% to complete before the
/// service expires the subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Subscription ID assigned by the remote service
    pub sid: String,
    /// The service this subscription targets
    pub service: Service,
    /// Timeout the service granted, in seconds
    pub granted_secs: u64,
    /// When the subscription expires unless renewed
    pub expires_at: SystemTime,
    /// When a renewal becomes due
    pub renews_at: SystemTime,
    /// Sequence number of the last delivered event
    pub last_seq: Option<u32>,
}

impl Subscription {
    /// Create a subscription granted `granted_secs` starting at `now`.
    pub fn new(sid: String, service: Service, granted_secs: u64, now: SystemTime) -> Self {
        let (expires_at, renews_at) = deadlines(now, granted_secs);
        Self {
            sid,
            service,
            granted_secs,
            expires_at,
            renews_at,
            last_seq: None,
        }
    }

    /// Reset the deadlines after a successful renewal.
    pub fn refresh(&mut self, granted_secs: u64, now: SystemTime) {
        self.granted_secs = granted_secs;
        let (expires_at, renews_at) = deadlines(now, granted_secs);
        self.expires_at = expires_at;
        self.renews_at = renews_at;
    }

    /// Whether a renewal is due at `now`.
    pub fn needs_renewal_at(&self, now: SystemTime) -> bool {
        now >= self.renews_at
    }

    /// Whether the subscription has expired at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }

    /// Gate an incoming event sequence number.
    ///
    /// The first event is always accepted; afterwards only strictly greater
    /// numbers pass. Duplicates and out-of-order numbers are rejected and
    /// must not be delivered.
    pub fn accept_seq(&mut self, seq: u32) -> bool {
        match self.last_seq {
            Some(last) if seq <= last => false,
            _ => {
                self.last_seq = Some(seq);
                true
            }
        }
    }
}

fn deadlines(now: SystemTime, granted_secs: u64) -> (SystemTime, SystemTime) {
    let expires_at = now + Duration::from_secs(granted_secs);
    let renew_after = Duration::from_secs_f64(granted_secs as f64 * RENEWAL_FRACTION);
    (expires_at, now + renew_after)
}
