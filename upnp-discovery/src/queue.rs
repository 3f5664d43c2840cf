//! Bounded handoff queue between the SSDP transport and the engine worker.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::ssdp::Advertisement;

/// Bounded advertisement buffer with drop-oldest overflow.
///
/// The transport threads push into this queue and never block on downstream
/// processing. When the queue is full the oldest pending advertisement is
/// discarded with a warning: a re-advertising device will announce itself
/// again, so liveness wins over completeness.
pub struct AdvertisementQueue {
    inner: Mutex<VecDeque<Advertisement>>,
    capacity: usize,
}

impl AdvertisementQueue {
    /// Create a queue holding at most `capacity` pending advertisements.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Push an advertisement, evicting the oldest entry if full.
    pub fn push(&self, ad: Advertisement) {
        let Ok(mut queue) = self.inner.lock() else {
            return;
        };
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                tracing::warn!(
                    usn = %dropped.usn,
                    "advertisement queue full, dropping oldest entry"
                );
            }
        }
        queue.push_back(ad);
    }

    /// Drain all pending advertisements in arrival order.
    pub fn drain(&self) -> Vec<Advertisement> {
        match self.inner.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of pending advertisements.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or(0)
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssdp::AdvertisementKind;

    fn ad(usn: &str) -> Advertisement {
        Advertisement {
            usn: usn.to_string(),
            notification_type: "upnp:rootdevice".to_string(),
            location: Some(format!("http://10.0.0.1/{usn}.xml")),
            max_age: 1800,
            kind: AdvertisementKind::Alive,
        }
    }

    #[test]
    fn test_push_and_drain_preserves_order() {
        let queue = AdvertisementQueue::new(8);
        queue.push(ad("uuid:a"));
        queue.push(ad("uuid:b"));
        queue.push(ad("uuid:c"));

        let drained = queue.drain();
        let usns: Vec<_> = drained.iter().map(|a| a.usn.as_str()).collect();
        assert_eq!(usns, vec!["uuid:a", "uuid:b", "uuid:c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = AdvertisementQueue::new(2);
        queue.push(ad("uuid:a"));
        queue.push(ad("uuid:b"));
        queue.push(ad("uuid:c"));

        assert_eq!(queue.len(), 2);
        let drained = queue.drain();
        let usns: Vec<_> = drained.iter().map(|a| a.usn.as_str()).collect();
        assert_eq!(usns, vec!["uuid:b", "uuid:c"]);
    }

    #[test]
    fn test_drain_empty() {
        let queue = AdvertisementQueue::new(4);
        assert!(queue.drain().is_empty());
    }
}
