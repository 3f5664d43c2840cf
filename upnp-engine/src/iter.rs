//! Blocking iterator for consuming control point events.

use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use crate::event::ControlPointEvent;

/// Blocking iterator over control point events.
///
/// Blocks on `next()` until an event is available. Use `try_recv()` for
/// non-blocking access or `recv_timeout()` to bound the wait. Clones share
/// the underlying channel: each event is delivered to exactly one consumer.
pub struct EventIterator {
    rx: Arc<Mutex<mpsc::Receiver<ControlPointEvent>>>,
}

impl EventIterator {
    pub(crate) fn new(rx: Arc<Mutex<mpsc::Receiver<ControlPointEvent>>>) -> Self {
        Self { rx }
    }

    /// Block until an event is available.
    ///
    /// Returns `None` once the engine is gone and the channel drained.
    pub fn recv(&self) -> Option<ControlPointEvent> {
        self.rx.lock().ok()?.recv().ok()
    }

    /// Receive without blocking.
    pub fn try_recv(&self) -> Option<ControlPointEvent> {
        self.rx.lock().ok()?.try_recv().ok()
    }

    /// Block until an event is available or the timeout expires.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ControlPointEvent> {
        self.rx.lock().ok()?.recv_timeout(timeout).ok()
    }

    /// Non-blocking iterator over currently queued events.
    pub fn try_iter(&self) -> TryIter<'_> {
        TryIter { inner: self }
    }

    /// Iterator that waits up to `timeout` per event.
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIter<'_> {
        TimeoutIter {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for EventIterator {
    type Item = ControlPointEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

impl Clone for EventIterator {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

/// Non-blocking iterator over currently queued events.
pub struct TryIter<'a> {
    inner: &'a EventIterator,
}

impl<'a> Iterator for TryIter<'a> {
    type Item = ControlPointEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Iterator bounding each wait with a timeout.
pub struct TimeoutIter<'a> {
    inner: &'a EventIterator,
    timeout: Duration,
}

impl<'a> Iterator for TimeoutIter<'a> {
    type Item = ControlPointEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
