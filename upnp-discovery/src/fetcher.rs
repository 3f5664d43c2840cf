//! Description fetching with per-location coalescing.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::description::parse_description;
use crate::device::Device;
use crate::error::{DiscoveryError, FetchError, Result};

/// Outcome of a description fetch, shared by every coalesced caller.
pub type FetchOutcome = std::result::Result<Arc<Device>, FetchError>;

/// One in-flight fetch that waiters block on.
struct FetchSlot {
    outcome: Mutex<Option<FetchOutcome>>,
    ready: Condvar,
}

/// Fetches and parses device descriptions over HTTP.
///
/// Fetches are deduplicated per location URL while in flight: the first
/// caller for a location issues the HTTP GET, concurrent callers for the
/// same location wait on its slot and receive the same outcome. At most one
/// request is ever outstanding per location.
pub struct DescriptionFetcher {
    http: reqwest::blocking::Client,
    in_flight: Mutex<HashMap<String, Arc<FetchSlot>>>,
}

impl DescriptionFetcher {
    /// Create a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch and parse the description document at `location`.
    ///
    /// Concurrent calls for the same location share a single HTTP GET; every
    /// caller receives a clone of the one outcome.
    pub fn fetch(&self, location: &str) -> FetchOutcome {
        let (slot, leader) = {
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|_| FetchError::Unreachable("fetcher lock poisoned".to_string()))?;
            match in_flight.get(location) {
                Some(slot) => (Arc::clone(slot), false),
                None => {
                    let slot = Arc::new(FetchSlot {
                        outcome: Mutex::new(None),
                        ready: Condvar::new(),
                    });
                    in_flight.insert(location.to_string(), Arc::clone(&slot));
                    (slot, true)
                }
            }
        };

        if leader {
            let outcome = self.fetch_inner(location);

            if let Ok(mut done) = slot.outcome.lock() {
                *done = Some(outcome.clone());
            }
            slot.ready.notify_all();

            if let Ok(mut in_flight) = self.in_flight.lock() {
                in_flight.remove(location);
            }

            outcome
        } else {
            tracing::debug!(%location, "coalescing with in-flight description fetch");
            let mut done = slot
                .outcome
                .lock()
                .map_err(|_| FetchError::Unreachable("fetch slot lock poisoned".to_string()))?;
            while done.is_none() {
                done = slot
                    .ready
                    .wait(done)
                    .map_err(|_| FetchError::Unreachable("fetch slot lock poisoned".to_string()))?;
            }
            done.clone().unwrap_or_else(|| {
                Err(FetchError::Unreachable("fetch slot emptied unexpectedly".to_string()))
            })
        }
    }

    fn fetch_inner(&self, location: &str) -> FetchOutcome {
        let response = self
            .http
            .get(location)
            .send()
            .map_err(|e| FetchError::Unreachable(format!("GET {location} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Unreachable(format!(
                "GET {location} returned HTTP {status}"
            )));
        }

        let xml = response
            .text()
            .map_err(|e| FetchError::Unreachable(format!("failed to read body: {e}")))?;

        let device = parse_description(&xml)?.into_device(location)?;
        tracing::debug!(udn = %device.udn, %location, "resolved device description");
        Ok(Arc::new(device))
    }
}
