//! Device/service registry.
//!
//! Tracks every advertised USN through its lifecycle and owns the resolved
//! device models. The registry is a pure state machine: it performs no
//! network I/O and is driven with explicit timestamps, which is what makes
//! the lifecycle testable. The worker feeds it advertisements and fetch
//! outcomes and carries out the fetch requests it returns.
//!
//! Lifecycle per USN:
//!
//! ```text
//! (unknown) --alive/response--> Resolving --fetch ok--> Active
//!      Resolving --fetch err/expiry--> (gone, never observed)
//!      Active --byebye/expiry--> (gone, Removed events)
//! ```
//!
//! Devices are deduplicated by UDN: several USNs (root device, embedded
//! devices, each service) typically reference one description location, and
//! the device stays visible until the last of them goes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use upnp_discovery::{Advertisement, Device, Service};

use crate::event::ControlPointEvent;

/// What the worker must do after feeding the registry an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAction {
    /// Nothing; the advertisement was absorbed.
    None,
    /// Fetch the description document at this location.
    Fetch(String),
}

#[derive(Debug, Clone, PartialEq)]
enum AdvertState {
    /// Description fetch pending; not yet observable by callers.
    Resolving,
    /// Resolved against a device; visible to callers.
    Active { udn: String },
}

#[derive(Debug)]
struct AdvertEntry {
    state: AdvertState,
    location: String,
    max_age: u64,
    expires_at: SystemTime,
}

/// Registry of advertised USNs and the devices they resolved to.
#[derive(Default)]
pub struct DeviceRegistry {
    /// Every live USN and its lifecycle state
    adverts: HashMap<String, AdvertEntry>,
    /// Resolved devices by UDN
    devices: HashMap<String, Arc<Device>>,
    /// Which USNs keep each device alive
    usns_by_udn: HashMap<String, HashSet<String>>,
    /// USNs waiting on each in-flight location fetch
    resolving_locations: HashMap<String, HashSet<String>>,
    /// Location-to-UDN index for attaching new USNs without refetching
    location_udn: HashMap<String, String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one advertisement into the state machine.
    ///
    /// Returns the follow-up action and any events to emit. Re-advertisement
    /// of a known USN refreshes its expiry without an event; the racing-
    /// advertisement tie-break keeps the larger max-age.
    pub fn on_advertisement(
        &mut self,
        ad: &Advertisement,
        now: SystemTime,
    ) -> (RegistryAction, Vec<ControlPointEvent>) {
        if !ad.is_alive() {
            return (RegistryAction::None, self.remove_usn(&ad.usn));
        }

        let Some(location) = ad.location.as_deref() else {
            return (RegistryAction::None, Vec::new());
        };

        if let Some(entry) = self.adverts.get_mut(&ad.usn) {
            // Later advertisement wins only with a newer max-age; otherwise
            // the existing record's expiry is simply extended.
            if ad.max_age > entry.max_age {
                entry.max_age = ad.max_age;
            }
            entry.expires_at = now + Duration::from_secs(entry.max_age);
            return (RegistryAction::None, Vec::new());
        }

        let entry = AdvertEntry {
            state: AdvertState::Resolving,
            location: location.to_string(),
            max_age: ad.max_age,
            expires_at: now + Duration::from_secs(ad.max_age),
        };

        if let Some(udn) = self.location_udn.get(location).cloned() {
            // The device behind this location is already resolved; the new
            // USN attaches silently.
            self.adverts.insert(
                ad.usn.clone(),
                AdvertEntry {
                    state: AdvertState::Active { udn: udn.clone() },
                    ..entry
                },
            );
            self.usns_by_udn
                .entry(udn)
                .or_default()
                .insert(ad.usn.clone());
            return (RegistryAction::None, Vec::new());
        }

        if let Some(waiters) = self.resolving_locations.get_mut(location) {
            // A fetch for this location is already in flight; wait on it.
            waiters.insert(ad.usn.clone());
            self.adverts.insert(ad.usn.clone(), entry);
            return (RegistryAction::None, Vec::new());
        }

        self.adverts.insert(ad.usn.clone(), entry);
        self.resolving_locations
            .insert(location.to_string(), HashSet::from([ad.usn.clone()]));
        (RegistryAction::Fetch(location.to_string()), Vec::new())
    }

    /// Record a successful description fetch.
    ///
    /// Every USN still waiting on the location becomes Active. The device
    /// becomes visible (`DeviceAdded` then `ServiceAdded` per declared
    /// service) only if its UDN is new; additional USNs for a known device
    /// attach without events. A fetch whose waiters all expired in flight is
    /// discarded.
    pub fn on_fetch_success(
        &mut self,
        location: &str,
        device: Arc<Device>,
        _now: SystemTime,
    ) -> Vec<ControlPointEvent> {
        let Some(waiters) = self.resolving_locations.remove(location) else {
            // Stale result: everything that wanted it is gone, or the
            // registry was cleared while the fetch ran.
            return Vec::new();
        };

        let live: Vec<String> = waiters
            .into_iter()
            .filter(|usn| {
                self.adverts
                    .get(usn)
                    .map(|e| e.state == AdvertState::Resolving)
                    .unwrap_or(false)
            })
            .collect();
        if live.is_empty() {
            return Vec::new();
        }

        let udn = device.udn.clone();
        let mut events = Vec::new();

        if !self.devices.contains_key(&udn) {
            self.devices.insert(udn.clone(), Arc::clone(&device));
            events.push(ControlPointEvent::DeviceAdded(Arc::clone(&device)));
            for service in device.all_services() {
                events.push(ControlPointEvent::ServiceAdded(service.clone()));
            }
        }
        self.location_udn.insert(location.to_string(), udn.clone());

        let attached = self.usns_by_udn.entry(udn.clone()).or_default();
        for usn in live {
            if let Some(entry) = self.adverts.get_mut(&usn) {
                entry.state = AdvertState::Active { udn: udn.clone() };
                attached.insert(usn);
            }
        }

        events
    }

    /// Record a failed description fetch.
    ///
    /// The waiting USNs are dropped without events; they were never
    /// observable. Their devices will be retried on the next advertisement.
    pub fn on_fetch_failure(&mut self, location: &str) {
        if let Some(waiters) = self.resolving_locations.remove(location) {
            for usn in waiters {
                self.adverts.remove(&usn);
            }
        }
    }

    /// Expire every USN whose advertisement lifetime has passed.
    pub fn sweep(&mut self, now: SystemTime) -> Vec<ControlPointEvent> {
        let expired: Vec<String> = self
            .adverts
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(usn, _)| usn.clone())
            .collect();

        let mut events = Vec::new();
        for usn in expired {
            tracing::debug!(%usn, "advertisement expired");
            events.extend(self.remove_usn(&usn));
        }
        events
    }

    /// Remove a USN; when it was the last reference to a device, the device
    /// and its services are removed with events (services first).
    fn remove_usn(&mut self, usn: &str) -> Vec<ControlPointEvent> {
        let Some(entry) = self.adverts.remove(usn) else {
            return Vec::new();
        };

        match entry.state {
            AdvertState::Resolving => {
                if let Some(waiters) = self.resolving_locations.get_mut(&entry.location) {
                    waiters.remove(usn);
                    if waiters.is_empty() {
                        self.resolving_locations.remove(&entry.location);
                    }
                }
                Vec::new()
            }
            AdvertState::Active { udn } => {
                let last = self
                    .usns_by_udn
                    .get_mut(&udn)
                    .map(|set| {
                        set.remove(usn);
                        set.is_empty()
                    })
                    .unwrap_or(false);
                if !last {
                    return Vec::new();
                }

                self.usns_by_udn.remove(&udn);
                self.location_udn.retain(|_, v| v != &udn);
                let Some(device) = self.devices.remove(&udn) else {
                    return Vec::new();
                };

                let mut events = Vec::new();
                for service in device.all_services() {
                    events.push(ControlPointEvent::ServiceRemoved(service.clone()));
                }
                events.push(ControlPointEvent::DeviceRemoved(device));
                events
            }
        }
    }

    /// Snapshot of every visible device.
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices.values().cloned().collect()
    }

    /// Snapshot of every visible service, embedded devices included.
    pub fn services(&self) -> Vec<Service> {
        self.devices
            .values()
            .flat_map(|d| d.all_services().into_iter().cloned())
            .collect()
    }

    /// Look up a visible device by UDN (root devices only).
    pub fn device(&self, udn: &str) -> Option<Arc<Device>> {
        self.devices.get(udn).cloned()
    }

    /// Find a service by owning-device UDN and service ID, searching
    /// embedded devices too.
    pub fn find_service(&self, udn: &str, service_id: &str) -> Option<Service> {
        self.devices.values().find_map(|device| {
            device
                .all_services()
                .into_iter()
                .find(|s| s.device_udn == udn && s.service_id == service_id)
                .cloned()
        })
    }

    /// Number of visible devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether no devices are visible.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Drop all state. Used when discovery restarts.
    pub fn clear(&mut self) {
        self.adverts.clear();
        self.devices.clear();
        self.usns_by_udn.clear();
        self.resolving_locations.clear();
        self.location_udn.clear();
    }
}
