//! UPnP discovery library
//!
//! This crate provides the discovery half of a UPnP control point: SSDP
//! searching and listening, and resolution of advertised locations into
//! device/service models via their XML description documents.
//!
//! # Quick Start
//!
//! ```no_run
//! use upnp_discovery::discover;
//!
//! // One-shot sweep for root devices on the local network
//! let devices = discover(&["upnp:rootdevice"]);
//! for device in devices {
//!     println!("Found {} at {}", device.friendly_name, device.location);
//! }
//! ```
//!
//! For a continuously maintained registry with add/remove events and
//! service eventing, use the `upnp-cp-engine` crate, which drives the
//! primitives exposed here from background workers.

mod description;
mod error;
mod fetcher;
mod listener;
mod queue;
mod ssdp;

pub mod device;

pub use device::{Device, Service};
pub use error::{DiscoveryError, FetchError, Result};
pub use fetcher::{DescriptionFetcher, FetchOutcome};
pub use listener::NotifyListener;
pub use queue::AdvertisementQueue;
pub use ssdp::{
    parse_datagram, Advertisement, AdvertisementKind, SearchResponses, SsdpSocket,
    DEFAULT_MAX_AGE, SSDP_MULTICAST_ADDR, SSDP_PORT,
};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Discover devices for the given search targets with a 3-second timeout.
///
/// This is a convenience one-shot sweep: it sends one M-SEARCH per target,
/// resolves every distinct location that responds, and returns the resolved
/// devices deduplicated by UDN. Unreachable or malformed descriptions are
/// skipped.
pub fn discover(search_targets: &[&str]) -> Vec<Arc<Device>> {
    discover_with_timeout(search_targets, Duration::from_secs(3))
}

/// Discover devices for the given search targets with a custom timeout.
///
/// The timeout bounds both the SSDP response window per target and each
/// description fetch.
pub fn discover_with_timeout(search_targets: &[&str], timeout: Duration) -> Vec<Arc<Device>> {
    let Ok(socket) = SsdpSocket::new(timeout) else {
        return Vec::new();
    };
    let Ok(fetcher) = DescriptionFetcher::new(timeout) else {
        return Vec::new();
    };

    let mut seen_locations = HashSet::new();
    let mut seen_udns = HashSet::new();
    let mut devices = Vec::new();

    for target in search_targets {
        if let Err(e) = socket.search(target, 2) {
            tracing::warn!(%target, "M-SEARCH failed: {e}");
            continue;
        }
        for ad in socket.responses() {
            let Some(location) = ad.location else { continue };
            if !seen_locations.insert(location.clone()) {
                continue;
            }
            match fetcher.fetch(&location) {
                Ok(device) => {
                    if seen_udns.insert(device.udn.clone()) {
                        devices.push(device);
                    }
                }
                Err(e) => {
                    tracing::debug!(%location, "skipping device: {e}");
                }
            }
        }
    }

    devices
}
