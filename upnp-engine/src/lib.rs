//! UPnP control-point engine.
//!
//! Discovers UPnP devices and services on the local network via SSDP, keeps
//! a live registry of them, and delivers service eventing (GENA) to
//! subscribers. This is the client side of UPnP only; the crate never acts
//! as a device.
//!
//! # Architecture
//!
//! A [`ControlPoint`] owns four cooperating pieces:
//!
//! - two transport threads (multicast NOTIFY listener, periodic M-SEARCH
//!   bursts) feeding a bounded advertisement queue;
//! - a worker thread with its own tokio runtime running the callback
//!   server, description fetches, registry sweeps, and renewals;
//! - the [`DeviceRegistry`] state machine, which makes a device visible only
//!   after its description document has been fetched and parsed;
//! - a [`SubscriptionManager`](upnp_eventing::SubscriptionManager) enforcing
//!   renewal deadlines and per-subscription event ordering.
//!
//! Everything the caller sees arrives through the [`ControlPointEvent`]
//! feed or via snapshot accessors; no live references to internal state are
//! ever handed out.
//!
//! # Quick Start
//!
//! ```no_run
//! use upnp_engine::{ControlPoint, ControlPointEvent, EngineConfig};
//!
//! let engine = ControlPoint::new(EngineConfig::default()).unwrap();
//! engine.start().unwrap();
//!
//! for event in engine.events() {
//!     if let ControlPointEvent::ServiceAdded(service) = event {
//!         println!("service up: {}", service.service_id);
//!     }
//! }
//! ```

mod config;
mod engine;
mod error;
mod event;
mod iter;
mod registry;
mod transport;
mod worker;

pub use config::EngineConfig;
pub use engine::{ControlPoint, SubscriptionHandle};
pub use error::{EngineError, Result};
pub use event::ControlPointEvent;
pub use iter::EventIterator;
pub use registry::{DeviceRegistry, RegistryAction};

pub use upnp_discovery::{Advertisement, AdvertisementKind, Device, Service};
pub use upnp_eventing::{EventPayload, ServiceEvent, StateVariable, Subscription};
