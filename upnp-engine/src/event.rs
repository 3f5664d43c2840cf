//! The caller-facing event feed.

use std::sync::Arc;

use upnp_discovery::{Device, Service};
use upnp_eventing::ServiceEvent;

/// Events emitted by the control point.
///
/// This tagged stream is the engine's sole outward contract: registry
/// changes, subscription losses, and parsed service events all arrive here
/// in order.
#[derive(Debug, Clone)]
pub enum ControlPointEvent {
    /// A device's description resolved and it became visible.
    DeviceAdded(Arc<Device>),

    /// A device said byebye or its advertisements expired.
    DeviceRemoved(Arc<Device>),

    /// A service became visible (follows its device's `DeviceAdded`).
    ServiceAdded(Service),

    /// A service disappeared (precedes its device's `DeviceRemoved`).
    ServiceRemoved(Service),

    /// A subscription could not be renewed and was dropped. No further
    /// events will arrive for it; resubscribe to resume.
    SubscriptionLost {
        /// SID of the lost subscription
        sid: String,
        /// The service it targeted
        service: Service,
    },

    /// A state-variable change event from a subscribed service.
    ServiceEvent(ServiceEvent),

    /// SSDP discovery failed past its retry limit and has stopped.
    /// The registry keeps serving what it already knows.
    DiscoveryFailed {
        /// Human-readable failure description
        reason: String,
    },
}
