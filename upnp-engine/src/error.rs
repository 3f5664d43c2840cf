//! Error types for the engine crate.

use upnp_eventing::SubscriptionError;

/// Errors surfaced by the control point facade.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid configuration provided
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The SSDP listen socket could not be bound at startup
    #[error("failed to bind SSDP listener: {0}")]
    Bind(String),

    /// The callback server could not be started
    #[error("callback server error: {0}")]
    CallbackServer(String),

    /// The background worker failed to start or disappeared
    #[error("engine worker error: {0}")]
    Worker(String),

    /// An operation requires the engine to be running
    #[error("engine is not running")]
    NotRunning,

    /// The requested service is not in the registry
    #[error("unknown service {service_id:?} on device {udn:?}")]
    UnknownService {
        /// UDN of the device looked up
        udn: String,
        /// Service ID looked up
        service_id: String,
    },

    /// A subscription operation failed
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    /// An internal lock was poisoned by a panicking thread
    #[error("engine state lock poisoned")]
    LockPoisoned,
}

/// Convenience type alias for Results using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
