//! Error types for the discovery crate.

/// Errors from the SSDP transport layer.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Failed to bind or configure a UDP socket
    #[error("failed to bind SSDP socket: {0}")]
    Bind(String),

    /// A socket-level send or receive error
    #[error("SSDP network error: {0}")]
    Network(String),
}

/// Errors from fetching and parsing a device-description document.
///
/// Both variants are per-advertisement and non-fatal: the advertisement that
/// referenced the location is dropped and discovery continues. `Clone` is
/// required so a coalesced fetch can hand the same outcome to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The description document could not be retrieved (network, timeout,
    /// or non-success HTTP status)
    #[error("description unreachable: {0}")]
    Unreachable(String),

    /// The document was retrieved but is not a valid device description
    #[error("description malformed: {0}")]
    Malformed(String),
}

/// Convenience Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
