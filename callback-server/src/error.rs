//! Error types for the callback server.

/// Errors from starting or running the callback server.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    /// Every port in the configured range was taken
    #[error("no available port in range {start}-{end}")]
    NoAvailablePort {
        /// First port tried
        start: u16,
        /// Last port tried
        end: u16,
    },

    /// The local IP address could not be determined
    #[error("failed to detect local IP address")]
    NoLocalIp,

    /// The HTTP listener failed to come up
    #[error("callback server startup failed: {0}")]
    Startup(String),
}
