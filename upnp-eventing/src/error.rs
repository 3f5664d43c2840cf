//! Error types for the eventing crate.

/// Errors from subscription operations.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// The SUBSCRIBE request was rejected or could not be completed
    #[error("failed to create subscription: {0}")]
    CreationFailed(String),

    /// A renewal request failed
    #[error("renewal failed: {0}")]
    RenewalFailed(String),

    /// The remote service no longer knows the subscription (HTTP 412/404)
    #[error("subscription no longer known to the service")]
    Gone,

    /// A network error occurred
    #[error("network error: {0}")]
    Network(String),

    /// The SUBSCRIBE response carried no SID header
    #[error("missing SID header in SUBSCRIBE response")]
    MissingSid,

    /// An event body could not be parsed as a property set
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// An internal lock was poisoned by a panicking thread
    #[error("subscription state lock poisoned")]
    LockPoisoned,
}

/// Convenience type alias for Results using SubscriptionError.
pub type Result<T> = std::result::Result<T, SubscriptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SubscriptionError::CreationFailed("HTTP 500".to_string());
        assert_eq!(error.to_string(), "failed to create subscription: HTTP 500");

        assert_eq!(
            SubscriptionError::Gone.to_string(),
            "subscription no longer known to the service"
        );

        assert_eq!(
            SubscriptionError::MissingSid.to_string(),
            "missing SID header in SUBSCRIBE response"
        );

        let error = SubscriptionError::MalformedEvent("not xml".to_string());
        assert_eq!(error.to_string(), "malformed event: not xml");
    }
}
