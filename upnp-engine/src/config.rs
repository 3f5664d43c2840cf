//! Engine configuration.
//!
//! [`EngineConfig`] controls every tunable of the control point: which
//! search targets to sweep for, how the transport paces itself, fetch and
//! subscription timeouts, and the callback server's port range.

use std::time::Duration;

use crate::error::EngineError;

/// Configuration for a [`ControlPoint`](crate::ControlPoint).
///
/// The search-target set is deliberately caller-supplied: which device and
/// service types an application cares about is an application concern, not
/// an engine concern. The default sweeps for root devices only.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SSDP search targets to M-SEARCH for, one burst each per interval.
    /// Default: `["upnp:rootdevice"]`
    pub search_targets: Vec<String>,

    /// Time between full M-SEARCH burst cycles.
    /// Default: 60 seconds
    pub search_interval: Duration,

    /// Gap between per-target bursts inside one cycle, to avoid flooding.
    /// Default: 500 milliseconds
    pub search_target_gap: Duration,

    /// MX header value: how long devices may spread their responses.
    /// Default: 2
    pub search_mx: u8,

    /// How long to collect responses after each M-SEARCH.
    /// Default: 3 seconds
    pub search_response_window: Duration,

    /// Read timeout on the NOTIFY listen socket (shutdown poll granularity).
    /// Default: 500 milliseconds
    pub listen_read_timeout: Duration,

    /// Initial backoff after a listen-socket failure.
    /// Default: 250 milliseconds
    pub listen_backoff_base: Duration,

    /// Backoff ceiling for listen-socket retries.
    /// Default: 30 seconds
    pub listen_backoff_max: Duration,

    /// Consecutive listen failures tolerated before discovery is declared
    /// failed and a `DiscoveryFailed` event is emitted.
    /// Default: 8
    pub listen_failure_ceiling: u32,

    /// Interval for the registry's expiry sweep.
    /// Default: 5 seconds
    pub sweep_interval: Duration,

    /// Interval between renewal-deadline checks.
    /// Default: 10 seconds
    pub renewal_check_interval: Duration,

    /// Timeout for each description-document fetch.
    /// Default: 5 seconds
    pub fetch_timeout: Duration,

    /// Maximum concurrent description fetches.
    /// Default: 4
    pub max_concurrent_fetches: usize,

    /// Capacity of the transport-to-registry advertisement queue; overflow
    /// drops the oldest pending advertisement.
    /// Default: 256
    pub advertisement_queue_capacity: usize,

    /// Subscription timeout requested on SUBSCRIBE, in seconds.
    /// Default: 1800 (30 minutes)
    pub subscription_timeout_secs: u64,

    /// Port range scanned for the callback server.
    /// Default: (3400, 3500)
    pub callback_port_range: (u16, u16),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_targets: vec!["upnp:rootdevice".to_string()],
            search_interval: Duration::from_secs(60),
            search_target_gap: Duration::from_millis(500),
            search_mx: 2,
            search_response_window: Duration::from_secs(3),
            listen_read_timeout: Duration::from_millis(500),
            listen_backoff_base: Duration::from_millis(250),
            listen_backoff_max: Duration::from_secs(30),
            listen_failure_ceiling: 8,
            sweep_interval: Duration::from_secs(5),
            renewal_check_interval: Duration::from_secs(10),
            fetch_timeout: Duration::from_secs(5),
            max_concurrent_fetches: 4,
            advertisement_queue_capacity: 256,
            subscription_timeout_secs: 1800,
            callback_port_range: (3400, 3500),
        }
    }
}

impl EngineConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset tuned for quick turnaround on small networks.
    pub fn fast_discovery() -> Self {
        Self {
            search_interval: Duration::from_secs(15),
            search_response_window: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(2),
            renewal_check_interval: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// Preset tuned for minimal background traffic and memory.
    pub fn resource_efficient() -> Self {
        Self {
            search_interval: Duration::from_secs(300),
            max_concurrent_fetches: 2,
            advertisement_queue_capacity: 64,
            sweep_interval: Duration::from_secs(15),
            renewal_check_interval: Duration::from_secs(30),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.search_targets.is_empty() {
            return Err(EngineError::Configuration(
                "search target set must not be empty".to_string(),
            ));
        }
        if self.search_targets.iter().any(|t| t.trim().is_empty()) {
            return Err(EngineError::Configuration(
                "search targets must not be blank".to_string(),
            ));
        }
        if self.callback_port_range.0 >= self.callback_port_range.1 {
            return Err(EngineError::Configuration(
                "invalid callback port range: start must be less than end".to_string(),
            ));
        }
        if self.advertisement_queue_capacity == 0 {
            return Err(EngineError::Configuration(
                "advertisement queue capacity must be greater than 0".to_string(),
            ));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(EngineError::Configuration(
                "max concurrent fetches must be greater than 0".to_string(),
            ));
        }
        if self.search_mx == 0 {
            return Err(EngineError::Configuration(
                "search MX must be at least 1".to_string(),
            ));
        }
        if self.subscription_timeout_secs == 0 {
            return Err(EngineError::Configuration(
                "subscription timeout must be greater than 0".to_string(),
            ));
        }
        if self.listen_backoff_base > self.listen_backoff_max {
            return Err(EngineError::Configuration(
                "listen backoff base must not exceed its ceiling".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the search-target set.
    pub fn with_search_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Set the callback server port range.
    pub fn with_callback_ports(mut self, start: u16, end: u16) -> Self {
        self.callback_port_range = (start, end);
        self
    }

    /// Set the M-SEARCH cycle interval.
    pub fn with_search_interval(mut self, interval: Duration) -> Self {
        self.search_interval = interval;
        self
    }

    /// Set the requested subscription timeout in seconds.
    pub fn with_subscription_timeout(mut self, secs: u64) -> Self {
        self.subscription_timeout_secs = secs;
        self
    }

    /// Set the advertisement queue capacity.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.advertisement_queue_capacity = capacity;
        self
    }
}
