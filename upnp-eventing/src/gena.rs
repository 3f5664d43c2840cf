//! GENA wire client: SUBSCRIBE, renewal, and UNSUBSCRIBE requests.

use std::time::Duration;

use crate::error::{Result, SubscriptionError};

/// Timeout applied to every GENA request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a successful SUBSCRIBE request.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeResponse {
    /// Subscription ID assigned by the service
    pub sid: String,
    /// Timeout granted by the service, in seconds
    pub timeout_secs: u64,
}

/// HTTP client for the GENA verbs.
///
/// Stateless: every call carries the event URL it targets. Subscription
/// bookkeeping lives in the manager.
pub struct GenaClient {
    http: reqwest::blocking::Client,
}

impl GenaClient {
    /// Create a client with the standard GENA request timeout.
    pub fn new() -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SubscriptionError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Send an initial SUBSCRIBE request.
    ///
    /// `callback_url` is where the service will deliver NOTIFY requests;
    /// `timeout_secs` is the requested subscription lifetime. The service may
    /// grant a different timeout, returned in the response.
    pub fn subscribe(
        &self,
        event_url: &str,
        callback_url: &str,
        timeout_secs: u64,
    ) -> Result<SubscribeResponse> {
        let response = self
            .http
            .request(subscribe_method(), event_url)
            .header("HOST", host_header(event_url))
            .header("CALLBACK", format!("<{callback_url}>"))
            .header("NT", "upnp:event")
            .header("TIMEOUT", format!("Second-{timeout_secs}"))
            .send()
            .map_err(|e| SubscriptionError::Network(format!("SUBSCRIBE request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubscriptionError::CreationFailed(format!(
                "SUBSCRIBE returned HTTP {status}"
            )));
        }

        let sid = response
            .headers()
            .get("SID")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(SubscriptionError::MissingSid)?;

        let granted = response
            .headers()
            .get("TIMEOUT")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_timeout)
            .unwrap_or(timeout_secs);

        Ok(SubscribeResponse {
            sid,
            timeout_secs: granted,
        })
    }

    /// Renew an existing subscription, returning the newly granted timeout.
    pub fn renew(&self, event_url: &str, sid: &str, timeout_secs: u64) -> Result<u64> {
        let response = self
            .http
            .request(subscribe_method(), event_url)
            .header("HOST", host_header(event_url))
            .header("SID", sid)
            .header("TIMEOUT", format!("Second-{timeout_secs}"))
            .send()
            .map_err(|e| SubscriptionError::Network(format!("renewal request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::PRECONDITION_FAILED
            || status == reqwest::StatusCode::NOT_FOUND
        {
            return Err(SubscriptionError::Gone);
        }
        if !status.is_success() {
            return Err(SubscriptionError::RenewalFailed(format!(
                "renewal returned HTTP {status}"
            )));
        }

        Ok(response
            .headers()
            .get("TIMEOUT")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_timeout)
            .unwrap_or(timeout_secs))
    }

    /// Send an UNSUBSCRIBE request.
    pub fn unsubscribe(&self, event_url: &str, sid: &str) -> Result<()> {
        let method = reqwest::Method::from_bytes(b"UNSUBSCRIBE")
            .expect("UNSUBSCRIBE is a valid method token");

        let response = self
            .http
            .request(method, event_url)
            .header("HOST", host_header(event_url))
            .header("SID", sid)
            .send()
            .map_err(|e| SubscriptionError::Network(format!("UNSUBSCRIBE request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::PRECONDITION_FAILED
            || status == reqwest::StatusCode::NOT_FOUND
        {
            return Err(SubscriptionError::Gone);
        }
        if !status.is_success() {
            return Err(SubscriptionError::Network(format!(
                "UNSUBSCRIBE returned HTTP {status}"
            )));
        }

        Ok(())
    }
}

fn subscribe_method() -> reqwest::Method {
    reqwest::Method::from_bytes(b"SUBSCRIBE").expect("SUBSCRIBE is a valid method token")
}

/// Build the HOST header value from an event URL.
fn host_header(event_url: &str) -> String {
    if let Ok(url) = url::Url::parse(event_url) {
        if let Some(host) = url.host_str() {
            return match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
        }
    }
    event_url.to_string()
}

/// Parse a GENA TIMEOUT header value of the form `Second-1800`.
///
/// `Second-infinite` and unparsable values yield `None` so the caller falls
/// back to the requested timeout.
fn parse_timeout(value: &str) -> Option<u64> {
    let value = value.trim();
    let seconds = value
        .strip_prefix("Second-")
        .or_else(|| value.strip_prefix("second-"))?;
    seconds.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Second-1800", Some(1800))]
    #[case("second-300", Some(300))]
    #[case(" Second-60 ", Some(60))]
    #[case("Second-infinite", None)]
    #[case("1800", None)]
    #[case("", None)]
    fn test_parse_timeout(#[case] input: &str, #[case] expected: Option<u64>) {
        assert_eq!(parse_timeout(input), expected);
    }

    #[test]
    fn test_host_header() {
        assert_eq!(
            host_header("http://192.168.1.42:49152/av/event"),
            "192.168.1.42:49152"
        );
        assert_eq!(host_header("http://192.168.1.42/av/event"), "192.168.1.42");
    }
}
