//! Integration tests for the GENA wire client against a mock HTTP server.

use mockito::Matcher;
use upnp_discovery::Service;
use upnp_eventing::{GenaClient, SubscriptionError, SubscriptionManager};

fn service(event_url: &str) -> Service {
    Service {
        service_type: "urn:schemas-upnp-org:service:AVTransport:1".to_string(),
        service_id: "urn:upnp-org:serviceId:AVTransport".to_string(),
        control_url: format!("{event_url}/control"),
        event_sub_url: event_url.to_string(),
        scpd_url: format!("{event_url}/scpd.xml"),
        device_udn: "uuid:device-1".to_string(),
    }
}

#[test]
fn test_subscribe_parses_sid_and_timeout() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("SUBSCRIBE", "/av/event")
        .match_header("NT", "upnp:event")
        .match_header("CALLBACK", "<http://10.0.0.2:3400>")
        .match_header("TIMEOUT", "Second-1800")
        .with_status(200)
        .with_header("SID", "uuid:sub-abc")
        .with_header("TIMEOUT", "Second-900")
        .create();

    let client = GenaClient::new().unwrap();
    let response = client
        .subscribe(
            &format!("{}/av/event", server.url()),
            "http://10.0.0.2:3400",
            1800,
        )
        .unwrap();

    assert_eq!(response.sid, "uuid:sub-abc");
    // The service granted less than requested; the grant wins.
    assert_eq!(response.timeout_secs, 900);
    mock.assert();
}

#[test]
fn test_subscribe_without_sid_fails() {
    let mut server = mockito::Server::new();
    server
        .mock("SUBSCRIBE", "/av/event")
        .with_status(200)
        .create();

    let client = GenaClient::new().unwrap();
    let result = client.subscribe(
        &format!("{}/av/event", server.url()),
        "http://10.0.0.2:3400",
        1800,
    );

    assert!(matches!(result, Err(SubscriptionError::MissingSid)));
}

#[test]
fn test_subscribe_rejection_is_creation_failed() {
    let mut server = mockito::Server::new();
    server
        .mock("SUBSCRIBE", "/av/event")
        .with_status(500)
        .create();

    let client = GenaClient::new().unwrap();
    let result = client.subscribe(
        &format!("{}/av/event", server.url()),
        "http://10.0.0.2:3400",
        1800,
    );

    assert!(matches!(result, Err(SubscriptionError::CreationFailed(_))));
}

#[test]
fn test_renew_returns_new_grant() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("SUBSCRIBE", "/av/event")
        .match_header("SID", "uuid:sub-abc")
        .with_status(200)
        .with_header("TIMEOUT", "Second-1800")
        .create();

    let client = GenaClient::new().unwrap();
    let granted = client
        .renew(&format!("{}/av/event", server.url()), "uuid:sub-abc", 900)
        .unwrap();

    assert_eq!(granted, 1800);
    mock.assert();
}

#[test]
fn test_renew_precondition_failed_is_gone() {
    let mut server = mockito::Server::new();
    server
        .mock("SUBSCRIBE", "/av/event")
        .match_header("SID", "uuid:sub-abc")
        .with_status(412)
        .create();

    let client = GenaClient::new().unwrap();
    let result = client.renew(&format!("{}/av/event", server.url()), "uuid:sub-abc", 900);

    assert!(matches!(result, Err(SubscriptionError::Gone)));
}

#[test]
fn test_unsubscribe_sends_sid() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("UNSUBSCRIBE", "/av/event")
        .match_header("SID", "uuid:sub-abc")
        .with_status(200)
        .create();

    let client = GenaClient::new().unwrap();
    client
        .unsubscribe(&format!("{}/av/event", server.url()), "uuid:sub-abc")
        .unwrap();
    mock.assert();
}

#[test]
fn test_failed_renewal_demotes_subscription() {
    let mut server = mockito::Server::new();

    // Initial subscription: Second-0 makes the renewal due immediately.
    let subscribe_mock = server
        .mock("SUBSCRIBE", "/av/event")
        .match_header("CALLBACK", Matcher::Regex(".+".to_string()))
        .with_status(200)
        .with_header("SID", "uuid:renew-me")
        .with_header("TIMEOUT", "Second-0")
        .expect(1)
        .create();

    // The renewal attempt is told the subscription no longer exists.
    let renew_mock = server
        .mock("SUBSCRIBE", "/av/event")
        .match_header("SID", "uuid:renew-me")
        .with_status(412)
        .expect(1)
        .create();

    let manager = SubscriptionManager::new("http://10.0.0.2:3400".to_string(), 1800).unwrap();
    let event_url = format!("{}/av/event", server.url());
    let subscription = manager.subscribe(&service(&event_url)).unwrap();
    assert_eq!(subscription.sid, "uuid:renew-me");
    assert_eq!(manager.subscriptions().len(), 1);

    let lost = manager.check_renewals();
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].sid, "uuid:renew-me");
    // Demoted: no local state left, no further renewal will be attempted.
    assert!(manager.subscriptions().is_empty());
    assert!(manager.check_renewals().is_empty());

    subscribe_mock.assert();
    renew_mock.assert();
}
