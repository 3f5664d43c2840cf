//! Integration tests for description fetching against a mock HTTP server.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use upnp_discovery::{DescriptionFetcher, FetchError};

const DEVICE_XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Test Renderer</friendlyName>
    <manufacturer>Acme Audio</manufacturer>
    <modelName>StreamBox 2</modelName>
    <UDN>uuid:test-renderer-1</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
        <controlURL>/av/control</controlURL>
        <eventSubURL>/av/event</eventSubURL>
        <SCPDURL>/av/scpd.xml</SCPDURL>
      </service>
    </serviceList>
  </device>
</root>"#;

#[test]
fn test_fetch_resolves_urls_against_location() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/description.xml")
        .with_status(200)
        .with_header("content-type", "text/xml")
        .with_body(DEVICE_XML)
        .create();

    let fetcher = DescriptionFetcher::new(Duration::from_secs(2)).unwrap();
    let location = format!("{}/description.xml", server.url());
    let device = fetcher.fetch(&location).unwrap();

    assert_eq!(device.udn, "uuid:test-renderer-1");
    assert_eq!(device.services.len(), 1);
    assert_eq!(
        device.services[0].control_url,
        format!("{}/av/control", server.url())
    );
    assert_eq!(
        device.services[0].event_sub_url,
        format!("{}/av/event", server.url())
    );
    mock.assert();
}

#[test]
fn test_concurrent_fetches_share_one_request() {
    let mut server = mockito::Server::new();
    // expect(1): the whole point is that only one GET goes out. The response
    // is slowed down so the follower threads reliably find the fetch in
    // flight rather than racing past a completed one.
    let mock = server
        .mock("GET", "/desc.xml")
        .with_status(200)
        .with_chunked_body(|writer| {
            std::thread::sleep(Duration::from_millis(400));
            writer.write_all(DEVICE_XML.as_bytes())
        })
        .expect(1)
        .create();

    let fetcher = Arc::new(DescriptionFetcher::new(Duration::from_secs(5)).unwrap());
    let location = format!("{}/desc.xml", server.url());

    let leader = {
        let fetcher = Arc::clone(&fetcher);
        let location = location.clone();
        std::thread::spawn(move || fetcher.fetch(&location))
    };
    std::thread::sleep(Duration::from_millis(100));

    let followers: Vec<_> = (0..3)
        .map(|_| {
            let fetcher = Arc::clone(&fetcher);
            let location = location.clone();
            std::thread::spawn(move || fetcher.fetch(&location))
        })
        .collect();

    let mut outcomes = vec![leader.join().unwrap()];
    outcomes.extend(followers.into_iter().map(|h| h.join().unwrap()));

    for outcome in outcomes {
        let device = outcome.expect("every coalesced caller should get the device");
        assert_eq!(device.udn, "uuid:test-renderer-1");
    }
    mock.assert();
}

#[test]
fn test_http_error_is_unreachable() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/missing.xml")
        .with_status(404)
        .create();

    let fetcher = DescriptionFetcher::new(Duration::from_secs(2)).unwrap();
    let location = format!("{}/missing.xml", server.url());

    assert!(matches!(
        fetcher.fetch(&location),
        Err(FetchError::Unreachable(_))
    ));
}

#[test]
fn test_invalid_body_is_malformed() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/garbage.xml")
        .with_status(200)
        .with_body("<root><device></device>")
        .create();

    let fetcher = DescriptionFetcher::new(Duration::from_secs(2)).unwrap();
    let location = format!("{}/garbage.xml", server.url());

    assert!(matches!(
        fetcher.fetch(&location),
        Err(FetchError::Malformed(_))
    ));
}

#[test]
fn test_sequential_fetches_are_not_cached() {
    // Coalescing is in-flight only: a second fetch after completion issues a
    // fresh request.
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/desc.xml")
        .with_status(200)
        .with_body(DEVICE_XML)
        .expect(2)
        .create();

    let fetcher = DescriptionFetcher::new(Duration::from_secs(2)).unwrap();
    let location = format!("{}/desc.xml", server.url());

    fetcher.fetch(&location).unwrap();
    fetcher.fetch(&location).unwrap();
    mock.assert();
}
