//! End-to-end registry scenarios, driven without any network.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use upnp_engine::{
    Advertisement, AdvertisementKind, ControlPointEvent, Device, DeviceRegistry, RegistryAction,
    Service,
};

const LOCATION: &str = "http://192.168.1.42:49152/description.xml";
const AV_USN: &str = "uuid:123::urn:schemas-upnp-org:service:AVTransport:1";

fn alive(usn: &str, max_age: u64) -> Advertisement {
    Advertisement {
        usn: usn.to_string(),
        notification_type: "urn:schemas-upnp-org:service:AVTransport:1".to_string(),
        location: Some(LOCATION.to_string()),
        max_age,
        kind: AdvertisementKind::Alive,
    }
}

fn renderer() -> Arc<Device> {
    // Control/event URLs the way the fetcher produces them: resolved
    // against the advertisement's LOCATION.
    Arc::new(Device {
        udn: "uuid:123".to_string(),
        friendly_name: "Living Room".to_string(),
        device_type: "urn:schemas-upnp-org:device:MediaRenderer:1".to_string(),
        manufacturer: Some("Acme Audio".to_string()),
        model_name: Some("StreamBox 2".to_string()),
        location: LOCATION.to_string(),
        services: vec![Service {
            service_type: "urn:schemas-upnp-org:service:AVTransport:1".to_string(),
            service_id: "urn:upnp-org:serviceId:AVTransport".to_string(),
            control_url: "http://192.168.1.42:49152/MediaRenderer/AVTransport/Control".to_string(),
            event_sub_url: "http://192.168.1.42:49152/MediaRenderer/AVTransport/Event".to_string(),
            scpd_url: "http://192.168.1.42:49152/xml/AVTransport1.xml".to_string(),
            device_udn: "uuid:123".to_string(),
        }],
        devices: vec![],
    })
}

/// The full AVTransport lifecycle: advertisement with max-age 1800 arrives,
/// the description resolves, ServiceAdded carries the control URL resolved
/// against LOCATION, and nothing further happens until byebye or the 1800 s
/// expiry.
#[test]
fn test_avtransport_advertisement_lifecycle() {
    let mut registry = DeviceRegistry::new();
    let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    // Advertisement arrives: a fetch is requested, nothing visible yet.
    let (action, events) = registry.on_advertisement(&alive(AV_USN, 1800), start);
    assert_eq!(action, RegistryAction::Fetch(LOCATION.to_string()));
    assert!(events.is_empty());
    assert!(registry.devices().is_empty());

    // Description resolves: DeviceAdded then ServiceAdded, with the control
    // URL resolved against the advertised LOCATION's authority.
    let events = registry.on_fetch_success(LOCATION, renderer(), start);
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], ControlPointEvent::DeviceAdded(d) if d.udn == "uuid:123"));
    match &events[1] {
        ControlPointEvent::ServiceAdded(service) => {
            assert_eq!(
                service.control_url,
                "http://192.168.1.42:49152/MediaRenderer/AVTransport/Control"
            );
            assert_eq!(service.device_udn, "uuid:123");
        }
        other => panic!("expected ServiceAdded, got {other:?}"),
    }

    // Re-advertisements refresh silently; sweeps before expiry are quiet.
    let mid = start + Duration::from_secs(900);
    let (action, events) = registry.on_advertisement(&alive(AV_USN, 1800), mid);
    assert_eq!(action, RegistryAction::None);
    assert!(events.is_empty());
    assert!(registry.sweep(start + Duration::from_secs(1800)).is_empty());

    // 1800 s after the refresh the entry expires: ServiceRemoved then
    // DeviceRemoved.
    let events = registry.sweep(mid + Duration::from_secs(1800));
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], ControlPointEvent::ServiceRemoved(_)));
    assert!(matches!(&events[1], ControlPointEvent::DeviceRemoved(_)));
    assert!(registry.devices().is_empty());
}

/// Byebye ends the lifecycle immediately, without waiting for expiry.
#[test]
fn test_byebye_is_immediate() {
    let mut registry = DeviceRegistry::new();
    let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    registry.on_advertisement(&alive(AV_USN, 1800), start);
    registry.on_fetch_success(LOCATION, renderer(), start);
    assert_eq!(registry.devices().len(), 1);

    let byebye = Advertisement {
        usn: AV_USN.to_string(),
        notification_type: "urn:schemas-upnp-org:service:AVTransport:1".to_string(),
        location: None,
        max_age: 0,
        kind: AdvertisementKind::ByeBye,
    };
    let (_, events) = registry.on_advertisement(&byebye, start + Duration::from_secs(1));
    assert_eq!(events.len(), 2);
    assert!(registry.devices().is_empty());
}

/// A burst of duplicate advertisements for one USN never produces duplicate
/// registry entries or duplicate events.
#[test]
fn test_duplicate_advertisements_coalesce() {
    let mut registry = DeviceRegistry::new();
    let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    let mut fetches = 0;
    for _ in 0..5 {
        let (action, events) = registry.on_advertisement(&alive(AV_USN, 1800), start);
        if matches!(action, RegistryAction::Fetch(_)) {
            fetches += 1;
        }
        assert!(events.is_empty());
    }
    assert_eq!(fetches, 1);

    let events = registry.on_fetch_success(LOCATION, renderer(), start);
    assert_eq!(events.len(), 2);

    for _ in 0..5 {
        let (action, events) = registry.on_advertisement(&alive(AV_USN, 1800), start);
        assert_eq!(action, RegistryAction::None);
        assert!(events.is_empty());
    }
    assert_eq!(registry.devices().len(), 1);
}
