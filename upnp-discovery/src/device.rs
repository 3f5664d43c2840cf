//! Public device and service model.
//!
//! These types are what the registry exposes to callers. They are built only
//! from a successfully parsed description document and are immutable once
//! constructed; liveness bookkeeping lives in the registry, not here.

/// A resolved UPnP device.
///
/// Embedded devices are owned by their parent; services carry their owning
/// device's UDN as a plain-string back-reference (lookup only, no ownership
/// cycle).
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    /// Unique Device Name, e.g. "uuid:9ab0c000-f668-11de-9976-000000000000"
    pub udn: String,
    /// Human-readable name from the description document
    pub friendly_name: String,
    /// Device type URN, e.g. "urn:schemas-upnp-org:device:MediaRenderer:1"
    pub device_type: String,
    /// Manufacturer string, when the description declares one
    pub manufacturer: Option<String>,
    /// Model name, when the description declares one
    pub model_name: Option<String>,
    /// The description URL this device was resolved from
    pub location: String,
    /// Services declared directly on this device
    pub services: Vec<Service>,
    /// Embedded child devices
    pub devices: Vec<Device>,
}

impl Device {
    /// Iterate over this device's services and every embedded device's
    /// services, depth-first.
    pub fn all_services(&self) -> Vec<&Service> {
        let mut out: Vec<&Service> = self.services.iter().collect();
        for child in &self.devices {
            out.extend(child.all_services());
        }
        out
    }

    /// Find a service anywhere in this device tree by its service ID.
    pub fn find_service(&self, service_id: &str) -> Option<&Service> {
        self.all_services()
            .into_iter()
            .find(|s| s.service_id == service_id)
    }

    /// Find the first service anywhere in this device tree whose type
    /// matches `service_type` exactly.
    pub fn service_of_type(&self, service_type: &str) -> Option<&Service> {
        self.all_services()
            .into_iter()
            .find(|s| s.service_type == service_type)
    }
}

/// A service declared by a device description.
///
/// All URLs are absolute, resolved against the device's base URL at parse
/// time.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    /// Service type URN, e.g. "urn:schemas-upnp-org:service:AVTransport:1"
    pub service_type: String,
    /// Service ID, e.g. "urn:upnp-org:serviceId:AVTransport"
    pub service_id: String,
    /// Absolute control endpoint URL (SOAP actions)
    pub control_url: String,
    /// Absolute event subscription URL (GENA SUBSCRIBE/UNSUBSCRIBE)
    pub event_sub_url: String,
    /// Absolute service description (SCPD) URL
    pub scpd_url: String,
    /// UDN of the device that declared this service
    pub device_udn: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(id: &str, udn: &str) -> Service {
        Service {
            service_type: format!("urn:schemas-upnp-org:service:{id}:1"),
            service_id: format!("urn:upnp-org:serviceId:{id}"),
            control_url: format!("http://10.0.0.5/{id}/control"),
            event_sub_url: format!("http://10.0.0.5/{id}/event"),
            scpd_url: format!("http://10.0.0.5/{id}/scpd.xml"),
            device_udn: udn.to_string(),
        }
    }

    fn device_tree() -> Device {
        Device {
            udn: "uuid:root".to_string(),
            friendly_name: "Media Server".to_string(),
            device_type: "urn:schemas-upnp-org:device:MediaServer:1".to_string(),
            manufacturer: Some("Acme".to_string()),
            model_name: None,
            location: "http://10.0.0.5/desc.xml".to_string(),
            services: vec![service("ContentDirectory", "uuid:root")],
            devices: vec![Device {
                udn: "uuid:embedded".to_string(),
                friendly_name: "Renderer".to_string(),
                device_type: "urn:schemas-upnp-org:device:MediaRenderer:1".to_string(),
                manufacturer: None,
                model_name: None,
                location: "http://10.0.0.5/desc.xml".to_string(),
                services: vec![service("AVTransport", "uuid:embedded")],
                devices: vec![],
            }],
        }
    }

    #[test]
    fn test_all_services_includes_embedded() {
        let device = device_tree();
        let ids: Vec<_> = device
            .all_services()
            .iter()
            .map(|s| s.service_id.as_str())
            .collect();
        assert_eq!(
            ids,
            vec![
                "urn:upnp-org:serviceId:ContentDirectory",
                "urn:upnp-org:serviceId:AVTransport",
            ]
        );
    }

    #[test]
    fn test_find_service_by_id() {
        let device = device_tree();
        let found = device
            .find_service("urn:upnp-org:serviceId:AVTransport")
            .unwrap();
        assert_eq!(found.device_udn, "uuid:embedded");
        assert!(device.find_service("urn:upnp-org:serviceId:Missing").is_none());
    }

    #[test]
    fn test_service_of_type() {
        let device = device_tree();
        let found = device
            .service_of_type("urn:schemas-upnp-org:service:ContentDirectory:1")
            .unwrap();
        assert_eq!(found.device_udn, "uuid:root");
    }
}
