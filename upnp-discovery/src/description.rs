//! Device-description document parsing.
//!
//! Parses the XML document a device serves at its advertised LOCATION,
//! including embedded device trees, and resolves every declared service's
//! relative URLs against the document's base URL.

use serde::Deserialize;
use url::Url;

use crate::device::{Device, Service};
use crate::error::FetchError;

/// Root element of a UPnP device description document.
#[derive(Debug, Deserialize)]
pub struct Root {
    /// Optional base URL for resolving relative URLs (UPnP 1.0)
    #[serde(rename = "URLBase")]
    pub url_base: Option<String>,
    pub device: DeviceDescription,
}

/// A `<device>` element, possibly nested inside a `<deviceList>`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    #[serde(rename = "UDN")]
    pub udn: String,
    pub service_list: Option<ServiceList>,
    pub device_list: Option<DeviceList>,
}

#[derive(Debug, Deserialize)]
pub struct ServiceList {
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceDescription>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceList {
    #[serde(default, rename = "device")]
    pub devices: Vec<DeviceDescription>,
}

/// A `<service>` element with its (usually relative) URLs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescription {
    pub service_type: String,
    pub service_id: String,
    #[serde(rename = "controlURL")]
    pub control_url: String,
    #[serde(rename = "eventSubURL")]
    pub event_sub_url: String,
    #[serde(rename = "SCPDURL")]
    pub scpd_url: String,
}

/// Parse a description document from XML.
pub fn parse_description(xml: &str) -> Result<Root, FetchError> {
    quick_xml::de::from_str(xml)
        .map_err(|e| FetchError::Malformed(format!("failed to parse device description: {e}")))
}

impl Root {
    /// Convert the parsed document into the public [`Device`] model.
    ///
    /// Relative service URLs are resolved against `URLBase` when present,
    /// otherwise against the location the document was fetched from.
    pub fn into_device(self, location: &str) -> Result<Device, FetchError> {
        let base_str = self.url_base.as_deref().unwrap_or(location);
        let base = Url::parse(base_str)
            .map_err(|e| FetchError::Malformed(format!("invalid base URL {base_str:?}: {e}")))?;

        build_device(self.device, &base, location)
    }
}

fn build_device(
    desc: DeviceDescription,
    base: &Url,
    location: &str,
) -> Result<Device, FetchError> {
    if desc.udn.is_empty() {
        return Err(FetchError::Malformed("device is missing its UDN".to_string()));
    }

    let services = desc
        .service_list
        .map(|list| list.services)
        .unwrap_or_default()
        .into_iter()
        .map(|s| build_service(s, base, &desc.udn))
        .collect::<Result<Vec<_>, _>>()?;

    let devices = desc
        .device_list
        .map(|list| list.devices)
        .unwrap_or_default()
        .into_iter()
        .map(|child| build_device(child, base, location))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Device {
        udn: desc.udn,
        friendly_name: desc.friendly_name,
        device_type: desc.device_type,
        manufacturer: desc.manufacturer,
        model_name: desc.model_name,
        location: location.to_string(),
        services,
        devices,
    })
}

fn build_service(
    desc: ServiceDescription,
    base: &Url,
    device_udn: &str,
) -> Result<Service, FetchError> {
    Ok(Service {
        control_url: resolve(base, &desc.control_url)?,
        event_sub_url: resolve(base, &desc.event_sub_url)?,
        scpd_url: resolve(base, &desc.scpd_url)?,
        service_type: desc.service_type,
        service_id: desc.service_id,
        device_udn: device_udn.to_string(),
    })
}

/// Resolve a possibly-relative URL against the device's base URL.
fn resolve(base: &Url, candidate: &str) -> Result<String, FetchError> {
    base.join(candidate)
        .map(|u| u.to_string())
        .map_err(|e| FetchError::Malformed(format!("unresolvable URL {candidate:?}: {e}")))
}
