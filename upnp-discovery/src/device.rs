//! The device/service data model and device-description parsing.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::DiscoveryError;

/// Device categories a control point tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    MediaServer,
    MediaRenderer,
}

impl DeviceKind {
    /// The version-1 device type URN used in `ST`/`NT` headers.
    pub fn urn(&self) -> &'static str {
        match self {
            DeviceKind::MediaServer => "urn:schemas-upnp-org:device:MediaServer:1",
            DeviceKind::MediaRenderer => "urn:schemas-upnp-org:device:MediaRenderer:1",
        }
    }

    /// Match a device type URN of any version.
    pub fn from_urn(urn: &str) -> Option<Self> {
        let rest = urn.strip_prefix("urn:schemas-upnp-org:device:")?;
        let name = rest.split(':').next()?;
        match name {
            "MediaServer" => Some(DeviceKind::MediaServer),
            "MediaRenderer" => Some(DeviceKind::MediaRenderer),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::MediaServer => f.write_str("MediaServer"),
            DeviceKind::MediaRenderer => f.write_str("MediaRenderer"),
        }
    }
}

/// The four AV service types a control point drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    ContentDirectory,
    ConnectionManager,
    AVTransport,
    RenderingControl,
}

impl ServiceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::ContentDirectory => "ContentDirectory",
            ServiceKind::ConnectionManager => "ConnectionManager",
            ServiceKind::AVTransport => "AVTransport",
            ServiceKind::RenderingControl => "RenderingControl",
        }
    }

    /// Full service type URN for a given version,
    /// e.g. `urn:schemas-upnp-org:service:AVTransport:1`.
    pub fn urn(&self, version: u32) -> String {
        format!("urn:schemas-upnp-org:service:{}:{}", self.name(), version)
    }

    /// Parse a service type URN into kind and version.
    pub fn from_urn(urn: &str) -> Option<(Self, u32)> {
        let rest = urn.strip_prefix("urn:schemas-upnp-org:service:")?;
        let mut parts = rest.split(':');
        let kind = match parts.next()? {
            "ContentDirectory" => ServiceKind::ContentDirectory,
            "ConnectionManager" => ServiceKind::ConnectionManager,
            "AVTransport" => ServiceKind::AVTransport,
            "RenderingControl" => ServiceKind::RenderingControl,
            _ => return None,
        };
        let version = parts.next().and_then(|v| v.parse().ok()).unwrap_or(1);
        Some((kind, version))
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One service entry of a device description. Immutable once parsed; URLs
/// are absolute (resolved against the description's base).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub kind: ServiceKind,
    pub version: u32,
    pub id: String,
    pub control_url: String,
    pub event_subscription_url: String,
    pub scpd_url: String,
}

impl Service {
    pub fn urn(&self) -> String {
        self.kind.urn(self.version)
    }
}

/// A discovered device, identified by its UDN.
#[derive(Debug, Clone)]
pub struct Device {
    pub udn: String,
    pub kind: DeviceKind,
    /// Raw `deviceType` value from the description.
    pub device_type: String,
    pub friendly_name: String,
    /// The description URL the device announced.
    pub location: String,
    /// Base URL service URLs were resolved against.
    pub base_url: String,
    pub presentation_url: Option<String>,
    pub services: HashMap<ServiceKind, Service>,
}

impl Device {
    pub fn implements_service(&self, kind: ServiceKind) -> bool {
        self.services.contains_key(&kind)
    }

    pub fn service(&self, kind: ServiceKind) -> Option<&Service> {
        self.services.get(&kind)
    }

    /// Parse a device description document fetched from `location`.
    ///
    /// Returns `Ok(None)` for well-formed descriptions that do not qualify:
    /// wrong device category, or missing the services mandatory for the
    /// category (a MediaServer must expose ContentDirectory; a MediaRenderer
    /// must expose RenderingControl and ConnectionManager).
    pub fn from_description(
        xml: &str,
        location: &str,
        targets: &[DeviceKind],
    ) -> Result<Option<Device>, DiscoveryError> {
        let root: RootXml = quick_xml::de::from_str(xml)
            .map_err(|e| DiscoveryError::Parse(format!("device description: {e}")))?;
        let description = root.device;

        let Some(kind) = DeviceKind::from_urn(&description.device_type) else {
            debug!(device_type = %description.device_type, "ignoring unrelated device");
            return Ok(None);
        };
        if !targets.contains(&kind) {
            return Ok(None);
        }
        if description.udn.is_empty() {
            return Err(DiscoveryError::Parse("description without UDN".to_string()));
        }

        let base_url = root
            .url_base
            .as_deref()
            .filter(|b| !b.is_empty())
            .unwrap_or(location)
            .to_string();
        let base = Url::parse(&base_url)
            .map_err(|e| DiscoveryError::Parse(format!("bad base URL {base_url:?}: {e}")))?;

        let mut services = HashMap::new();
        for entry in description
            .service_list
            .map(|l| l.services)
            .unwrap_or_default()
        {
            let Some((kind, version)) = ServiceKind::from_urn(&entry.service_type) else {
                continue;
            };
            let Some(service) = entry.resolve(&base, kind, version) else {
                warn!(service = %entry.service_type, "service with unresolvable URLs skipped");
                continue;
            };
            // at most one service per kind; keep the first occurrence
            services.entry(kind).or_insert(service);
        }

        let presentation_url = description
            .presentation_url
            .filter(|p| !p.is_empty())
            .and_then(|p| base.join(&p).ok())
            .map(|u| u.to_string());

        let device = Device {
            udn: description.udn,
            kind,
            device_type: description.device_type,
            friendly_name: description.friendly_name,
            location: location.to_string(),
            base_url,
            presentation_url,
            services,
        };

        if device.satisfies_required_services() {
            Ok(Some(device))
        } else {
            debug!(udn = %device.udn, kind = %device.kind, "device lacks required services");
            Ok(None)
        }
    }

    fn satisfies_required_services(&self) -> bool {
        match self.kind {
            DeviceKind::MediaServer => self.implements_service(ServiceKind::ContentDirectory),
            DeviceKind::MediaRenderer => {
                self.implements_service(ServiceKind::RenderingControl)
                    && self.implements_service(ServiceKind::ConnectionManager)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RootXml {
    #[serde(rename = "URLBase")]
    url_base: Option<String>,
    device: DeviceXml,
}

#[derive(Debug, Deserialize)]
struct DeviceXml {
    #[serde(rename = "deviceType", default)]
    device_type: String,
    #[serde(rename = "friendlyName", default)]
    friendly_name: String,
    #[serde(rename = "UDN", default)]
    udn: String,
    #[serde(rename = "presentationURL")]
    presentation_url: Option<String>,
    #[serde(rename = "serviceList")]
    service_list: Option<ServiceListXml>,
}

#[derive(Debug, Deserialize)]
struct ServiceListXml {
    #[serde(rename = "service", default)]
    services: Vec<ServiceXml>,
}

#[derive(Debug, Deserialize)]
struct ServiceXml {
    #[serde(rename = "serviceType", default)]
    service_type: String,
    #[serde(rename = "serviceId", default)]
    service_id: String,
    #[serde(rename = "SCPDURL", default)]
    scpd_url: String,
    #[serde(rename = "controlURL", default)]
    control_url: String,
    #[serde(rename = "eventSubURL", default)]
    event_sub_url: String,
}

impl ServiceXml {
    fn resolve(&self, base: &Url, kind: ServiceKind, version: u32) -> Option<Service> {
        Some(Service {
            kind,
            version,
            id: self.service_id.clone(),
            control_url: base.join(&self.control_url).ok()?.to_string(),
            event_subscription_url: base.join(&self.event_sub_url).ok()?.to_string(),
            scpd_url: base.join(&self.scpd_url).ok()?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERER_XML: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Living Room Radio</friendlyName>
    <UDN>uuid:renderer-1</UDN>
    <presentationURL>/web/</presentationURL>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:RenderingControl:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:RenderingControl</serviceId>
        <SCPDURL>/scpd/rc.xml</SCPDURL>
        <controlURL>/ctl/rc</controlURL>
        <eventSubURL>/evt/rc</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
        <SCPDURL>/scpd/cm.xml</SCPDURL>
        <controlURL>/ctl/cm</controlURL>
        <eventSubURL>/evt/cm</eventSubURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:AVTransport:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:AVTransport</serviceId>
        <SCPDURL>/scpd/avt.xml</SCPDURL>
        <controlURL>/ctl/avt</controlURL>
        <eventSubURL>/evt/avt</eventSubURL>
      </service>
    </serviceList>
  </device>
</root>"#;

    const BOTH_KINDS: &[DeviceKind] = &[DeviceKind::MediaServer, DeviceKind::MediaRenderer];

    #[test]
    fn renderer_description_parses_with_resolved_urls() {
        let device = Device::from_description(
            RENDERER_XML,
            "http://192.168.1.20:49152/description.xml",
            BOTH_KINDS,
        )
        .unwrap()
        .unwrap();

        assert_eq!(device.udn, "uuid:renderer-1");
        assert_eq!(device.kind, DeviceKind::MediaRenderer);
        assert_eq!(device.friendly_name, "Living Room Radio");
        assert_eq!(device.services.len(), 3);

        let avt = device.service(ServiceKind::AVTransport).unwrap();
        assert_eq!(avt.control_url, "http://192.168.1.20:49152/ctl/avt");
        assert_eq!(avt.event_subscription_url, "http://192.168.1.20:49152/evt/avt");
        assert_eq!(avt.version, 1);
        assert_eq!(
            device.presentation_url.as_deref(),
            Some("http://192.168.1.20:49152/web/")
        );
    }

    #[test]
    fn url_base_overrides_location_for_resolution() {
        let xml = RENDERER_XML.replace(
            "<device>",
            "<URLBase>http://10.0.0.9:8080/dev/</URLBase><device>",
        );
        let device = Device::from_description(&xml, "http://192.168.1.20:49152/d.xml", BOTH_KINDS)
            .unwrap()
            .unwrap();
        let rc = device.service(ServiceKind::RenderingControl).unwrap();
        assert_eq!(rc.control_url, "http://10.0.0.9:8080/ctl/rc");
    }

    #[test]
    fn renderer_without_connection_manager_is_discarded() {
        let xml = RENDERER_XML.replace("ConnectionManager", "Unrelated");
        let device =
            Device::from_description(&xml, "http://192.168.1.20:49152/d.xml", BOTH_KINDS).unwrap();
        assert!(device.is_none());
    }

    #[test]
    fn server_requires_content_directory() {
        let xml = r#"<root>
          <device>
            <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
            <friendlyName>NAS</friendlyName>
            <UDN>uuid:server-1</UDN>
            <serviceList>
              <service>
                <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
                <serviceId>cm</serviceId>
                <SCPDURL>/cm.xml</SCPDURL>
                <controlURL>/cm</controlURL>
                <eventSubURL>/cmev</eventSubURL>
              </service>
            </serviceList>
          </device>
        </root>"#;
        let device =
            Device::from_description(xml, "http://192.168.1.30:8200/d.xml", BOTH_KINDS).unwrap();
        assert!(device.is_none());
    }

    #[test]
    fn untargeted_kind_is_ignored() {
        let device = Device::from_description(
            RENDERER_XML,
            "http://192.168.1.20:49152/d.xml",
            &[DeviceKind::MediaServer],
        )
        .unwrap();
        assert!(device.is_none());
    }

    #[test]
    fn malformed_description_is_an_error() {
        assert!(Device::from_description("<root><device>", "http://x/d.xml", BOTH_KINDS).is_err());
    }

    #[test]
    fn device_kind_urn_round_trip() {
        assert_eq!(
            DeviceKind::from_urn(DeviceKind::MediaServer.urn()),
            Some(DeviceKind::MediaServer)
        );
        assert_eq!(
            DeviceKind::from_urn("urn:schemas-upnp-org:device:MediaRenderer:2"),
            Some(DeviceKind::MediaRenderer)
        );
        assert_eq!(DeviceKind::from_urn("urn:schemas-upnp-org:device:Basic:1"), None);
        assert_eq!(DeviceKind::from_urn("upnp:rootdevice"), None);
    }

    #[test]
    fn service_kind_urn_round_trip() {
        let (kind, version) =
            ServiceKind::from_urn("urn:schemas-upnp-org:service:ContentDirectory:1").unwrap();
        assert_eq!(kind, ServiceKind::ContentDirectory);
        assert_eq!(version, 1);
        assert_eq!(kind.urn(version), "urn:schemas-upnp-org:service:ContentDirectory:1");
        assert!(ServiceKind::from_urn("urn:schemas-upnp-org:service:Scheduler:1").is_none());
    }
}
