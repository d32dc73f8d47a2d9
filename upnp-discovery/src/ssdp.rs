//! SSDP multicast listener and M-SEARCH sender.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::DiscoveryError;

/// The SSDP multicast group.
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
/// The SSDP port.
pub const SSDP_PORT: u16 = 1900;

/// Presence information extracted from an announcement or search response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsdpInfo {
    /// Device identity: the `uuid:...` part of the USN.
    pub udn: String,
    /// Device type URN when the announcement concerns a device.
    pub device_type: Option<String>,
    /// Service type URN when the announcement concerns a service.
    pub service_type: Option<String>,
    /// Description URL (empty on bye-bye).
    pub location: String,
    /// `CACHE-CONTROL: max-age` (0 on bye-bye).
    pub expiration_seconds: u32,
}

/// Presence events emitted by the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SsdpEvent {
    Alive(SsdpInfo),
    ByeBye(SsdpInfo),
}

/// Multicast listener plus active search.
///
/// All datagrams arriving on the socket are parsed on a background task;
/// whatever parses becomes a broadcast [`SsdpEvent`], everything else is
/// logged and dropped. A parse failure never tears down the socket.
pub struct SsdpClient {
    socket: Arc<UdpSocket>,
    events: broadcast::Sender<SsdpEvent>,
    listener: JoinHandle<()>,
}

impl SsdpClient {
    /// Open the UDP socket on `port` and join the SSDP multicast group on
    /// `bind_interface`. Fails with [`DiscoveryError::Network`] when the
    /// join is refused.
    pub async fn start(bind_interface: Ipv4Addr, port: u16) -> Result<Self, DiscoveryError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port)).into())?;
        socket
            .join_multicast_v4(&SSDP_MULTICAST_ADDR, &bind_interface)
            .map_err(|e| DiscoveryError::Network(format!("multicast join failed: {e}")))?;
        socket.set_multicast_loop_v4(true)?;
        socket.set_nonblocking(true)?;

        let socket = Arc::new(UdpSocket::from_std(socket.into())?);
        let (events, _) = broadcast::channel(64);

        let listener = tokio::spawn(Self::listen(socket.clone(), events.clone()));

        Ok(Self {
            socket,
            events,
            listener,
        })
    }

    /// Subscribe to presence events.
    pub fn events(&self) -> broadcast::Receiver<SsdpEvent> {
        self.events.subscribe()
    }

    /// Emit one `M-SEARCH` for `target`. Responses arrive as
    /// [`SsdpEvent::Alive`] on the event channel.
    pub async fn search(&self, target: &str, mx_seconds: u32) -> Result<(), DiscoveryError> {
        let mx = mx_seconds.clamp(1, 5);
        let request = format!(
            "M-SEARCH * HTTP/1.1\r\n\
             HOST: {SSDP_MULTICAST_ADDR}:{SSDP_PORT}\r\n\
             MAN: \"ssdp:discover\"\r\n\
             MX: {mx}\r\n\
             ST: {target}\r\n\
             \r\n"
        );
        self.socket
            .send_to(
                request.as_bytes(),
                SocketAddr::V4(SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT)),
            )
            .await?;
        Ok(())
    }

    /// Stop the listener and close the socket.
    pub fn stop(self) {
        self.listener.abort();
    }

    async fn listen(socket: Arc<UdpSocket>, events: broadcast::Sender<SsdpEvent>) {
        let mut buffer = [0u8; 2048];
        loop {
            let (size, source) = match socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("SSDP receive failed: {e}");
                    continue;
                }
            };
            let Ok(text) = std::str::from_utf8(&buffer[..size]) else {
                debug!(%source, "non-UTF8 SSDP datagram dropped");
                continue;
            };
            match parse_message(text) {
                Some(event) => {
                    // no receivers is fine; discovery may not have started yet
                    let _ = events.send(event);
                }
                None => {
                    debug!(%source, "unparsable SSDP datagram dropped");
                }
            }
        }
    }
}

/// Classify and parse one SSDP datagram.
///
/// - `NOTIFY * HTTP/1.1` → spontaneous announcement, alive or bye-bye per
///   the `NTS` header.
/// - `HTTP/1.1 200 OK` → response to our own search; implicitly alive.
/// - `M-SEARCH * HTTP/1.1` → a peer's search; ignored.
fn parse_message(text: &str) -> Option<SsdpEvent> {
    let mut lines = text.lines();
    let request_line = lines.next()?.trim();

    if request_line.eq_ignore_ascii_case("M-SEARCH * HTTP/1.1") {
        return None;
    }

    let is_notify = request_line.eq_ignore_ascii_case("NOTIFY * HTTP/1.1");
    let is_response = request_line
        .to_ascii_uppercase()
        .starts_with("HTTP/1.1 200");
    if !is_notify && !is_response {
        return None;
    }

    let mut nts = None;
    let mut usn = None;
    let mut notification_type = None;
    let mut location = None;
    let mut max_age = None;

    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_uppercase().as_str() {
            "NTS" => nts = Some(value.to_string()),
            "USN" => usn = Some(value.to_string()),
            "NT" | "ST" => notification_type = Some(value.to_string()),
            "LOCATION" => location = Some(value.to_string()),
            "CACHE-CONTROL" => max_age = parse_max_age(value),
            _ => {}
        }
    }

    let usn = usn?;
    let udn = udn_from_usn(&usn)?;
    let notification_type = notification_type.unwrap_or_else(|| usn_suffix(&usn));

    let (device_type, service_type) = classify_type(&notification_type);

    if is_notify {
        match nts.as_deref() {
            Some("ssdp:alive") => Some(SsdpEvent::Alive(SsdpInfo {
                udn,
                device_type,
                service_type,
                location: location?,
                expiration_seconds: max_age?,
            })),
            Some("ssdp:byebye") => Some(SsdpEvent::ByeBye(SsdpInfo {
                udn,
                device_type,
                service_type,
                location: String::new(),
                expiration_seconds: 0,
            })),
            _ => None,
        }
    } else {
        // search responses carry no NTS and are implicitly alive
        Some(SsdpEvent::Alive(SsdpInfo {
            udn,
            device_type,
            service_type,
            location: location?,
            expiration_seconds: max_age?,
        }))
    }
}

/// Extract the `uuid:...` identity from `uuid:<uuid>[::<type>]`.
fn udn_from_usn(usn: &str) -> Option<String> {
    if !usn.starts_with("uuid:") {
        return None;
    }
    let udn = usn.split("::").next().unwrap_or(usn);
    if udn.len() > "uuid:".len() {
        Some(udn.to_string())
    } else {
        None
    }
}

fn usn_suffix(usn: &str) -> String {
    usn.split_once("::").map(|(_, s)| s.to_string()).unwrap_or_default()
}

fn classify_type(nt: &str) -> (Option<String>, Option<String>) {
    if nt.contains(":device:") {
        (Some(nt.to_string()), None)
    } else if nt.contains(":service:") {
        (None, Some(nt.to_string()))
    } else {
        (None, None)
    }
}

fn parse_max_age(cache_control: &str) -> Option<u32> {
    cache_control.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age")?
            .trim_start()
            .strip_prefix('=')?
            .trim()
            .parse()
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const ALIVE: &str = "NOTIFY * HTTP/1.1\r\n\
        HOST: 239.255.255.250:1900\r\n\
        CACHE-CONTROL: max-age=1800\r\n\
        LOCATION: http://192.168.1.20:49152/description.xml\r\n\
        NT: urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
        NTS: ssdp:alive\r\n\
        SERVER: Linux/5.4 UPnP/1.0 Renderer/1.0\r\n\
        USN: uuid:renderer-1::urn:schemas-upnp-org:device:MediaRenderer:1\r\n\
        \r\n";

    #[test]
    fn alive_notification_parses() {
        let event = parse_message(ALIVE).unwrap();
        let SsdpEvent::Alive(info) = event else {
            panic!("expected alive");
        };
        assert_eq!(info.udn, "uuid:renderer-1");
        assert_eq!(
            info.device_type.as_deref(),
            Some("urn:schemas-upnp-org:device:MediaRenderer:1")
        );
        assert_eq!(info.service_type, None);
        assert_eq!(info.location, "http://192.168.1.20:49152/description.xml");
        assert_eq!(info.expiration_seconds, 1800);
    }

    #[test]
    fn byebye_notification_parses_without_location() {
        let text = "NOTIFY * HTTP/1.1\r\n\
            HOST: 239.255.255.250:1900\r\n\
            NT: urn:schemas-upnp-org:device:MediaServer:1\r\n\
            NTS: ssdp:byebye\r\n\
            USN: uuid:server-9::urn:schemas-upnp-org:device:MediaServer:1\r\n\
            \r\n";
        let event = parse_message(text).unwrap();
        let SsdpEvent::ByeBye(info) = event else {
            panic!("expected byebye");
        };
        assert_eq!(info.udn, "uuid:server-9");
        assert_eq!(info.expiration_seconds, 0);
        assert!(info.location.is_empty());
    }

    #[test]
    fn search_response_is_implicitly_alive() {
        let text = "HTTP/1.1 200 OK\r\n\
            CACHE-CONTROL: max-age=120\r\n\
            LOCATION: http://192.168.1.30:8200/rootDesc.xml\r\n\
            ST: urn:schemas-upnp-org:device:MediaServer:1\r\n\
            USN: uuid:server-2::urn:schemas-upnp-org:device:MediaServer:1\r\n\
            \r\n";
        let event = parse_message(text).unwrap();
        let SsdpEvent::Alive(info) = event else {
            panic!("expected alive");
        };
        assert_eq!(info.udn, "uuid:server-2");
        assert_eq!(info.expiration_seconds, 120);
    }

    #[test]
    fn peer_searches_are_ignored() {
        let text = "M-SEARCH * HTTP/1.1\r\n\
            HOST: 239.255.255.250:1900\r\n\
            MAN: \"ssdp:discover\"\r\n\
            MX: 2\r\n\
            ST: ssdp:all\r\n\
            \r\n";
        assert!(parse_message(text).is_none());
    }

    #[rstest]
    #[case::missing_location("NOTIFY * HTTP/1.1\r\nNTS: ssdp:alive\r\nUSN: uuid:x-1\r\nCACHE-CONTROL: max-age=5\r\n\r\n")]
    #[case::missing_cache_control("NOTIFY * HTTP/1.1\r\nNTS: ssdp:alive\r\nUSN: uuid:x-1\r\nLOCATION: http://x/\r\n\r\n")]
    #[case::missing_usn("NOTIFY * HTTP/1.1\r\nNTS: ssdp:alive\r\nLOCATION: http://x/\r\nCACHE-CONTROL: max-age=5\r\n\r\n")]
    #[case::bad_nts("NOTIFY * HTTP/1.1\r\nNTS: ssdp:update\r\nUSN: uuid:x-1\r\nLOCATION: http://x/\r\nCACHE-CONTROL: max-age=5\r\n\r\n")]
    #[case::garbage("not even http\r\n\r\n")]
    fn malformed_messages_are_dropped(#[case] text: &str) {
        assert!(parse_message(text).is_none());
    }

    #[test]
    fn service_announcements_classify_as_service() {
        let text = "NOTIFY * HTTP/1.1\r\n\
            CACHE-CONTROL: max-age=1800\r\n\
            LOCATION: http://192.168.1.20:49152/description.xml\r\n\
            NT: urn:schemas-upnp-org:service:AVTransport:1\r\n\
            NTS: ssdp:alive\r\n\
            USN: uuid:renderer-1::urn:schemas-upnp-org:service:AVTransport:1\r\n\
            \r\n";
        let SsdpEvent::Alive(info) = parse_message(text).unwrap() else {
            panic!("expected alive");
        };
        assert_eq!(info.device_type, None);
        assert_eq!(
            info.service_type.as_deref(),
            Some("urn:schemas-upnp-org:service:AVTransport:1")
        );
    }

    #[test]
    fn usn_identity_extraction() {
        assert_eq!(udn_from_usn("uuid:abc"), Some("uuid:abc".to_string()));
        assert_eq!(
            udn_from_usn("uuid:abc::urn:schemas-upnp-org:device:MediaServer:1"),
            Some("uuid:abc".to_string())
        );
        assert_eq!(udn_from_usn("abc"), None);
        assert_eq!(udn_from_usn("uuid:"), None);
    }

    #[test]
    fn max_age_parsing_tolerates_extra_directives() {
        assert_eq!(parse_max_age("max-age=1800"), Some(1800));
        assert_eq!(parse_max_age("no-cache, max-age = 60"), Some(60));
        assert_eq!(parse_max_age("no-cache"), None);
        assert_eq!(parse_max_age("max-age=soon"), None);
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let text = "NOTIFY * HTTP/1.1\r\n\
            cache-control: max-age=900\r\n\
            location: http://192.168.1.7/d.xml\r\n\
            nt: urn:schemas-upnp-org:device:MediaServer:1\r\n\
            nts: ssdp:alive\r\n\
            usn: uuid:lower-1\r\n\
            \r\n";
        let SsdpEvent::Alive(info) = parse_message(text).unwrap() else {
            panic!("expected alive");
        };
        assert_eq!(info.udn, "uuid:lower-1");
        assert_eq!(info.expiration_seconds, 900);
    }
}
