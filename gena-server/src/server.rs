//! HTTP server accepting inbound `NOTIFY` requests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::Filter;

use crate::router::{EventNotification, EventRouter};

#[derive(Debug, Error)]
pub enum GenaServerError {
    #[error("no available port in range {0}-{1}")]
    NoAvailablePort(u16, u16),

    #[error("failed to detect a local IP address for the callback URL")]
    LocalIpDetection,

    #[error("server failed to start")]
    StartFailed,
}

/// The event callback endpoint.
///
/// Binds a port from the configured range, serves `/event`, and advertises
/// an externally addressable URL for `CALLBACK` headers. Dropping the server
/// does not stop it; call [`stop`](GenaServer::stop) to drain in-flight
/// requests and close the listener.
pub struct GenaServer {
    port: u16,
    callback_url: String,
    router: EventRouter,
    shutdown_tx: Option<mpsc::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl GenaServer {
    /// Start the server on the first free port of `port_range`.
    ///
    /// `bind_addr` selects the listening interface. For the unspecified
    /// address the callback URL advertises the outbound-route local IP
    /// instead, since `0.0.0.0` is not addressable by publishers.
    pub async fn start(
        bind_addr: IpAddr,
        port_range: (u16, u16),
    ) -> Result<Self, GenaServerError> {
        let port = find_available_port(bind_addr, port_range.0, port_range.1)
            .ok_or(GenaServerError::NoAvailablePort(port_range.0, port_range.1))?;

        let advertised_ip = if bind_addr.is_unspecified() {
            detect_local_ip().ok_or(GenaServerError::LocalIpDetection)?
        } else {
            bind_addr
        };
        let callback_url = format!("http://{advertised_ip}:{port}/event");

        let router = EventRouter::new();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(1);

        let route = notify_route(router.clone());
        let server_handle = tokio::spawn(async move {
            let (addr, server) = warp::serve(route).bind_with_graceful_shutdown(
                SocketAddr::new(bind_addr, port),
                async move {
                    shutdown_rx.recv().await;
                },
            );
            info!(%addr, "event server listening");
            let _ = ready_tx.send(()).await;
            server.await;
        });

        ready_rx.recv().await.ok_or(GenaServerError::StartFailed)?;

        Ok(Self {
            port,
            callback_url,
            router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// The URL to advertise in `CALLBACK` headers.
    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Drain in-flight requests and close the listener.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
    }
}

fn notify_route(
    router: EventRouter,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path("event")
        .and(warp::path::end())
        .and(warp::method())
        .and(warp::header::optional::<String>("sid"))
        .and(warp::header::optional::<String>("nt"))
        .and(warp::header::optional::<String>("nts"))
        .and(warp::header::optional::<String>("seq"))
        .and(warp::body::bytes())
        .and_then(
            move |method: warp::http::Method,
                  sid: Option<String>,
                  nt: Option<String>,
                  nts: Option<String>,
                  seq: Option<String>,
                  body: Bytes| {
                let router = router.clone();
                async move {
                    let status = handle_notify(&router, method, sid, nt, nts, seq, body).await;
                    Ok::<_, warp::Rejection>(warp::reply::with_status("", status))
                }
            },
        )
}

async fn handle_notify(
    router: &EventRouter,
    method: warp::http::Method,
    sid: Option<String>,
    nt: Option<String>,
    nts: Option<String>,
    seq: Option<String>,
    body: Bytes,
) -> StatusCode {
    if method.as_str() != "NOTIFY" {
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    let Some((sid, seq)) = validate_headers(sid, nt, nts, seq) else {
        warn!("notification with malformed GENA headers rejected");
        return StatusCode::BAD_REQUEST;
    };

    let notification = EventNotification {
        sid: sid.clone(),
        seq,
        body: String::from_utf8_lossy(&body).into_owned(),
    };

    if router.route(notification).await {
        StatusCode::OK
    } else {
        debug!(%sid, "notification for unknown subscription");
        StatusCode::PRECONDITION_FAILED
    }
}

/// Check the required GENA header set:
/// `SID`, `NT: upnp:event`, `NTS: upnp:propchange`, numeric `SEQ`.
fn validate_headers(
    sid: Option<String>,
    nt: Option<String>,
    nts: Option<String>,
    seq: Option<String>,
) -> Option<(String, u32)> {
    let sid = sid.filter(|s| !s.is_empty())?;
    if nt.as_deref() != Some("upnp:event") {
        return None;
    }
    if nts.as_deref() != Some("upnp:propchange") {
        return None;
    }
    let seq = seq?.trim().parse().ok()?;
    Some((sid, seq))
}

fn find_available_port(addr: IpAddr, start: u16, end: u16) -> Option<u16> {
    (start..=end).find(|&port| TcpListener::bind(SocketAddr::new(addr, port)).is_ok())
}

/// Determine the local IP used for outbound traffic. No packet is sent; the
/// connect only fixes the routing decision.
fn detect_local_ip() -> Option<IpAddr> {
    let socket = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    Some(socket.local_addr().ok()?.ip())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(
        sid: &str,
        nt: &str,
        nts: &str,
        seq: &str,
    ) -> (Option<String>, Option<String>, Option<String>, Option<String>) {
        (
            Some(sid.to_string()),
            Some(nt.to_string()),
            Some(nts.to_string()),
            Some(seq.to_string()),
        )
    }

    #[test]
    fn header_validation_accepts_conforming_set() {
        let (sid, nt, nts, seq) = headers("uuid:s", "upnp:event", "upnp:propchange", "3");
        assert_eq!(
            validate_headers(sid, nt, nts, seq),
            Some(("uuid:s".to_string(), 3))
        );
    }

    #[test]
    fn header_validation_rejects_missing_or_wrong_values() {
        let (_, nt, nts, seq) = headers("x", "upnp:event", "upnp:propchange", "0");
        assert_eq!(validate_headers(None, nt, nts, seq), None);

        let (sid, _, nts, seq) = headers("uuid:s", "x", "upnp:propchange", "0");
        assert_eq!(validate_headers(sid, Some("wrong".into()), nts, seq), None);

        let (sid, nt, _, seq) = headers("uuid:s", "upnp:event", "x", "0");
        assert_eq!(validate_headers(sid, nt, Some("wrong".into()), seq), None);

        let (sid, nt, nts, _) = headers("uuid:s", "upnp:event", "upnp:propchange", "0");
        assert_eq!(validate_headers(sid.clone(), nt.clone(), nts.clone(), None), None);
        assert_eq!(
            validate_headers(sid, nt, nts, Some("not-a-number".into())),
            None
        );
    }

    #[test]
    fn port_probe_finds_a_port() {
        let port = find_available_port(IpAddr::V4(Ipv4Addr::LOCALHOST), 53000, 53100);
        assert!(port.is_some());
        let port = port.unwrap();
        assert!((53000..=53100).contains(&port));
    }

    #[test]
    fn port_probe_skips_taken_ports() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let taken = listener.local_addr().unwrap().port();
        assert_eq!(
            find_available_port(IpAddr::V4(Ipv4Addr::LOCALHOST), taken, taken),
            None
        );
    }
}
