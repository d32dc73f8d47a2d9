//! End-to-end NOTIFY handling over a real listener.

use std::net::{IpAddr, Ipv4Addr};

use gena_server::GenaServer;
use tokio::sync::mpsc;

const PROPERTY_SET: &str = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property><LastChange>&lt;Event&gt;&lt;InstanceID val="0"&gt;&lt;TransportState val="PLAYING"/&gt;&lt;/InstanceID&gt;&lt;/Event&gt;</LastChange></e:property>
</e:propertyset>"#;

async fn start_server() -> GenaServer {
    GenaServer::start(IpAddr::V4(Ipv4Addr::LOCALHOST), (41400, 41500))
        .await
        .expect("server should start on a loopback port")
}

async fn notify(
    url: &str,
    sid: Option<&str>,
    nt: Option<&str>,
    nts: Option<&str>,
    seq: Option<&str>,
) -> u16 {
    let client = reqwest::Client::new();
    let mut request = client.request(
        reqwest::Method::from_bytes(b"NOTIFY").unwrap(),
        url,
    );
    for (name, value) in [("SID", sid), ("NT", nt), ("NTS", nts), ("SEQ", seq)] {
        if let Some(value) = value {
            request = request.header(name, value);
        }
    }
    request
        .body(PROPERTY_SET)
        .send()
        .await
        .unwrap()
        .status()
        .as_u16()
}

#[tokio::test]
async fn registered_sid_receives_event_and_200() {
    let server = start_server().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    server.router().register("uuid:sub-42".to_string(), tx).await;

    let status = notify(
        server.callback_url(),
        Some("uuid:sub-42"),
        Some("upnp:event"),
        Some("upnp:propchange"),
        Some("0"),
    )
    .await;
    assert_eq!(status, 200);

    let event = rx.recv().await.unwrap();
    assert_eq!(event.sid, "uuid:sub-42");
    assert_eq!(event.seq, 0);
    assert!(event.body.contains("LastChange"));

    server.stop().await;
}

#[tokio::test]
async fn unknown_sid_gets_412() {
    let server = start_server().await;

    let status = notify(
        server.callback_url(),
        Some("uuid:never-registered"),
        Some("upnp:event"),
        Some("upnp:propchange"),
        Some("1"),
    )
    .await;
    assert_eq!(status, 412);

    server.stop().await;
}

#[tokio::test]
async fn malformed_headers_get_400() {
    let server = start_server().await;
    let (tx, _rx) = mpsc::unbounded_channel();
    server.router().register("uuid:sub-1".to_string(), tx).await;

    // missing SID
    let status = notify(
        server.callback_url(),
        None,
        Some("upnp:event"),
        Some("upnp:propchange"),
        Some("0"),
    )
    .await;
    assert_eq!(status, 400);

    // wrong NTS
    let status = notify(
        server.callback_url(),
        Some("uuid:sub-1"),
        Some("upnp:event"),
        Some("upnp:subscribe"),
        Some("0"),
    )
    .await;
    assert_eq!(status, 400);

    // non-numeric SEQ
    let status = notify(
        server.callback_url(),
        Some("uuid:sub-1"),
        Some("upnp:event"),
        Some("upnp:propchange"),
        Some("first"),
    )
    .await;
    assert_eq!(status, 400);

    server.stop().await;
}

#[tokio::test]
async fn events_for_one_sid_arrive_in_wire_order() {
    let server = start_server().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    server.router().register("uuid:ordered".to_string(), tx).await;

    for seq in 0..5 {
        let status = notify(
            server.callback_url(),
            Some("uuid:ordered"),
            Some("upnp:event"),
            Some("upnp:propchange"),
            Some(&seq.to_string()),
        )
        .await;
        assert_eq!(status, 200);
    }

    for expected in 0..5 {
        assert_eq!(rx.recv().await.unwrap().seq, expected);
    }

    server.stop().await;
}

#[tokio::test]
async fn unregistered_sid_stops_receiving() {
    let server = start_server().await;
    let (tx, _rx) = mpsc::unbounded_channel();
    server.router().register("uuid:gone".to_string(), tx).await;
    server.router().unregister("uuid:gone").await;

    let status = notify(
        server.callback_url(),
        Some("uuid:gone"),
        Some("upnp:event"),
        Some("upnp:propchange"),
        Some("2"),
    )
    .await;
    assert_eq!(status, 412);

    server.stop().await;
}
