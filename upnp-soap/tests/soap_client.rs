//! Wire-level tests for the SOAP and GENA verbs against a mock HTTP server.

use upnp_soap::{Action, HttpClient, SoapClient, SoapError};

fn soap_client() -> SoapClient {
    SoapClient::new(HttpClient::new().unwrap())
}

#[tokio::test]
async fn play_action_posts_expected_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/ctl/AVTransport")
        .match_header(
            "SOAPACTION",
            "\"urn:schemas-upnp-org:service:AVTransport:1#Play\"",
        )
        .match_header("Content-Type", "text/xml; charset=\"utf-8\"")
        .match_body(mockito::Matcher::Regex(
            "<u:Play xmlns:u=\"urn:schemas-upnp-org:service:AVTransport:1\">\
             <InstanceID>0</InstanceID><Speed>2</Speed></u:Play>"
                .to_string(),
        ))
        .with_status(200)
        .with_body(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
              <s:Body><u:PlayResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1"/></s:Body>
            </s:Envelope>"#,
        )
        .create_async()
        .await;

    let mut action = Action::new(
        "Play",
        &format!("{}/ctl/AVTransport", server.url()),
        "urn:schemas-upnp-org:service:AVTransport:1",
    );
    action.add_argument("InstanceID", "0");
    action.add_argument("Speed", "2");

    let result = soap_client().send(&action).await.unwrap();
    assert_eq!(result.status, 200);
    assert!(result.fault.is_none());
    assert!(result.response_element("Play").is_ok());

    mock.assert_async().await;
}

#[tokio::test]
async fn http_500_with_upnp_error_surfaces_as_fault() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/ctl/AVTransport")
        .with_status(500)
        .with_body(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
              <s:Body><s:Fault>
                <faultcode>s:Client</faultcode>
                <faultstring>UPnPError</faultstring>
                <detail>
                  <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                    <errorCode>718</errorCode>
                    <errorDescription>ConflictInMappingEntry</errorDescription>
                  </UPnPError>
                </detail>
              </s:Fault></s:Body>
            </s:Envelope>"#,
        )
        .create_async()
        .await;

    let action = Action::new(
        "SetAVTransportURI",
        &format!("{}/ctl/AVTransport", server.url()),
        "urn:schemas-upnp-org:service:AVTransport:1",
    );

    let result = soap_client().send(&action).await.unwrap();
    assert_eq!(result.status, 500);
    let fault = result.fault.unwrap();
    assert_eq!(fault.code, 718);
    assert_eq!(fault.description, "ConflictInMappingEntry");
}

#[tokio::test]
async fn http_500_without_upnp_error_is_protocol_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/ctl")
        .with_status(500)
        .with_body("<html>internal error</html>")
        .create_async()
        .await;

    let action = Action::new(
        "Play",
        &format!("{}/ctl", server.url()),
        "urn:schemas-upnp-org:service:AVTransport:1",
    );

    assert!(matches!(
        soap_client().send(&action).await,
        Err(SoapError::Unexpected(_))
    ));
}

#[tokio::test]
async fn unexpected_status_is_http_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/ctl")
        .with_status(403)
        .create_async()
        .await;

    let action = Action::new(
        "Play",
        &format!("{}/ctl", server.url()),
        "urn:schemas-upnp-org:service:AVTransport:1",
    );

    assert!(matches!(
        soap_client().send(&action).await,
        Err(SoapError::Http { status: 403, .. })
    ));
}

#[tokio::test]
async fn subscribe_parses_sid_and_granted_timeout() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("SUBSCRIBE", "/event/AVTransport")
        .match_header("NT", "upnp:event")
        .match_header("TIMEOUT", "Second-1801")
        .match_header(
            "CALLBACK",
            "<http://192.168.1.50:3400/event>",
        )
        .with_status(200)
        .with_header("SID", "uuid:sub-1234")
        .with_header("TIMEOUT", "Second-1800")
        .create_async()
        .await;

    let http = HttpClient::new().unwrap();
    let response = http
        .subscribe(
            &format!("{}/event/AVTransport", server.url()),
            "http://192.168.1.50:3400/event",
            1801,
        )
        .await
        .unwrap();

    assert_eq!(response.sid, "uuid:sub-1234");
    assert_eq!(response.timeout_seconds, 1800);
    mock.assert_async().await;
}

#[tokio::test]
async fn subscribe_without_sid_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("SUBSCRIBE", "/event")
        .with_status(200)
        .create_async()
        .await;

    let http = HttpClient::new().unwrap();
    let result = http
        .subscribe(&format!("{}/event", server.url()), "http://cb/", 1801)
        .await;
    assert!(matches!(result, Err(SoapError::Unexpected(_))));
}

#[tokio::test]
async fn renew_sends_only_sid_and_timeout() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("SUBSCRIBE", "/event")
        .match_header("SID", "uuid:sub-1234")
        .match_header("TIMEOUT", "Second-1801")
        .with_status(200)
        .with_header("SID", "uuid:sub-1234")
        .with_header("TIMEOUT", "Second-900")
        .create_async()
        .await;

    let http = HttpClient::new().unwrap();
    let response = http
        .renew(&format!("{}/event", server.url()), "uuid:sub-1234", 1801)
        .await
        .unwrap();

    assert_eq!(response.timeout_seconds, 900);
    mock.assert_async().await;
}

#[tokio::test]
async fn renew_rejection_surfaces_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("SUBSCRIBE", "/event")
        .with_status(412)
        .create_async()
        .await;

    let http = HttpClient::new().unwrap();
    let result = http
        .renew(&format!("{}/event", server.url()), "uuid:stale", 1801)
        .await;
    assert!(matches!(result, Err(SoapError::Http { status: 412, .. })));
}

#[tokio::test]
async fn unsubscribe_sends_sid() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("UNSUBSCRIBE", "/event")
        .match_header("SID", "uuid:sub-1234")
        .with_status(200)
        .create_async()
        .await;

    let http = HttpClient::new().unwrap();
    let status = http
        .unsubscribe(&format!("{}/event", server.url()), "uuid:sub-1234")
        .await
        .unwrap();
    assert_eq!(status, 200);
    mock.assert_async().await;
}
