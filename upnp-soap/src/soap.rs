//! SOAP 1.1 envelope construction and response/fault parsing.

use xmltree::Element;

use crate::error::SoapError;
use crate::http::HttpClient;

/// A UPnP action bound to a control URL, with ordered named arguments.
#[derive(Debug, Clone)]
pub struct Action {
    name: String,
    control_url: String,
    service_urn: String,
    arguments: Vec<(String, String)>,
}

impl Action {
    /// `service_urn` is the full service type URN,
    /// e.g. `urn:schemas-upnp-org:service:AVTransport:1`.
    pub fn new(name: &str, control_url: &str, service_urn: &str) -> Self {
        Self {
            name: name.to_string(),
            control_url: control_url.to_string(),
            service_urn: service_urn.to_string(),
            arguments: Vec::new(),
        }
    }

    /// Append an argument. Order is preserved on the wire.
    pub fn add_argument(&mut self, name: &str, value: impl Into<String>) {
        self.arguments.push((name.to_string(), value.into()));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn control_url(&self) -> &str {
        &self.control_url
    }

    /// The `SOAPACTION` header value (quotes included).
    pub fn soap_action(&self) -> String {
        format!("\"{}#{}\"", self.service_urn, self.name)
    }

    /// Serialize the full envelope. Argument values are entity-escaped.
    pub fn envelope(&self) -> String {
        let mut args = String::new();
        for (name, value) in &self.arguments {
            args.push('<');
            args.push_str(name);
            args.push('>');
            args.push_str(&escape_xml(value));
            args.push_str("</");
            args.push_str(name);
            args.push('>');
        }

        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
             <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
             s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">\
             <s:Body>\
             <u:{name} xmlns:u=\"{urn}\">{args}</u:{name}>\
             </s:Body>\
             </s:Envelope>",
            name = self.name,
            urn = self.service_urn,
            args = args,
        )
    }
}

/// A UPnP error carried inside an HTTP 500 fault body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub code: u32,
    pub description: String,
}

/// Result of dispatching an [`Action`].
///
/// `fault` is populated when the publisher answered HTTP 500 with a
/// well-formed `<UPnPError>` body; the raw body is kept either way so typed
/// clients can extract response arguments.
#[derive(Debug, Clone)]
pub struct ActionResult {
    pub status: u16,
    pub body: String,
    pub fault: Option<Fault>,
}

impl ActionResult {
    /// Extract the `<u:{Action}Response>` element from a successful result.
    pub fn response_element(&self, action_name: &str) -> Result<Element, SoapError> {
        let envelope = Element::parse(self.body.as_bytes())
            .map_err(|e| SoapError::Unexpected(format!("invalid response XML: {e}")))?;
        let body = envelope
            .get_child("Body")
            .ok_or_else(|| SoapError::Unexpected("missing SOAP Body".to_string()))?;
        let name = format!("{action_name}Response");
        body.get_child(name.as_str())
            .cloned()
            .ok_or_else(|| SoapError::Unexpected(format!("missing {name} element")))
    }
}

/// SOAP action dispatcher.
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: HttpClient,
}

impl SoapClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// POST the action to its control URL.
    ///
    /// - HTTP 200 yields an [`ActionResult`] without fault.
    /// - HTTP 500 with an `<s:Fault>` body containing `<UPnPError>` yields an
    ///   [`ActionResult`] with `fault` populated; a 500 without a recognisable
    ///   `<UPnPError>` is a protocol violation ([`SoapError::Unexpected`]).
    /// - Any other status is [`SoapError::Http`].
    pub async fn send(&self, action: &Action) -> Result<ActionResult, SoapError> {
        let headers = [("SOAPACTION", action.soap_action())];
        let response = self
            .http
            .post_raw(
                action.control_url(),
                "text/xml; charset=\"utf-8\"",
                action.envelope(),
                &headers,
            )
            .await?;

        match response.status {
            200 => Ok(ActionResult {
                status: response.status,
                body: response.body,
                fault: None,
            }),
            500 => {
                let fault = parse_fault(&response.body)?;
                Ok(ActionResult {
                    status: response.status,
                    body: response.body,
                    fault: Some(fault),
                })
            }
            status => Err(SoapError::Http {
                status,
                reason: format!("action {} rejected", action.name()),
            }),
        }
    }
}

/// Parse the `<UPnPError>` detail out of a fault body.
fn parse_fault(body: &str) -> Result<Fault, SoapError> {
    let envelope = Element::parse(body.as_bytes())
        .map_err(|e| SoapError::Unexpected(format!("invalid fault XML: {e}")))?;

    let upnp_error = envelope
        .get_child("Body")
        .and_then(|b| b.get_child("Fault"))
        .and_then(|f| f.get_child("detail"))
        .and_then(|d| d.get_child("UPnPError"))
        .ok_or_else(|| SoapError::Unexpected("fault body without UPnPError".to_string()))?;

    let code = upnp_error
        .get_child("errorCode")
        .and_then(|c| c.get_text())
        .and_then(|t| t.trim().parse().ok())
        .ok_or_else(|| SoapError::Unexpected("fault without numeric errorCode".to_string()))?;

    let description = upnp_error
        .get_child("errorDescription")
        .and_then(|d| d.get_text())
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    Ok(Fault { code, description })
}

/// Entity-escape the five XML special characters.
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
