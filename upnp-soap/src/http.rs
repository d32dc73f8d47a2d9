//! Thin async HTTP client: GET, POST and the GENA subscription verbs.

use std::time::Duration;

use reqwest::Method;
use tracing::debug;

use crate::error::SoapError;

/// Default per-request timeout for GET/POST.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A plain HTTP response: status code and body text.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Outcome of a SUBSCRIBE or renewal request.
#[derive(Debug, Clone)]
pub struct SubscriptionResponse {
    /// Subscription ID granted by the publisher.
    pub sid: String,
    /// Granted timeout in seconds. `0` means the publisher granted an
    /// infinite subscription and no renewal is needed.
    pub timeout_seconds: u32,
}

/// Async HTTP client wrapping a shared connection pool.
///
/// Statuses outside {200, 206} surface as [`SoapError::Http`]; elapsed
/// deadlines surface as [`SoapError::Timeout`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self, SoapError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a client with a non-default per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, SoapError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SoapError::Network(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    /// Fetch a document (device descriptions, SCPDs).
    pub async fn get(&self, url: &str) -> Result<HttpResponse, SoapError> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        check_status(status, &body)?;
        Ok(HttpResponse { status, body })
    }

    /// POST a body with the given content type and extra headers.
    ///
    /// Unlike [`SoapClient::send`](crate::SoapClient::send) this rejects every
    /// status outside {200, 206}; the SOAP layer handles 500 itself.
    pub async fn post(
        &self,
        url: &str,
        content_type: &str,
        body: String,
        extra_headers: &[(&str, &str)],
    ) -> Result<HttpResponse, SoapError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", content_type)
            .body(body);
        for (name, value) in extra_headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        check_status(status, &body)?;
        Ok(HttpResponse { status, body })
    }

    /// POST without status filtering; used by the SOAP layer which needs to
    /// look inside 500 responses.
    pub(crate) async fn post_raw(
        &self,
        url: &str,
        content_type: &str,
        body: String,
        extra_headers: &[(&str, String)],
    ) -> Result<HttpResponse, SoapError> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", content_type)
            .body(body);
        for (name, value) in extra_headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }

    /// Open an event subscription.
    ///
    /// Sends `SUBSCRIBE` with `CALLBACK: <url>`, `NT: upnp:event` and
    /// `TIMEOUT: Second-N`; on success the publisher answers with a `SID`
    /// and the timeout it actually granted.
    pub async fn subscribe(
        &self,
        url: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        let response = self
            .client
            .request(subscribe_method()?, url)
            .header("CALLBACK", format!("<{callback_url}>"))
            .header("NT", "upnp:event")
            .header("TIMEOUT", format!("Second-{timeout_seconds}"))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 && status != 206 {
            return Err(SoapError::Http {
                status,
                reason: "SUBSCRIBE rejected".to_string(),
            });
        }

        let sid = response
            .headers()
            .get("SID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| SoapError::Unexpected("missing SID header".to_string()))?
            .to_string();
        let timeout_seconds = granted_timeout(&response, timeout_seconds);
        debug!(sid, timeout_seconds, "subscription accepted");

        Ok(SubscriptionResponse {
            sid,
            timeout_seconds,
        })
    }

    /// Renew an existing subscription: `SUBSCRIBE` with only `SID` and
    /// `TIMEOUT` set (no `CALLBACK`/`NT`).
    pub async fn renew(
        &self,
        url: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        let response = self
            .client
            .request(subscribe_method()?, url)
            .header("SID", sid)
            .header("TIMEOUT", format!("Second-{timeout_seconds}"))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 && status != 206 {
            return Err(SoapError::Http {
                status,
                reason: "renewal rejected".to_string(),
            });
        }

        let timeout_seconds = granted_timeout(&response, timeout_seconds);
        Ok(SubscriptionResponse {
            sid: sid.to_string(),
            timeout_seconds,
        })
    }

    /// Cancel a subscription. Returns the response status.
    pub async fn unsubscribe(&self, url: &str, sid: &str) -> Result<u16, SoapError> {
        let method = Method::from_bytes(b"UNSUBSCRIBE")
            .map_err(|e| SoapError::Unexpected(e.to_string()))?;
        let response = self
            .client
            .request(method, url)
            .header("SID", sid)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 && status != 206 {
            return Err(SoapError::Http {
                status,
                reason: "UNSUBSCRIBE rejected".to_string(),
            });
        }
        Ok(status)
    }
}

fn subscribe_method() -> Result<Method, SoapError> {
    Method::from_bytes(b"SUBSCRIBE").map_err(|e| SoapError::Unexpected(e.to_string()))
}

fn check_status(status: u16, body: &str) -> Result<(), SoapError> {
    if status == 200 || status == 206 {
        Ok(())
    } else {
        let reason = body.lines().next().unwrap_or("").chars().take(120).collect();
        Err(SoapError::Http { status, reason })
    }
}

fn granted_timeout(response: &reqwest::Response, requested: u32) -> u32 {
    response
        .headers()
        .get("TIMEOUT")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_timeout_header)
        .unwrap_or(requested)
}

/// Parse a `TIMEOUT: Second-N` header value. `Second-infinite` maps to 0,
/// meaning the subscription never needs renewal.
pub(crate) fn parse_timeout_header(value: &str) -> Option<u32> {
    let rest = value.trim().strip_prefix("Second-")?;
    if rest.eq_ignore_ascii_case("infinite") {
        Some(0)
    } else {
        rest.parse().ok()
    }
}
