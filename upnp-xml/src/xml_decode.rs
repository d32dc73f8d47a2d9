//! Namespace-stripping pre-pass for serde deserialization.
//!
//! UPnP documents mix several namespace prefixes (`e:`, `dc:`, `upnp:`,
//! `dlna:`, …). Rewriting every element and attribute to its local name
//! before deserializing keeps the serde struct definitions flat: one rename
//! per field instead of a namespace-aware derive.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::de::DeserializeOwned;

use crate::error::ParseError;

/// Deserialize `xml` into `T` after stripping namespace prefixes.
pub fn from_str<T: DeserializeOwned>(xml: &str) -> Result<T, ParseError> {
    let stripped = strip_namespaces(xml)?;
    quick_xml::de::from_str(&stripped).map_err(|e| ParseError::Malformed(e.to_string()))
}

/// Rewrite a document so that every element and attribute carries its local
/// name only; `xmlns` and `xmlns:*` declarations are dropped entirely.
///
/// Text content passes through untouched, so nested escaped documents (the
/// `LastChange` payload) survive the rewrite byte for byte.
pub fn strip_namespaces(xml: &str) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());

    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let stripped = strip_element(&e)?;
                writer
                    .write_event(Event::Start(stripped))
                    .map_err(|e| ParseError::Malformed(e.to_string()))?;
            }
            Ok(Event::Empty(e)) => {
                let stripped = strip_element(&e)?;
                writer
                    .write_event(Event::Empty(stripped))
                    .map_err(|e| ParseError::Malformed(e.to_string()))?;
            }
            Ok(Event::End(e)) => {
                let local = local_str(e.name().local_name().as_ref())?;
                writer
                    .write_event(Event::End(BytesEnd::new(local)))
                    .map_err(|e| ParseError::Malformed(e.to_string()))?;
            }
            Ok(other) => {
                writer
                    .write_event(other)
                    .map_err(|e| ParseError::Malformed(e.to_string()))?;
            }
            Err(e) => return Err(ParseError::Malformed(e.to_string())),
        }
    }

    String::from_utf8(writer.into_inner())
        .map_err(|e| ParseError::Malformed(e.to_string()))
}

fn strip_element(e: &BytesStart<'_>) -> Result<BytesStart<'static>, ParseError> {
    let local = local_str(e.name().local_name().as_ref())?;
    let mut out = BytesStart::new(local);

    for attr in e.attributes() {
        let attr = attr.map_err(|e| ParseError::Malformed(e.to_string()))?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let key = local_str(attr.key.local_name().as_ref())?;
        let value = std::str::from_utf8(attr.value.as_ref())
            .map_err(|e| ParseError::Malformed(e.to_string()))?
            .to_string();
        out.push_attribute((key.as_str(), value.as_str()));
    }

    Ok(out)
}

fn local_str(bytes: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| ParseError::Malformed(e.to_string()))
}
