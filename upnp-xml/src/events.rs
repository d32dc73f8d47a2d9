//! GENA event payload parsing.
//!
//! An inbound NOTIFY body is a small `<e:propertyset>` document whose
//! properties are raw name/value pairs. For AVTransport and
//! RenderingControl the interesting property is `LastChange`: its value is
//! a *string containing a second XML document* which aggregates per-instance
//! variable changes.

use tracing::warn;
use xmltree::{Element, XMLNode};

use crate::error::ParseError;

/// Variable changes for one `<InstanceID val="n">` block of a LastChange
/// document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceChanges {
    pub instance_id: u32,
    /// `(variable name, value)` pairs in document order.
    pub changes: Vec<(String, String)>,
}

/// Parse an `<e:propertyset>` body into `(name, value)` pairs.
///
/// Values are the text content of each property child; for `LastChange`
/// this text is itself an XML document (feed it to [`parse_last_change`]).
pub fn parse_property_set(xml: &str) -> Result<Vec<(String, String)>, ParseError> {
    let root = Element::parse(xml.as_bytes())
        .map_err(|e| ParseError::Malformed(e.to_string()))?;
    if root.name != "propertyset" {
        return Err(ParseError::Invalid(format!(
            "expected propertyset, got {}",
            root.name
        )));
    }

    let mut properties = Vec::new();
    for property in child_elements(&root) {
        if property.name != "property" {
            continue;
        }
        for variable in child_elements(property) {
            let value = variable
                .get_text()
                .map(|t| t.into_owned())
                .unwrap_or_default();
            properties.push((variable.name.clone(), value));
        }
    }
    Ok(properties)
}

/// Parse the inner LastChange document.
///
/// Expected shape:
///
/// ```xml
/// <Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/">
///   <InstanceID val="0">
///     <TransportState val="PLAYING"/>
///     <CurrentTrackURI val="http://x.mp3"/>
///   </InstanceID>
/// </Event>
/// ```
///
/// Instances whose `val` attribute is missing or non-numeric are dropped
/// with a warning; individual variables without a `val` attribute decode to
/// the empty string.
pub fn parse_last_change(xml: &str) -> Result<Vec<InstanceChanges>, ParseError> {
    let root = Element::parse(xml.as_bytes())
        .map_err(|e| ParseError::Malformed(e.to_string()))?;
    if root.name != "Event" {
        return Err(ParseError::Invalid(format!(
            "expected Event document, got {}",
            root.name
        )));
    }

    let mut instances = Vec::new();
    for instance in child_elements(&root) {
        if instance.name != "InstanceID" {
            continue;
        }
        let Some(instance_id) = instance
            .attributes
            .get("val")
            .and_then(|v| v.trim().parse().ok())
        else {
            warn!("InstanceID without numeric val attribute dropped");
            continue;
        };

        let changes = child_elements(instance)
            .map(|variable| {
                let value = variable.attributes.get("val").cloned().unwrap_or_default();
                (variable.name.clone(), value)
            })
            .collect();

        instances.push(InstanceChanges {
            instance_id,
            changes,
        });
    }
    Ok(instances)
}

fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(XMLNode::as_element)
}
