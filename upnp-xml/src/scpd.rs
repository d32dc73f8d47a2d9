//! Service Control Protocol Description (SCPD) parsing.

use serde::Deserialize;

use crate::error::ParseError;
use crate::xml_decode;

/// Parsed SCPD: the set of actions a service instance implements and the
/// state variables it evented or accepts as arguments.
#[derive(Debug, Clone, Default)]
pub struct ServiceDescriptor {
    pub actions: Vec<String>,
    pub state_variables: Vec<StateVariableDescriptor>,
}

impl ServiceDescriptor {
    pub fn parse(xml: &str) -> Result<Self, ParseError> {
        let scpd: ScpdXml = xml_decode::from_str(xml)?;

        let actions = scpd
            .action_list
            .map(|l| l.actions.into_iter().map(|a| a.name).collect())
            .unwrap_or_default();

        let state_variables = scpd
            .state_table
            .map(|t| {
                t.variables
                    .into_iter()
                    .map(StateVariableDescriptor::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            actions,
            state_variables,
        })
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.iter().any(|a| a == name)
    }

    pub fn state_variable(&self, name: &str) -> Option<&StateVariableDescriptor> {
        self.state_variables.iter().find(|v| v.name == name)
    }
}

/// One `<stateVariable>` entry.
#[derive(Debug, Clone)]
pub struct StateVariableDescriptor {
    pub name: String,
    pub data_type: String,
    pub send_events: bool,
    pub range: Option<ValueRange>,
    pub allowed_values: Vec<String>,
}

/// `<allowedValueRange>` bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRange {
    pub min: i64,
    pub max: i64,
    pub step: Option<i64>,
}

impl ValueRange {
    /// Clamp `value` into `[min, max]`.
    pub fn clamp(&self, value: i64) -> i64 {
        value.max(self.min).min(self.max)
    }
}

impl From<StateVariableXml> for StateVariableDescriptor {
    fn from(xml: StateVariableXml) -> Self {
        let range = xml.range.and_then(|r| {
            Some(ValueRange {
                min: r.minimum?.trim().parse().ok()?,
                max: r.maximum?.trim().parse().ok()?,
                step: r.step.and_then(|s| s.trim().parse().ok()),
            })
        });

        Self {
            name: xml.name,
            data_type: xml.data_type.unwrap_or_default(),
            // UPnP-DA defaults sendEvents to yes when the attribute is absent
            send_events: xml
                .send_events
                .map(|v| v.eq_ignore_ascii_case("yes"))
                .unwrap_or(true),
            range,
            allowed_values: xml
                .allowed_values
                .map(|l| l.values)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ScpdXml {
    #[serde(rename = "actionList")]
    action_list: Option<ActionListXml>,
    #[serde(rename = "serviceStateTable")]
    state_table: Option<StateTableXml>,
}

#[derive(Debug, Deserialize)]
struct ActionListXml {
    #[serde(rename = "action", default)]
    actions: Vec<ActionXml>,
}

#[derive(Debug, Deserialize)]
struct ActionXml {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StateTableXml {
    #[serde(rename = "stateVariable", default)]
    variables: Vec<StateVariableXml>,
}

#[derive(Debug, Deserialize)]
struct StateVariableXml {
    name: String,
    #[serde(rename = "dataType")]
    data_type: Option<String>,
    #[serde(rename = "@sendEvents")]
    send_events: Option<String>,
    #[serde(rename = "allowedValueRange")]
    range: Option<RangeXml>,
    #[serde(rename = "allowedValueList")]
    allowed_values: Option<AllowedValuesXml>,
}

#[derive(Debug, Deserialize)]
struct RangeXml {
    minimum: Option<String>,
    maximum: Option<String>,
    step: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AllowedValuesXml {
    #[serde(rename = "allowedValue", default)]
    values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLUME_SCPD: &str = r#"<?xml version="1.0"?>
<scpd xmlns="urn:schemas-upnp-org:service-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <actionList>
    <action><name>GetVolume</name></action>
    <action><name>SetVolume</name></action>
  </actionList>
  <serviceStateTable>
    <stateVariable sendEvents="no">
      <name>Volume</name>
      <dataType>ui2</dataType>
      <allowedValueRange>
        <minimum>0</minimum>
        <maximum>100</maximum>
        <step>1</step>
      </allowedValueRange>
    </stateVariable>
    <stateVariable sendEvents="yes">
      <name>LastChange</name>
      <dataType>string</dataType>
    </stateVariable>
    <stateVariable sendEvents="no">
      <name>A_ARG_TYPE_Channel</name>
      <dataType>string</dataType>
      <allowedValueList>
        <allowedValue>Master</allowedValue>
        <allowedValue>LF</allowedValue>
      </allowedValueList>
    </stateVariable>
  </serviceStateTable>
</scpd>"#;

    #[test]
    fn parses_actions_and_variables() {
        let descriptor = ServiceDescriptor::parse(VOLUME_SCPD).unwrap();
        assert!(descriptor.has_action("GetVolume"));
        assert!(descriptor.has_action("SetVolume"));
        assert!(!descriptor.has_action("Seek"));
        assert_eq!(descriptor.state_variables.len(), 3);
    }

    #[test]
    fn volume_variable_carries_range() {
        let descriptor = ServiceDescriptor::parse(VOLUME_SCPD).unwrap();
        let volume = descriptor.state_variable("Volume").unwrap();
        assert_eq!(volume.data_type, "ui2");
        assert!(!volume.send_events);
        assert_eq!(
            volume.range,
            Some(ValueRange {
                min: 0,
                max: 100,
                step: Some(1)
            })
        );
    }

    #[test]
    fn send_events_defaults_to_yes() {
        let xml = r#"<scpd>
            <serviceStateTable>
              <stateVariable><name>TransportState</name><dataType>string</dataType></stateVariable>
            </serviceStateTable>
          </scpd>"#;
        let descriptor = ServiceDescriptor::parse(xml).unwrap();
        assert!(descriptor.state_variable("TransportState").unwrap().send_events);
    }

    #[test]
    fn allowed_values_collected() {
        let descriptor = ServiceDescriptor::parse(VOLUME_SCPD).unwrap();
        let channel = descriptor.state_variable("A_ARG_TYPE_Channel").unwrap();
        assert_eq!(channel.allowed_values, vec!["Master", "LF"]);
    }

    #[test]
    fn clamp_respects_bounds() {
        let range = ValueRange {
            min: 0,
            max: 100,
            step: None,
        };
        assert_eq!(range.clamp(-3), 0);
        assert_eq!(range.clamp(50), 50);
        assert_eq!(range.clamp(130), 100);
    }

    #[test]
    fn malformed_scpd_is_rejected() {
        assert!(ServiceDescriptor::parse("<scpd><actionList>").is_err());
    }
}
