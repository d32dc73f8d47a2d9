//! RenderingControl name tables.

use crate::error::UpnpError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GetVolume,
    SetVolume,
    GetMute,
    SetMute,
    ListPresets,
    SelectPreset,
}

const ACTION_NAMES: &[(&str, Action)] = &[
    ("GetVolume", Action::GetVolume),
    ("SetVolume", Action::SetVolume),
    ("GetMute", Action::GetMute),
    ("SetMute", Action::SetMute),
    ("ListPresets", Action::ListPresets),
    ("SelectPreset", Action::SelectPreset),
];

impl Action {
    pub fn name(&self) -> &'static str {
        ACTION_NAMES
            .iter()
            .find(|(_, action)| action == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn from_str(name: &str) -> Result<Self> {
        ACTION_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, action)| *action)
            .ok_or_else(|| {
                UpnpError::invalid_argument(format!("unknown RenderingControl action {name:?}"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    PresetNameList,
    Mute,
    Volume,
    VolumeDB,
    Loudness,
    LastChange,
}

const VARIABLE_NAMES: &[(&str, Variable)] = &[
    ("PresetNameList", Variable::PresetNameList),
    ("Mute", Variable::Mute),
    ("Volume", Variable::Volume),
    ("VolumeDB", Variable::VolumeDB),
    ("Loudness", Variable::Loudness),
    ("LastChange", Variable::LastChange),
];

impl Variable {
    pub fn name(&self) -> &'static str {
        VARIABLE_NAMES
            .iter()
            .find(|(_, variable)| variable == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn from_str(name: &str) -> Result<Self> {
        VARIABLE_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, variable)| *variable)
            .ok_or_else(|| {
                UpnpError::invalid_argument(format!("unknown RenderingControl variable {name:?}"))
            })
    }
}

/// Audio channel selector; `Master` is the default everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    #[default]
    Master,
    LeftFront,
    RightFront,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Master => "Master",
            Channel::LeftFront => "LF",
            Channel::RightFront => "RF",
        }
    }

    pub fn from_str(name: &str) -> Result<Self> {
        match name {
            "Master" => Ok(Channel::Master),
            "LF" => Ok(Channel::LeftFront),
            "RF" => Ok(Channel::RightFront),
            other => Err(UpnpError::invalid_argument(format!("unknown channel {other:?}"))),
        }
    }
}
