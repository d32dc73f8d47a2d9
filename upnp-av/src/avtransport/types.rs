//! AVTransport name tables and typed values.

use std::fmt;

use crate::error::UpnpError;
use crate::Result;

/// The AVTransport actions this client drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    SetAVTransportURI,
    SetNextAVTransportURI,
    GetMediaInfo,
    GetTransportInfo,
    GetPositionInfo,
    Stop,
    Play,
    Pause,
    Seek,
    Next,
    Previous,
    GetCurrentTransportActions,
}

const ACTION_NAMES: &[(&str, Action)] = &[
    ("SetAVTransportURI", Action::SetAVTransportURI),
    ("SetNextAVTransportURI", Action::SetNextAVTransportURI),
    ("GetMediaInfo", Action::GetMediaInfo),
    ("GetTransportInfo", Action::GetTransportInfo),
    ("GetPositionInfo", Action::GetPositionInfo),
    ("Stop", Action::Stop),
    ("Play", Action::Play),
    ("Pause", Action::Pause),
    ("Seek", Action::Seek),
    ("Next", Action::Next),
    ("Previous", Action::Previous),
    ("GetCurrentTransportActions", Action::GetCurrentTransportActions),
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
            .ok_or_else(|| UpnpError::invalid_argument(format!("unknown AVTransport action {name:?}")))
    }
}

/// Evented and argument state variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    TransportState,
    TransportStatus,
    PlaybackStorageMedium,
    PossiblePlaybackStorageMedia,
    CurrentPlayMode,
    TransportPlaySpeed,
    RecordStorageMedium,
    RecordMediumWriteStatus,
    NumberOfTracks,
    CurrentTrack,
    CurrentTrackDuration,
    CurrentMediaDuration,
    CurrentTrackURI,
    CurrentTrackMetaData,
    AVTransportURI,
    AVTransportURIMetaData,
    NextAVTransportURI,
    NextAVTransportURIMetaData,
    CurrentTransportActions,
    RelativeTimePosition,
    AbsoluteTimePosition,
    RelativeCounterPosition,
    AbsoluteCounterPosition,
    LastChange,
}

const VARIABLE_NAMES: &[(&str, Variable)] = &[
    ("TransportState", Variable::TransportState),
    ("TransportStatus", Variable::TransportStatus),
    ("PlaybackStorageMedium", Variable::PlaybackStorageMedium),
    ("PossiblePlaybackStorageMedia", Variable::PossiblePlaybackStorageMedia),
    ("CurrentPlayMode", Variable::CurrentPlayMode),
    ("TransportPlaySpeed", Variable::TransportPlaySpeed),
    ("RecordStorageMedium", Variable::RecordStorageMedium),
    ("RecordMediumWriteStatus", Variable::RecordMediumWriteStatus),
    ("NumberOfTracks", Variable::NumberOfTracks),
    ("CurrentTrack", Variable::CurrentTrack),
    ("CurrentTrackDuration", Variable::CurrentTrackDuration),
    ("CurrentMediaDuration", Variable::CurrentMediaDuration),
    ("CurrentTrackURI", Variable::CurrentTrackURI),
    ("CurrentTrackMetaData", Variable::CurrentTrackMetaData),
    ("AVTransportURI", Variable::AVTransportURI),
    ("AVTransportURIMetaData", Variable::AVTransportURIMetaData),
    ("NextAVTransportURI", Variable::NextAVTransportURI),
    ("NextAVTransportURIMetaData", Variable::NextAVTransportURIMetaData),
    ("CurrentTransportActions", Variable::CurrentTransportActions),
    ("RelativeTimePosition", Variable::RelativeTimePosition),
    ("AbsoluteTimePosition", Variable::AbsoluteTimePosition),
    ("RelativeCounterPosition", Variable::RelativeCounterPosition),
    ("AbsoluteCounterPosition", Variable::AbsoluteCounterPosition),
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
                UpnpError::invalid_argument(format!("unknown AVTransport variable {name:?}"))
            })
    }
}

/// `TransportState` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportState {
    Stopped,
    Playing,
    Transitioning,
    PausedPlayback,
    PausedRecording,
    Recording,
    NoMediaPresent,
}

const STATE_NAMES: &[(&str, TransportState)] = &[
    ("STOPPED", TransportState::Stopped),
    ("PLAYING", TransportState::Playing),
    ("TRANSITIONING", TransportState::Transitioning),
    ("PAUSED_PLAYBACK", TransportState::PausedPlayback),
    ("PAUSED_RECORDING", TransportState::PausedRecording),
    ("RECORDING", TransportState::Recording),
    ("NO_MEDIA_PRESENT", TransportState::NoMediaPresent),
];

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        STATE_NAMES
            .iter()
            .find(|(_, state)| state == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn from_str(name: &str) -> Result<Self> {
        STATE_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, state)| *state)
            .ok_or_else(|| UpnpError::invalid_argument(format!("unknown transport state {name:?}")))
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `TransportStatus` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Ok,
    ErrorOccurred,
}

impl TransportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportStatus::Ok => "OK",
            TransportStatus::ErrorOccurred => "ERROR_OCCURRED",
        }
    }

    pub fn from_str(name: &str) -> Result<Self> {
        match name {
            "OK" => Ok(TransportStatus::Ok),
            "ERROR_OCCURRED" => Ok(TransportStatus::ErrorOccurred),
            other => Err(UpnpError::invalid_argument(format!(
                "unknown transport status {other:?}"
            ))),
        }
    }
}

/// Seek units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    TrackNumber,
    AbsoluteTime,
    RelativeTime,
    AbsoluteCount,
    RelativeCount,
    ChannelFrequency,
    TapeIndex,
    RelativeTapeIndex,
    Frame,
    RelativeFrame,
}

const SEEK_MODE_NAMES: &[(&str, SeekMode)] = &[
    ("TRACK_NR", SeekMode::TrackNumber),
    ("ABS_TIME", SeekMode::AbsoluteTime),
    ("REL_TIME", SeekMode::RelativeTime),
    ("ABS_COUNT", SeekMode::AbsoluteCount),
    ("REL_COUNT", SeekMode::RelativeCount),
    ("CHANNEL_FREQ", SeekMode::ChannelFrequency),
    ("TAPE-INDEX", SeekMode::TapeIndex),
    ("REL_TAPE-INDEX", SeekMode::RelativeTapeIndex),
    ("FRAME", SeekMode::Frame),
    ("REL_FRAME", SeekMode::RelativeFrame),
];

impl SeekMode {
    pub fn as_str(&self) -> &'static str {
        SEEK_MODE_NAMES
            .iter()
            .find(|(_, mode)| mode == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn from_str(name: &str) -> Result<Self> {
        SEEK_MODE_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, mode)| *mode)
            .ok_or_else(|| UpnpError::invalid_argument(format!("unknown seek mode {name:?}")))
    }
}

/// `CurrentPlayMode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Normal,
    Shuffle,
    RepeatOne,
    RepeatAll,
    Random,
    Direct,
    Intro,
}

const PLAY_MODE_NAMES: &[(&str, PlayMode)] = &[
    ("NORMAL", PlayMode::Normal),
    ("SHUFFLE", PlayMode::Shuffle),
    ("REPEAT_ONE", PlayMode::RepeatOne),
    ("REPEAT_ALL", PlayMode::RepeatAll),
    ("RANDOM", PlayMode::Random),
    ("DIRECT_1", PlayMode::Direct),
    ("INTRO", PlayMode::Intro),
];

impl PlayMode {
    pub fn as_str(&self) -> &'static str {
        PLAY_MODE_NAMES
            .iter()
            .find(|(_, mode)| mode == self)
            .map(|(name, _)| *name)
            .unwrap_or_default()
    }

    pub fn from_str(name: &str) -> Result<Self> {
        PLAY_MODE_NAMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, mode)| *mode)
            .ok_or_else(|| UpnpError::invalid_argument(format!("unknown play mode {name:?}")))
    }
}

/// `GetTransportInfo` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInfo {
    pub state: TransportState,
    pub status: TransportStatus,
    pub speed: String,
}

/// `GetPositionInfo` result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionInfo {
    pub track: u32,
    pub track_duration: String,
    pub track_metadata: String,
    pub track_uri: String,
    pub relative_time: String,
    pub absolute_time: String,
    pub relative_count: i32,
    pub absolute_count: i32,
}

/// `GetMediaInfo` result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInfo {
    pub number_of_tracks: u32,
    pub media_duration: String,
    pub current_uri: String,
    pub current_uri_metadata: String,
    pub next_uri: String,
    pub next_uri_metadata: String,
    pub play_medium: String,
    pub record_medium: String,
    pub write_status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn action_round_trip_is_bijective() {
        for (name, action) in ACTION_NAMES {
            assert_eq!(Action::from_str(name).unwrap(), *action);
            assert_eq!(action.name(), *name);
        }
        assert!(Action::from_str("Record").is_err());
        assert!(Action::from_str("").is_err());
    }

    #[test]
    fn variable_round_trip_is_bijective() {
        for (name, variable) in VARIABLE_NAMES {
            assert_eq!(Variable::from_str(name).unwrap(), *variable);
            assert_eq!(variable.name(), *name);
        }
        assert!(Variable::from_str("DRMState").is_err());
    }

    #[rstest]
    #[case("STOPPED", TransportState::Stopped)]
    #[case("PLAYING", TransportState::Playing)]
    #[case("TRANSITIONING", TransportState::Transitioning)]
    #[case("PAUSED_PLAYBACK", TransportState::PausedPlayback)]
    #[case("PAUSED_RECORDING", TransportState::PausedRecording)]
    #[case("RECORDING", TransportState::Recording)]
    #[case("NO_MEDIA_PRESENT", TransportState::NoMediaPresent)]
    fn transport_state_round_trip(#[case] name: &str, #[case] state: TransportState) {
        assert_eq!(TransportState::from_str(name).unwrap(), state);
        assert_eq!(state.as_str(), name);
    }

    #[test]
    fn transport_state_rejects_unknown() {
        assert!(TransportState::from_str("IDLE").is_err());
    }

    #[test]
    fn seek_mode_tables_cover_the_ten_units() {
        assert_eq!(SEEK_MODE_NAMES.len(), 10);
        for (name, mode) in SEEK_MODE_NAMES {
            assert_eq!(SeekMode::from_str(name).unwrap(), *mode);
            assert_eq!(mode.as_str(), *name);
        }
        assert!(SeekMode::from_str("REL-TIME").is_err());
    }

    #[test]
    fn play_mode_round_trip() {
        for (name, mode) in PLAY_MODE_NAMES {
            assert_eq!(PlayMode::from_str(name).unwrap(), *mode);
            assert_eq!(mode.as_str(), *name);
        }
        assert!(PlayMode::from_str("SINGLE").is_err());
    }
}
