//! ContentDirectory name tables and browse data.

use upnp_xml::Item;

use crate::error::UpnpError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GetSearchCapabilities,
    GetSortCapabilities,
    GetSystemUpdateID,
    Browse,
    Search,
}

const ACTION_NAMES: &[(&str, Action)] = &[
    ("GetSearchCapabilities", Action::GetSearchCapabilities),
    ("GetSortCapabilities", Action::GetSortCapabilities),
    ("GetSystemUpdateID", Action::GetSystemUpdateID),
    ("Browse", Action::Browse),
    ("Search", Action::Search),
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
                UpnpError::invalid_argument(format!("unknown ContentDirectory action {name:?}"))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    TransferIDs,
    SystemUpdateID,
    ContainerUpdateIDs,
}

const VARIABLE_NAMES: &[(&str, Variable)] = &[
    ("TransferIDs", Variable::TransferIDs),
    ("SystemUpdateID", Variable::SystemUpdateID),
    ("ContainerUpdateIDs", Variable::ContainerUpdateIDs),
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
                UpnpError::invalid_argument(format!("unknown ContentDirectory variable {name:?}"))
            })
    }
}

/// The `BrowseFlag` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseFlag {
    Metadata,
    DirectChildren,
}

impl BrowseFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowseFlag::Metadata => "BrowseMetadata",
            BrowseFlag::DirectChildren => "BrowseDirectChildren",
        }
    }
}

/// Sort direction for one sort property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortMode {
    Ascending,
    Descending,
}

impl SortMode {
    /// The sign prefix used in `SortCriteria`.
    pub fn sign(&self) -> char {
        match self {
            SortMode::Ascending => '+',
            SortMode::Descending => '-',
        }
    }
}

/// Category filter applied client-side to browse results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowseCategory {
    #[default]
    All,
    ItemsOnly,
    ContainersOnly,
}

impl BrowseCategory {
    pub fn keeps(&self, item: &Item) -> bool {
        match self {
            BrowseCategory::All => true,
            BrowseCategory::ItemsOnly => !item.is_container(),
            BrowseCategory::ContainersOnly => item.is_container(),
        }
    }
}

/// One page of Browse/Search results.
#[derive(Debug, Clone, Default)]
pub struct BrowseResult {
    pub total_matches: u32,
    pub number_returned: u32,
    pub update_id: u32,
    pub items: Vec<Item>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_round_trip() {
        for (name, action) in ACTION_NAMES {
            assert_eq!(Action::from_str(name).unwrap(), *action);
            assert_eq!(action.name(), *name);
        }
        assert!(Action::from_str("CreateObject").is_err());
    }

    #[test]
    fn variable_round_trip() {
        for (name, variable) in VARIABLE_NAMES {
            assert_eq!(Variable::from_str(name).unwrap(), *variable);
            assert_eq!(variable.name(), *name);
        }
        assert!(Variable::from_str("SortCapabilities").is_err());
    }

    #[test]
    fn sort_mode_signs() {
        assert_eq!(SortMode::Ascending.sign(), '+');
        assert_eq!(SortMode::Descending.sign(), '-');
    }
}
