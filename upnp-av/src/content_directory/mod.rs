//! ContentDirectory service client.

mod types;

use std::collections::VecDeque;

use upnp_discovery::{Device, ServiceKind};
use upnp_xml::{didl, Item, Property};

use crate::client::{ClientContext, ServiceClientBase, ServiceTraits};
use crate::response::{child_text, child_u32};
use crate::Result;

pub use types::{Action, BrowseCategory, BrowseFlag, BrowseResult, SortMode, Variable};

/// Default page size for lazy container iteration.
pub const DEFAULT_BROWSE_PAGE_SIZE: u32 = 32;

/// The root container id every server exposes.
pub const ROOT_ID: &str = "0";

pub struct ContentDirectoryTraits;

impl ServiceTraits for ContentDirectoryTraits {
    type Action = Action;
    type Variable = Variable;

    const KIND: ServiceKind = ServiceKind::ContentDirectory;

    fn action_from_str(name: &str) -> Result<Action> {
        Action::from_str(name)
    }

    fn action_name(action: Action) -> &'static str {
        action.name()
    }

    fn variable_from_str(name: &str) -> Result<Variable> {
        Variable::from_str(name)
    }

    fn variable_name(variable: Variable) -> &'static str {
        variable.name()
    }
}

/// Typed client for `urn:schemas-upnp-org:service:ContentDirectory`.
pub struct ContentDirectoryClient {
    base: ServiceClientBase<ContentDirectoryTraits>,
}

impl ContentDirectoryClient {
    pub async fn bind(context: &ClientContext, device: &Device) -> Result<Self> {
        Ok(Self {
            base: ServiceClientBase::bind(context, device).await?,
        })
    }

    pub fn supports_action(&self, action: Action) -> bool {
        self.base.supports_action(action)
    }

    pub async fn subscribe(&self) -> Result<()> {
        self.base.subscribe().await
    }

    pub async fn unsubscribe(&self) -> Result<()> {
        self.base.unsubscribe().await
    }

    /// Properties the server accepts in search criteria. `*` means all.
    pub async fn get_search_capabilities(&self) -> Result<Vec<Property>> {
        let response = self
            .base
            .execute_parsed(Action::GetSearchCapabilities, &[])
            .await?;
        Ok(parse_property_csv(&child_text(&response, "SearchCaps")))
    }

    /// Properties the server accepts in sort criteria.
    pub async fn get_sort_capabilities(&self) -> Result<Vec<Property>> {
        let response = self
            .base
            .execute_parsed(Action::GetSortCapabilities, &[])
            .await?;
        Ok(parse_property_csv(&child_text(&response, "SortCaps")))
    }

    pub async fn get_system_update_id(&self) -> Result<u32> {
        let response = self
            .base
            .execute_parsed(Action::GetSystemUpdateID, &[])
            .await?;
        Ok(child_u32(&response, "Id"))
    }

    /// One Browse request. `sort_criteria` is the raw wire string; use
    /// [`sort_criteria`] to build it from typed parts.
    pub async fn browse(
        &self,
        object_id: &str,
        flag: BrowseFlag,
        filter: &str,
        start_index: u32,
        requested_count: u32,
        sort_criteria: &str,
    ) -> Result<BrowseResult> {
        let response = self
            .base
            .execute_parsed(
                Action::Browse,
                &[
                    ("ObjectID", object_id.to_string()),
                    ("BrowseFlag", flag.as_str().to_string()),
                    ("Filter", filter.to_string()),
                    ("StartingIndex", start_index.to_string()),
                    ("RequestedCount", requested_count.to_string()),
                    ("SortCriteria", sort_criteria.to_string()),
                ],
            )
            .await?;

        Ok(BrowseResult {
            total_matches: child_u32(&response, "TotalMatches"),
            number_returned: child_u32(&response, "NumberReturned"),
            update_id: child_u32(&response, "UpdateID"),
            items: parse_result_document(&child_text(&response, "Result"))?,
        })
    }

    /// Metadata of a single object.
    pub async fn browse_metadata(&self, object_id: &str, filter: &str) -> Result<Item> {
        let result = self
            .browse(object_id, BrowseFlag::Metadata, filter, 0, 0, "")
            .await?;
        result
            .items
            .into_iter()
            .next()
            .ok_or_else(|| crate::UpnpError::Unexpected("empty BrowseMetadata result".to_string()))
    }

    /// One Search request against a container.
    pub async fn search(
        &self,
        container_id: &str,
        criteria: &str,
        filter: &str,
        start_index: u32,
        requested_count: u32,
        sort_criteria: &str,
    ) -> Result<BrowseResult> {
        let response = self
            .base
            .execute_parsed(
                Action::Search,
                &[
                    ("ContainerID", container_id.to_string()),
                    ("SearchCriteria", criteria.to_string()),
                    ("Filter", filter.to_string()),
                    ("StartingIndex", start_index.to_string()),
                    ("RequestedCount", requested_count.to_string()),
                    ("SortCriteria", sort_criteria.to_string()),
                ],
            )
            .await?;

        Ok(BrowseResult {
            total_matches: child_u32(&response, "TotalMatches"),
            number_returned: child_u32(&response, "NumberReturned"),
            update_id: child_u32(&response, "UpdateID"),
            items: parse_result_document(&child_text(&response, "Result"))?,
        })
    }

    /// Lazily iterate everything in a container with the default page size.
    pub fn all_in_container<'a>(&'a self, object_id: &str) -> ContainerItems<'a> {
        self.all_in_container_paged(object_id, DEFAULT_BROWSE_PAGE_SIZE, "")
    }

    /// Lazily iterate a container with an explicit page size and sort
    /// string. The sequence issues Browse requests on demand and ends when
    /// a response returns zero items.
    pub fn all_in_container_paged<'a>(
        &'a self,
        object_id: &str,
        page_size: u32,
        sort_criteria: &str,
    ) -> ContainerItems<'a> {
        ContainerItems {
            client: self,
            object_id: object_id.to_string(),
            sort_criteria: sort_criteria.to_string(),
            category: BrowseCategory::All,
            page_size: page_size.max(1),
            next_index: 0,
            buffered: VecDeque::new(),
            finished: false,
        }
    }
}

/// A finite, non-restartable stream of items produced by repeated Browse
/// calls.
///
/// Each page advances `StartingIndex` by the `NumberReturned` of the
/// previous response; the stream terminates when a response returns zero
/// items. An error ends the stream after being yielded once.
pub struct ContainerItems<'a> {
    client: &'a ContentDirectoryClient,
    object_id: String,
    sort_criteria: String,
    category: BrowseCategory,
    page_size: u32,
    next_index: u32,
    buffered: VecDeque<Item>,
    finished: bool,
}

impl<'a> ContainerItems<'a> {
    /// Keep only items of the given category (client-side filter).
    pub fn category(mut self, category: BrowseCategory) -> Self {
        self.category = category;
        self
    }

    /// The next item, or `None` at end of stream.
    pub async fn next(&mut self) -> Option<Result<Item>> {
        loop {
            if let Some(item) = self.buffered.pop_front() {
                if self.category.keeps(&item) {
                    return Some(Ok(item));
                }
                continue;
            }
            if self.finished {
                return None;
            }

            let page = self
                .client
                .browse(
                    &self.object_id,
                    BrowseFlag::DirectChildren,
                    "*",
                    self.next_index,
                    self.page_size,
                    &self.sort_criteria,
                )
                .await;

            match page {
                Ok(result) => {
                    if result.number_returned == 0 {
                        self.finished = true;
                        return None;
                    }
                    self.next_index += result.number_returned;
                    self.buffered.extend(result.items);
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Drain the remaining items into a vector.
    pub async fn collect(mut self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

/// Build a `SortCriteria` string: `+dc:title,-upnp:originalTrackNumber`.
pub fn sort_criteria(sort: &[(Property, SortMode)]) -> String {
    sort.iter()
        .map(|(property, mode)| format!("{}{}", mode.sign(), property.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Build a `SearchCriteria` string: predicates of the form
/// `<property> contains "<value>"` joined with `and`.
///
/// Values are embedded verbatim; XML escaping happens once, at envelope
/// serialization. Embedded quotes are backslash-escaped per the
/// ContentDirectory query grammar.
pub fn search_criteria(predicates: &[(Property, &str)]) -> String {
    predicates
        .iter()
        .map(|(property, value)| {
            format!(
                "{} contains \"{}\"",
                property.as_str(),
                value.replace('"', "\\\"")
            )
        })
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Some servers answer zero-match pages with an empty `Result` string
/// instead of an empty DIDL document.
fn parse_result_document(didl_text: &str) -> Result<Vec<Item>> {
    if didl_text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(didl::parse_items(didl_text)?)
}

fn parse_property_csv(csv: &str) -> Vec<Property> {
    csv.split(',')
        .filter_map(|token| Property::from_str(token.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_criteria_maps_modes_to_signs() {
        let criteria = sort_criteria(&[
            (Property::Title, SortMode::Ascending),
            (Property::Genre, SortMode::Descending),
        ]);
        assert_eq!(criteria, "+dc:title,-upnp:genre");
        assert_eq!(sort_criteria(&[]), "");
    }

    #[test]
    fn search_criteria_joins_predicates_with_and() {
        let criteria = search_criteria(&[
            (Property::Artist, "Bach"),
            (Property::Title, "Air"),
        ]);
        assert_eq!(
            criteria,
            "upnp:artist contains \"Bach\" and dc:title contains \"Air\""
        );
    }

    #[test]
    fn search_criteria_keeps_values_verbatim_but_escapes_quotes() {
        let criteria = search_criteria(&[(Property::Title, "Tom & Jerry")]);
        assert_eq!(criteria, "dc:title contains \"Tom & Jerry\"");

        let criteria = search_criteria(&[(Property::Title, r#"the "best" take"#)]);
        assert_eq!(criteria, r#"dc:title contains "the \"best\" take""#);
    }

    #[test]
    fn capability_csv_parses_known_properties() {
        let caps = parse_property_csv("dc:title,upnp:artist,unknown:thing,upnp:genre");
        assert_eq!(
            caps,
            vec![Property::Title, Property::Artist, Property::Genre]
        );
        assert_eq!(parse_property_csv("*"), vec![Property::All]);
        assert!(parse_property_csv("").is_empty());
    }
}
