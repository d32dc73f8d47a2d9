//! The MediaServer aggregate.

use upnp_av::content_directory::{
    self, BrowseCategory, BrowseResult, ContainerItems, SortMode,
};
use upnp_av::{
    AvTransportClient, ClientContext, ConnectionManagerClient, ContentDirectoryClient, Result,
    UpnpError,
};
use upnp_discovery::{Device, DeviceKind, ServiceKind};
use upnp_xml::{Item, Property, Resource};

/// The root container id.
pub const ROOT_ID: &str = content_directory::ROOT_ID;

/// A media server: ContentDirectory plus ConnectionManager, with an
/// optional AVTransport for servers that push content themselves.
///
/// Search and sort capabilities are fetched once at bind time; sort and
/// search requests are validated against them before anything is sent.
pub struct MediaServer {
    device: Device,
    content_directory: ContentDirectoryClient,
    connection_manager: ConnectionManagerClient,
    avtransport: Option<AvTransportClient>,
    search_capabilities: Vec<Property>,
    sort_capabilities: Vec<Property>,
}

impl MediaServer {
    pub async fn bind(context: &ClientContext, device: &Device) -> Result<Self> {
        if device.kind != DeviceKind::MediaServer {
            return Err(UpnpError::invalid_argument(format!(
                "{} is not a media server",
                device.udn
            )));
        }

        let content_directory = ContentDirectoryClient::bind(context, device).await?;
        let connection_manager = ConnectionManagerClient::bind(context, device).await?;
        let avtransport = if device.implements_service(ServiceKind::AVTransport) {
            Some(AvTransportClient::bind(context, device).await?)
        } else {
            None
        };

        let search_capabilities = content_directory.get_search_capabilities().await?;
        let sort_capabilities = content_directory.get_sort_capabilities().await?;

        Ok(Self {
            device: device.clone(),
            content_directory,
            connection_manager,
            avtransport,
            search_capabilities,
            sort_capabilities,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn udn(&self) -> &str {
        &self.device.udn
    }

    pub fn friendly_name(&self) -> &str {
        &self.device.friendly_name
    }

    pub fn content_directory(&self) -> &ContentDirectoryClient {
        &self.content_directory
    }

    pub fn connection_manager(&self) -> &ConnectionManagerClient {
        &self.connection_manager
    }

    pub fn avtransport(&self) -> Option<&AvTransportClient> {
        self.avtransport.as_ref()
    }

    pub fn search_capabilities(&self) -> &[Property] {
        &self.search_capabilities
    }

    pub fn sort_capabilities(&self) -> &[Property] {
        &self.sort_capabilities
    }

    pub fn can_search_on(&self, property: Property) -> bool {
        self.search_capabilities.contains(&Property::All)
            || self.search_capabilities.contains(&property)
    }

    pub fn can_sort_on(&self, property: Property) -> bool {
        self.sort_capabilities.contains(&Property::All)
            || self.sort_capabilities.contains(&property)
    }

    /// Lazily iterate a container, optionally sorted and filtered by
    /// category. Sort properties outside the server's capabilities are
    /// rejected before any request goes out.
    pub fn items_in_container(
        &self,
        container_id: &str,
        page_size: u32,
        sort: &[(Property, SortMode)],
        category: BrowseCategory,
    ) -> Result<ContainerItems<'_>> {
        let criteria = self.validated_sort_criteria(sort)?;
        Ok(self
            .content_directory
            .all_in_container_paged(container_id, page_size, &criteria)
            .category(category))
    }

    /// Everything in a container, in server order.
    pub async fn all_in_container(&self, container_id: &str) -> Result<Vec<Item>> {
        self.content_directory.all_in_container(container_id).collect().await
    }

    /// Metadata of a single object.
    pub async fn metadata(&self, object_id: &str) -> Result<Item> {
        self.content_directory.browse_metadata(object_id, "*").await
    }

    /// Search a container with `contains` predicates joined by `and`.
    /// Predicate properties outside SearchCapabilities are rejected before
    /// any request goes out.
    pub async fn search(
        &self,
        container_id: &str,
        predicates: &[(Property, &str)],
        start_index: u32,
        requested_count: u32,
        sort: &[(Property, SortMode)],
    ) -> Result<BrowseResult> {
        for (property, _) in predicates {
            if !self.can_search_on(*property) {
                return Err(UpnpError::invalid_argument(format!(
                    "server cannot search on {property}"
                )));
            }
        }
        let criteria = content_directory::search_criteria(predicates);
        let sort_criteria = self.validated_sort_criteria(sort)?;
        self.content_directory
            .search(
                container_id,
                &criteria,
                "*",
                start_index,
                requested_count,
                &sort_criteria,
            )
            .await
    }

    /// Point the server's own transport at a resource (servers with an
    /// AVTransport can push to renderers themselves).
    pub async fn set_transport_item(&self, resource: &Resource) -> Result<()> {
        let Some(avtransport) = &self.avtransport else {
            return Ok(());
        };
        avtransport
            .set_av_transport_uri(0, &resource.url, "")
            .await
    }

    fn validated_sort_criteria(&self, sort: &[(Property, SortMode)]) -> Result<String> {
        for (property, _) in sort {
            if !self.can_sort_on(*property) {
                return Err(UpnpError::invalid_argument(format!(
                    "server cannot sort on {property}"
                )));
            }
        }
        Ok(content_directory::sort_criteria(sort))
    }
}
