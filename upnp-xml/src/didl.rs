//! DIDL-Lite parsing: the content model returned by ContentDirectory
//! Browse and Search.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Deserialize;
use tracing::warn;

use crate::error::ParseError;
use crate::xml_decode;

/// Metadata property vocabulary used in DIDL documents, sort criteria and
/// search/sort capability lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Property {
    Id,
    ParentId,
    RefId,
    ChildCount,
    Restricted,
    Title,
    Creator,
    Date,
    Description,
    Artist,
    Album,
    AlbumArt,
    Genre,
    TrackNumber,
    Actor,
    Class,
    Res,
    StorageUsed,
    All,
}

impl Property {
    pub fn as_str(&self) -> &'static str {
        match self {
            Property::Id => "id",
            Property::ParentId => "parentID",
            Property::RefId => "refID",
            Property::ChildCount => "childCount",
            Property::Restricted => "restricted",
            Property::Title => "dc:title",
            Property::Creator => "dc:creator",
            Property::Date => "dc:date",
            Property::Description => "dc:description",
            Property::Artist => "upnp:artist",
            Property::Album => "upnp:album",
            Property::AlbumArt => "upnp:albumArtURI",
            Property::Genre => "upnp:genre",
            Property::TrackNumber => "upnp:originalTrackNumber",
            Property::Actor => "upnp:actor",
            Property::Class => "upnp:class",
            Property::Res => "res",
            Property::StorageUsed => "upnp:storageUsed",
            Property::All => "*",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Some(match value {
            "id" => Property::Id,
            "parentID" => Property::ParentId,
            "refID" => Property::RefId,
            "childCount" => Property::ChildCount,
            "restricted" => Property::Restricted,
            "dc:title" => Property::Title,
            "dc:creator" => Property::Creator,
            "dc:date" => Property::Date,
            "dc:description" => Property::Description,
            "upnp:artist" => Property::Artist,
            "upnp:album" => Property::Album,
            "upnp:albumArtURI" => Property::AlbumArt,
            "upnp:genre" => Property::Genre,
            "upnp:originalTrackNumber" => Property::TrackNumber,
            "upnp:actor" => Property::Actor,
            "upnp:class" => Property::Class,
            "res" => Property::Res,
            "upnp:storageUsed" => Property::StorageUsed,
            "*" => Property::All,
            _ => return None,
        })
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Object class derived from the `upnp:class` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemClass {
    Container,
    AudioContainer,
    VideoContainer,
    ImageContainer,
    Audio,
    Video,
    Image,
    Generic,
    #[default]
    Unknown,
}

impl ItemClass {
    /// Classify a `upnp:class` string such as
    /// `object.item.audioItem.musicTrack`.
    pub fn from_class_string(value: &str) -> Self {
        if let Some(rest) = value.strip_prefix("object.container") {
            return match rest {
                r if r.starts_with(".album.musicAlbum") => ItemClass::AudioContainer,
                r if r.starts_with(".album.videoAlbum") => ItemClass::VideoContainer,
                r if r.starts_with(".album.photoAlbum") => ItemClass::ImageContainer,
                r if r.starts_with(".playlistContainer") => ItemClass::AudioContainer,
                _ => ItemClass::Container,
            };
        }
        if let Some(rest) = value.strip_prefix("object.item") {
            return match rest {
                r if r.starts_with(".audioItem") => ItemClass::Audio,
                r if r.starts_with(".videoItem") => ItemClass::Video,
                r if r.starts_with(".imageItem") => ItemClass::Image,
                "" => ItemClass::Generic,
                _ => ItemClass::Generic,
            };
        }
        ItemClass::Unknown
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            ItemClass::Container
                | ItemClass::AudioContainer
                | ItemClass::VideoContainer
                | ItemClass::ImageContainer
        )
    }
}

/// The four-field protocol descriptor attached to every resource:
/// `protocol : network : content-format : additional-info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolInfo {
    pub protocol: String,
    pub network: String,
    pub content_format: String,
    pub additional_info: String,
}

impl ProtocolInfo {
    /// Parse `http-get:*:audio/mpeg:*`-style strings.
    pub fn parse(value: &str) -> Result<Self, ParseError> {
        let mut fields = value.trim().splitn(4, ':');
        let protocol = fields.next().filter(|s| !s.is_empty());
        let network = fields.next();
        let content_format = fields.next();
        let additional_info = fields.next();

        match (protocol, network, content_format, additional_info) {
            (Some(protocol), Some(network), Some(content_format), Some(additional_info)) => {
                Ok(Self {
                    protocol: protocol.to_string(),
                    network: network.to_string(),
                    content_format: content_format.to_string(),
                    additional_info: additional_info.to_string(),
                })
            }
            _ => Err(ParseError::Invalid(format!(
                "protocol info needs 4 fields: {value:?}"
            ))),
        }
    }

    /// Wildcard-aware compatibility check over the first three fields.
    pub fn is_compatible_with(&self, other: &ProtocolInfo) -> bool {
        fn field_matches(a: &str, b: &str) -> bool {
            a == "*" || b == "*" || a.eq_ignore_ascii_case(b)
        }

        field_matches(&self.protocol, &other.protocol)
            && field_matches(&self.network, &other.network)
            && field_matches(&self.content_format, &other.content_format)
    }
}

impl fmt::Display for ProtocolInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.protocol, self.network, self.content_format, self.additional_info
        )
    }
}

/// A playable/downloadable rendition of an item.
#[derive(Debug, Clone)]
pub struct Resource {
    pub url: String,
    pub protocol_info: ProtocolInfo,
    /// Extra `<res>` attributes (duration, size, bitrate, ...).
    pub metadata: BTreeMap<String, String>,
}

/// One DIDL object: either a container or an item, in server order.
#[derive(Debug, Clone, Default)]
pub struct Item {
    pub object_id: String,
    pub parent_id: String,
    pub ref_id: Option<String>,
    pub restricted: bool,
    pub title: String,
    pub class: ItemClass,
    /// The raw `upnp:class` value the server reported.
    pub class_name: String,
    pub child_count: Option<u32>,
    pub resources: Vec<Resource>,
    /// Album art URLs keyed by DLNA profile id (empty key when the server
    /// did not tag the art with a profile).
    pub album_art: HashMap<String, String>,
    pub metadata: BTreeMap<Property, String>,
}

impl Item {
    pub fn is_container(&self) -> bool {
        self.class.is_container()
    }

    pub fn metadata(&self, property: Property) -> Option<&str> {
        self.metadata.get(&property).map(String::as_str)
    }

    pub fn album_art(&self, profile_id: &str) -> Option<&str> {
        self.album_art.get(profile_id).map(String::as_str)
    }
}

/// Parse a DIDL-Lite document into items, preserving server order.
///
/// Containers and items share the [`Item`] representation; use
/// [`Item::is_container`] to tell them apart. Resources whose
/// `protocolInfo` is missing or malformed are skipped with a warning.
pub fn parse_items(xml: &str) -> Result<Vec<Item>, ParseError> {
    let didl: DidlXml = xml_decode::from_str(xml)?;

    Ok(didl
        .nodes
        .into_iter()
        .filter_map(|node| match node {
            DidlNode::Container(object) => Some(build_item(object, true)),
            DidlNode::Item(object) => Some(build_item(object, false)),
            DidlNode::Text(_) => None,
        })
        .collect())
}

/// Parse a DIDL-Lite document expected to describe exactly one object.
pub fn parse_metadata(xml: &str) -> Result<Item, ParseError> {
    parse_items(xml)?
        .into_iter()
        .next()
        .ok_or_else(|| ParseError::Invalid("metadata document contains no object".to_string()))
}

fn build_item(object: ObjectXml, container: bool) -> Item {
    let class = if object.class.is_empty() {
        if container {
            ItemClass::Container
        } else {
            ItemClass::Unknown
        }
    } else {
        ItemClass::from_class_string(&object.class)
    };

    let mut resources = Vec::new();
    for res in object.resources {
        let Some(url) = res.uri.filter(|u| !u.trim().is_empty()) else {
            warn!("resource without URL skipped");
            continue;
        };
        let protocol_info = match res.protocol_info.as_deref().map(ProtocolInfo::parse) {
            Some(Ok(info)) => info,
            Some(Err(e)) => {
                warn!(resource = %url, "skipping resource with bad protocolInfo: {e}");
                continue;
            }
            None => {
                warn!(resource = %url, "skipping resource without protocolInfo");
                continue;
            }
        };

        let mut metadata = BTreeMap::new();
        if let Some(duration) = res.duration {
            metadata.insert("duration".to_string(), duration);
        }
        if let Some(size) = res.size {
            metadata.insert("size".to_string(), size);
        }
        if let Some(bitrate) = res.bitrate {
            metadata.insert("bitrate".to_string(), bitrate);
        }

        resources.push(Resource {
            url: url.trim().to_string(),
            protocol_info,
            metadata,
        });
    }

    let mut album_art = HashMap::new();
    for art in object.album_art {
        album_art.insert(art.profile_id.unwrap_or_default(), art.uri.trim().to_string());
    }

    let mut metadata = BTreeMap::new();
    let mut put = |property: Property, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            metadata.insert(property, value);
        }
    };
    put(Property::Title, Some(object.title.clone()));
    put(Property::Class, Some(object.class.clone()));
    put(Property::Creator, object.creator);
    put(Property::Date, object.date);
    put(Property::Description, object.description);
    put(Property::Album, object.album);
    put(Property::Genre, object.genre);
    put(Property::TrackNumber, object.track_number);
    put(Property::Artist, object.artists.first().cloned());
    put(Property::Actor, object.actors.first().cloned());

    Item {
        object_id: object.id,
        parent_id: object.parent_id,
        ref_id: object.ref_id.filter(|r| !r.is_empty()),
        restricted: object
            .restricted
            .map(|r| r == "1" || r.eq_ignore_ascii_case("true"))
            .unwrap_or(false),
        title: object.title,
        class,
        class_name: object.class,
        child_count: object.child_count,
        resources,
        album_art,
        metadata,
    }
}

#[derive(Debug, Deserialize)]
struct DidlXml {
    #[serde(rename = "$value", default)]
    nodes: Vec<DidlNode>,
}

#[derive(Debug, Deserialize)]
enum DidlNode {
    #[serde(rename = "container")]
    Container(ObjectXml),
    #[serde(rename = "item")]
    Item(ObjectXml),
    // whitespace between elements
    #[serde(rename = "$text")]
    Text(String),
}

#[derive(Debug, Deserialize)]
struct ObjectXml {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@parentID", default)]
    parent_id: String,
    #[serde(rename = "@refID")]
    ref_id: Option<String>,
    #[serde(rename = "@restricted")]
    restricted: Option<String>,
    #[serde(rename = "@childCount")]
    child_count: Option<u32>,
    #[serde(rename = "title", default)]
    title: String,
    #[serde(rename = "class", default)]
    class: String,
    creator: Option<String>,
    date: Option<String>,
    description: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    #[serde(rename = "originalTrackNumber")]
    track_number: Option<String>,
    #[serde(rename = "artist", default)]
    artists: Vec<String>,
    #[serde(rename = "actor", default)]
    actors: Vec<String>,
    #[serde(rename = "albumArtURI", default)]
    album_art: Vec<AlbumArtXml>,
    #[serde(rename = "res", default)]
    resources: Vec<ResXml>,
}

#[derive(Debug, Deserialize)]
struct AlbumArtXml {
    #[serde(rename = "@profileID")]
    profile_id: Option<String>,
    #[serde(rename = "$text", default)]
    uri: String,
}

#[derive(Debug, Deserialize)]
struct ResXml {
    #[serde(rename = "@protocolInfo")]
    protocol_info: Option<String>,
    #[serde(rename = "@duration")]
    duration: Option<String>,
    #[serde(rename = "@size")]
    size: Option<String>,
    #[serde(rename = "@bitrate")]
    bitrate: Option<String>,
    #[serde(rename = "$text")]
    uri: Option<String>,
}
