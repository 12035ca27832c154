//! Materialised feature records.
//!
//! These types are the flattened, self-contained output of a query. They hold
//! no reference to the store that produced them and can be moved across
//! threads or serialised for transfer to another runtime.

use std::{fmt, str::FromStr};

use geo::{Coord, LineString};
use thiserror::Error;

use crate::BoundingBox;

/// Ordered `(key, value)` tag pairs as returned by the store.
///
/// Order and duplicates are preserved exactly as the store enumerated them.
pub type Tags = Vec<(String, String)>;

/// Classification of a map feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FeatureKind {
    /// A single point.
    Node,
    /// An ordered sequence of nodes.
    Way,
    /// A grouping of other features.
    Relation,
}

impl FeatureKind {
    /// Every kind, in store iteration order.
    pub const ALL: [Self; 3] = [Self::Node, Self::Way, Self::Relation];

    /// Lowercase name used in serialised output.
    ///
    /// # Examples
    /// ```
    /// use geodex_core::FeatureKind;
    ///
    /// assert_eq!(FeatureKind::Way.as_str(), "way");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }

    /// Compact integer code used by the dataset format.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Node => 0,
            Self::Way => 1,
            Self::Relation => 2,
        }
    }

    /// Inverse of [`FeatureKind::code`].
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Node),
            1 => Some(Self::Way),
            2 => Some(Self::Relation),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`FeatureKind`] name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown feature kind {0:?}; expected node, way or relation")]
pub struct ParseFeatureKindError(pub String);

impl FromStr for FeatureKind {
    type Err = ParseFeatureKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseFeatureKindError(s.to_owned()))
    }
}

/// One vertex of a way's geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeRecord {
    /// Node identifier, unique within the dataset.
    pub id: i64,
    /// WGS84 longitude in degrees.
    pub lon: f64,
    /// WGS84 latitude in degrees.
    pub lat: f64,
}

impl NodeRecord {
    /// Construct a vertex.
    #[must_use]
    pub const fn new(id: i64, lon: f64, lat: f64) -> Self {
        Self { id, lon, lat }
    }

    /// Position as a `geo` coordinate (`x = longitude`, `y = latitude`).
    #[must_use]
    pub const fn coord(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }
}

/// A fully materialised feature.
///
/// `name` is the value of the `name` tag, or the empty string when the
/// feature has none. `nodes` carries the way geometry captured at query time
/// and is empty for nodes and relations.
///
/// # Examples
/// ```
/// use geodex_core::{FeatureKind, FeatureRecord};
///
/// let cafe = FeatureRecord::new(
///     7,
///     FeatureKind::Node,
///     -0.1,
///     51.55,
///     vec![("amenity".into(), "cafe".into()), ("name".into(), "Fika".into())],
/// );
/// assert_eq!(cafe.name, "Fika");
/// assert_eq!(cafe.tag("amenity"), Some("cafe"));
/// assert!(!cafe.is_way());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeatureRecord {
    /// Identifier, unique per kind within the dataset.
    pub id: i64,
    /// Feature classification.
    pub kind: FeatureKind,
    /// Representative longitude in degrees.
    pub lon: f64,
    /// Representative latitude in degrees.
    pub lat: f64,
    /// Value of the `name` tag, empty when absent.
    pub name: String,
    /// All tags in store order.
    pub tags: Tags,
    /// Ordered way vertices; empty unless `kind` is [`FeatureKind::Way`].
    #[cfg_attr(feature = "serde", serde(default))]
    pub nodes: Vec<NodeRecord>,
    /// Area covered by a relation's members. Nodes and ways leave this unset
    /// since their location and vertices already describe their extent.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub extent: Option<BoundingBox>,
}

impl FeatureRecord {
    /// Construct a record without geometry, deriving `name` from the tags.
    #[must_use]
    pub fn new(id: i64, kind: FeatureKind, lon: f64, lat: f64, tags: Tags) -> Self {
        let name = tag_value(&tags, "name").unwrap_or_default().to_owned();
        Self {
            id,
            kind,
            lon,
            lat,
            name,
            tags,
            nodes: Vec::new(),
            extent: None,
        }
    }

    /// Attach way geometry.
    #[must_use]
    pub fn with_nodes(mut self, nodes: Vec<NodeRecord>) -> Self {
        self.nodes = nodes;
        self
    }

    /// Attach the area covered by a relation's members.
    #[must_use]
    pub fn with_extent(mut self, extent: BoundingBox) -> Self {
        self.extent = Some(extent);
        self
    }

    /// First value recorded for `key`.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        tag_value(&self.tags, key)
    }

    /// Whether any tag uses `key`.
    #[must_use]
    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.iter().any(|(k, _)| k == key)
    }

    /// Whether this record describes a way.
    #[must_use]
    pub fn is_way(&self) -> bool {
        self.kind == FeatureKind::Way
    }

    /// Whether the way geometry forms a ring.
    ///
    /// A ring needs at least four vertices with the first repeated last.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        match (self.nodes.first(), self.nodes.last()) {
            (Some(first), Some(last)) => self.nodes.len() >= 4 && first.id == last.id,
            _ => false,
        }
    }

    /// Whether the feature describes an area rather than a line or point.
    ///
    /// Closed ways count unless tagged `area=no`; relations count when they
    /// are multipolygons or boundaries.
    #[must_use]
    pub fn is_area(&self) -> bool {
        match self.kind {
            FeatureKind::Node => false,
            FeatureKind::Way => self.is_closed() && self.tag("area") != Some("no"),
            FeatureKind::Relation => {
                matches!(self.tag("type"), Some("multipolygon" | "boundary"))
            }
        }
    }

    /// Representative point as a `geo` coordinate.
    #[must_use]
    pub const fn location(&self) -> Coord<f64> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }

    /// Way geometry as a line string, or `None` when there are no vertices.
    #[must_use]
    pub fn line_string(&self) -> Option<LineString<f64>> {
        if self.nodes.is_empty() {
            return None;
        }
        Some(LineString::from(
            self.nodes.iter().map(NodeRecord::coord).collect::<Vec<_>>(),
        ))
    }
}

fn tag_value<'a>(tags: &'a [(String, String)], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
