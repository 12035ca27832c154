//! Read-only access to indexed feature stores.
//!
//! [`FeatureStore`] is the narrow capability interface the query executor
//! relies on: select the features matching a filter inside a rectangle, then
//! read each feature's identity, position, tags and way vertices through
//! [`StoredFeature`]. Index structures and file formats stay behind it.

use geo::{Coord, Rect};
use thiserror::Error;

use crate::{BoundingBox, FeatureKind, FeatureRecord, FilterSyntaxError, NodeRecord};

#[cfg(feature = "store-sqlite")]
mod spatial_index;
#[cfg(feature = "store-sqlite")]
mod sqlite;
#[cfg(feature = "store-sqlite")]
mod writer;

#[cfg(feature = "store-sqlite")]
pub use spatial_index::SpatialIndexError;
#[cfg(feature = "store-sqlite")]
pub use sqlite::{OpenError, SqliteFeatureStore};
#[cfg(feature = "store-sqlite")]
pub use writer::{DatasetWriteError, write_dataset};

/// Fallible stream of features produced by [`FeatureStore::select`].
pub type FeatureIter<'a> =
    Box<dyn Iterator<Item = Result<Box<dyn StoredFeature + 'a>, StoreError>> + 'a>;

/// Fallible stream of way vertices produced by [`StoredFeature::nodes`].
pub type NodeIter<'a> = Box<dyn Iterator<Item = Result<NodeRecord, StoreError>> + 'a>;

/// Failures reported by a store while selecting or reading features.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The filter expression did not parse.
    #[error(transparent)]
    Filter(#[from] FilterSyntaxError),
    /// A stored feature could not be decoded.
    #[error("{kind} {id} is corrupt: {reason}")]
    Corrupt {
        /// Kind of the damaged feature.
        kind: FeatureKind,
        /// Identifier of the damaged feature.
        id: i64,
        /// What was wrong with it.
        reason: String,
    },
    /// The underlying storage engine failed.
    #[error("storage backend failure: {source}")]
    Backend {
        /// Error raised by the storage engine.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Wrap a storage engine error.
    pub fn backend<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(source),
        }
    }
}

/// Read-only indexed feature store.
///
/// The rectangle uses WGS84 degrees with `x = longitude` and `y = latitude`;
/// features whose envelope touches it, boundary included, are candidates.
/// Filter grammar and ordering belong to the implementation, but the order
/// must be deterministic for an unchanged store.
///
/// # Examples
///
/// ```rust
/// use geo::{Coord, Rect};
/// use geodex_core::{FeatureKind, FeatureRecord, FeatureStore, test_support::MemoryStore};
///
/// let bench = FeatureRecord::new(
///     1,
///     FeatureKind::Node,
///     0.0,
///     0.0,
///     vec![("amenity".into(), "bench".into())],
/// );
/// let store = MemoryStore::with_features([bench]);
/// let bbox = Rect::new(Coord { x: -1.0, y: -1.0 }, Coord { x: 1.0, y: 1.0 });
///
/// let found = store.select("n[amenity]", &bbox).unwrap().count();
/// assert_eq!(found, 1);
/// ```
pub trait FeatureStore {
    /// Stream the features matching `filter` that intersect `bbox`.
    ///
    /// Filter syntax errors are reported here, before any feature is
    /// produced. Failures while reading individual features surface as
    /// `Err` items.
    fn select<'a>(&'a self, filter: &str, bbox: &Rect<f64>)
    -> Result<FeatureIter<'a>, StoreError>;
}

/// One feature as exposed by a store during iteration.
pub trait StoredFeature {
    /// Identifier, unique per kind.
    fn id(&self) -> i64;

    /// Feature classification.
    fn kind(&self) -> FeatureKind;

    /// Representative longitude.
    fn lon(&self) -> f64;

    /// Representative latitude.
    fn lat(&self) -> f64;

    /// All tags in store order.
    fn tags(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_>;

    /// First value recorded for `key`.
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Whether the feature is a way.
    fn is_way(&self) -> bool {
        self.kind() == FeatureKind::Way
    }

    /// Way vertices in order; empty for other kinds.
    fn nodes(&self) -> NodeIter<'_>;

    /// Area covered by a relation's members, when the store recorded one.
    fn extent(&self) -> Option<BoundingBox> {
        None
    }
}

impl StoredFeature for FeatureRecord {
    fn id(&self) -> i64 {
        self.id
    }

    fn kind(&self) -> FeatureKind {
        self.kind
    }

    fn lon(&self) -> f64 {
        self.lon
    }

    fn lat(&self) -> f64 {
        self.lat
    }

    fn tags(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_> {
        Box::new(self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    fn nodes(&self) -> NodeIter<'_> {
        Box::new(self.nodes.iter().copied().map(Ok))
    }

    fn extent(&self) -> Option<BoundingBox> {
        self.extent
    }
}

/// Envelope of a record: the recorded extent of a relation, the vertices of a
/// way with geometry, otherwise the representative point.
pub(crate) fn feature_envelope(feature: &FeatureRecord) -> Rect<f64> {
    if let Some(extent) = feature.extent {
        return Rect::new(
            Coord {
                x: extent.west,
                y: extent.south,
            },
            Coord {
                x: extent.east,
                y: extent.north,
            },
        );
    }
    let location = feature.location();
    let Some(first) = feature.nodes.first() else {
        return Rect::new(location, location);
    };
    let (min, max) = feature.nodes.iter().fold(
        (first.coord(), first.coord()),
        |(min, max), node| {
            (
                Coord {
                    x: min.x.min(node.lon),
                    y: min.y.min(node.lat),
                },
                Coord {
                    x: max.x.max(node.lon),
                    y: max.y.max(node.lat),
                },
            )
        },
    );
    Rect::new(min, max)
}

/// Inclusive rectangle overlap test.
pub(crate) fn envelopes_intersect(lhs: &Rect<f64>, rhs: &Rect<f64>) -> bool {
    lhs.min().x <= rhs.max().x
        && rhs.min().x <= lhs.max().x
        && lhs.min().y <= rhs.max().y
        && rhs.min().y <= lhs.max().y
}
