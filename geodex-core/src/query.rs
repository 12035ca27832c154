//! Store handle and query execution.

use std::time::Instant;

use log::debug;
use thiserror::Error;

use crate::filter::amenity_filter;
use crate::store::{FeatureStore, StoreError, StoredFeature};
use crate::{BoundingBox, BoundingBoxError, FeatureRecord, ResultSet};

/// Error returned when a query cannot produce a result set.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The bounding box was rejected before the store was consulted.
    #[error(transparent)]
    InvalidBoundingBox(#[from] BoundingBoxError),
    /// The store failed while selecting or reading features.
    #[error("query failed for filter {filter:?}: {source}")]
    Store {
        /// Filter expression as supplied.
        filter: String,
        /// Failure reported by the store.
        #[source]
        source: StoreError,
    },
}

/// Ready-made queries for common feature categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Nodes and areas carrying any `amenity` tag.
    AllAmenities,
    /// `amenity=restaurant`.
    Restaurants,
    /// `amenity=cafe`.
    Cafes,
    /// `amenity=bar` or `amenity=pub`.
    BarsAndPubs,
    /// Bus stop nodes and areas.
    BusStops,
    /// Ways tagged `highway`.
    Roads,
}

impl Preset {
    /// Filter expression the preset runs.
    #[must_use]
    pub fn filter(self) -> String {
        match self {
            Self::AllAmenities => "na[amenity]".to_owned(),
            Self::Restaurants => amenity_filter("restaurant"),
            Self::Cafes => amenity_filter("cafe"),
            Self::BarsAndPubs => "na[amenity=bar,pub]".to_owned(),
            Self::BusStops => "na[highway=bus_stop]".to_owned(),
            Self::Roads => "w[highway]".to_owned(),
        }
    }
}

/// Handle bound to exactly one feature store.
///
/// The handle owns the store for its whole life and exposes no mutation.
/// Queries run synchronously and return fully materialised [`ResultSet`]s
/// that remain valid after the handle is dropped.
///
/// # Examples
///
/// ```
/// use geodex_core::{BoundingBox, Dataset, FeatureKind, FeatureRecord, test_support::MemoryStore};
///
/// let cafe = FeatureRecord::new(
///     1,
///     FeatureKind::Node,
///     -0.1,
///     51.55,
///     vec![("amenity".into(), "cafe".into())],
/// );
/// let dataset = Dataset::new(MemoryStore::with_features([cafe]));
/// let results = dataset
///     .query_amenities("cafe", BoundingBox::new(-0.2, 51.5, 0.0, 51.6))
///     .unwrap();
/// assert_eq!(results.count(), 1);
/// assert_eq!(results.get(0).unwrap().name, "");
/// ```
#[derive(Debug)]
pub struct Dataset<S> {
    store: S,
}

impl<S> Dataset<S> {
    /// Bind a handle to `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// Borrow the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Release the handle and return the store.
    pub fn into_store(self) -> S {
        self.store
    }
}

impl<S: FeatureStore> Dataset<S> {
    /// Run `filter` within `bbox` and materialise every match.
    ///
    /// The filter string is passed to the store unchanged. Any failure
    /// discards the records gathered so far.
    pub fn query(&self, filter: &str, bbox: BoundingBox) -> Result<ResultSet, QueryError> {
        let rect = bbox.to_rect()?;
        let started = Instant::now();
        let store_error = |source| QueryError::Store {
            filter: filter.to_owned(),
            source,
        };

        let features = self.store.select(filter, &rect).map_err(store_error)?;
        let records = features
            .map(|feature| feature.and_then(|feature| materialise(feature.as_ref())))
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_error)?;

        debug!(
            "query {filter:?} in {bbox} matched {} features in {:?}",
            records.len(),
            started.elapsed()
        );
        Ok(ResultSet::from(records))
    }

    /// Find nodes and areas tagged `amenity` with exactly `amenity`.
    ///
    /// The value is quoted before it reaches the filter, so punctuation in
    /// it is matched literally.
    pub fn query_amenities(
        &self,
        amenity: &str,
        bbox: BoundingBox,
    ) -> Result<ResultSet, QueryError> {
        self.query(&amenity_filter(amenity), bbox)
    }

    /// Run one of the [`Preset`] queries.
    pub fn query_preset(&self, preset: Preset, bbox: BoundingBox) -> Result<ResultSet, QueryError> {
        self.query(&preset.filter(), bbox)
    }
}

/// Copy a stored feature into an owned record, capturing way vertices.
fn materialise(feature: &dyn StoredFeature) -> Result<FeatureRecord, StoreError> {
    let nodes = if feature.is_way() {
        feature.nodes().collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };
    Ok(FeatureRecord {
        id: feature.id(),
        kind: feature.kind(),
        lon: feature.lon(),
        lat: feature.lat(),
        name: feature.tag("name").unwrap_or_default().to_owned(),
        tags: feature
            .tags()
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect(),
        nodes,
        extent: feature.extent(),
    })
}
