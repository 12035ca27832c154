//! Facade crate for geodex, a read-only spatial feature query layer.
//!
//! The crate re-exports the core types and, with the `store-sqlite` feature,
//! a flat set of functions covering the whole lifecycle: open a dataset,
//! query it by amenity or raw filter, then count or list the results. Those
//! functions are the surface mirrored by the `geodex-capi` C ABI.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = geodex::create_store("london.geodex")?;
//! let cafes = geodex::query_amenities(&store, "cafe", -0.2, 51.5, 0.0, 51.6)?;
//! for cafe in geodex::to_list(&cafes) {
//!     println!("{} at {}, {}", cafe.name, cafe.lon, cafe.lat);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub use geodex_core::{
    BoundingBox, BoundingBoxError, Dataset, FeatureKind, FeatureRecord, FeatureStore, Filter,
    FilterSyntaxError, IndexError, NodeRecord, ParseBoundingBoxError, Preset, QueryError,
    ResultSet, StoreError, StoredFeature, Tags,
};

#[cfg(feature = "store-sqlite")]
pub use geodex_core::{DatasetWriteError, OpenError, SqliteFeatureStore, write_dataset};

#[cfg(feature = "store-sqlite")]
use std::path::Path;

/// Store handle bound to a SQLite dataset.
#[cfg(feature = "store-sqlite")]
pub type GeoDex = Dataset<SqliteFeatureStore>;

/// Open the dataset at `path`.
///
/// # Errors
/// Returns [`OpenError`] when the file is missing, unreadable, not a geodex
/// dataset or carries an inconsistent spatial index.
#[cfg(feature = "store-sqlite")]
pub fn create_store<P: AsRef<Path>>(path: P) -> Result<GeoDex, OpenError> {
    open(path)
}

/// Open the dataset at `path`; same as [`create_store`].
///
/// # Errors
/// Returns [`OpenError`] under the same conditions as [`create_store`].
#[cfg(feature = "store-sqlite")]
pub fn open<P: AsRef<Path>>(path: P) -> Result<GeoDex, OpenError> {
    SqliteFeatureStore::open(path).map(Dataset::new)
}

/// Nodes and areas tagged `amenity=<amenity>` inside the given box.
///
/// # Errors
/// Returns [`QueryError`] when the box is malformed or the store fails.
#[cfg(feature = "store-sqlite")]
pub fn query_amenities(
    store: &GeoDex,
    amenity: &str,
    west: f64,
    south: f64,
    east: f64,
    north: f64,
) -> Result<ResultSet, QueryError> {
    store.query_amenities(amenity, BoundingBox::new(west, south, east, north))
}

/// Features matching `filter` inside the given box.
///
/// # Errors
/// Returns [`QueryError`] when the box is malformed, the filter does not
/// parse or the store fails.
#[cfg(feature = "store-sqlite")]
pub fn query_raw(
    store: &GeoDex,
    filter: &str,
    west: f64,
    south: f64,
    east: f64,
    north: f64,
) -> Result<ResultSet, QueryError> {
    store.query(filter, BoundingBox::new(west, south, east, north))
}

/// Number of records in `results`.
#[must_use]
pub fn count(results: &ResultSet) -> usize {
    results.count()
}

/// Copy every record of `results`, in order.
#[must_use]
pub fn to_list(results: &ResultSet) -> Vec<FeatureRecord> {
    results.to_vec()
}
