//! Core types for querying indexed map datasets.
//!
//! A [`Dataset`] owns one [`FeatureStore`] and answers bounding-box queries
//! with fully materialised [`ResultSet`]s. Every record carries its tags and,
//! for ways, the ordered vertices captured when the query ran, so results
//! can be handed to other components or runtimes without a live store.
//!
//! The bundled store reads SQLite datasets with an embedded R\*-tree and is
//! enabled by the `store-sqlite` feature.

#![forbid(unsafe_code)]

mod bbox;
mod feature;
pub mod filter;
mod query;
mod result;
pub mod store;
pub mod test_support;

pub use bbox::{BoundingBox, BoundingBoxError, ParseBoundingBoxError};
pub use feature::{FeatureKind, FeatureRecord, NodeRecord, ParseFeatureKindError, Tags};
pub use filter::{Filter, FilterSyntaxError};
pub use query::{Dataset, Preset, QueryError};
pub use result::{IndexError, ResultSet};
pub use store::{FeatureIter, FeatureStore, NodeIter, StoreError, StoredFeature};

#[cfg(feature = "store-sqlite")]
pub use store::{
    DatasetWriteError, OpenError, SpatialIndexError, SqliteFeatureStore, write_dataset,
};
