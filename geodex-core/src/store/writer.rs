//! Dataset creation.

use std::path::{Path, PathBuf};

use log::debug;
use rusqlite::{Connection, Transaction, params};
use thiserror::Error;

use crate::{FeatureKind, FeatureRecord};

use super::spatial_index::{IndexedFeature, encode_index};
use super::sqlite::{DATASET_FORMAT, DATASET_VERSION};

const SCHEMA: &str = "
    DROP TABLE IF EXISTS metadata;
    DROP TABLE IF EXISTS features;
    DROP TABLE IF EXISTS way_nodes;
    DROP TABLE IF EXISTS spatial_index;
    CREATE TABLE metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE features (
        kind INTEGER NOT NULL,
        id INTEGER NOT NULL,
        lon REAL NOT NULL,
        lat REAL NOT NULL,
        area INTEGER NOT NULL,
        tags TEXT NOT NULL,
        west REAL,
        south REAL,
        east REAL,
        north REAL,
        PRIMARY KEY (kind, id)
    );
    CREATE TABLE way_nodes (
        way_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        node_id INTEGER NOT NULL,
        lon REAL NOT NULL,
        lat REAL NOT NULL,
        PRIMARY KEY (way_id, position)
    );
    CREATE TABLE spatial_index (
        id INTEGER PRIMARY KEY,
        payload BLOB NOT NULL
    );
";

/// Error raised while writing a dataset.
#[derive(Debug, Error)]
pub enum DatasetWriteError {
    /// The database file could not be created or opened.
    #[error("failed to open {path} for writing: {source}")]
    Open {
        /// Destination path.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Creating tables or writing metadata failed.
    #[error("failed to prepare dataset schema: {source}")]
    Schema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// A feature's tags could not be encoded.
    #[error("failed to encode tags for {kind} {id}: {source}")]
    EncodeTags {
        /// Kind of the offending feature.
        kind: FeatureKind,
        /// Identifier of the offending feature.
        id: i64,
        /// JSON encoder failure.
        #[source]
        source: serde_json::Error,
    },
    /// Inserting a feature failed, for example because its id repeats.
    #[error("failed to store {kind} {id}: {source}")]
    PersistFeature {
        /// Kind of the offending feature.
        kind: FeatureKind,
        /// Identifier of the offending feature.
        id: i64,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The spatial index could not be encoded.
    #[error("failed to encode spatial index: {source}")]
    EncodeIndex {
        /// Encoder failure from `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// Writing the spatial index or committing failed.
    #[error("failed to finish dataset {path}: {source}")]
    Commit {
        /// Destination path.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
}

/// Create or replace the dataset at `path` with `features`.
///
/// Everything is written in one transaction, so a failed write leaves any
/// previous dataset at `path` intact. Feature ids must be unique per kind.
pub fn write_dataset(path: &Path, features: &[FeatureRecord]) -> Result<(), DatasetWriteError> {
    let mut connection = Connection::open(path).map_err(|source| DatasetWriteError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let transaction = connection
        .transaction()
        .map_err(|source| DatasetWriteError::Schema { source })?;

    transaction
        .execute_batch(SCHEMA)
        .map_err(|source| DatasetWriteError::Schema { source })?;
    transaction
        .execute(
            "INSERT INTO metadata (key, value) VALUES ('format', ?1), ('version', ?2)",
            params![DATASET_FORMAT, DATASET_VERSION.to_string()],
        )
        .map_err(|source| DatasetWriteError::Schema { source })?;

    insert_features(&transaction, features)?;

    let entries: Vec<IndexedFeature> = features.iter().map(IndexedFeature::from_record).collect();
    let payload = encode_index(&entries).map_err(|source| DatasetWriteError::EncodeIndex { source })?;
    let commit_error = |source| DatasetWriteError::Commit {
        path: path.to_path_buf(),
        source,
    };
    transaction
        .execute(
            "INSERT INTO spatial_index (id, payload) VALUES (0, ?1)",
            [payload],
        )
        .map_err(commit_error)?;
    transaction.commit().map_err(commit_error)?;

    debug!("wrote {} features to {}", features.len(), path.display());
    Ok(())
}

fn insert_features(
    transaction: &Transaction<'_>,
    features: &[FeatureRecord],
) -> Result<(), DatasetWriteError> {
    let mut feature_insert = transaction
        .prepare(
            "INSERT INTO features (kind, id, lon, lat, area, tags, west, south, east, north) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .map_err(|source| DatasetWriteError::Schema { source })?;
    let mut node_insert = transaction
        .prepare(
            "INSERT INTO way_nodes (way_id, position, node_id, lon, lat) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(|source| DatasetWriteError::Schema { source })?;

    for feature in features {
        let persist_error = |source| DatasetWriteError::PersistFeature {
            kind: feature.kind,
            id: feature.id,
            source,
        };
        let tags = serde_json::to_string(&feature.tags).map_err(|source| {
            DatasetWriteError::EncodeTags {
                kind: feature.kind,
                id: feature.id,
                source,
            }
        })?;
        feature_insert
            .execute(params![
                feature.kind.code(),
                feature.id,
                feature.lon,
                feature.lat,
                feature.is_area(),
                tags,
                feature.extent.map(|extent| extent.west),
                feature.extent.map(|extent| extent.south),
                feature.extent.map(|extent| extent.east),
                feature.extent.map(|extent| extent.north),
            ])
            .map_err(persist_error)?;

        if !feature.is_way() {
            continue;
        }
        for (position, node) in (0_i64..).zip(&feature.nodes) {
            node_insert
                .execute(params![feature.id, position, node.id, node.lon, node.lat])
                .map_err(persist_error)?;
        }
    }
    Ok(())
}
