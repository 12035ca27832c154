//! SQLite-backed feature store.

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use geo::Rect;
use log::debug;
use rstar::{AABB, RTree};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use thiserror::Error;

use crate::{BoundingBox, FeatureKind, Filter, NodeRecord, Tags};

use super::spatial_index::{IndexedFeature, SpatialIndexError, decode_index};
use super::{FeatureIter, FeatureStore, NodeIter, StoreError, StoredFeature};

/// Value of the `format` metadata row.
pub(crate) const DATASET_FORMAT: &str = "geodex";

/// Value of the `version` metadata row understood by this build.
pub(crate) const DATASET_VERSION: u32 = 1;

/// Error raised when a dataset cannot be opened.
#[derive(Debug, Error)]
pub enum OpenError {
    /// Nothing exists at the path.
    #[error("dataset {path} does not exist")]
    NotFound {
        /// Requested location.
        path: PathBuf,
    },
    /// The path could not be inspected, or is not a regular file.
    #[error("failed to inspect dataset path {path}: {source}")]
    Inspect {
        /// Requested location.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// SQLite refused to open the file.
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the database.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// The file is not a geodex dataset.
    #[error("{path} is not a geodex dataset: {reason}")]
    Unrecognised {
        /// Location of the file.
        path: PathBuf,
        /// What was missing or unexpected.
        reason: String,
    },
    /// The dataset was written by an incompatible version.
    #[error("dataset {path} has version {found}; supported version is {supported}")]
    UnsupportedVersion {
        /// Location of the dataset.
        path: PathBuf,
        /// Version recorded in the metadata table.
        found: String,
        /// Version understood by this build.
        supported: u32,
    },
    /// The embedded spatial index is damaged.
    #[error("spatial index in {path} is invalid: {source}")]
    SpatialIndex {
        /// Location of the dataset.
        path: PathBuf,
        /// Decoding failure.
        #[source]
        source: SpatialIndexError,
    },
    /// The spatial index and the feature table disagree.
    #[error("spatial index in {path} lists {indexed} features but the table holds {stored}")]
    IndexMismatch {
        /// Location of the dataset.
        path: PathBuf,
        /// Envelopes in the spatial index.
        indexed: usize,
        /// Rows in the `features` table.
        stored: u64,
    },
}

/// Read-only store over a dataset file.
///
/// Envelopes live in an in-memory R\*-tree; tags and way vertices are read
/// from SQLite on demand. The connection cannot be shared between threads,
/// so the store is `Send` but not `Sync`.
pub struct SqliteFeatureStore {
    path: PathBuf,
    connection: Connection,
    index: RTree<IndexedFeature>,
}

impl fmt::Debug for SqliteFeatureStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteFeatureStore")
            .field("path", &self.path)
            .field("entries", &self.index.size())
            .finish_non_exhaustive()
    }
}

impl SqliteFeatureStore {
    /// Open the dataset at `path` read-only and load its spatial index.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, OpenError> {
        let path = path.as_ref();
        ensure_regular_file(path)?;

        let connection = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| OpenError::OpenDatabase {
            path: path.to_path_buf(),
            source,
        })?;

        check_metadata(&connection, path)?;

        let unrecognised = |err: rusqlite::Error| OpenError::Unrecognised {
            path: path.to_path_buf(),
            reason: err.to_string(),
        };
        let payload: Vec<u8> = connection
            .query_row(
                "SELECT payload FROM spatial_index WHERE id = 0",
                [],
                |row| row.get(0),
            )
            .map_err(unrecognised)?;
        let entries = decode_index(&payload).map_err(|source| OpenError::SpatialIndex {
            path: path.to_path_buf(),
            source,
        })?;

        let stored: u64 = connection
            .query_row("SELECT COUNT(*) FROM features", [], |row| row.get(0))
            .map_err(unrecognised)?;
        if usize::try_from(stored).ok() != Some(entries.len()) {
            return Err(OpenError::IndexMismatch {
                path: path.to_path_buf(),
                indexed: entries.len(),
                stored,
            });
        }

        debug!("opened dataset {} with {stored} features", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            connection,
            index: RTree::bulk_load(entries),
        })
    }

    /// Location of the dataset file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of features in the dataset.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.size()
    }

    /// Whether the dataset holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.size() == 0
    }

    fn load_matching(
        &self,
        entry: &IndexedFeature,
        filter: &Filter,
    ) -> Result<Option<SqliteFeature<'_>>, StoreError> {
        let row = self
            .connection
            .prepare_cached(
                "SELECT lon, lat, tags, west, south, east, north FROM features \
                 WHERE kind = ?1 AND id = ?2",
            )
            .and_then(|mut statement| {
                statement
                    .query_row(params![entry.kind.code(), entry.id], |row| {
                        let edges = (
                            row.get::<_, Option<f64>>(3)?,
                            row.get::<_, Option<f64>>(4)?,
                            row.get::<_, Option<f64>>(5)?,
                            row.get::<_, Option<f64>>(6)?,
                        );
                        let extent = match edges {
                            (Some(west), Some(south), Some(east), Some(north)) => {
                                Some(BoundingBox::new(west, south, east, north))
                            }
                            _ => None,
                        };
                        Ok((
                            row.get::<_, f64>(0)?,
                            row.get::<_, f64>(1)?,
                            row.get::<_, String>(2)?,
                            extent,
                        ))
                    })
                    .optional()
            })
            .map_err(StoreError::backend)?;
        let Some((lon, lat, tags_json, extent)) = row else {
            return Err(StoreError::Corrupt {
                kind: entry.kind,
                id: entry.id,
                reason: "listed in the spatial index but missing from the feature table".into(),
            });
        };
        let tags: Tags = serde_json::from_str(&tags_json).map_err(|err| StoreError::Corrupt {
            kind: entry.kind,
            id: entry.id,
            reason: format!("invalid tags: {err}"),
        })?;

        if !filter.matches(entry.kind, entry.area, &tags) {
            return Ok(None);
        }
        Ok(Some(SqliteFeature {
            store: self,
            kind: entry.kind,
            id: entry.id,
            lon,
            lat,
            tags,
            extent,
        }))
    }

    fn way_nodes(&self, way_id: i64) -> Result<Vec<NodeRecord>, StoreError> {
        let mut statement = self
            .connection
            .prepare_cached(
                "SELECT node_id, lon, lat FROM way_nodes WHERE way_id = ?1 ORDER BY position",
            )
            .map_err(StoreError::backend)?;
        let rows = statement
            .query_map([way_id], |row| {
                Ok(NodeRecord::new(row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(StoreError::backend)?;
        let nodes = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::backend)?;
        Ok(nodes)
    }
}

impl FeatureStore for SqliteFeatureStore {
    fn select<'a>(
        &'a self,
        filter: &str,
        bbox: &Rect<f64>,
    ) -> Result<FeatureIter<'a>, StoreError> {
        let filter = Filter::parse(filter)?;
        let envelope =
            AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y]);
        let mut candidates: Vec<&IndexedFeature> = self
            .index
            .locate_in_envelope_intersecting(&envelope)
            .filter(|entry| filter.accepts_kind(entry.kind, entry.area))
            .collect();
        candidates.sort_unstable_by_key(|entry| (entry.kind, entry.id));

        Ok(Box::new(candidates.into_iter().filter_map(move |entry| {
            match self.load_matching(entry, &filter) {
                Ok(Some(feature)) => Some(Ok(Box::new(feature) as Box<dyn StoredFeature + 'a>)),
                Ok(None) => None,
                Err(err) => Some(Err(err)),
            }
        })))
    }
}

/// Feature row loaded during iteration.
struct SqliteFeature<'a> {
    store: &'a SqliteFeatureStore,
    kind: FeatureKind,
    id: i64,
    lon: f64,
    lat: f64,
    tags: Tags,
    extent: Option<BoundingBox>,
}

impl StoredFeature for SqliteFeature<'_> {
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
        if self.kind != FeatureKind::Way {
            return Box::new(std::iter::empty());
        }
        match self.store.way_nodes(self.id) {
            Ok(nodes) => Box::new(nodes.into_iter().map(Ok)),
            Err(err) => Box::new(std::iter::once(Err(err))),
        }
    }

    fn extent(&self) -> Option<BoundingBox> {
        self.extent
    }
}

fn ensure_regular_file(path: &Path) -> Result<(), OpenError> {
    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(OpenError::Inspect {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        }),
        Err(source) if source.kind() == io::ErrorKind::NotFound => Err(OpenError::NotFound {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(OpenError::Inspect {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn check_metadata(connection: &Connection, path: &Path) -> Result<(), OpenError> {
    let read = |key: &str| -> Result<Option<String>, OpenError> {
        connection
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(|err| OpenError::Unrecognised {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })
    };

    match read("format")? {
        Some(format) if format == DATASET_FORMAT => {}
        Some(format) => {
            return Err(OpenError::Unrecognised {
                path: path.to_path_buf(),
                reason: format!("format marker is {format:?}"),
            });
        }
        None => {
            return Err(OpenError::Unrecognised {
                path: path.to_path_buf(),
                reason: "format marker is missing".into(),
            });
        }
    }

    let found = read("version")?.unwrap_or_default();
    if found.parse::<u32>().ok() != Some(DATASET_VERSION) {
        return Err(OpenError::UnsupportedVersion {
            path: path.to_path_buf(),
            found,
            supported: DATASET_VERSION,
        });
    }
    Ok(())
}
