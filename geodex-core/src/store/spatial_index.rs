//! Spatial index payload embedded in a dataset.
//!
//! The payload is a fixed header (`GDXI` followed by a little-endian `u16`
//! version) and a `bincode` list of feature envelopes. Readers rebuild an
//! R\*-tree from the envelopes when a dataset is opened.

use rstar::{AABB, RTreeObject};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{FeatureKind, FeatureRecord};

use super::feature_envelope;

/// Payload identifier.
pub(crate) const SPATIAL_INDEX_MAGIC: [u8; 4] = *b"GDXI";

/// Supported version of the payload layout.
pub(crate) const SPATIAL_INDEX_VERSION: u16 = 1;

const HEADER_LEN: usize = SPATIAL_INDEX_MAGIC.len() + size_of::<u16>();

/// Error emitted when decoding or validating a spatial index payload.
#[derive(Debug, Error)]
pub enum SpatialIndexError {
    /// The payload ended before the header was complete.
    #[error("spatial index payload is truncated: {len} bytes")]
    Truncated {
        /// Length of the payload.
        len: usize,
    },
    /// The payload did not start with the expected identifier.
    #[error("invalid spatial index magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected byte sequence.
        expected: [u8; 4],
        /// Sequence read from the payload.
        found: [u8; 4],
    },
    /// The header carried an unknown layout version.
    #[error("unsupported spatial index version {found}; supported version is {supported}")]
    UnsupportedVersion {
        /// Version present in the header.
        found: u16,
        /// Version understood by this build.
        supported: u16,
    },
    /// The envelope list could not be decoded.
    #[error("failed to decode spatial index entries: {source}")]
    Decode {
        /// Decoder error returned by `bincode`.
        #[source]
        source: bincode::Error,
    },
}

/// One feature envelope as stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct IndexedFeature {
    pub(crate) kind: FeatureKind,
    pub(crate) id: i64,
    pub(crate) area: bool,
    pub(crate) min: [f64; 2],
    pub(crate) max: [f64; 2],
}

impl IndexedFeature {
    pub(crate) fn from_record(record: &FeatureRecord) -> Self {
        let envelope = feature_envelope(record);
        Self {
            kind: record.kind,
            id: record.id,
            area: record.is_area(),
            min: [envelope.min().x, envelope.min().y],
            max: [envelope.max().x, envelope.max().y],
        }
    }
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.min, self.max)
    }
}

/// Serialise envelopes behind the payload header.
pub(crate) fn encode_index(entries: &[IndexedFeature]) -> Result<Vec<u8>, bincode::Error> {
    let body = bincode::serialize(entries)?;
    let mut payload = Vec::with_capacity(HEADER_LEN + body.len());
    payload.extend_from_slice(&SPATIAL_INDEX_MAGIC);
    payload.extend_from_slice(&SPATIAL_INDEX_VERSION.to_le_bytes());
    payload.extend_from_slice(&body);
    Ok(payload)
}

/// Validate the header and decode the envelopes.
pub(crate) fn decode_index(payload: &[u8]) -> Result<Vec<IndexedFeature>, SpatialIndexError> {
    let (Some(magic), Some(version), Some(body)) = (
        payload.get(..4),
        payload.get(4..HEADER_LEN),
        payload.get(HEADER_LEN..),
    ) else {
        return Err(SpatialIndexError::Truncated { len: payload.len() });
    };

    let mut found = [0_u8; 4];
    found.copy_from_slice(magic);
    if found != SPATIAL_INDEX_MAGIC {
        return Err(SpatialIndexError::InvalidMagic {
            expected: SPATIAL_INDEX_MAGIC,
            found,
        });
    }

    let version = u16::from_le_bytes([version[0], version[1]]);
    if version != SPATIAL_INDEX_VERSION {
        return Err(SpatialIndexError::UnsupportedVersion {
            found: version,
            supported: SPATIAL_INDEX_VERSION,
        });
    }

    bincode::deserialize(body).map_err(|source| SpatialIndexError::Decode { source })
}
