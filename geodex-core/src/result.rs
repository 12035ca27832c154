//! Materialised query results.

use thiserror::Error;

use crate::FeatureRecord;

/// Error returned by [`ResultSet::get`] for an index past the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("index {index} is out of range for a result set of {count} features")]
pub struct IndexError {
    /// Requested position.
    pub index: usize,
    /// Number of records in the set.
    pub count: usize,
}

/// Ordered, immutable snapshot of the features a query matched.
///
/// The set owns its records outright. It never refers back to the store that
/// produced it and stays valid after the store is dropped.
///
/// # Examples
/// ```
/// use geodex_core::{FeatureKind, FeatureRecord, ResultSet};
///
/// let results: ResultSet = [
///     FeatureRecord::new(1, FeatureKind::Node, 0.0, 0.0, Vec::new()),
///     FeatureRecord::new(2, FeatureKind::Node, 1.0, 1.0, Vec::new()),
/// ]
/// .into_iter()
/// .collect();
///
/// assert_eq!(results.count(), 2);
/// assert_eq!(results.get(1).map(|f| f.id), Ok(2));
/// assert!(results.get(2).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ResultSet {
    features: Vec<FeatureRecord>,
}

impl ResultSet {
    /// Number of records.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.features.len()
    }

    /// Whether the query matched nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Record at `index`.
    pub fn get(&self, index: usize) -> Result<&FeatureRecord, IndexError> {
        self.features.get(index).ok_or(IndexError {
            index,
            count: self.features.len(),
        })
    }

    /// Copy every record, in order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<FeatureRecord> {
        self.features.clone()
    }

    /// Take ownership of the records without copying.
    #[must_use]
    pub fn into_vec(self) -> Vec<FeatureRecord> {
        self.features
    }

    /// Borrow the records as a slice.
    #[must_use]
    pub const fn as_slice(&self) -> &[FeatureRecord] {
        self.features.as_slice()
    }

    /// Iterate over the records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, FeatureRecord> {
        self.features.iter()
    }
}

impl From<Vec<FeatureRecord>> for ResultSet {
    fn from(features: Vec<FeatureRecord>) -> Self {
        Self { features }
    }
}

impl FromIterator<FeatureRecord> for ResultSet {
    fn from_iter<I: IntoIterator<Item = FeatureRecord>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = FeatureRecord;
    type IntoIter = std::vec::IntoIter<FeatureRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a FeatureRecord;
    type IntoIter = std::slice::Iter<'a, FeatureRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}
