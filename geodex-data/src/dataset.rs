//! Build query-ready datasets from OSM extracts.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use geodex_core::{DatasetWriteError, write_dataset};
use log::info;
use thiserror::Error;

use crate::fs::ensure_parent_dir;
use crate::ingest::{OsmIngestError, OsmIngestSummary, ingest_osm_pbf};

/// Outcome of a successful [`build_dataset`] run.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    /// Raw element counts from the extract.
    pub ingest: OsmIngestSummary,
    /// Number of features written to the dataset.
    pub features: usize,
    /// Dataset that was written.
    pub output: Utf8PathBuf,
}

/// Errors raised while building a dataset.
#[derive(Debug, Error)]
pub enum BuildDatasetError {
    /// The output directory could not be created.
    #[error("failed to create parent directory for {path}")]
    CreateParent {
        /// Dataset path whose parent was being created.
        path: Utf8PathBuf,
        /// Filesystem failure.
        #[source]
        source: io::Error,
    },
    /// Reading the extract failed.
    #[error(transparent)]
    Ingest(#[from] OsmIngestError),
    /// Writing the dataset failed.
    #[error(transparent)]
    Write(#[from] DatasetWriteError),
}

/// Ingest `osm_pbf` and write its features to a dataset at `output`.
///
/// Missing parent directories of `output` are created. An existing dataset
/// at `output` is replaced in a single transaction.
///
/// # Examples
/// ```no_run
/// use camino::Utf8Path;
/// use geodex_data::build_dataset;
///
/// # fn main() -> Result<(), geodex_data::BuildDatasetError> {
/// let summary = build_dataset(
///     Utf8Path::new("london.osm.pbf"),
///     Utf8Path::new("artefacts/london.geodex"),
/// )?;
/// println!("wrote {} features", summary.features);
/// # Ok(())
/// # }
/// ```
pub fn build_dataset(
    osm_pbf: &Utf8Path,
    output: &Utf8Path,
) -> Result<BuildSummary, BuildDatasetError> {
    let report = ingest_osm_pbf(osm_pbf.as_std_path())?;
    ensure_parent_dir(output).map_err(|source| BuildDatasetError::CreateParent {
        path: output.to_path_buf(),
        source,
    })?;
    write_dataset(output.as_std_path(), &report.features)?;
    info!("Wrote {} features to {output}", report.features.len());
    Ok(BuildSummary {
        ingest: report.summary,
        features: report.features.len(),
        output: output.to_path_buf(),
    })
}
