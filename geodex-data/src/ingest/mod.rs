use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use geodex_core::{BoundingBox, FeatureRecord};
use log::{info, warn};
use osmpbf::{Element, ElementReader};
use thiserror::Error;

mod accumulator;
mod tags;

use accumulator::OsmFeatureAccumulator;

/// Raw element counts of an extract and the extent of its valid nodes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OsmIngestSummary {
    /// Nodes read, dense entries included.
    pub nodes: u64,
    /// Ways read.
    pub ways: u64,
    /// Relations read.
    pub relations: u64,
    /// Extent of every node with a valid coordinate.
    pub bounds: Option<BoundingBox>,
}

impl OsmIngestSummary {
    fn merge(&mut self, other: &Self) {
        self.nodes += other.nodes;
        self.ways += other.ways;
        self.relations += other.relations;
        self.bounds = match (self.bounds, other.bounds) {
            (Some(lhs), Some(rhs)) => Some(lhs.union(&rhs)),
            (lhs, rhs) => lhs.or(rhs),
        };
    }
}

/// Element counts plus the features derived from an OSM extract.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmIngestReport {
    /// Element counts and node extent.
    pub summary: OsmIngestSummary,
    /// Tagged nodes, ways and relations ordered by kind then id.
    pub features: Vec<FeatureRecord>,
}

/// Failure while reading an OSM PBF file.
#[derive(Debug, Error)]
pub enum OsmIngestError {
    /// The file could not be opened.
    #[error("cannot open OSM extract {path:?}")]
    Open {
        /// Extract path.
        path: PathBuf,
        /// Reader failure.
        #[source]
        source: osmpbf::Error,
    },
    /// A block could not be decoded.
    #[error("cannot decode OSM extract {path:?}")]
    Decode {
        /// Extract path.
        path: PathBuf,
        /// Decoder failure.
        #[source]
        source: osmpbf::Error,
    },
}

/// Ingest an OSM PBF file into feature records.
///
/// Blocks are processed in parallel. Untagged ways that outline a relation
/// and coordinates not seen alongside the element that needs them are picked
/// up by sequential passes afterwards.
///
/// # Examples
/// ```no_run
/// use std::path::Path;
/// use geodex_data::ingest_osm_pbf;
///
/// # fn main() -> Result<(), geodex_data::OsmIngestError> {
/// let report = ingest_osm_pbf(Path::new("berlin.osm.pbf"))?;
/// println!("{} nodes, {} features", report.summary.nodes, report.features.len());
/// # Ok(())
/// # }
/// ```
pub fn ingest_osm_pbf(path: &Path) -> Result<OsmIngestReport, OsmIngestError> {
    let mut accumulator = open_reader(path)?
        .par_map_reduce(
            |element| {
                let mut block = OsmFeatureAccumulator::default();
                block.process_element(element);
                block
            },
            OsmFeatureAccumulator::default,
            OsmFeatureAccumulator::combine,
        )
        .map_err(decode_error(path))?;

    accumulator.settle_member_ways();
    if accumulator.has_pending_ways() {
        open_reader(path)?
            .for_each(|element| {
                if let Element::Way(way) = element {
                    accumulator.resolve_member_way(way.id(), way.refs());
                }
            })
            .map_err(decode_error(path))?;
    }

    if accumulator.has_pending_nodes() {
        open_reader(path)?
            .for_each(|element| match element {
                Element::Node(node) => {
                    accumulator.resolve_pending_node(node.id(), node.lon(), node.lat());
                }
                Element::DenseNode(node) => {
                    accumulator.resolve_pending_node(node.id(), node.lon(), node.lat());
                }
                Element::Way(_) | Element::Relation(_) => {}
            })
            .map_err(decode_error(path))?;
        if accumulator.has_pending_nodes() {
            warn!(
                "{} referenced nodes are missing from {}",
                accumulator.pending_node_count(),
                path.display()
            );
        }
    }

    let report = accumulator.into_report();
    info!(
        "Ingested {} nodes, {} ways and {} relations into {} features from {}",
        report.summary.nodes,
        report.summary.ways,
        report.summary.relations,
        report.features.len(),
        path.display()
    );
    Ok(report)
}

fn open_reader(path: &Path) -> Result<ElementReader<BufReader<File>>, OsmIngestError> {
    ElementReader::from_path(path).map_err(|source| OsmIngestError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn decode_error(path: &Path) -> impl FnOnce(osmpbf::Error) -> OsmIngestError + '_ {
    move |source| OsmIngestError::Decode {
        path: path.to_path_buf(),
        source,
    }
}
