//! Dataset building for geodex.
//!
//! Responsibilities:
//! - Read OpenStreetMap PBF extracts into [`geodex_core::FeatureRecord`]s.
//! - Write those records to query-ready datasets.
//! - Provide capability-based filesystem helpers for tool inputs and outputs.
//!
//! Boundaries:
//! - Query semantics and the dataset format live in `geodex-core`.
//!
//! Invariants:
//! - Ingestion is deterministic: features are ordered by kind then id.
//! - No global mutable state.

#![forbid(unsafe_code)]

mod dataset;
pub mod fs;
mod ingest;

pub use dataset::{BuildDatasetError, BuildSummary, build_dataset};
pub use ingest::{OsmIngestError, OsmIngestReport, OsmIngestSummary, ingest_osm_pbf};
