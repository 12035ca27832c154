//! Error types emitted by the geodex CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geodex::{OpenError, QueryError};
use geodex_data::BuildDatasetError;
use thiserror::Error;

/// Errors emitted by the geodex CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// A referenced input path does not exist on disk.
    #[error("{field} path {path:?} does not exist")]
    MissingSourceFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path exists but is not a file.
    #[error("{field} path {path:?} exists but is not a file")]
    SourcePathNotFile {
        field: &'static str,
        path: Utf8PathBuf,
    },
    /// A referenced input path could not be inspected due to an IO error.
    #[error("failed to inspect {field} path {path:?}: {source}")]
    InspectSourcePath {
        field: &'static str,
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The `--bbox` value is not four comma-separated numbers.
    #[error("invalid bounding box {value:?}: {source}")]
    InvalidBoundingBox {
        value: String,
        #[source]
        source: geodex::ParseBoundingBoxError,
    },
    /// Building a dataset from an extract failed.
    #[error("failed to build dataset: {0}")]
    Build(#[from] BuildDatasetError),
    /// Opening the dataset failed.
    #[error(transparent)]
    Open(#[from] OpenError),
    /// The query was rejected or the store failed.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
