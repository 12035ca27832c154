//! Command-line interface for building and querying geodex datasets.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::Utf8Path;
use clap::{Parser, Subcommand, error::ErrorKind};
use serde::Serialize;

mod build;
mod error;
mod query;

pub use error::CliError;

use build::BuildArgs;
use query::{AmenitiesArgs, QueryArgs};

const ARG_OSM_PBF: &str = "osm-pbf";
const ARG_OUTPUT: &str = "output";
const ARG_DATASET: &str = "dataset";
const ARG_BBOX: &str = "bbox";
const ARG_FILTER: &str = "filter";
const ARG_AMENITY: &str = "amenity";
const ENV_BUILD_OSM_PBF: &str = "GEODEX_CMDS_BUILD_OSM_PBF";
const ENV_BUILD_OUTPUT: &str = "GEODEX_CMDS_BUILD_OUTPUT";
const ENV_QUERY_DATASET: &str = "GEODEX_CMDS_QUERY_DATASET";
const ENV_QUERY_BBOX: &str = "GEODEX_CMDS_QUERY_BBOX";
const ENV_QUERY_FILTER: &str = "GEODEX_CMDS_QUERY_FILTER";
const ENV_AMENITIES_DATASET: &str = "GEODEX_CMDS_AMENITIES_DATASET";
const ENV_AMENITIES_BBOX: &str = "GEODEX_CMDS_AMENITIES_BBOX";
const ENV_AMENITIES_AMENITY: &str = "GEODEX_CMDS_AMENITIES_AMENITY";

/// Run the geodex CLI with the current process arguments and environment.
///
/// Command output goes to standard output. `--help` and `--version` print
/// and exit the process directly.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse()
        .or_else(|err| match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => Err(err),
        })
        .map_err(CliError::ArgumentParsing)?;
    let mut stdout = std::io::stdout().lock();
    run_with(cli, &mut stdout)
}

fn run_with(cli: Cli, writer: &mut dyn Write) -> Result<(), CliError> {
    match cli.command {
        Command::Build(args) => build::run_build_with(args, writer),
        Command::Query(args) => query::run_query_with(args.into_config()?, writer),
        Command::Amenities(args) => query::run_query_with(args.into_config()?, writer),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "geodex",
    about = "Build and query indexed OpenStreetMap feature datasets",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a dataset from an OSM PBF extract.
    Build(BuildArgs),
    /// Query a dataset with a filter expression.
    Query(QueryArgs),
    /// List features tagged with one amenity.
    Amenities(AmenitiesArgs),
}

/// Check that `path` names an existing regular file.
fn require_existing(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match geodex_data::fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write `value` as pretty JSON followed by a newline.
fn write_json<T: Serialize + ?Sized>(writer: &mut dyn Write, value: &T) -> Result<(), CliError> {
    let payload = serde_json::to_string_pretty(value).map_err(CliError::SerializeOutput)?;
    writer
        .write_all(payload.as_bytes())
        .map_err(CliError::WriteOutput)?;
    writer.write_all(b"\n").map_err(CliError::WriteOutput)?;
    Ok(())
}

#[cfg(test)]
mod tests;
