//! Query commands: run a filter or an amenity lookup against a dataset.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geodex::{BoundingBox, ResultSet};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_AMENITY, ARG_BBOX, ARG_DATASET, ARG_FILTER, CliError, ENV_AMENITIES_AMENITY,
    ENV_AMENITIES_BBOX, ENV_AMENITIES_DATASET, ENV_QUERY_BBOX, ENV_QUERY_DATASET,
    ENV_QUERY_FILTER, require_existing, write_json,
};

/// CLI arguments for the `query` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "query",
    long_about = "Run a filter expression such as `n[amenity=cafe]` or \
                 `w[highway]` against a dataset and print the matching \
                 features as JSON.",
    about = "Query a dataset with a filter expression"
)]
#[ortho_config(prefix = "GEODEX")]
pub(crate) struct QueryArgs {
    /// Filter expression, for example `na[amenity=cafe]`.
    #[arg(value_name = "filter")]
    #[serde(default)]
    pub(crate) filter: Option<String>,
    /// Path to the dataset built by `geodex build`.
    #[arg(long = ARG_DATASET, value_name = "path")]
    #[serde(default)]
    pub(crate) dataset: Option<Utf8PathBuf>,
    /// Bounding box as `west,south,east,north` in degrees.
    #[arg(long = ARG_BBOX, value_name = "w,s,e,n", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
}

impl QueryArgs {
    pub(crate) fn into_config(self) -> Result<QueryConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        QueryConfig::try_from(merged)
    }
}

impl TryFrom<QueryArgs> for QueryConfig {
    type Error = CliError;

    fn try_from(args: QueryArgs) -> Result<Self, Self::Error> {
        let filter = args.filter.ok_or(CliError::MissingArgument {
            field: ARG_FILTER,
            env: ENV_QUERY_FILTER,
        })?;
        let dataset = args.dataset.ok_or(CliError::MissingArgument {
            field: ARG_DATASET,
            env: ENV_QUERY_DATASET,
        })?;
        let bbox = args.bbox.ok_or(CliError::MissingArgument {
            field: ARG_BBOX,
            env: ENV_QUERY_BBOX,
        })?;
        Ok(Self {
            dataset,
            bbox: parse_bbox(bbox)?,
            selection: Selection::Filter(filter),
        })
    }
}

/// CLI arguments for the `amenities` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "amenities",
    about = "List nodes and areas tagged with one amenity"
)]
#[ortho_config(prefix = "GEODEX")]
pub(crate) struct AmenitiesArgs {
    /// Amenity value, for example `cafe` or `restaurant`.
    #[arg(value_name = "amenity")]
    #[serde(default)]
    pub(crate) amenity: Option<String>,
    /// Path to the dataset built by `geodex build`.
    #[arg(long = ARG_DATASET, value_name = "path")]
    #[serde(default)]
    pub(crate) dataset: Option<Utf8PathBuf>,
    /// Bounding box as `west,south,east,north` in degrees.
    #[arg(long = ARG_BBOX, value_name = "w,s,e,n", allow_hyphen_values = true)]
    #[serde(default)]
    pub(crate) bbox: Option<String>,
}

impl AmenitiesArgs {
    pub(crate) fn into_config(self) -> Result<QueryConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        QueryConfig::try_from(merged)
    }
}

impl TryFrom<AmenitiesArgs> for QueryConfig {
    type Error = CliError;

    fn try_from(args: AmenitiesArgs) -> Result<Self, Self::Error> {
        let amenity = args.amenity.ok_or(CliError::MissingArgument {
            field: ARG_AMENITY,
            env: ENV_AMENITIES_AMENITY,
        })?;
        let dataset = args.dataset.ok_or(CliError::MissingArgument {
            field: ARG_DATASET,
            env: ENV_AMENITIES_DATASET,
        })?;
        let bbox = args.bbox.ok_or(CliError::MissingArgument {
            field: ARG_BBOX,
            env: ENV_AMENITIES_BBOX,
        })?;
        Ok(Self {
            dataset,
            bbox: parse_bbox(bbox)?,
            selection: Selection::Amenity(amenity),
        })
    }
}

/// What a query command asks the dataset for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    Filter(String),
    Amenity(String),
}

/// Resolved configuration shared by `query` and `amenities`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QueryConfig {
    pub(crate) dataset: Utf8PathBuf,
    pub(crate) bbox: BoundingBox,
    pub(crate) selection: Selection,
}

fn parse_bbox(value: String) -> Result<BoundingBox, CliError> {
    value
        .parse()
        .map_err(|source| CliError::InvalidBoundingBox { value, source })
}

pub(crate) fn run_query_with(config: QueryConfig, writer: &mut dyn Write) -> Result<(), CliError> {
    let results = execute_query(&config)?;
    write_json(writer, &results)
}

pub(crate) fn execute_query(config: &QueryConfig) -> Result<ResultSet, CliError> {
    require_existing(&config.dataset, ARG_DATASET)?;
    let store = geodex::create_store(&config.dataset)?;
    let BoundingBox {
        west,
        south,
        east,
        north,
    } = config.bbox;
    let results = match &config.selection {
        Selection::Filter(filter) => {
            geodex::query_raw(&store, filter, west, south, east, north)?
        }
        Selection::Amenity(amenity) => {
            geodex::query_amenities(&store, amenity, west, south, east, north)?
        }
    };
    info!(
        "{} features matched in {}",
        geodex::count(&results),
        config.dataset
    );
    Ok(results)
}
