//! Build command: turn an OSM PBF extract into a queryable dataset.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use geodex_data::{BuildSummary, build_dataset};
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{
    ARG_OSM_PBF, ARG_OUTPUT, CliError, ENV_BUILD_OSM_PBF, ENV_BUILD_OUTPUT, require_existing,
    write_json,
};

/// CLI arguments for the `build` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "build",
    long_about = "Read an OpenStreetMap PBF extract, keep every node, way and \
                 relation carrying descriptive tags, and write them with a \
                 spatial index to a single dataset file. Paths can come from \
                 CLI flags, configuration files, or environment variables.",
    about = "Build a dataset from an OSM PBF extract"
)]
#[ortho_config(prefix = "GEODEX")]
pub(crate) struct BuildArgs {
    /// Path to the OpenStreetMap PBF file.
    #[arg(long = ARG_OSM_PBF, value_name = "path")]
    #[serde(default)]
    pub(crate) osm_pbf: Option<Utf8PathBuf>,
    /// Path of the dataset to write; parent directories are created.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
}

impl BuildArgs {
    pub(crate) fn into_config(self) -> Result<BuildConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        BuildConfig::try_from(merged)
    }
}

/// Resolved `build` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BuildConfig {
    pub(crate) osm_pbf: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
}

impl BuildConfig {
    pub(crate) fn validate_sources(&self) -> Result<(), CliError> {
        require_existing(&self.osm_pbf, ARG_OSM_PBF)
    }
}

impl TryFrom<BuildArgs> for BuildConfig {
    type Error = CliError;

    fn try_from(args: BuildArgs) -> Result<Self, Self::Error> {
        let osm_pbf = args.osm_pbf.ok_or(CliError::MissingArgument {
            field: ARG_OSM_PBF,
            env: ENV_BUILD_OSM_PBF,
        })?;
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_BUILD_OUTPUT,
        })?;
        Ok(Self { osm_pbf, output })
    }
}

/// Summary printed after a successful build.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct BuildReport {
    pub(crate) output: Utf8PathBuf,
    pub(crate) features: usize,
    pub(crate) nodes: u64,
    pub(crate) ways: u64,
    pub(crate) relations: u64,
    /// `[west, south, east, north]` of every valid node, if any.
    pub(crate) bounds: Option<[f64; 4]>,
}

impl From<BuildSummary> for BuildReport {
    fn from(summary: BuildSummary) -> Self {
        let bounds = summary
            .ingest
            .bounds
            .map(|bbox| [bbox.west, bbox.south, bbox.east, bbox.north]);
        Self {
            output: summary.output,
            features: summary.features,
            nodes: summary.ingest.nodes,
            ways: summary.ingest.ways,
            relations: summary.ingest.relations,
            bounds,
        }
    }
}

pub(crate) fn run_build_with(args: BuildArgs, writer: &mut dyn Write) -> Result<(), CliError> {
    let report = execute_build(args)?;
    write_json(writer, &report)
}

pub(crate) fn execute_build(args: BuildArgs) -> Result<BuildReport, CliError> {
    let config = resolve_build_config(args)?;
    info!(
        "building dataset {} from {}",
        config.output, config.osm_pbf
    );
    let summary = build_dataset(&config.osm_pbf, &config.output)?;
    Ok(BuildReport::from(summary))
}

fn resolve_build_config(args: BuildArgs) -> Result<BuildConfig, CliError> {
    let config = args.into_config()?;
    config.validate_sources()?;
    Ok(config)
}

#[cfg(test)]
pub(crate) fn config_from_layers_for_test(
    layers: Vec<ortho_config::MergeLayer<'static>>,
) -> Result<BuildConfig, CliError> {
    let merged = BuildArgs::merge_from_layers(layers).map_err(CliError::from)?;
    BuildConfig::try_from(merged)
}
