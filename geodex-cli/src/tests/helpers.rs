//! Test helpers for composing CLI invocations against temporary datasets.

use super::*;
use camino::Utf8PathBuf;
use geodex_core::test_support::write_sample_dataset;
use std::fs;
use tempfile::TempDir;

/// Bounding box around central London, as passed to `--bbox`.
pub(super) const LONDON_BBOX: &str = "-0.2,51.5,0.0,51.6";

/// Temporary directory holding a sample dataset and a corrupt extract.
#[derive(Debug)]
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace path");
        write_sample_dataset(root.join("sample.geodex").as_std_path())
            .expect("write sample dataset");
        fs::write(root.join("corrupt.osm.pbf"), b"not a protobuf blob")
            .expect("write corrupt extract");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn dataset(&self) -> Utf8PathBuf {
        self.root.join("sample.geodex")
    }

    pub(super) fn corrupt_extract(&self) -> Utf8PathBuf {
        self.root.join("corrupt.osm.pbf")
    }
}

/// Parse `args` as a `geodex` invocation and run it, capturing stdout.
pub(super) fn invoke<I, S>(args: I) -> Result<String, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut invocation = vec!["geodex".to_string()];
    invocation.extend(args.into_iter().map(Into::into));
    let cli = Cli::try_parse_from(invocation).map_err(CliError::ArgumentParsing)?;
    let mut output = Vec::new();
    run_with(cli, &mut output)?;
    Ok(String::from_utf8(output).expect("utf-8 output"))
}

/// Names of the features in a JSON result set, in order.
pub(super) fn feature_names(output: &str) -> Vec<String> {
    let parsed: serde_json::Value = serde_json::from_str(output).expect("valid JSON");
    parsed
        .as_array()
        .expect("JSON array")
        .iter()
        .map(|feature| feature["name"].as_str().unwrap_or_default().to_owned())
        .collect()
}
