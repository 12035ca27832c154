//! Behavioural tests for OSM ingestion and dataset building.

use std::{cell::RefCell, path::PathBuf};

use camino::Utf8PathBuf;
use geodex_core::{
    BoundingBox, Dataset, FeatureKind, ResultSet, SqliteFeatureStore, test_support::london,
};
use geodex_data::{
    BuildDatasetError, BuildSummary, OsmIngestError, OsmIngestReport, build_dataset,
    ingest_osm_pbf,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

mod support;

use support::{assert_close, bloomsbury_extract, outlined_park_extract};

#[derive(Debug)]
struct IngestWorld {
    workspace: TempDir,
    source: RefCell<Option<PathBuf>>,
    ingest: RefCell<Option<Result<OsmIngestReport, OsmIngestError>>>,
    build: RefCell<Option<Result<BuildSummary, BuildDatasetError>>>,
    results: RefCell<Option<ResultSet>>,
}

impl IngestWorld {
    fn new() -> Self {
        Self {
            workspace: TempDir::new().expect("create temp dir"),
            source: RefCell::new(None),
            ingest: RefCell::new(None),
            build: RefCell::new(None),
            results: RefCell::new(None),
        }
    }

    fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.workspace.path().to_path_buf()).expect("utf-8 temp dir")
    }

    fn source(&self) -> PathBuf {
        self.source
            .borrow()
            .clone()
            .expect("a PBF path should be chosen first")
    }

    fn report(&self) -> OsmIngestReport {
        match self.ingest.borrow().as_ref() {
            Some(Ok(report)) => report.clone(),
            Some(Err(err)) => panic!("expected successful ingestion, got {err:?}"),
            None => panic!("ingestion was not attempted"),
        }
    }
}

#[fixture]
fn world() -> IngestWorld {
    IngestWorld::new()
}

#[given("a PBF extract around Bloomsbury")]
fn given_extract(world: &IngestWorld) {
    let path = world.workspace.path().join("bloomsbury.osm.pbf");
    bloomsbury_extract().write_to(&path);
    world.source.replace(Some(path));
}

#[given("a PBF extract with a park outlined by an untagged way")]
fn given_outlined_park(world: &IngestWorld) {
    let path = world.workspace.path().join("square.osm.pbf");
    outlined_park_extract().write_to(&path);
    world.source.replace(Some(path));
}

#[given("a path to a missing PBF file")]
fn given_missing(world: &IngestWorld) {
    world
        .source
        .replace(Some(world.workspace.path().join("missing.osm.pbf")));
}

#[given("a path to a file containing invalid PBF data")]
fn given_invalid(world: &IngestWorld) {
    let path = world.workspace.path().join("corrupt.osm.pbf");
    std::fs::write(&path, b"this is not a protocol buffer").expect("write corrupt file");
    world.source.replace(Some(path));
}

#[when("I ingest the PBF file")]
fn ingest(world: &IngestWorld) {
    let outcome = ingest_osm_pbf(&world.source());
    world.ingest.replace(Some(outcome));
}

#[when("I build a dataset from the PBF file")]
fn build(world: &IngestWorld) {
    let source = Utf8PathBuf::from_path_buf(world.source()).expect("utf-8 source");
    let output = world.root().join("artefacts/nested/bloomsbury.geodex");
    world.build.replace(Some(build_dataset(&source, &output)));
}

#[when("I query cafés in central London")]
fn query_cafes(world: &IngestWorld) {
    let output = match world.build.borrow().as_ref() {
        Some(Ok(summary)) => summary.output.clone(),
        Some(Err(err)) => panic!("expected a built dataset, got {err:?}"),
        None => panic!("no dataset was built"),
    };
    let store = SqliteFeatureStore::open(output.as_std_path()).expect("open built dataset");
    let results = Dataset::new(store)
        .query_amenities("cafe", london())
        .expect("query succeeds");
    world.results.replace(Some(results));
}

#[when("I query parks near the south-west corner of the square")]
fn query_park_corner(world: &IngestWorld) {
    let output = match world.build.borrow().as_ref() {
        Some(Ok(summary)) => summary.output.clone(),
        Some(Err(err)) => panic!("expected a built dataset, got {err:?}"),
        None => panic!("no dataset was built"),
    };
    let store = SqliteFeatureStore::open(output.as_std_path()).expect("open built dataset");
    let results = Dataset::new(store)
        .query("a[leisure=park]", BoundingBox::new(0.1, 0.1, 0.3, 0.3))
        .expect("query succeeds");
    world.results.replace(Some(results));
}

#[then("the summary counts 12 nodes, 3 ways and 1 relation")]
fn summary_counts(world: &IngestWorld) {
    let summary = world.report().summary;
    assert_eq!(summary.nodes, 12);
    assert_eq!(summary.ways, 3);
    assert_eq!(summary.relations, 1);
    let bounds = summary.bounds.expect("nodes produce bounds");
    assert_close(bounds.west, -0.15);
    assert_close(bounds.east, 2.35);
    assert_close(bounds.south, 48.85);
    assert_close(bounds.north, 51.55);
}

#[then("seven features are extracted in kind and id order")]
fn feature_order(world: &IngestWorld) {
    let keys: Vec<(FeatureKind, i64)> = world
        .report()
        .features
        .iter()
        .map(|feature| (feature.kind, feature.id))
        .collect();
    assert_eq!(
        keys,
        vec![
            (FeatureKind::Node, 1),
            (FeatureKind::Node, 2),
            (FeatureKind::Node, 3),
            (FeatureKind::Node, 4),
            (FeatureKind::Way, 10),
            (FeatureKind::Way, 11),
            (FeatureKind::Relation, 20),
        ]
    );
}

#[then("the road carries its vertices in order")]
fn road_vertices(world: &IngestWorld) {
    let report = world.report();
    let road = report
        .features
        .iter()
        .find(|feature| feature.kind == FeatureKind::Way && feature.id == 10)
        .expect("road feature");
    let ids: Vec<i64> = road.nodes.iter().map(|vertex| vertex.id).collect();
    assert_eq!(ids, vec![100, 101, 102]);
    assert_eq!(road.name, "Lamb's Conduit Street");
    assert_close(road.lon, -0.119);
    assert_close(road.lat, 51.523);

    let restaurant = report
        .features
        .iter()
        .find(|feature| feature.kind == FeatureKind::Way && feature.id == 11)
        .expect("restaurant feature");
    assert!(restaurant.is_closed(), "restaurant outline should be closed");
}

#[then("the park relation is centred on its members")]
fn park_centre(world: &IngestWorld) {
    let report = world.report();
    let park = report
        .features
        .iter()
        .find(|feature| feature.kind == FeatureKind::Relation)
        .expect("park relation");
    assert_close(park.lon, -0.123);
    assert_close(park.lat, 51.521);
    assert!(park.nodes.is_empty());
}

#[then("the park spans its untagged outline")]
fn park_spans_outline(world: &IngestWorld) {
    let report = world.report();
    assert_eq!(report.summary.ways, 1);
    assert_eq!(report.features.len(), 1, "only the relation is a feature");
    let park = &report.features[0];
    assert_eq!((park.kind, park.id), (FeatureKind::Relation, 40));
    assert_close(park.lon, 1.0);
    assert_close(park.lat, 1.0);
    assert_eq!(park.extent, Some(BoundingBox::new(0.0, 0.0, 2.0, 2.0)));
}

#[then("the square is returned")]
fn square_returned(world: &IngestWorld) {
    let results = world
        .results
        .borrow()
        .clone()
        .expect("a query should have run");
    let names: Vec<&str> = results.iter().map(|feature| feature.name.as_str()).collect();
    assert_eq!(names, vec!["Square"]);
}

#[then("two cafés are returned")]
fn two_cafes(world: &IngestWorld) {
    let results = world
        .results
        .borrow()
        .clone()
        .expect("a query should have run");
    let names: Vec<&str> = results.iter().map(|feature| feature.name.as_str()).collect();
    assert_eq!(names, vec!["Fika", "Kaffeine"]);
}

#[then("an open error is returned")]
fn open_error(world: &IngestWorld) {
    match world.ingest.borrow().as_ref() {
        Some(Err(OsmIngestError::Open { path, .. })) => {
            assert!(path.ends_with("missing.osm.pbf"), "unexpected path {path:?}");
        }
        other => panic!("expected an open error, got {other:?}"),
    }
}

#[then("a decode error is returned")]
fn decode_error(world: &IngestWorld) {
    match world.ingest.borrow().as_ref() {
        Some(Err(OsmIngestError::Decode { path, .. })) => {
            assert!(path.ends_with("corrupt.osm.pbf"), "unexpected path {path:?}");
        }
        other => panic!("expected a decode error, got {other:?}"),
    }
}

#[scenario(path = "tests/features/osm_ingest.feature", index = 0)]
fn ingest_small_extract(world: IngestWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/osm_ingest.feature", index = 1)]
fn ways_carry_vertices(world: IngestWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/osm_ingest.feature", index = 2)]
fn build_and_query(world: IngestWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/osm_ingest.feature", index = 3)]
fn missing_file(world: IngestWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/osm_ingest.feature", index = 4)]
fn corrupted_file(world: IngestWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/osm_ingest.feature", index = 5)]
fn park_outlined_by_untagged_way(world: IngestWorld) {
    let _ = world;
}

#[scenario(path = "tests/features/osm_ingest.feature", index = 6)]
fn park_found_away_from_its_centre(world: IngestWorld) {
    let _ = world;
}
