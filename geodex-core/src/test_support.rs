//! In-memory store and sample data shared by unit, behaviour and downstream
//! tests.

use geo::Rect;

use crate::store::{
    FeatureIter, FeatureStore, NodeIter, StoreError, StoredFeature, envelopes_intersect,
    feature_envelope,
};
use crate::{BoundingBox, FeatureKind, FeatureRecord, Filter, NodeRecord};

/// In-memory `FeatureStore` evaluating the bundled filter language.
///
/// The store performs a linear scan in insertion order and is intended only
/// for small datasets. It can be told to fail part-way through a query.
#[derive(Default, Debug)]
pub struct MemoryStore {
    features: Vec<FeatureRecord>,
    fail_after: Option<usize>,
    fail_vertices: bool,
}

impl MemoryStore {
    /// Create a store from a collection of features.
    pub fn with_features<I>(features: I) -> Self
    where
        I: IntoIterator<Item = FeatureRecord>,
    {
        Self {
            features: features.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Report a backend failure after `count` matching features.
    #[must_use]
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Report a backend failure whenever way vertices are read.
    #[must_use]
    pub fn failing_vertices(mut self) -> Self {
        self.fail_vertices = true;
        self
    }
}

impl FeatureStore for MemoryStore {
    fn select<'a>(
        &'a self,
        filter: &str,
        bbox: &Rect<f64>,
    ) -> Result<FeatureIter<'a>, StoreError> {
        let filter = Filter::parse(filter)?;
        let bbox = *bbox;
        let fail_vertices = self.fail_vertices;
        let matches = self
            .features
            .iter()
            .filter(move |record| envelopes_intersect(&feature_envelope(record), &bbox))
            .filter(move |record| filter.matches(record.kind, record.is_area(), &record.tags))
            .map(move |record| {
                Ok::<_, StoreError>(Box::new(MemoryFeature {
                    record,
                    fail_vertices,
                }) as Box<dyn StoredFeature + 'a>)
            });

        match self.fail_after {
            Some(count) => Ok(Box::new(
                matches
                    .take(count)
                    .chain(std::iter::once(Err(simulated_failure()))),
            )),
            None => Ok(Box::new(matches)),
        }
    }
}

struct MemoryFeature<'a> {
    record: &'a FeatureRecord,
    fail_vertices: bool,
}

impl StoredFeature for MemoryFeature<'_> {
    fn id(&self) -> i64 {
        self.record.id
    }

    fn kind(&self) -> FeatureKind {
        self.record.kind
    }

    fn lon(&self) -> f64 {
        self.record.lon
    }

    fn lat(&self) -> f64 {
        self.record.lat
    }

    fn tags(&self) -> Box<dyn Iterator<Item = (&str, &str)> + '_> {
        self.record.tags()
    }

    fn nodes(&self) -> NodeIter<'_> {
        if self.fail_vertices {
            return Box::new(std::iter::once(Err(simulated_failure())));
        }
        self.record.nodes()
    }

    fn extent(&self) -> Option<BoundingBox> {
        self.record.extent
    }
}

fn simulated_failure() -> StoreError {
    StoreError::backend(std::io::Error::other("simulated store failure"))
}

/// Box around central London used throughout the tests.
#[must_use]
pub const fn london() -> BoundingBox {
    BoundingBox::new(-0.2, 51.5, 0.0, 51.6)
}

fn tags(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn node(id: i64, lon: f64, lat: f64, pairs: &[(&str, &str)]) -> FeatureRecord {
    FeatureRecord::new(id, FeatureKind::Node, lon, lat, tags(pairs))
}

/// Small dataset sorted by kind then id.
///
/// Inside [`london`]: cafés 1 and 2 (named) and 3 (unnamed), bus stop 5,
/// pub 6, residential way 10 with vertices 100 to 102, restaurant area 11
/// and park relation 20. Café 4 lies in Paris.
#[must_use]
pub fn sample_features() -> Vec<FeatureRecord> {
    let street = FeatureRecord::new(
        10,
        FeatureKind::Way,
        -0.119,
        51.521,
        tags(&[
            ("highway", "residential"),
            ("name", "Lamb's Conduit Street"),
        ]),
    )
    .with_nodes(vec![
        NodeRecord::new(100, -0.119, 51.520),
        NodeRecord::new(101, -0.119, 51.521),
        NodeRecord::new(102, -0.118, 51.522),
    ]);
    let restaurant = FeatureRecord::new(
        11,
        FeatureKind::Way,
        -0.1305,
        51.5145,
        tags(&[
            ("amenity", "restaurant"),
            ("building", "yes"),
            ("name", "Dishoom"),
        ]),
    )
    .with_nodes(vec![
        NodeRecord::new(110, -0.131, 51.514),
        NodeRecord::new(111, -0.130, 51.514),
        NodeRecord::new(112, -0.130, 51.515),
        NodeRecord::new(113, -0.131, 51.515),
        NodeRecord::new(110, -0.131, 51.514),
    ]);
    let park = FeatureRecord::new(
        20,
        FeatureKind::Relation,
        -0.153,
        51.527,
        tags(&[
            ("type", "multipolygon"),
            ("leisure", "park"),
            ("name", "Regent's Park"),
        ]),
    );

    vec![
        node(1, -0.1, 51.55, &[("amenity", "cafe"), ("name", "Fika")]),
        node(2, -0.15, 51.52, &[("amenity", "cafe"), ("name", "Kaffeine")]),
        node(3, -0.05, 51.58, &[("amenity", "cafe")]),
        node(4, 2.35, 48.85, &[("amenity", "cafe"), ("name", "Le Dôme")]),
        node(
            5,
            -0.141,
            51.515,
            &[("highway", "bus_stop"), ("name", "Oxford Circus")],
        ),
        node(6, -0.118, 51.523, &[("amenity", "pub"), ("name", "The Lamb")]),
        street,
        restaurant,
        park,
    ]
}

/// Write [`sample_features`] to a dataset at `path` and return them.
#[cfg(feature = "store-sqlite")]
pub fn write_sample_dataset(
    path: &std::path::Path,
) -> Result<Vec<FeatureRecord>, crate::store::DatasetWriteError> {
    let features = sample_features();
    crate::store::write_dataset(path, &features)?;
    Ok(features)
}
