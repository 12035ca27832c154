//! Shared helpers for ingestion tests.
//!
//! [`PbfFixture`] writes small, uncompressed OSM PBF files so tests can
//! describe their extract in code instead of shipping binary blobs.
#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::{fs, path::Path};

/// Epsilon for floating-point coordinate comparisons in tests.
const COORDINATE_EPSILON: f64 = 1.0e-7;

/// Relation member kinds as encoded in the PBF `MemberType` enum.
#[derive(Debug, Clone, Copy)]
pub enum Member {
    Node(i64),
    Way(i64),
}

#[derive(Debug, Clone)]
struct Node {
    id: i64,
    lon: f64,
    lat: f64,
    tags: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Way {
    id: i64,
    refs: Vec<i64>,
    tags: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct Relation {
    id: i64,
    members: Vec<Member>,
    tags: Vec<(String, String)>,
}

/// In-code description of an OSM extract.
#[derive(Debug, Clone, Default)]
pub struct PbfFixture {
    nodes: Vec<Node>,
    ways: Vec<Way>,
    relations: Vec<Relation>,
}

fn owned_tags(tags: &[(&str, &str)]) -> Vec<(String, String)> {
    tags.iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

impl PbfFixture {
    pub fn node(mut self, id: i64, lon: f64, lat: f64, tags: &[(&str, &str)]) -> Self {
        self.nodes.push(Node {
            id,
            lon,
            lat,
            tags: owned_tags(tags),
        });
        self
    }

    pub fn way(mut self, id: i64, refs: &[i64], tags: &[(&str, &str)]) -> Self {
        self.ways.push(Way {
            id,
            refs: refs.to_vec(),
            tags: owned_tags(tags),
        });
        self
    }

    pub fn relation(mut self, id: i64, members: &[Member], tags: &[(&str, &str)]) -> Self {
        self.relations.push(Relation {
            id,
            members: members.to_vec(),
            tags: owned_tags(tags),
        });
        self
    }

    /// Encode the extract as a header blob followed by one data blob.
    pub fn encode(&self) -> Vec<u8> {
        let mut header = Vec::new();
        bytes_field(&mut header, 4, b"OsmSchema-V0.6");

        let mut file = Vec::new();
        write_blob(&mut file, "OSMHeader", &header);
        write_blob(&mut file, "OSMData", &self.primitive_block());
        file
    }

    pub fn write_to(&self, path: &Path) {
        fs::write(path, self.encode())
            .unwrap_or_else(|err| panic!("failed to write PBF fixture {path:?}: {err}"));
    }

    fn primitive_block(&self) -> Vec<u8> {
        let mut strings = StringTable::default();
        let mut block = Vec::new();
        let mut groups = Vec::new();

        if !self.nodes.is_empty() {
            let mut group = Vec::new();
            for node in &self.nodes {
                let mut message = Vec::new();
                sint_field(&mut message, 1, node.id);
                write_tags(&mut message, &mut strings, &node.tags);
                sint_field(&mut message, 8, to_fixed(node.lat));
                sint_field(&mut message, 9, to_fixed(node.lon));
                bytes_field(&mut group, 1, &message);
            }
            groups.push(group);
        }

        if !self.ways.is_empty() {
            let mut group = Vec::new();
            for way in &self.ways {
                let mut message = Vec::new();
                uint_field(&mut message, 1, way.id as u64);
                write_tags(&mut message, &mut strings, &way.tags);
                packed(&mut message, 8, delta(&way.refs).map(zigzag));
                bytes_field(&mut group, 3, &message);
            }
            groups.push(group);
        }

        if !self.relations.is_empty() {
            let mut group = Vec::new();
            for relation in &self.relations {
                let ids: Vec<i64> = relation
                    .members
                    .iter()
                    .map(|member| match member {
                        Member::Node(id) | Member::Way(id) => *id,
                    })
                    .collect();
                let types = relation.members.iter().map(|member| match member {
                    Member::Node(_) => 0,
                    Member::Way(_) => 1,
                });
                let empty_role = strings.index("");
                let mut message = Vec::new();
                uint_field(&mut message, 1, relation.id as u64);
                write_tags(&mut message, &mut strings, &relation.tags);
                packed(&mut message, 8, ids.iter().map(|_| empty_role));
                packed(&mut message, 9, delta(&ids).map(zigzag));
                packed(&mut message, 10, types);
                bytes_field(&mut group, 4, &message);
            }
            groups.push(group);
        }

        bytes_field(&mut block, 1, &strings.encode());
        for group in groups {
            bytes_field(&mut block, 2, &group);
        }
        block
    }
}

#[derive(Debug)]
struct StringTable {
    entries: Vec<String>,
}

impl Default for StringTable {
    fn default() -> Self {
        // Index zero is reserved for the empty string.
        Self {
            entries: vec![String::new()],
        }
    }
}

impl StringTable {
    fn index(&mut self, value: &str) -> u64 {
        let position = match self.entries.iter().position(|entry| entry == value) {
            Some(position) => position,
            None => {
                self.entries.push(value.to_owned());
                self.entries.len() - 1
            }
        };
        position as u64
    }

    fn encode(&self) -> Vec<u8> {
        let mut table = Vec::new();
        for entry in &self.entries {
            bytes_field(&mut table, 1, entry.as_bytes());
        }
        table
    }
}

fn write_tags(message: &mut Vec<u8>, strings: &mut StringTable, tags: &[(String, String)]) {
    if tags.is_empty() {
        return;
    }
    let keys: Vec<u64> = tags.iter().map(|(key, _)| strings.index(key)).collect();
    let values: Vec<u64> = tags.iter().map(|(_, value)| strings.index(value)).collect();
    packed(message, 2, keys);
    packed(message, 3, values);
}

fn write_blob(file: &mut Vec<u8>, kind: &str, payload: &[u8]) {
    let mut blob = Vec::new();
    bytes_field(&mut blob, 1, payload);
    uint_field(&mut blob, 2, payload.len() as u64);

    let mut header = Vec::new();
    bytes_field(&mut header, 1, kind.as_bytes());
    uint_field(&mut header, 3, blob.len() as u64);

    file.extend_from_slice(&(header.len() as u32).to_be_bytes());
    file.extend_from_slice(&header);
    file.extend_from_slice(&blob);
}

/// Degrees to the default 100-nanodegree granularity.
fn to_fixed(degrees: f64) -> i64 {
    (degrees * 1.0e7).round() as i64
}

fn delta(values: &[i64]) -> impl Iterator<Item = i64> + '_ {
    let mut previous = 0;
    values.iter().map(move |value| {
        let step = value - previous;
        previous = *value;
        step
    })
}

fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

fn varint(buffer: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buffer.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buffer.push(value as u8);
}

fn key(buffer: &mut Vec<u8>, field: u64, wire_type: u64) {
    varint(buffer, (field << 3) | wire_type);
}

fn uint_field(buffer: &mut Vec<u8>, field: u64, value: u64) {
    key(buffer, field, 0);
    varint(buffer, value);
}

fn sint_field(buffer: &mut Vec<u8>, field: u64, value: i64) {
    uint_field(buffer, field, zigzag(value));
}

fn bytes_field(buffer: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    key(buffer, field, 2);
    varint(buffer, bytes.len() as u64);
    buffer.extend_from_slice(bytes);
}

fn packed<I>(buffer: &mut Vec<u8>, field: u64, values: I)
where
    I: IntoIterator<Item = u64>,
{
    let mut encoded = Vec::new();
    for value in values {
        varint(&mut encoded, value);
    }
    bytes_field(buffer, field, &encoded);
}

/// A small extract around Bloomsbury plus one café in Paris.
///
/// Tagged: cafés 1, 2 and 4, pub 3, road way 10, restaurant area way 11 and
/// park relation 20. Nodes 100 to 113 are untagged way vertices.
pub fn bloomsbury_extract() -> PbfFixture {
    PbfFixture::default()
        .node(1, -0.1, 51.55, &[("amenity", "cafe"), ("name", "Fika")])
        .node(2, -0.15, 51.52, &[("amenity", "cafe"), ("name", "Kaffeine")])
        .node(3, -0.12, 51.53, &[("amenity", "pub"), ("name", "The Lamb")])
        .node(4, 2.35, 48.85, &[("amenity", "cafe"), ("name", "Le Dôme")])
        .node(5, -0.11, 51.51, &[("created_by", "JOSM")])
        .node(100, -0.119, 51.522, &[])
        .node(101, -0.119, 51.523, &[])
        .node(102, -0.119, 51.524, &[])
        .node(110, -0.126, 51.512, &[])
        .node(111, -0.125, 51.512, &[])
        .node(112, -0.125, 51.513, &[])
        .node(113, -0.126, 51.513, &[])
        .way(
            10,
            &[100, 101, 102],
            &[("highway", "residential"), ("name", "Lamb's Conduit Street")],
        )
        .way(
            11,
            &[110, 111, 112, 113, 110],
            &[("amenity", "restaurant"), ("name", "Dishoom")],
        )
        .way(12, &[100, 110], &[])
        .relation(
            20,
            &[Member::Way(11), Member::Node(3)],
            &[("type", "multipolygon"), ("leisure", "park")],
        )
}

/// A park relation whose only member is an untagged ring around (1, 1).
pub fn outlined_park_extract() -> PbfFixture {
    PbfFixture::default()
        .node(200, 0.0, 0.0, &[])
        .node(201, 2.0, 0.0, &[])
        .node(202, 2.0, 2.0, &[])
        .node(203, 0.0, 2.0, &[])
        .way(30, &[200, 201, 202, 203, 200], &[])
        .relation(
            40,
            &[Member::Way(30)],
            &[("type", "multipolygon"), ("leisure", "park"), ("name", "Square")],
        )
}

/// Compare floating-point coordinates within a small epsilon.
pub fn assert_close(actual: f64, expected: f64) {
    let delta = (actual - expected).abs();
    assert!(
        delta <= COORDINATE_EPSILON,
        "expected {expected}, got {actual} (|Δ| = {delta})"
    );
}
