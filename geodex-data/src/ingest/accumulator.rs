//! Internal accumulator for OpenStreetMap (OSM) PBF ingestion.
//!
//! Collects tagged elements, the coordinates their geometry depends on and
//! the node and way references still waiting to be resolved. Accumulators
//! built per block are merged, then finished into [`OsmIngestReport`]s.
use std::collections::{HashMap, HashSet};

use geo::{BoundingRect, Coord, MultiPoint, Point, Rect};
use geodex_core::{BoundingBox, FeatureKind, FeatureRecord, NodeRecord, Tags};
use log::warn;
use osmpbf::{Element, RelMemberType};

use super::tags::{collect_tags, has_descriptive_tag};
use super::{OsmIngestReport, OsmIngestSummary};

/// Relation member the accumulator can place on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum MemberRef {
    Node(i64),
    Way(i64),
}

#[derive(Debug, Default)]
pub(super) struct OsmFeatureAccumulator {
    summary: OsmIngestSummary,
    nodes: HashMap<i64, Coord<f64>>,
    pending_nodes: HashSet<i64>,
    pending_ways: HashSet<i64>,
    member_ways: HashMap<i64, Vec<i64>>,
    tagged_nodes: Vec<FeatureRecord>,
    way_candidates: Vec<WayCandidate>,
    relation_candidates: Vec<RelationCandidate>,
}

impl OsmFeatureAccumulator {
    pub(super) fn process_element(&mut self, element: Element<'_>) {
        match element {
            Element::Node(node) => {
                self.process_node(node.id(), node.lon(), node.lat(), node.tags(), node.tags());
            }
            Element::DenseNode(node) => {
                self.process_node(node.id(), node.lon(), node.lat(), node.tags(), node.tags());
            }
            Element::Way(way) => {
                self.process_way(way.id(), way.refs(), way.tags(), way.tags());
            }
            Element::Relation(relation) => {
                let members = relation.members().filter_map(|member| match member.member_type {
                    RelMemberType::Node => Some(MemberRef::Node(member.member_id)),
                    RelMemberType::Way => Some(MemberRef::Way(member.member_id)),
                    RelMemberType::Relation => None,
                });
                self.process_relation(relation.id(), members, relation.tags(), relation.tags());
            }
        }
    }

    pub(super) fn process_node<'a, R, C>(
        &mut self,
        id: i64,
        lon: f64,
        lat: f64,
        relevance_tags: R,
        tags: C,
    ) where
        R: IntoIterator<Item = (&'a str, &'a str)>,
        C: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.summary.nodes += 1;
        let was_pending = self.pending_nodes.remove(&id);
        let Some(location) = validated_coord(lon, lat) else {
            return;
        };
        let point = BoundingBox::new(location.x, location.y, location.x, location.y);
        self.summary.bounds = Some(
            self.summary
                .bounds
                .map_or(point, |bounds| bounds.union(&point)),
        );
        let is_feature = has_descriptive_tag(relevance_tags);
        if !is_feature && !was_pending {
            return;
        }

        self.nodes.insert(id, location);
        if is_feature {
            self.tagged_nodes.push(FeatureRecord::new(
                id,
                FeatureKind::Node,
                location.x,
                location.y,
                collect_tags(tags),
            ));
        }
    }

    pub(super) fn process_way<'a, I, R, C>(&mut self, id: i64, refs: I, relevance_tags: R, tags: C)
    where
        I: IntoIterator<Item = i64>,
        R: IntoIterator<Item = (&'a str, &'a str)>,
        C: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.summary.ways += 1;
        if !has_descriptive_tag(relevance_tags) {
            return;
        }
        let refs: Vec<i64> = refs.into_iter().collect();
        for node_id in &refs {
            self.require_node(*node_id);
        }
        self.way_candidates.push(WayCandidate {
            id,
            refs,
            tags: collect_tags(tags),
        });
    }

    pub(super) fn process_relation<'a, M, R, C>(
        &mut self,
        id: i64,
        members: M,
        relevance_tags: R,
        tags: C,
    ) where
        M: IntoIterator<Item = MemberRef>,
        R: IntoIterator<Item = (&'a str, &'a str)>,
        C: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.summary.relations += 1;
        if !has_descriptive_tag(relevance_tags) {
            return;
        }
        let members: Vec<MemberRef> = members.into_iter().collect();
        for member in &members {
            match *member {
                MemberRef::Node(node_id) => self.require_node(node_id),
                MemberRef::Way(way_id) => {
                    self.pending_ways.insert(way_id);
                }
            }
        }
        self.relation_candidates.push(RelationCandidate {
            id,
            members,
            tags: collect_tags(tags),
        });
    }

    fn require_node(&mut self, node_id: i64) {
        if !self.nodes.contains_key(&node_id) {
            self.pending_nodes.insert(node_id);
        }
    }

    pub(super) fn combine(mut self, other: Self) -> Self {
        self.summary.merge(&other.summary);
        for (id, coord) in other.nodes {
            self.nodes.entry(id).or_insert(coord);
        }
        self.tagged_nodes.extend(other.tagged_nodes);
        self.way_candidates.extend(other.way_candidates);
        self.relation_candidates.extend(other.relation_candidates);
        self.pending_nodes.extend(other.pending_nodes);
        self.pending_nodes
            .retain(|node_id| !self.nodes.contains_key(node_id));
        self.pending_ways.extend(other.pending_ways);
        self.member_ways.extend(other.member_ways);
        self
    }

    /// Drop relation member ways that are features themselves; their
    /// geometry is already collected.
    pub(super) fn settle_member_ways(&mut self) {
        for candidate in &self.way_candidates {
            self.pending_ways.remove(&candidate.id);
        }
    }

    pub(super) fn has_pending_ways(&self) -> bool {
        !self.pending_ways.is_empty()
    }

    /// Record the vertices of an untagged relation member way.
    pub(super) fn resolve_member_way<I>(&mut self, id: i64, refs: I)
    where
        I: IntoIterator<Item = i64>,
    {
        if !self.pending_ways.remove(&id) {
            return;
        }
        let refs: Vec<i64> = refs.into_iter().collect();
        for node_id in &refs {
            self.require_node(*node_id);
        }
        self.member_ways.insert(id, refs);
    }

    pub(super) fn has_pending_nodes(&self) -> bool {
        !self.pending_nodes.is_empty()
    }

    pub(super) fn pending_node_count(&self) -> usize {
        self.pending_nodes.len()
    }

    pub(super) fn resolve_pending_node(&mut self, id: i64, lon: f64, lat: f64) {
        if !self.pending_nodes.remove(&id) {
            return;
        }
        if let Some(location) = validated_coord(lon, lat) {
            self.nodes.insert(id, location);
        }
    }

    pub(super) fn into_report(self) -> OsmIngestReport {
        let Self {
            summary,
            nodes,
            member_ways,
            tagged_nodes,
            way_candidates,
            relation_candidates,
            ..
        } = self;

        let mut features = tagged_nodes;
        let mut way_envelopes = HashMap::with_capacity(way_candidates.len());
        let mut missing_vertices = 0_usize;
        let mut skipped_ways = 0_usize;
        for candidate in way_candidates {
            let vertices: Vec<NodeRecord> = candidate
                .refs
                .iter()
                .filter_map(|node_id| {
                    nodes
                        .get(node_id)
                        .map(|coord| NodeRecord::new(*node_id, coord.x, coord.y))
                })
                .collect();
            missing_vertices += candidate.refs.len() - vertices.len();
            let Some(envelope) = envelope(vertices.iter().map(NodeRecord::coord)) else {
                skipped_ways += 1;
                continue;
            };
            let centre = envelope.center();
            way_envelopes.insert(candidate.id, envelope);
            features.push(
                FeatureRecord::new(candidate.id, FeatureKind::Way, centre.x, centre.y, candidate.tags)
                    .with_nodes(vertices),
            );
        }
        if missing_vertices > 0 {
            warn!("Skipped {missing_vertices} way vertices without coordinates");
        }
        if skipped_ways > 0 {
            warn!("Skipped {skipped_ways} ways with no resolvable vertices");
        }
        for (way_id, refs) in member_ways {
            let corners = refs.iter().filter_map(|node_id| nodes.get(node_id).copied());
            if let Some(outline) = envelope(corners) {
                way_envelopes.entry(way_id).or_insert(outline);
            }
        }

        let mut skipped_relations = 0_usize;
        for candidate in relation_candidates {
            let corners = candidate.members.iter().flat_map(|member| match member {
                MemberRef::Node(node_id) => nodes.get(node_id).copied().into_iter().collect(),
                MemberRef::Way(way_id) => way_envelopes
                    .get(way_id)
                    .map(|rect| vec![rect.min(), rect.max()])
                    .unwrap_or_default(),
            });
            let Some(envelope) = envelope(corners) else {
                skipped_relations += 1;
                continue;
            };
            let centre = envelope.center();
            features.push(
                FeatureRecord::new(
                    candidate.id,
                    FeatureKind::Relation,
                    centre.x,
                    centre.y,
                    candidate.tags,
                )
                .with_extent(BoundingBox::from(envelope)),
            );
        }
        if skipped_relations > 0 {
            warn!("Skipped {skipped_relations} relations with no resolvable members");
        }

        features.sort_by_key(|feature| (feature.kind.code(), feature.id));
        OsmIngestReport { summary, features }
    }
}

#[derive(Debug)]
struct WayCandidate {
    id: i64,
    refs: Vec<i64>,
    tags: Tags,
}

#[derive(Debug)]
struct RelationCandidate {
    id: i64,
    members: Vec<MemberRef>,
    tags: Tags,
}

fn envelope<I>(coords: I) -> Option<Rect<f64>>
where
    I: IntoIterator<Item = Coord<f64>>,
{
    let points: Vec<Point<f64>> = coords.into_iter().map(Point::from).collect();
    MultiPoint::new(points).bounding_rect()
}

fn validated_coord(lon: f64, lat: f64) -> Option<Coord<f64>> {
    (lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat))
    .then_some(Coord { x: lon, y: lat })
}
