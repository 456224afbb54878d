//! Identifier assignment and the adjacency graph between segments.
//!
//! Intersections get plain decimal ids (`"0"`, `"1"`, ...) and non-intersection
//! segments get the same numbering prefixed with `"00"` (`"000"`, `"001"`, ...),
//! so both kinds share one flat string namespace without colliding. Each kind is
//! numbered from zero on every run through an [`IdCounter`] owned by that run.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use geo::{Distance, Euclidean, MultiLineString};
use log::{debug, info};
use serde::{Serialize, Serializer};

use crate::geo_utils::{center_point, line_midpoint, mercator_to_wgs84};
use crate::grouping::FragmentGroup;
use crate::splitting::SplitResult;
use crate::{Error, Intersection, JunctionNode, Road, Segment, Segmentation};

/// Prefix that marks a non-intersection segment id.
pub const SEGMENT_ID_PREFIX: &str = "00";

/// Identifier of a segment or an intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentId {
    Segment(usize),
    Intersection(usize),
}

impl SegmentId {
    pub fn is_intersection(&self) -> bool {
        matches!(self, SegmentId::Intersection(_))
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentId::Segment(n) => write!(f, "{}{}", SEGMENT_ID_PREFIX, n),
            SegmentId::Intersection(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for SegmentId {
    type Err = Error;

    /// Accepts exactly the strings [`Display`](fmt::Display) produces.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidInput(format!("not a segment id: '{}'", s));
        let id = if is_inter(s) {
            s.parse().map(SegmentId::Intersection).map_err(|_| invalid())?
        } else {
            s[SEGMENT_ID_PREFIX.len()..]
                .parse()
                .map(SegmentId::Segment)
                .map_err(|_| invalid())?
        };
        // Rules out signs and extra leading zeros
        if id.to_string() != s {
            return Err(invalid());
        }
        Ok(id)
    }
}

impl Serialize for SegmentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// True when a string id names an intersection rather than a segment.
pub fn is_inter(id: &str) -> bool {
    !(id.len() > SEGMENT_ID_PREFIX.len() && id.starts_with(SEGMENT_ID_PREFIX))
}

/// Per-run counters for both id namespaces.
#[derive(Debug, Default)]
pub struct IdCounter {
    next_segment: usize,
    next_intersection: usize,
}

impl IdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_segment(&mut self) -> SegmentId {
        let id = SegmentId::Segment(self.next_segment);
        self.next_segment += 1;
        id
    }

    pub fn next_intersection(&mut self) -> SegmentId {
        let id = SegmentId::Intersection(self.next_intersection);
        self.next_intersection += 1;
        id
    }
}

/// Turn fragment groups and road pieces into identified intersections and
/// segments, and link them.
///
/// `junctions` are the nodes the groups' node indices refer to. A segment is
/// connected to every intersection holding a fragment of the same road within
/// `adjacency_tolerance` of it; an intersection lists the segments that list it.
pub fn assign_identifiers(
    roads: &[Road],
    junctions: &[&JunctionNode],
    split: &SplitResult,
    groups: &[FragmentGroup],
    adjacency_tolerance: f64,
) -> Segmentation {
    let mut counter = IdCounter::new();

    let mut intersections = Vec::with_capacity(groups.len());
    // road position -> (intersection position, fragment position)
    let mut road_fragments: HashMap<usize, Vec<(usize, usize)>> = HashMap::new();

    for (i, group) in groups.iter().enumerate() {
        let id = counter.next_intersection();
        let mut lines = Vec::with_capacity(group.fragments.len());
        let mut data = Vec::with_capacity(group.fragments.len());
        let mut orig_ids = Vec::with_capacity(group.fragments.len());

        for &f in &group.fragments {
            let fragment = &split.fragments[f];
            let road = &roads[fragment.road];
            lines.push(fragment.geometry.clone());
            data.push(road.properties.clone());
            orig_ids.push(road.orig_id);
            road_fragments.entry(fragment.road).or_default().push((i, f));
        }

        let nodes: Vec<&JunctionNode> = group.nodes.iter().map(|&n| junctions[n]).collect();
        let geometry = MultiLineString::new(lines.clone());
        let center = center_point(&geometry).map(|p| mercator_to_wgs84(p.0));

        intersections.push(Intersection {
            id,
            lines,
            data,
            orig_ids,
            signal: nodes.iter().any(|n| n.has_signal()),
            nodes: nodes.iter().map(|n| n.properties.clone()).collect(),
            connected_segments: vec![],
            geometry,
            display_name: String::new(),
            center,
        });
    }

    let mut segments = Vec::with_capacity(split.pieces.len());
    let mut orig_to_segments: HashMap<u64, Vec<SegmentId>> = HashMap::new();

    for piece in &split.pieces {
        let road = &roads[piece.road];
        let id = counter.next_segment();

        let mut connected: Vec<SegmentId> = road_fragments
            .get(&piece.road)
            .into_iter()
            .flatten()
            .filter(|(_, f)| {
                Euclidean.distance(&piece.geometry, &split.fragments[*f].geometry)
                    <= adjacency_tolerance
            })
            .map(|(i, _)| intersections[*i].id)
            .collect();
        connected.sort_unstable();
        connected.dedup();

        orig_to_segments.entry(road.orig_id).or_default().push(id);

        let center = line_midpoint(&piece.geometry).map(|p| mercator_to_wgs84(p.0));
        segments.push(Segment {
            id,
            orig_id: road.orig_id,
            geometry: piece.geometry.clone(),
            properties: road.properties.clone(),
            connected_segments: connected,
            display_name: String::new(),
            center,
        });
    }

    for intersection in intersections.iter_mut() {
        let mut connected = Vec::new();
        for orig_id in &intersection.orig_ids {
            let Some(candidates) = orig_to_segments.get(orig_id) else {
                debug!(
                    "Road {} in intersection {} has no segment outside buffers",
                    orig_id, intersection.id
                );
                continue;
            };
            for &candidate in candidates {
                let SegmentId::Segment(n) = candidate else {
                    continue;
                };
                // Segment(n) is always at position n
                if segments[n].connected_segments.contains(&intersection.id) {
                    connected.push(candidate);
                }
            }
        }
        connected.sort_unstable();
        connected.dedup();
        intersection.connected_segments = connected;
    }

    info!(
        "Assigned ids to {} intersections and {} segments",
        intersections.len(),
        segments.len()
    );

    Segmentation {
        segments,
        intersections,
    }
}
