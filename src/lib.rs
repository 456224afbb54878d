//! # Street Segmenter
//!
//! Splits a city street network into intersections and the road segments
//! between them, and attaches point features (crashes, counts, requests) to
//! the nearest piece.
//!
//! This library provides:
//! - Intersection detection by buffering and unioning junction nodes
//! - Road splitting at intersection buffers and connected-component grouping
//! - Stable identifiers and a segment/intersection adjacency graph
//! - Human-readable display names
//! - Point feature snapping and per-segment aggregation
//!
//! ## Features
//!
//! - **`parallel`** - Snap point features in parallel with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use geo::{line_string, Point};
//! use street_segmenter::{segment_network, JunctionNode, Properties, RoadNetwork, SegmentationConfig};
//!
//! // Two roads crossing at a junction, in Web Mercator meters
//! let network = RoadNetwork::new(
//!     vec![
//!         (line_string![(x: -100.0, y: 0.0), (x: 100.0, y: 0.0)], Properties::new()),
//!         (line_string![(x: 0.0, y: -100.0), (x: 0.0, y: 100.0)], Properties::new()),
//!     ],
//!     vec![JunctionNode::new(Point::new(0.0, 0.0), Properties::new())],
//! );
//!
//! let segmentation = segment_network(&network, &SegmentationConfig::default()).unwrap();
//! assert_eq!(segmentation.intersections.len(), 1);
//! assert_eq!(segmentation.segments.len(), 4);
//! assert_eq!(segmentation.intersections[0].connected_segments.len(), 4);
//! ```
//!
//! All geometry handed to [`segment_network`] is expected in a projected,
//! meters-based system; [`io::read_network`] projects WGS84 input to Web
//! Mercator for you.

use std::collections::BTreeMap;
use std::time::Instant;

use geo::{LineString, MultiLineString, Point};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod error;
pub use error::{Error, Result};

pub mod geo_utils;
pub mod index;
pub mod shape;
pub use index::GeometryIndex;
pub use shape::Shape;

// Segmentation stages, in pipeline order
pub mod buffers;
pub mod grouping;
pub mod identifiers;
pub mod naming;
pub mod splitting;
pub use buffers::{build_intersection_buffers, IntersectionBuffer};
pub use grouping::{group_fragments, merge_touching_groups, take_nodeless_groups, FragmentGroup};
pub use identifiers::{is_inter, IdCounter, SegmentId};
pub use naming::JunctionNames;
pub use splitting::{rejoin_fragments, split_roads, SplitResult};

// Point features
pub mod features;
pub use features::{
    attach_point_features, FeatureAggregation, FeatureAttacher, PointFeature, SnappedPoint,
};

pub mod io;

/// Free-form attribute map carried by roads, junctions and point features.
pub type Properties = serde_json::Map<String, Value>;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use street_segmenter::GpsPoint;
/// let point = GpsPoint::new(42.3601, -71.0589); // Boston
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// An input road line with its source attributes.
#[derive(Debug, Clone)]
pub struct Road {
    /// Sequential id assigned at ingestion
    pub orig_id: u64,
    pub geometry: LineString<f64>,
    pub properties: Properties,
}

/// A junction node: a point where roads meet.
#[derive(Debug, Clone)]
pub struct JunctionNode {
    pub point: Point<f64>,
    pub properties: Properties,
}

impl JunctionNode {
    pub fn new(point: Point<f64>, properties: Properties) -> Self {
        Self { point, properties }
    }

    /// Junction id as referenced by road `from`/`to` properties (`osmid`, else `id`).
    pub fn junction_id(&self) -> Option<String> {
        self.properties
            .get("osmid")
            .or_else(|| self.properties.get("id"))
            .and_then(naming::property_key)
    }

    /// Street names listed on the node itself, if any.
    pub fn street_names(&self) -> Option<Vec<String>> {
        let names = naming::names_from_value(self.properties.get("streets")?);
        (!names.is_empty()).then_some(names)
    }

    pub fn is_dead_end(&self) -> bool {
        is_truthy(self.properties.get("dead_end"))
    }

    pub fn has_signal(&self) -> bool {
        is_truthy(self.properties.get("signal"))
    }
}

/// Roads and junction nodes in one projected coordinate system.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    pub roads: Vec<Road>,
    pub junctions: Vec<JunctionNode>,
}

impl RoadNetwork {
    /// Build a network, numbering roads in input order.
    pub fn new(lines: Vec<(LineString<f64>, Properties)>, junctions: Vec<JunctionNode>) -> Self {
        let roads = lines
            .into_iter()
            .enumerate()
            .map(|(i, (geometry, properties))| Road {
                orig_id: i as u64,
                geometry,
                properties,
            })
            .collect();
        Self { roads, junctions }
    }
}

/// A maximal piece of one road lying outside every intersection buffer.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: SegmentId,
    /// `orig_id` of the source road
    pub orig_id: u64,
    pub geometry: LineString<f64>,
    pub properties: Properties,
    /// Intersections this segment touches
    pub connected_segments: Vec<SegmentId>,
    pub display_name: String,
    pub center: Option<GpsPoint>,
}

/// The union of road fragments inside one connected junction cluster.
#[derive(Debug, Clone)]
pub struct Intersection {
    pub id: SegmentId,
    /// Component fragments, one per source road part
    pub lines: Vec<LineString<f64>>,
    /// Source road properties, parallel to `lines`
    pub data: Vec<Properties>,
    /// Source road ids, parallel to `lines`
    pub orig_ids: Vec<u64>,
    /// Properties of the junction nodes seeding this intersection
    pub nodes: Vec<Properties>,
    /// Segments that list this intersection as connected
    pub connected_segments: Vec<SegmentId>,
    /// Always multi-part, even for a single fragment
    pub geometry: MultiLineString<f64>,
    pub display_name: String,
    pub center: Option<GpsPoint>,
    pub signal: bool,
}

/// Output of [`segment_network`].
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    /// Ordered by id, `segments[n]` has id `Segment(n)`
    pub segments: Vec<Segment>,
    /// Ordered by id, `intersections[n]` has id `Intersection(n)`
    pub intersections: Vec<Intersection>,
}

impl Segmentation {
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        match id {
            SegmentId::Segment(n) => self.segments.get(n),
            SegmentId::Intersection(_) => None,
        }
    }

    pub fn intersection(&self, id: SegmentId) -> Option<&Intersection> {
        match id {
            SegmentId::Intersection(n) => self.intersections.get(n),
            SegmentId::Segment(_) => None,
        }
    }

    /// Total number of segments and intersections.
    pub fn len(&self) -> usize {
        self.segments.len() + self.intersections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.intersections.is_empty()
    }
}

/// Configuration for segmentation and point feature attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Radius of the buffer around each junction, in projection units.
    /// Default: 20.0 meters
    pub buffer_radius: f64,

    /// Segments per quarter circle of each junction buffer.
    /// Default: 16
    pub buffer_resolution: usize,

    /// Distance below which two fragments or a fragment and a node touch.
    /// Default: 1e-4
    pub touch_tolerance: f64,

    /// Maximum distance between a segment and an intersection fragment of the
    /// same road for the two to be connected.
    /// Default: 0.5
    pub adjacency_tolerance: f64,

    /// Maximum distance for a point feature to attach to a segment.
    /// Default: 20.0 meters
    pub snap_tolerance: f64,

    /// Whether junctions flagged `dead_end` get an intersection buffer.
    /// Default: true
    pub include_dead_ends: bool,

    /// Log progress every this many items in long loops; 0 disables.
    /// Default: 1000
    pub progress_interval: usize,

    /// Aggregation policy per point feature name.
    pub features: BTreeMap<String, FeatureAggregation>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            buffer_radius: 20.0,
            buffer_resolution: 16,
            touch_tolerance: 1e-4,
            adjacency_tolerance: 0.5,
            snap_tolerance: 20.0,
            include_dead_ends: true,
            progress_interval: 1000,
            features: BTreeMap::new(),
        }
    }
}

impl SegmentationConfig {
    /// Parse a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("buffer_radius", self.buffer_radius),
            ("touch_tolerance", self.touch_tolerance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        let non_negative = [
            ("adjacency_tolerance", self.adjacency_tolerance),
            ("snap_tolerance", self.snap_tolerance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.buffer_resolution == 0 {
            return Err(Error::InvalidConfig(
                "buffer_resolution must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Segmentation
// ============================================================================

/// Split a road network into intersections and segments.
///
/// Stages run in order: junction buffering, road splitting, fragment grouping,
/// identifier assignment and naming. Fragments that reach no junction are
/// folded back into their road's segments. Ids are numbered from zero on every call,
/// so identical input always yields identical output.
pub fn segment_network(network: &RoadNetwork, config: &SegmentationConfig) -> Result<Segmentation> {
    config.validate()?;
    let start = Instant::now();

    let junctions: Vec<&JunctionNode> = network
        .junctions
        .iter()
        .filter(|j| config.include_dead_ends || !j.is_dead_end())
        .collect();
    if junctions.len() < network.junctions.len() {
        info!(
            "Skipping {} dead-end junctions",
            network.junctions.len() - junctions.len()
        );
    }
    let points: Vec<Point<f64>> = junctions.iter().map(|j| j.point).collect();

    let buffers =
        buffers::build_intersection_buffers(&points, config.buffer_radius, config.buffer_resolution);
    let mut split = splitting::split_roads(&network.roads, &buffers, config.progress_interval);
    let groups = grouping::group_buffers(
        &buffers,
        &split.fragments,
        &points,
        config.touch_tolerance,
        config.progress_interval,
    );
    let (groups, loose) = grouping::take_nodeless_groups(groups);
    splitting::rejoin_fragments(&mut split, &loose, config.adjacency_tolerance);

    let mut segmentation = identifiers::assign_identifiers(
        &network.roads,
        &junctions,
        &split,
        &groups,
        config.adjacency_tolerance,
    );

    let names = JunctionNames::build(&network.roads, &network.junctions);
    naming::apply_display_names(&mut segmentation, &names);

    info!(
        "Segmented {} roads into {} segments and {} intersections in {:.2?}",
        network.roads.len(),
        segmentation.segments.len(),
        segmentation.intersections.len(),
        start.elapsed()
    );

    Ok(segmentation)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a progress line every `interval` items; true when a line was logged.
pub(crate) fn log_progress(index: usize, interval: usize, total: usize, what: &str) -> bool {
    if interval > 0 && index > 0 && index % interval == 0 {
        info!("finished {} of {} {}", index, total, what);
        return true;
    }
    false
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

/// Disjoint-set forest over `0..n`. The root of every set is its smallest
/// member, so component order never depends on merge order.
pub(crate) struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    pub(crate) fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Merge the sets of `a` and `b`; false if they were already one set.
    pub(crate) fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        let (low, high) = if root_a < root_b { (root_a, root_b) } else { (root_b, root_a) };
        self.parent[high] = low;
        true
    }

    /// Members of every set, each ascending, sets ordered by smallest member.
    pub(crate) fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..self.parent.len() {
            let root = self.find(i);
            by_root.entry(root).or_default().push(i);
        }
        by_root.into_values().collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;
    use serde_json::json;
    use std::collections::HashSet;

    fn props(value: Value) -> Properties {
        match value {
            Value::Object(map) => map,
            _ => Properties::new(),
        }
    }

    /// A plus-shaped crossing at the origin and a T junction at (300, 0).
    fn sample_network() -> RoadNetwork {
        RoadNetwork::new(
            vec![
                (
                    line_string![(x: -100.0, y: 0.0), (x: 0.0, y: 0.0)],
                    props(json!({"name": "Main St", "from": 10, "to": 1})),
                ),
                (
                    line_string![(x: 0.0, y: 0.0), (x: 300.0, y: 0.0)],
                    props(json!({"name": "Main St", "from": 1, "to": 2})),
                ),
                (
                    line_string![(x: 0.0, y: -100.0), (x: 0.0, y: 0.0)],
                    props(json!({"name": "Elm St", "from": 11, "to": 1})),
                ),
                (
                    line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 100.0)],
                    props(json!({"name": "Elm St", "from": 1, "to": 12})),
                ),
                (
                    line_string![(x: 300.0, y: 0.0), (x: 300.0, y: 150.0)],
                    props(json!({"name": "Oak St", "from": 2, "to": 13})),
                ),
            ],
            vec![
                JunctionNode::new(Point::new(0.0, 0.0), props(json!({"osmid": 1, "signal": true}))),
                JunctionNode::new(Point::new(300.0, 0.0), props(json!({"osmid": 2}))),
            ],
        )
    }

    #[test]
    fn test_gps_point_validation() {
        assert!(GpsPoint::new(42.3601, -71.0589).is_valid());
        assert!(!GpsPoint::new(91.0, 0.0).is_valid());
        assert!(!GpsPoint::new(0.0, 181.0).is_valid());
        assert!(!GpsPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_config_from_json_defaults() {
        let config = SegmentationConfig::from_json(r#"{"buffer_radius": 30.0}"#).unwrap();
        assert_eq!(config.buffer_radius, 30.0);
        assert_eq!(config.buffer_resolution, 16);
        assert!(config.include_dead_ends);

        let config =
            SegmentationConfig::from_json(r#"{"features": {"volume": "latest"}}"#).unwrap();
        assert_eq!(config.features["volume"], FeatureAggregation::Latest);
    }

    #[test]
    fn test_config_validation() {
        assert!(SegmentationConfig::default().validate().is_ok());

        let bad = SegmentationConfig { buffer_radius: 0.0, ..Default::default() };
        assert!(matches!(bad.validate(), Err(Error::InvalidConfig(_))));

        let bad = SegmentationConfig { touch_tolerance: f64::NAN, ..Default::default() };
        assert!(bad.validate().is_err());

        let bad = SegmentationConfig { buffer_resolution: 0, ..Default::default() };
        assert!(bad.validate().is_err());

        assert!(SegmentationConfig::from_json(r#"{"snap_tolerance": -1}"#).is_err());
    }

    #[test]
    fn test_log_progress_interval() {
        let logged: Vec<usize> = (0..10).filter(|&i| log_progress(i, 3, 10, "items")).collect();
        assert_eq!(logged, vec![3, 6, 9]);
        assert!(!(0..10).any(|i| log_progress(i, 0, 10, "items")));
    }

    #[test]
    fn test_union_find_groups() {
        let mut uf = UnionFind::new(5);
        assert!(uf.union(3, 1));
        assert!(uf.union(4, 3));
        assert!(!uf.union(1, 4));
        assert_eq!(uf.groups(), vec![vec![0], vec![1, 3, 4], vec![2]]);
    }

    #[test]
    fn test_junction_node_accessors() {
        let node = JunctionNode::new(
            Point::new(0.0, 0.0),
            props(json!({"osmid": 42, "dead_end": "True", "streets": ["A St"]})),
        );
        assert_eq!(node.junction_id().as_deref(), Some("42"));
        assert!(node.is_dead_end());
        assert!(!node.has_signal());
        assert_eq!(node.street_names(), Some(vec!["A St".to_string()]));
    }

    #[test]
    fn test_segment_network() {
        let segmentation = segment_network(&sample_network(), &SegmentationConfig::default()).unwrap();

        assert_eq!(segmentation.intersections.len(), 2);
        // Main St west, Main St middle, Elm St south and north, Oak St north
        assert_eq!(segmentation.segments.len(), 5);

        let crossing = &segmentation.intersections[0];
        assert!(crossing.signal);
        assert_eq!(crossing.display_name, "Elm St and Main St");
        assert_eq!(crossing.connected_segments.len(), 4);

        let tee = &segmentation.intersections[1];
        assert!(!tee.signal);
        assert_eq!(tee.display_name, "Main St and Oak St");
        assert_eq!(tee.connected_segments.len(), 2);

        let middle = segmentation
            .segments
            .iter()
            .find(|s| s.orig_id == 1)
            .unwrap();
        assert_eq!(middle.display_name, "Main St between Elm St and Oak St");
        assert_eq!(
            middle.connected_segments,
            vec![SegmentId::Intersection(0), SegmentId::Intersection(1)]
        );
    }

    #[test]
    fn test_ids_are_disjoint_and_sequential() {
        let segmentation = segment_network(&sample_network(), &SegmentationConfig::default()).unwrap();

        let mut seen = HashSet::new();
        for (n, segment) in segmentation.segments.iter().enumerate() {
            assert_eq!(segment.id, SegmentId::Segment(n));
            assert!(!is_inter(&segment.id.to_string()));
            assert!(seen.insert(segment.id.to_string()));
        }
        for (n, intersection) in segmentation.intersections.iter().enumerate() {
            assert_eq!(intersection.id, SegmentId::Intersection(n));
            assert!(is_inter(&intersection.id.to_string()));
            assert!(seen.insert(intersection.id.to_string()));
        }
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let segmentation = segment_network(&sample_network(), &SegmentationConfig::default()).unwrap();

        for intersection in &segmentation.intersections {
            for &id in &intersection.connected_segments {
                let segment = segmentation.segment(id).unwrap();
                assert!(segment.connected_segments.contains(&intersection.id));
            }
        }
        for segment in &segmentation.segments {
            for &id in &segment.connected_segments {
                let intersection = segmentation.intersection(id).unwrap();
                assert!(intersection.connected_segments.contains(&segment.id));
            }
        }
    }

    #[test]
    fn test_every_road_is_accounted_for() {
        let network = sample_network();
        let segmentation = segment_network(&network, &SegmentationConfig::default()).unwrap();

        for road in &network.roads {
            let in_segment = segmentation.segments.iter().any(|s| s.orig_id == road.orig_id);
            let in_intersection = segmentation
                .intersections
                .iter()
                .any(|i| i.orig_ids.contains(&road.orig_id));
            assert!(in_segment || in_intersection, "road {} lost", road.orig_id);
        }
    }

    /// Two junctions 15 m apart whose 20 m buffers merge into one.
    fn close_junctions_network() -> RoadNetwork {
        RoadNetwork::new(
            vec![
                (line_string![(x: -100.0, y: 0.0), (x: 0.0, y: 0.0)], Properties::new()),
                (line_string![(x: 0.0, y: 0.0), (x: 15.0, y: 0.0)], Properties::new()),
                (line_string![(x: 15.0, y: 0.0), (x: 115.0, y: 0.0)], Properties::new()),
                (line_string![(x: 0.0, y: -100.0), (x: 0.0, y: 0.0)], Properties::new()),
                (line_string![(x: 15.0, y: 0.0), (x: 15.0, y: 100.0)], Properties::new()),
            ],
            vec![
                JunctionNode::new(Point::new(0.0, 0.0), Properties::new()),
                JunctionNode::new(Point::new(15.0, 0.0), Properties::new()),
            ],
        )
    }

    fn assert_lengths_partitioned(network: &RoadNetwork, segmentation: &Segmentation) {
        let input: f64 = network.roads.iter().map(|r| geo_utils::line_length(&r.geometry)).sum();
        let segments: f64 = segmentation
            .segments
            .iter()
            .map(|s| geo_utils::line_length(&s.geometry))
            .sum();
        let fragments: f64 = segmentation
            .intersections
            .iter()
            .flat_map(|i| i.lines.iter())
            .map(geo_utils::line_length)
            .sum();

        assert!(
            (segments + fragments - input).abs() < 1e-2,
            "segments {} + fragments {} != roads {}",
            segments,
            fragments,
            input
        );
    }

    #[test]
    fn test_pieces_and_fragments_cover_every_road() {
        let network = sample_network();
        let segmentation = segment_network(&network, &SegmentationConfig::default()).unwrap();
        assert_lengths_partitioned(&network, &segmentation);
    }

    #[test]
    fn test_merged_buffers_cover_every_road() {
        let network = close_junctions_network();
        let segmentation = segment_network(&network, &SegmentationConfig::default()).unwrap();

        assert_eq!(segmentation.intersections.len(), 1);
        assert_eq!(segmentation.intersections[0].nodes.len(), 2);
        // The connector between the junctions lies entirely inside the buffer
        assert_eq!(segmentation.segments.len(), 4);
        assert!(segmentation.segments.iter().all(|s| s.orig_id != 1));
        assert_lengths_partitioned(&network, &segmentation);
    }

    #[test]
    fn test_road_inside_buffer_has_no_segment() {
        let network = RoadNetwork::new(
            vec![
                (line_string![(x: -100.0, y: 0.0), (x: 100.0, y: 0.0)], Properties::new()),
                (line_string![(x: 0.0, y: -100.0), (x: 0.0, y: 100.0)], Properties::new()),
                (line_string![(x: 0.0, y: 0.0), (x: 5.0, y: 8.0)], Properties::new()),
            ],
            vec![JunctionNode::new(Point::new(0.0, 0.0), Properties::new())],
        );
        let segmentation = segment_network(&network, &SegmentationConfig::default()).unwrap();

        assert_eq!(segmentation.intersections.len(), 1);
        let crossing = &segmentation.intersections[0];
        assert!(crossing.orig_ids.contains(&2));
        assert!(segmentation.segments.iter().all(|s| s.orig_id != 2));

        assert_eq!(crossing.connected_segments.len(), 4);
        for &id in &crossing.connected_segments {
            assert_ne!(segmentation.segment(id).unwrap().orig_id, 2);
        }
        assert_lengths_partitioned(&network, &segmentation);
    }

    #[test]
    fn test_road_passing_a_junction_stays_whole() {
        // The far carriageway runs through the buffer without meeting the junction
        let network = RoadNetwork::new(
            vec![
                (line_string![(x: -100.0, y: 5.0), (x: 100.0, y: 5.0)], Properties::new()),
                (line_string![(x: 0.0, y: 5.0), (x: 0.0, y: 100.0)], Properties::new()),
                (line_string![(x: -100.0, y: -5.0), (x: 100.0, y: -5.0)], Properties::new()),
            ],
            vec![JunctionNode::new(Point::new(0.0, 5.0), Properties::new())],
        );
        let segmentation = segment_network(&network, &SegmentationConfig::default()).unwrap();

        assert_eq!(segmentation.intersections.len(), 1);
        let junction = &segmentation.intersections[0];
        assert_eq!(junction.nodes.len(), 1);
        assert!(!junction.orig_ids.contains(&2));

        let far: Vec<&Segment> =
            segmentation.segments.iter().filter(|s| s.orig_id == 2).collect();
        assert_eq!(far.len(), 1);
        assert!((geo_utils::line_length(&far[0].geometry) - 200.0).abs() < 1e-2);
        assert!(far[0].connected_segments.is_empty());
        assert_lengths_partitioned(&network, &segmentation);
    }

    #[test]
    fn test_segmentation_is_repeatable() {
        let config = SegmentationConfig::default();
        for network in [sample_network(), close_junctions_network()] {
            let first = segment_network(&network, &config).unwrap();
            let second = segment_network(&network, &config).unwrap();

            let segments = |s: &Segmentation| {
                s.segments
                    .iter()
                    .map(|seg| {
                        (seg.id, seg.orig_id, seg.geometry.clone(), seg.connected_segments.clone())
                    })
                    .collect::<Vec<_>>()
            };
            let intersections = |s: &Segmentation| {
                s.intersections
                    .iter()
                    .map(|i| {
                        (i.id, i.orig_ids.clone(), i.geometry.clone(), i.connected_segments.clone())
                    })
                    .collect::<Vec<_>>()
            };
            assert_eq!(segments(&first), segments(&second));
            assert_eq!(intersections(&first), intersections(&second));
        }
    }

    #[test]
    fn test_dead_ends_excluded() {
        let mut network = sample_network();
        network.junctions[1].properties.insert("dead_end".to_string(), Value::Bool(true));
        let config = SegmentationConfig { include_dead_ends: false, ..Default::default() };
        let segmentation = segment_network(&network, &config).unwrap();

        assert_eq!(segmentation.intersections.len(), 1);
    }

    #[test]
    fn test_network_without_junctions() {
        let network = RoadNetwork::new(
            vec![(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)], Properties::new())],
            vec![],
        );
        let segmentation = segment_network(&network, &SegmentationConfig::default()).unwrap();

        assert!(segmentation.intersections.is_empty());
        assert_eq!(segmentation.segments.len(), 1);
        assert!(segmentation.segments[0].connected_segments.is_empty());
    }
}
