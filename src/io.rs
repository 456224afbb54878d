//! GeoJSON and JSON input/output.
//!
//! Networks are read as a GeoJSON feature collection in WGS84: line features
//! become roads and point features become junction nodes. Everything is
//! projected to Web Mercator on the way in and back to WGS84 on the way out.
//!
//! [`write_segments`] produces three files in the output directory:
//!
//! | File | Content |
//! |------|---------|
//! | `inters_segments.geojson` | One multi-line feature per intersection |
//! | `non_inters_segments.geojson` | One line feature per segment |
//! | `inter_and_non_int.geojson` | Both of the above in one collection |

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use geo::{LineString, MultiLineString};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value as GeoValue};
use log::{info, warn};
use serde_json::Value;

use crate::features::{PointFeature, SnappedPoint};
use crate::geo_utils::{mercator_to_wgs84, project_line, wgs84_to_mercator};
use crate::shape::Shape;
use crate::{
    Error, GpsPoint, Intersection, JunctionNode, Properties, Result, RoadNetwork, Segment,
    SegmentId, Segmentation,
};

pub const INTERSECTIONS_FILE: &str = "inters_segments.geojson";
pub const SEGMENTS_FILE: &str = "non_inters_segments.geojson";
pub const COMBINED_FILE: &str = "inter_and_non_int.geojson";

// =============================================================================
// Reading
// =============================================================================

/// Read a road network from a WGS84 GeoJSON file.
pub fn read_network(path: impl AsRef<Path>) -> Result<RoadNetwork> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let network = parse_network(&text)?;
    info!(
        "Read {} roads and {} junctions from {}",
        network.roads.len(),
        network.junctions.len(),
        path.display()
    );
    Ok(network)
}

/// Parse a road network from WGS84 GeoJSON text.
///
/// Multi-part lines become one road per part. Polygonal and empty features are
/// skipped with a warning.
pub fn parse_network(text: &str) -> Result<RoadNetwork> {
    let features = match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(Error::InvalidInput(
                "expected a Feature or FeatureCollection".to_string(),
            ))
        }
    };

    let mut lines: Vec<(LineString<f64>, Properties)> = Vec::new();
    let mut junctions: Vec<JunctionNode> = Vec::new();

    for (i, feature) in features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();
        let Some(shape) = feature.geometry.as_ref().and_then(Shape::from_geojson) else {
            warn!("Skipping feature {} without a point or line geometry", i);
            continue;
        };

        for line in shape.line_parts() {
            if line.0.len() < 2 {
                warn!("Skipping feature {} line part with fewer than two coordinates", i);
                continue;
            }
            lines.push((project_line(&line), properties.clone()));
        }
        for point in shape.point_parts() {
            let projected = wgs84_to_mercator(&GpsPoint::new(point.y(), point.x()));
            junctions.push(JunctionNode::new(projected.into(), properties.clone()));
        }
    }

    Ok(RoadNetwork::new(lines, junctions))
}

/// Read point features from a JSON array.
pub fn read_point_features(path: impl AsRef<Path>) -> Result<Vec<PointFeature>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let points: Vec<PointFeature> = serde_json::from_reader(reader)?;
    let points = keep_valid_points(points);
    info!("Read {} point features from {}", points.len(), path.display());
    Ok(points)
}

/// Parse point features from JSON text. Points with out-of-range or
/// non-finite coordinates are dropped with a warning.
pub fn parse_point_features(text: &str) -> Result<Vec<PointFeature>> {
    let points: Vec<PointFeature> = serde_json::from_str(text)?;
    Ok(keep_valid_points(points))
}

fn keep_valid_points(points: Vec<PointFeature>) -> Vec<PointFeature> {
    points
        .into_iter()
        .enumerate()
        .filter_map(|(i, point)| {
            if point.location.is_valid() {
                Some(point)
            } else {
                warn!(
                    "Skipping point feature {} ({}) with invalid location {:?}",
                    i, point.feature, point.location
                );
                None
            }
        })
        .collect()
}

// =============================================================================
// Writing
// =============================================================================

fn line_to_wgs84(line: &LineString<f64>) -> Vec<Vec<f64>> {
    line.coords()
        .map(|c| {
            let p = mercator_to_wgs84(*c);
            vec![p.longitude, p.latitude]
        })
        .collect()
}

fn multi_line_to_wgs84(lines: &MultiLineString<f64>) -> Vec<Vec<Vec<f64>>> {
    lines.0.iter().map(line_to_wgs84).collect()
}

fn insert_center(properties: &mut Properties, center: Option<GpsPoint>) {
    if let Some(center) = center {
        properties.insert("center_x".to_string(), Value::from(center.longitude));
        properties.insert("center_y".to_string(), Value::from(center.latitude));
    }
}

fn id_list(ids: &[SegmentId]) -> Value {
    Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect())
}

fn inter_flag(id: SegmentId) -> Value {
    Value::from(u8::from(id.is_intersection()))
}

/// GeoJSON feature for a segment, in WGS84.
pub fn segment_feature(segment: &Segment) -> Feature {
    let mut properties = segment.properties.clone();
    properties.insert("id".to_string(), Value::String(segment.id.to_string()));
    properties.insert("orig_id".to_string(), Value::from(segment.orig_id));
    properties.insert(
        "display_name".to_string(),
        Value::String(segment.display_name.clone()),
    );
    properties.insert(
        "connected_segments".to_string(),
        id_list(&segment.connected_segments),
    );
    properties.insert("inter".to_string(), inter_flag(segment.id));
    insert_center(&mut properties, segment.center);

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoValue::LineString(line_to_wgs84(
            &segment.geometry,
        )))),
        id: Some(geojson::feature::Id::String(segment.id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// GeoJSON feature for an intersection, in WGS84. Component road properties
/// are kept under `data`, junction properties under `nodes`.
pub fn intersection_feature(intersection: &Intersection) -> Feature {
    let mut properties = Properties::new();
    properties.insert("id".to_string(), Value::String(intersection.id.to_string()));
    properties.insert(
        "display_name".to_string(),
        Value::String(intersection.display_name.clone()),
    );
    properties.insert(
        "connected_segments".to_string(),
        id_list(&intersection.connected_segments),
    );
    properties.insert(
        "orig_ids".to_string(),
        Value::Array(intersection.orig_ids.iter().map(|&id| Value::from(id)).collect()),
    );
    properties.insert(
        "data".to_string(),
        Value::Array(intersection.data.iter().cloned().map(Value::Object).collect()),
    );
    properties.insert(
        "nodes".to_string(),
        Value::Array(intersection.nodes.iter().cloned().map(Value::Object).collect()),
    );
    properties.insert("signal".to_string(), Value::from(intersection.signal));
    properties.insert("inter".to_string(), inter_flag(intersection.id));
    insert_center(&mut properties, intersection.center);

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoValue::MultiLineString(
            multi_line_to_wgs84(&intersection.geometry),
        ))),
        id: Some(geojson::feature::Id::String(intersection.id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(writer, value)?;
    Ok(())
}

/// Write intersections, segments and the combined collection into `dir`.
pub fn write_segments(dir: impl AsRef<Path>, segmentation: &Segmentation) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let intersections: Vec<Feature> = segmentation
        .intersections
        .iter()
        .map(intersection_feature)
        .collect();
    let segments: Vec<Feature> = segmentation.segments.iter().map(segment_feature).collect();
    let combined: Vec<Feature> = intersections.iter().chain(&segments).cloned().collect();

    write_json(&dir.join(INTERSECTIONS_FILE), &collection(intersections))?;
    write_json(&dir.join(SEGMENTS_FILE), &collection(segments))?;
    write_json(&dir.join(COMBINED_FILE), &collection(combined))?;

    info!(
        "Wrote {} intersections and {} segments to {}",
        segmentation.intersections.len(),
        segmentation.segments.len(),
        dir.display()
    );
    Ok(())
}

/// Write snapped point features as a JSON array.
pub fn write_snapped_points(path: impl AsRef<Path>, points: &[SnappedPoint]) -> Result<()> {
    let path = path.as_ref();
    write_json(path, &points)?;
    info!("Wrote {} snapped point features to {}", points.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    const NETWORK: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "Main St"},
             "geometry": {"type": "LineString", "coordinates": [[-71.06, 42.36], [-71.05, 42.36]]}},
            {"type": "Feature", "properties": {"name": "Split Rd"},
             "geometry": {"type": "MultiLineString", "coordinates": [
                [[-71.06, 42.37], [-71.05, 42.37]],
                [[-71.04, 42.37], [-71.03, 42.37]]]}},
            {"type": "Feature", "properties": {"osmid": 1},
             "geometry": {"type": "Point", "coordinates": [-71.055, 42.36]}},
            {"type": "Feature", "properties": {},
             "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]}}
        ]
    }"#;

    #[test]
    fn test_parse_network() {
        let network = parse_network(NETWORK).unwrap();
        assert_eq!(network.roads.len(), 3);
        assert_eq!(network.junctions.len(), 1);
        assert_eq!(
            network.roads.iter().map(|r| r.orig_id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(network.roads[2].properties["name"], "Split Rd");

        // Projected into meters
        let first = network.roads[0].geometry.0[0];
        assert!(first.x < -7_000_000.0 && first.y > 5_000_000.0);
    }

    #[test]
    fn test_parse_network_rejects_bare_geometry() {
        let bare = r#"{"type": "Point", "coordinates": [0, 0]}"#;
        assert!(matches!(parse_network(bare), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_segment_feature_properties() {
        let segment = Segment {
            id: SegmentId::Segment(2),
            orig_id: 9,
            geometry: line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)],
            properties: Properties::new(),
            connected_segments: vec![SegmentId::Intersection(0)],
            display_name: "Main St".to_string(),
            center: Some(GpsPoint::new(0.0, 0.0)),
        };
        let feature = segment_feature(&segment);
        let properties = feature.properties.unwrap();

        assert_eq!(properties["id"], "002");
        assert_eq!(properties["orig_id"], 9);
        assert_eq!(properties["connected_segments"], serde_json::json!(["0"]));
        assert_eq!(properties["center_x"], 0.0);
        assert_eq!(properties["inter"], 0);
    }

    #[test]
    fn test_parse_point_features_drops_invalid_locations() {
        let text = r#"[
            {"feature": "crash", "location": {"latitude": 42.36, "longitude": -71.05}},
            {"feature": "crash", "location": {"latitude": 95.0, "longitude": -71.05}},
            {"feature": "request", "location": {"latitude": 42.36, "longitude": 200.0}},
            {"feature": "request", "location": {"latitude": -33.87, "longitude": 151.21}}
        ]"#;
        let points = parse_point_features(text).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].feature, "crash");
        assert_eq!(points[1].location, GpsPoint::new(-33.87, 151.21));
    }
}
