//! Point features (crashes, requests, counts...) snapped to the nearest segment
//! or intersection and aggregated onto it.
//!
//! Each feature name is aggregated with one policy:
//! - [`FeatureAggregation::Count`]: number of snapped points
//! - [`FeatureAggregation::Latest`]: `value` (or `category`) of the most recent point
//!
//! The policy comes from the configuration's `features` table, then from the
//! first point's own `feat_agg`, then defaults to counting.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use geo::{Distance, Euclidean, LineString, Point};
use log::{debug, info};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::geo_utils::wgs84_to_mercator;
use crate::index::GeometryIndex;
use crate::{Error, GpsPoint, Properties, Result, SegmentId, Segmentation, SegmentationConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureAggregation {
    #[default]
    Count,
    Latest,
}

/// A located point feature as read from input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointFeature {
    pub feature: String,
    pub location: GpsPoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feat_agg: Option<FeatureAggregation>,
    /// Any other input fields, passed through untouched
    #[serde(flatten)]
    pub extra: Properties,
}

impl PointFeature {
    pub fn new(feature: impl Into<String>, location: GpsPoint) -> Self {
        Self {
            feature: feature.into(),
            location,
            date: None,
            category: None,
            value: None,
            feat_agg: None,
            extra: Properties::new(),
        }
    }

    /// The value a `latest` aggregation reports for this point.
    fn latest_value(&self) -> Option<Value> {
        self.value
            .clone()
            .or_else(|| self.category.clone().map(Value::String))
    }
}

/// A point feature with the id of the segment or intersection it snapped to.
#[derive(Debug, Clone, Serialize)]
pub struct SnappedPoint {
    #[serde(flatten)]
    pub feature: PointFeature,
    /// Serialized as `""` when nothing was within tolerance
    #[serde(serialize_with = "serialize_near_id")]
    pub near_id: Option<SegmentId>,
}

fn serialize_near_id<S: Serializer>(
    id: &Option<SegmentId>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match id {
        Some(id) => serializer.collect_str(id),
        None => serializer.serialize_str(""),
    }
}

/// Nearest-line lookup over every segment and intersection component line.
pub struct FeatureAttacher<'a> {
    index: GeometryIndex,
    targets: Vec<(SegmentId, &'a LineString<f64>)>,
}

impl<'a> FeatureAttacher<'a> {
    pub fn new(segmentation: &'a Segmentation) -> Self {
        let mut targets: Vec<(SegmentId, &'a LineString<f64>)> = segmentation
            .segments
            .iter()
            .map(|s| (s.id, &s.geometry))
            .collect();
        for intersection in &segmentation.intersections {
            targets.extend(intersection.lines.iter().map(|l| (intersection.id, l)));
        }

        let index = GeometryIndex::from_lines(targets.iter().map(|(_, line)| *line));
        Self { index, targets }
    }

    /// Id of the line closest to `point`, if any lies within `tolerance`.
    ///
    /// On equal distances the earlier target wins (segments before
    /// intersections, then by id).
    pub fn nearest(&self, point: &Point<f64>, tolerance: f64) -> Option<SegmentId> {
        let mut best: Option<(SegmentId, f64)> = None;
        for idx in self.index.query_around(point.0, tolerance) {
            let (id, line) = self.targets[idx];
            let distance = Euclidean.distance(point, line);
            if distance > tolerance {
                continue;
            }
            match best {
                Some((_, best_distance)) if best_distance <= distance => {}
                _ => best = Some((id, distance)),
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn snap(&self, feature: PointFeature, tolerance: f64) -> SnappedPoint {
        let projected = Point::from(wgs84_to_mercator(&feature.location));
        let near_id = self.nearest(&projected, tolerance);
        SnappedPoint { feature, near_id }
    }
}

/// Snap every point to its nearest segment or intersection, keeping input order.
pub fn snap_points(
    segmentation: &Segmentation,
    points: Vec<PointFeature>,
    tolerance: f64,
    progress_interval: usize,
) -> Vec<SnappedPoint> {
    let attacher = FeatureAttacher::new(segmentation);
    let snapped = snap_all(&attacher, points, tolerance, progress_interval);

    let matched = snapped.iter().filter(|p| p.near_id.is_some()).count();
    info!(
        "Snapped {} of {} point features within {} m",
        matched,
        snapped.len(),
        tolerance
    );
    snapped
}

#[cfg(feature = "parallel")]
fn snap_all(
    attacher: &FeatureAttacher<'_>,
    points: Vec<PointFeature>,
    tolerance: f64,
    progress_interval: usize,
) -> Vec<SnappedPoint> {
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let total = points.len();
    let done = AtomicUsize::new(0);
    points
        .into_par_iter()
        .map(|point| {
            let snapped = attacher.snap(point, tolerance);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            crate::log_progress(finished, progress_interval, total, "point features");
            snapped
        })
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn snap_all(
    attacher: &FeatureAttacher<'_>,
    points: Vec<PointFeature>,
    tolerance: f64,
    progress_interval: usize,
) -> Vec<SnappedPoint> {
    let total = points.len();
    points
        .into_iter()
        .enumerate()
        .map(|(i, point)| {
            crate::log_progress(i, progress_interval, total, "point features");
            attacher.snap(point, tolerance)
        })
        .collect()
}

/// Parse the date formats point features arrive with.
pub fn parse_feature_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Resolve the aggregation policy of every feature name in `points`.
pub fn resolve_policies(
    points: &[SnappedPoint],
    configured: &BTreeMap<String, FeatureAggregation>,
) -> BTreeMap<String, FeatureAggregation> {
    let mut policies = configured.clone();
    for point in points {
        policies
            .entry(point.feature.feature.clone())
            .or_insert_with(|| point.feature.feat_agg.unwrap_or_default());
    }
    policies
}

enum Accumulator {
    Count(u64),
    Latest(Option<NaiveDateTime>, Value),
}

/// Aggregate snapped points per target id and feature name.
///
/// Fails if any point of a `latest` feature carries neither `value` nor `category`.
pub fn aggregate(
    points: &[SnappedPoint],
    configured: &BTreeMap<String, FeatureAggregation>,
) -> Result<BTreeMap<SegmentId, BTreeMap<String, Value>>> {
    let policies = resolve_policies(points, configured);

    for point in points {
        let name = &point.feature.feature;
        if policies.get(name) == Some(&FeatureAggregation::Latest)
            && point.feature.latest_value().is_none()
        {
            return Err(Error::MissingAggregationValue {
                feature: name.clone(),
            });
        }
    }

    let mut accumulators: BTreeMap<SegmentId, BTreeMap<String, Accumulator>> = BTreeMap::new();
    for point in points {
        let Some(id) = point.near_id else {
            continue;
        };
        let name = &point.feature.feature;
        let slot = accumulators.entry(id).or_default();

        match policies.get(name).copied().unwrap_or_default() {
            FeatureAggregation::Count => {
                if let Accumulator::Count(n) =
                    slot.entry(name.clone()).or_insert(Accumulator::Count(0))
                {
                    *n += 1;
                }
            }
            FeatureAggregation::Latest => {
                let Some(value) = point.feature.latest_value() else {
                    continue;
                };
                let date = point.feature.date.as_deref().and_then(parse_feature_date);
                let newer = match slot.get(name) {
                    Some(Accumulator::Latest(current, _)) => date > *current,
                    _ => true,
                };
                if newer {
                    slot.insert(name.clone(), Accumulator::Latest(date, value));
                }
            }
        }
    }

    Ok(accumulators
        .into_iter()
        .map(|(id, features)| {
            let values = features
                .into_iter()
                .map(|(name, acc)| match acc {
                    Accumulator::Count(n) => (name, Value::from(n)),
                    Accumulator::Latest(_, value) => (name, value),
                })
                .collect();
            (id, values)
        })
        .collect())
}

/// Write aggregated values into segment properties and into every component
/// road's data of an intersection.
pub fn apply_aggregates(
    segmentation: &mut Segmentation,
    aggregates: &BTreeMap<SegmentId, BTreeMap<String, Value>>,
) {
    for segment in segmentation.segments.iter_mut() {
        if let Some(values) = aggregates.get(&segment.id) {
            for (name, value) in values {
                segment.properties.insert(name.clone(), value.clone());
            }
        }
    }
    for intersection in segmentation.intersections.iter_mut() {
        if let Some(values) = aggregates.get(&intersection.id) {
            for data in intersection.data.iter_mut() {
                for (name, value) in values {
                    data.insert(name.clone(), value.clone());
                }
            }
        }
    }
    debug!("Applied point feature aggregates to {} ids", aggregates.len());
}

/// Snap `points` to the segmentation, aggregate them per id and write the
/// results back. Returns the snapped points for output.
pub fn attach_point_features(
    segmentation: &mut Segmentation,
    points: Vec<PointFeature>,
    config: &SegmentationConfig,
) -> Result<Vec<SnappedPoint>> {
    let snapped = snap_points(
        segmentation,
        points,
        config.snap_tolerance,
        config.progress_interval,
    );
    let aggregates = aggregate(&snapped, &config.features)?;
    apply_aggregates(segmentation, &aggregates);
    Ok(snapped)
}
