//! Closed set of geometry variants the pipeline understands.
//!
//! Input GeoJSON and the results of line/polygon clipping are both turned into a
//! [`Shape`] so every consumer matches exhaustively on the same small enum instead
//! of inspecting geometry type names.

use geo::{LineString, MultiLineString, MultiPoint, Point};

use crate::geo_utils::line_length;

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point<f64>),
    MultiPoint(MultiPoint<f64>),
    LineString(LineString<f64>),
    MultiLineString(MultiLineString<f64>),
    Collection(Vec<Shape>),
}

impl Shape {
    /// Classify the parts of a clipped multi-line.
    ///
    /// Parts with positive length stay lines; degenerate parts (a single
    /// coordinate, or all coordinates equal) become points. An empty input
    /// yields an empty collection.
    pub fn from_line_parts(parts: MultiLineString<f64>) -> Self {
        let mut lines = Vec::new();
        let mut points = Vec::new();
        for part in parts {
            if part.0.len() >= 2 && line_length(&part) > 0.0 {
                lines.push(part);
            } else if let Some(c) = part.0.first() {
                points.push(Point::from(*c));
            }
        }

        let line_shape = match lines.len() {
            0 => None,
            1 => lines.pop().map(Shape::LineString),
            _ => Some(Shape::MultiLineString(MultiLineString::new(lines))),
        };
        let point_shape = match points.len() {
            0 => None,
            1 => points.pop().map(Shape::Point),
            _ => Some(Shape::MultiPoint(MultiPoint::new(points))),
        };

        match (line_shape, point_shape) {
            (Some(l), None) => l,
            (None, Some(p)) => p,
            (Some(l), Some(p)) => Shape::Collection(vec![l, p]),
            (None, None) => Shape::Collection(vec![]),
        }
    }

    /// Convert a GeoJSON geometry. Polygonal geometry has no meaning for a road
    /// network and is rejected.
    pub fn from_geojson(geometry: &geojson::Geometry) -> Option<Self> {
        Self::from_geojson_value(&geometry.value)
    }

    fn from_geojson_value(value: &geojson::Value) -> Option<Self> {
        use geojson::Value;

        match value {
            Value::Point(pos) => position_to_point(pos).map(Shape::Point),
            Value::MultiPoint(positions) => positions
                .iter()
                .map(|p| position_to_point(p))
                .collect::<Option<Vec<_>>>()
                .map(|pts| Shape::MultiPoint(MultiPoint::new(pts))),
            Value::LineString(positions) => positions_to_line(positions).map(Shape::LineString),
            Value::MultiLineString(lines) => lines
                .iter()
                .map(|l| positions_to_line(l))
                .collect::<Option<Vec<_>>>()
                .map(|ls| Shape::MultiLineString(MultiLineString::new(ls))),
            Value::GeometryCollection(geometries) => Some(Shape::Collection(
                geometries.iter().filter_map(Self::from_geojson).collect(),
            )),
            Value::Polygon(_) | Value::MultiPolygon(_) => None,
        }
    }

    /// True when the shape holds no geometry at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Shape::Point(_) | Shape::LineString(_) => false,
            Shape::MultiPoint(mp) => mp.0.is_empty(),
            Shape::MultiLineString(mls) => mls.0.is_empty(),
            Shape::Collection(items) => items.iter().all(Shape::is_empty),
        }
    }

    /// All line parts, flattened, in order. Point variants contribute nothing.
    pub fn line_parts(&self) -> Vec<LineString<f64>> {
        match self {
            Shape::Point(_) | Shape::MultiPoint(_) => vec![],
            Shape::LineString(ls) => vec![ls.clone()],
            Shape::MultiLineString(mls) => mls.0.clone(),
            Shape::Collection(items) => items.iter().flat_map(Shape::line_parts).collect(),
        }
    }

    /// All point parts, flattened, in order.
    pub fn point_parts(&self) -> Vec<Point<f64>> {
        match self {
            Shape::Point(p) => vec![*p],
            Shape::MultiPoint(mp) => mp.0.clone(),
            Shape::LineString(_) | Shape::MultiLineString(_) => vec![],
            Shape::Collection(items) => items.iter().flat_map(Shape::point_parts).collect(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Shape::Point(_) => "Point",
            Shape::MultiPoint(_) => "MultiPoint",
            Shape::LineString(_) => "LineString",
            Shape::MultiLineString(_) => "MultiLineString",
            Shape::Collection(_) => "GeometryCollection",
        }
    }
}

fn position_to_point(pos: &[f64]) -> Option<Point<f64>> {
    match pos {
        [x, y, ..] => Some(Point::new(*x, *y)),
        _ => None,
    }
}

fn positions_to_line(positions: &[Vec<f64>]) -> Option<LineString<f64>> {
    positions
        .iter()
        .map(|p| position_to_point(p).map(|pt| pt.0))
        .collect::<Option<Vec<_>>>()
        .map(LineString::new)
}
