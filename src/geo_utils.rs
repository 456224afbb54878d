//! # Geographic Utilities
//!
//! Core geometric helpers shared by every segmentation stage.
//!
//! The segmentation engine works in a projected, meters-based coordinate system
//! (spherical Web Mercator, EPSG:3857). Input arrives in WGS84 latitude/longitude
//! and output centroids are reported back in WGS84, so the projection helpers
//! live here alongside the planar operations.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`wgs84_to_mercator`] | Project a GPS point into Web Mercator meters |
//! | [`mercator_to_wgs84`] | Unproject a Web Mercator coordinate to a GPS point |
//! | [`circle_polygon`] | Polygonal approximation of a circular buffer |
//! | [`line_length`] | Planar length of a line string |
//! | [`line_midpoint`] | Point halfway along a line string |
//! | [`center_point`] | Representative center of a line or multi-line |
//! | [`rect_to_aabb`] | Convert a bounding rectangle to an R-tree envelope |
//!
//! ## Example
//!
//! ```rust
//! use street_segmenter::{GpsPoint, geo_utils};
//!
//! let boston = GpsPoint::new(42.3601, -71.0589);
//! let projected = geo_utils::wgs84_to_mercator(&boston);
//! let back = geo_utils::mercator_to_wgs84(projected);
//! assert!((back.latitude - boston.latitude).abs() < 1e-9);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Web Mercator
//!
//! Uses the spherical formulas with the WGS84 semi-major axis as radius, which
//! is what EPSG:3857 defines. Distances in this projection are stretched by
//! `1 / cos(latitude)`, which is acceptable for the city-scale buffers used here.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use geo::{
    Closest, ClosestPoint, Coord, Euclidean, InterpolatableLine, Length, LineString,
    MultiLineString, Point, Polygon, Rect,
};
use rstar::AABB;

use crate::GpsPoint;

/// Radius of the sphere used by EPSG:3857, in meters.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

// =============================================================================
// Projection Functions
// =============================================================================

/// Project a WGS84 point into Web Mercator (EPSG:3857) meters.
///
/// Latitudes are clamped to the valid Mercator range (about ±85.05°).
#[inline]
pub fn wgs84_to_mercator(point: &GpsPoint) -> Coord<f64> {
    let lat = point.latitude.clamp(-85.051_128_78, 85.051_128_78);
    Coord {
        x: EARTH_RADIUS * point.longitude.to_radians(),
        y: EARTH_RADIUS * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln(),
    }
}

/// Unproject a Web Mercator (EPSG:3857) coordinate back to WGS84.
#[inline]
pub fn mercator_to_wgs84(coord: Coord<f64>) -> GpsPoint {
    let longitude = (coord.x / EARTH_RADIUS).to_degrees();
    let latitude = (2.0 * (coord.y / EARTH_RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
    GpsPoint::new(latitude, longitude)
}

/// Reproject every coordinate of a line string from WGS84 into Web Mercator.
///
/// Coordinates are read as GeoJSON orders them: `x` is longitude, `y` is latitude.
pub fn project_line(line: &LineString<f64>) -> LineString<f64> {
    line.coords()
        .map(|c| wgs84_to_mercator(&GpsPoint::new(c.y, c.x)))
        .collect()
}

// =============================================================================
// Buffer Functions
// =============================================================================

/// Create a polygon approximating a circle of `radius` around `center`.
///
/// `resolution` is the number of segments per quarter circle, so the ring has
/// `4 * resolution` distinct vertices (minimum one per quarter).
///
/// # Example
///
/// ```rust
/// use geo::{Area, Coord};
/// use street_segmenter::geo_utils;
///
/// let circle = geo_utils::circle_polygon(Coord { x: 0.0, y: 0.0 }, 10.0, 16);
/// let area = circle.unsigned_area();
/// assert!((area - std::f64::consts::PI * 100.0).abs() < 2.0);
/// ```
pub fn circle_polygon(center: Coord<f64>, radius: f64, resolution: usize) -> Polygon<f64> {
    let n = 4 * resolution.max(1);
    let mut coords = Vec::with_capacity(n + 1);
    for i in 0..n {
        let angle = 2.0 * PI * i as f64 / n as f64;
        coords.push(Coord {
            x: center.x + radius * angle.cos(),
            y: center.y + radius * angle.sin(),
        });
    }
    coords.push(coords[0]);

    Polygon::new(LineString::new(coords), vec![])
}

// =============================================================================
// Length and Center Functions
// =============================================================================

/// Planar length of a line string, in projection units.
#[inline]
pub fn line_length(line: &LineString<f64>) -> f64 {
    Euclidean.length(line)
}

/// The point halfway along a line string.
///
/// Returns `None` for an empty line. A zero-length line yields its first coordinate.
#[inline]
pub fn line_midpoint(line: &LineString<f64>) -> Option<Point<f64>> {
    line.point_at_ratio_from_start(&Euclidean, 0.5)
}

/// Representative center point of a line or multi-part line.
///
/// A single part uses its midpoint. For several parts, the midpoint of the
/// bounding-box diagonal is projected onto the nearest point of the geometry,
/// so the result always lies on the road material itself.
pub fn center_point(lines: &MultiLineString<f64>) -> Option<Point<f64>> {
    match lines.0.as_slice() {
        [] => None,
        [single] => line_midpoint(single),
        _ => {
            let rect = geo::BoundingRect::bounding_rect(lines)?;
            let mid = Point::from(rect.center());
            match lines.closest_point(&mid) {
                Closest::Intersection(p) | Closest::SinglePoint(p) => Some(p),
                Closest::Indeterminate => lines.0.first().and_then(line_midpoint),
            }
        }
    }
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Convert a bounding rectangle to an R-tree envelope.
#[inline]
pub fn rect_to_aabb(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Grow a rectangle by `margin` on every side.
#[inline]
pub fn expand_rect(rect: &Rect<f64>, margin: f64) -> Rect<f64> {
    Rect::new(
        Coord { x: rect.min().x - margin, y: rect.min().y - margin },
        Coord { x: rect.max().x + margin, y: rect.max().y + margin },
    )
}

// =============================================================================
// Unit Tests
// =============================================================================
