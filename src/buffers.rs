//! Intersection buffers: circular buffers around junction nodes, unioned so
//! that radius-overlapping junctions become a single polygon.
//!
//! ## Algorithm
//! 1. Index the junction points in an R-tree
//! 2. Union-find junctions whose circles can overlap (centers closer than 2r)
//! 3. Union the circles of each group
//! 4. Every connected polygon of the union becomes one [`IntersectionBuffer`],
//!    carrying the junctions that lie inside it
//!
//! Step 2 only partitions the work so no union ever spans unrelated parts of the
//! city; step 4 is what defines a buffer.

use geo::{BooleanOps, Contains, Distance, Euclidean, MultiPolygon, Point, Polygon};
use log::{debug, info};

use crate::geo_utils::circle_polygon;
use crate::index::GeometryIndex;
use crate::UnionFind;

/// One physically distinct junction cluster's buffer polygon.
#[derive(Debug, Clone)]
pub struct IntersectionBuffer {
    pub polygon: Polygon<f64>,
    /// Positions of the junction points contained in `polygon`
    pub nodes: Vec<usize>,
}

/// Buffer every junction point by `radius` and union overlapping buffers.
///
/// `resolution` is the number of segments per quarter circle. With a radius
/// small enough that no circles overlap, this yields one buffer per point.
///
/// # Example
/// ```
/// use geo::Point;
/// use street_segmenter::buffers::build_intersection_buffers;
///
/// let junctions = vec![Point::new(0.0, 0.0), Point::new(15.0, 0.0)];
/// assert_eq!(build_intersection_buffers(&junctions, 5.0, 16).len(), 2);
/// assert_eq!(build_intersection_buffers(&junctions, 10.0, 16).len(), 1);
/// ```
pub fn build_intersection_buffers(
    points: &[Point<f64>],
    radius: f64,
    resolution: usize,
) -> Vec<IntersectionBuffer> {
    if points.is_empty() {
        return vec![];
    }

    let index = GeometryIndex::from_points(points);
    let mut components = UnionFind::new(points.len());

    for (i, point) in points.iter().enumerate() {
        for j in index.query_around(point.0, 2.0 * radius) {
            if j <= i {
                continue;
            }
            if Euclidean.distance(point, &points[j]) < 2.0 * radius {
                components.union(i, j);
            }
        }
    }

    let mut buffers = Vec::new();
    for members in components.groups() {
        let circles: Vec<Polygon<f64>> = members
            .iter()
            .map(|&i| circle_polygon(points[i].0, radius, resolution))
            .collect();

        let merged: Vec<Polygon<f64>> = if circles.len() == 1 {
            circles
        } else {
            circles
                .into_iter()
                .fold(MultiPolygon::new(vec![]), |acc, circle| {
                    acc.union(&MultiPolygon::new(vec![circle]))
                })
                .0
        };

        for polygon in merged {
            let nodes: Vec<usize> = members
                .iter()
                .copied()
                .filter(|&i| polygon.contains(&points[i]))
                .collect();
            if nodes.is_empty() {
                debug!("Buffer polygon without a contained junction (group of {})", members.len());
            }
            buffers.push(IntersectionBuffer { polygon, nodes });
        }
    }

    info!(
        "Built {} intersection buffers from {} junctions (radius {})",
        buffers.len(),
        points.len(),
        radius
    );

    buffers
}
