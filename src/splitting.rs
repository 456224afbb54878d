//! Road splitting: cut every road at the intersection buffers it crosses.
//!
//! The part of a road inside a buffer becomes an [`IntersectionFragment`] that is
//! later grouped into an intersection; the parts outside every buffer become
//! [`RoadPiece`]s, one non-intersection segment each.
//!
//! Fragments that end up in no intersection (a road passing through a buffer
//! without meeting its junction) are handed back with [`rejoin_fragments`] and
//! chained onto the pieces of their road.

use std::collections::BTreeMap;

use geo::{
    BooleanOps, Coord, Distance, Euclidean, Intersects, LineString, MultiLineString, MultiPolygon,
    Polygon,
};
use log::{debug, info, warn};

use crate::buffers::IntersectionBuffer;
use crate::index::GeometryIndex;
use crate::shape::Shape;
use crate::{log_progress, Road};

/// The portion of one road lying inside one intersection buffer.
#[derive(Debug, Clone)]
pub struct IntersectionFragment {
    /// Position of the source road in the network
    pub road: usize,
    /// Position of the buffer the fragment lies in
    pub buffer: usize,
    pub geometry: LineString<f64>,
}

/// A connected part of a road lying outside every intersection buffer.
#[derive(Debug, Clone)]
pub struct RoadPiece {
    pub road: usize,
    pub geometry: LineString<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct SplitResult {
    /// Ordered by buffer, then road
    pub fragments: Vec<IntersectionFragment>,
    /// Ordered by road, then position along the road
    pub pieces: Vec<RoadPiece>,
    /// Roads lying entirely inside buffers
    pub absorbed: Vec<usize>,
    /// Roads whose remainder was not line material
    pub skipped: Vec<usize>,
    /// Fragments moved back into `pieces` by [`rejoin_fragments`]
    pub rejoined: Vec<usize>,
}

/// Split every road against the intersection buffers.
pub fn split_roads(
    roads: &[Road],
    buffers: &[IntersectionBuffer],
    progress_interval: usize,
) -> SplitResult {
    let mut result = SplitResult::default();
    let index = GeometryIndex::from_lines(roads.iter().map(|r| &r.geometry));
    let mut road_buffers: BTreeMap<usize, Vec<usize>> = BTreeMap::new();

    for (b, buffer) in buffers.iter().enumerate() {
        log_progress(b, progress_interval, buffers.len(), "intersection buffers");

        let Some(rect) = geo::BoundingRect::bounding_rect(&buffer.polygon) else {
            continue;
        };
        for r in index.query(&rect) {
            let road = &roads[r];
            if !road.geometry.intersects(&buffer.polygon) {
                continue;
            }
            road_buffers.entry(r).or_default().push(b);

            let inside = buffer
                .polygon
                .clip(&MultiLineString::new(vec![road.geometry.clone()]), false);
            for part in Shape::from_line_parts(inside).line_parts() {
                result.fragments.push(IntersectionFragment {
                    road: r,
                    buffer: b,
                    geometry: part,
                });
            }
        }
    }

    for (r, road) in roads.iter().enumerate() {
        log_progress(r, progress_interval, roads.len(), "roads");

        let Some(touching) = road_buffers.get(&r) else {
            result.pieces.push(RoadPiece {
                road: r,
                geometry: road.geometry.clone(),
            });
            continue;
        };

        let covered = union_buffers(touching.iter().map(|&b| &buffers[b].polygon));
        let outside = covered.clip(&MultiLineString::new(vec![road.geometry.clone()]), true);

        file_remainder(&mut result, r, road.orig_id, Shape::from_line_parts(outside));
    }

    info!(
        "Split {} roads into {} pieces and {} intersection fragments ({} absorbed, {} skipped)",
        roads.len(),
        result.pieces.len(),
        result.fragments.len(),
        result.absorbed.len(),
        result.skipped.len()
    );

    result
}

/// Record what is left of road `r` outside every buffer.
///
/// Line material becomes pieces; nothing left means the road was absorbed;
/// only degenerate (point) material means it is skipped.
fn file_remainder(result: &mut SplitResult, r: usize, orig_id: u64, outside: Shape) {
    match outside {
        shape if shape.is_empty() => {
            debug!("Road {} lies entirely inside intersection buffers", orig_id);
            result.absorbed.push(r);
        }
        Shape::LineString(line) => result.pieces.push(RoadPiece { road: r, geometry: line }),
        Shape::MultiLineString(lines) => {
            for line in lines {
                result.pieces.push(RoadPiece { road: r, geometry: line });
            }
        }
        shape @ Shape::Collection(_) => {
            let lines = shape.line_parts();
            warn!(
                "Road {} left {} degenerate parts outside intersection buffers",
                orig_id,
                shape.point_parts().len()
            );
            if lines.is_empty() {
                result.skipped.push(r);
            }
            for line in lines {
                result.pieces.push(RoadPiece { road: r, geometry: line });
            }
        }
        shape @ (Shape::Point(_) | Shape::MultiPoint(_)) => {
            warn!(
                "Road {} produced {} outside intersection buffers, skipping",
                orig_id,
                shape.type_name()
            );
            result.skipped.push(r);
        }
    }
}

/// Move `fragment_ids` back into the road pieces.
///
/// Each fragment is chained onto the pieces of its own road it shares an
/// endpoint with (within `tolerance`, in either direction); the chained lines
/// replace those pieces. Pieces keep their road order. A road that regains
/// material is no longer reported as absorbed or skipped.
pub fn rejoin_fragments(split: &mut SplitResult, fragment_ids: &[usize], tolerance: f64) {
    if fragment_ids.is_empty() {
        return;
    }

    let mut by_road: BTreeMap<usize, Vec<LineString<f64>>> = BTreeMap::new();
    for piece in split.pieces.drain(..) {
        by_road.entry(piece.road).or_default().push(piece.geometry);
    }

    let mut touched: Vec<usize> = Vec::new();
    for &f in fragment_ids {
        let fragment = &split.fragments[f];
        by_road.entry(fragment.road).or_default().push(fragment.geometry.clone());
        touched.push(fragment.road);
        split.rejoined.push(f);
    }
    touched.sort_unstable();
    touched.dedup();

    for (road, lines) in by_road {
        let lines = if touched.binary_search(&road).is_ok() {
            chain_lines(lines, tolerance)
        } else {
            lines
        };
        split
            .pieces
            .extend(lines.into_iter().map(|geometry| RoadPiece { road, geometry }));
    }

    split.absorbed.retain(|r| touched.binary_search(r).is_err());
    split.skipped.retain(|r| touched.binary_search(r).is_err());
    split.rejoined.sort_unstable();

    debug!(
        "Rejoined {} fragments on {} roads, now {} pieces",
        fragment_ids.len(),
        touched.len(),
        split.pieces.len()
    );
}

/// Greedily join lines sharing endpoints into as few lines as possible.
fn chain_lines(mut lines: Vec<LineString<f64>>, tolerance: f64) -> Vec<LineString<f64>> {
    let mut chains = Vec::with_capacity(lines.len());
    while !lines.is_empty() {
        let mut chain = lines.remove(0).0;
        while let Some((i, joined)) = lines
            .iter()
            .enumerate()
            .find_map(|(i, line)| join_lines(&chain, &line.0, tolerance).map(|j| (i, j)))
        {
            chain = joined;
            lines.remove(i);
        }
        chains.push(LineString::new(chain));
    }
    chains
}

fn join_lines(chain: &[Coord<f64>], line: &[Coord<f64>], tolerance: f64) -> Option<Vec<Coord<f64>>> {
    let (&chain_first, &chain_last) = (chain.first()?, chain.last()?);
    let (&line_first, &line_last) = (line.first()?, line.last()?);
    let close = |a: Coord<f64>, b: Coord<f64>| Euclidean.distance(a, b) <= tolerance;

    if close(chain_last, line_first) {
        Some(chain.iter().chain(&line[1..]).copied().collect())
    } else if close(line_last, chain_first) {
        Some(line.iter().chain(&chain[1..]).copied().collect())
    } else if close(chain_last, line_last) {
        Some(chain.iter().chain(line.iter().rev().skip(1)).copied().collect())
    } else if close(line_first, chain_first) {
        Some(line.iter().rev().chain(&chain[1..]).copied().collect())
    } else {
        None
    }
}

fn union_buffers<'a>(polygons: impl Iterator<Item = &'a Polygon<f64>>) -> MultiPolygon<f64> {
    polygons.fold(MultiPolygon::new(vec![]), |acc, polygon| {
        acc.union(&MultiPolygon::new(vec![polygon.clone()]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::build_intersection_buffers;
    use crate::geo_utils::line_length;
    use crate::Properties;
    use geo::{line_string, Point};

    fn road(orig_id: u64, geometry: LineString<f64>) -> Road {
        Road {
            orig_id,
            geometry,
            properties: Properties::new(),
        }
    }

    #[test]
    fn test_road_crossing_one_buffer() {
        let roads = vec![road(0, line_string![(x: -100.0, y: 0.0), (x: 100.0, y: 0.0)])];
        let buffers = build_intersection_buffers(&[Point::new(0.0, 0.0)], 20.0, 16);
        let split = split_roads(&roads, &buffers, 1000);

        assert_eq!(split.fragments.len(), 1);
        assert_eq!(split.pieces.len(), 2);
        assert!((line_length(&split.fragments[0].geometry) - 40.0).abs() < 1e-3);
        for piece in &split.pieces {
            assert!((line_length(&piece.geometry) - 80.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_road_without_buffers_is_one_piece() {
        let roads = vec![road(0, line_string![(x: 0.0, y: 0.0), (x: 50.0, y: 0.0)])];
        let buffers = build_intersection_buffers(&[Point::new(500.0, 500.0)], 20.0, 16);
        let split = split_roads(&roads, &buffers, 1000);

        assert!(split.fragments.is_empty());
        assert_eq!(split.pieces.len(), 1);
        assert_eq!(split.pieces[0].geometry, roads[0].geometry);
    }

    #[test]
    fn test_road_inside_buffer_is_absorbed() {
        let roads = vec![road(7, line_string![(x: -5.0, y: 0.0), (x: 5.0, y: 0.0)])];
        let buffers = build_intersection_buffers(&[Point::new(0.0, 0.0)], 20.0, 16);
        let split = split_roads(&roads, &buffers, 1000);

        assert!(split.pieces.is_empty());
        assert_eq!(split.absorbed, vec![0]);
        assert_eq!(split.fragments.len(), 1);
    }

    #[test]
    fn test_road_between_two_buffers() {
        let roads = vec![road(0, line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)])];
        let buffers =
            build_intersection_buffers(&[Point::new(0.0, 0.0), Point::new(100.0, 0.0)], 20.0, 16);
        let split = split_roads(&roads, &buffers, 1000);

        assert_eq!(split.fragments.len(), 2);
        assert_eq!(split.pieces.len(), 1);
        assert!((line_length(&split.pieces[0].geometry) - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_point_remainder_is_skipped() {
        let mut result = SplitResult::default();
        let degenerate = MultiLineString::new(vec![line_string![(x: 3.0, y: 3.0), (x: 3.0, y: 3.0)]]);
        file_remainder(&mut result, 4, 40, Shape::from_line_parts(degenerate));

        assert_eq!(result.skipped, vec![4]);
        assert!(result.pieces.is_empty());
        assert!(result.absorbed.is_empty());

        let several = MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0)],
            line_string![(x: 9.0, y: 9.0), (x: 9.0, y: 9.0)],
        ]);
        file_remainder(&mut result, 5, 50, Shape::from_line_parts(several));
        assert_eq!(result.skipped, vec![4, 5]);
    }

    #[test]
    fn test_mixed_remainder_keeps_lines() {
        let mut result = SplitResult::default();
        let mixed = MultiLineString::new(vec![
            line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)],
            line_string![(x: 20.0, y: 0.0), (x: 20.0, y: 0.0)],
        ]);
        file_remainder(&mut result, 1, 10, Shape::from_line_parts(mixed));

        assert_eq!(result.pieces.len(), 1);
        assert!(result.skipped.is_empty());
    }

    #[test]
    fn test_rejoin_restores_passing_road() {
        let roads = vec![road(0, line_string![(x: -100.0, y: 0.0), (x: 100.0, y: 0.0)])];
        let buffers = build_intersection_buffers(&[Point::new(0.0, 10.0)], 20.0, 16);
        let mut split = split_roads(&roads, &buffers, 1000);
        assert_eq!(split.pieces.len(), 2);

        rejoin_fragments(&mut split, &[0], 1e-3);

        assert_eq!(split.rejoined, vec![0]);
        assert_eq!(split.pieces.len(), 1);
        assert!((line_length(&split.pieces[0].geometry) - 200.0).abs() < 1e-3);
    }

    #[test]
    fn test_rejoin_absorbed_road() {
        let roads = vec![road(7, line_string![(x: -5.0, y: 0.0), (x: 5.0, y: 0.0)])];
        let buffers = build_intersection_buffers(&[Point::new(0.0, 0.0)], 20.0, 16);
        let mut split = split_roads(&roads, &buffers, 1000);

        rejoin_fragments(&mut split, &[0], 1e-3);

        assert!(split.absorbed.is_empty());
        assert_eq!(split.pieces.len(), 1);
        assert_eq!(split.pieces[0].road, 0);
    }

    #[test]
    fn test_chain_lines_follows_either_direction() {
        let lines = vec![
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
            line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0)],
            line_string![(x: 2.0, y: 0.0), (x: 1.0, y: 0.0)],
        ];
        let chains = chain_lines(lines, 1e-9);

        assert_eq!(chains.len(), 2);
        assert_eq!(
            chains[0],
            line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]
        );
    }
}
