//! R-tree over the bounding boxes of a geometry collection.
//!
//! Every "find nearby candidates" step goes through a [`GeometryIndex`]: callers
//! keep their geometries in a `Vec` and the index hands back positions into it.
//! Candidates are only bounding-box matches; exact predicates are left to the
//! caller.

use geo::{BoundingRect, Coord, LineString, Point, Rect};
use rstar::{RTree, RTreeObject, AABB};

use crate::geo_utils::{expand_rect, rect_to_aabb};

/// An entry's position in the indexed collection plus its envelope.
#[derive(Debug, Clone, Copy)]
struct IndexedEnvelope {
    idx: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Bounding-box index over a slice of geometries.
pub struct GeometryIndex {
    tree: RTree<IndexedEnvelope>,
}

impl GeometryIndex {
    /// Build from optional bounding rectangles; `None` entries (empty geometry)
    /// are left out of the index but still consume their position.
    pub fn from_rects(rects: impl IntoIterator<Item = Option<Rect<f64>>>) -> Self {
        let entries: Vec<IndexedEnvelope> = rects
            .into_iter()
            .enumerate()
            .filter_map(|(idx, rect)| {
                rect.map(|r| IndexedEnvelope {
                    idx,
                    envelope: rect_to_aabb(&r),
                })
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a LineString<f64>>) -> Self {
        Self::from_rects(lines.into_iter().map(|l| l.bounding_rect()))
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point<f64>>) -> Self {
        Self::from_rects(points.into_iter().map(|p| Some(p.bounding_rect())))
    }

    /// Number of indexed entries.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Positions of every entry whose bounding box intersects `rect`, ascending.
    ///
    /// Sorted so downstream id assignment never depends on tree layout.
    pub fn query(&self, rect: &Rect<f64>) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&rect_to_aabb(rect))
            .map(|e| e.idx)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Like [`GeometryIndex::query`], with the rectangle grown by `margin`.
    pub fn query_expanded(&self, rect: &Rect<f64>, margin: f64) -> Vec<usize> {
        self.query(&expand_rect(rect, margin))
    }

    /// Positions of entries whose bounding box comes within `radius` of `center`
    /// along each axis.
    pub fn query_around(&self, center: Coord<f64>, radius: f64) -> Vec<usize> {
        self.query(&Rect::new(
            Coord { x: center.x - radius, y: center.y - radius },
            Coord { x: center.x + radius, y: center.y + radius },
        ))
    }
}
