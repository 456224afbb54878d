//! Connected-component grouping of intersection fragments.
//!
//! Inside one buffer, the road fragments are grouped by geometric contact
//! (within a small tolerance), seeded from the junction nodes in that buffer:
//!
//! 1. **Seed**: every node starts a cluster. Fragments are visited once in order
//!    and join every cluster whose current extent (its node plus the fragments
//!    it already holds) they touch, so a fragment may join several clusters.
//! 2. **Orphans**: fragments that joined nothing seed a cluster of their own.
//! 3. **Merge**: clusters sharing a fragment, or touching anywhere, are merged
//!    until nothing changes.
//! 4. Clusters left without fragments are dropped.
//!
//! Groups from neighbouring buffers that still touch are then merged across
//! buffers with [`merge_touching_groups`]. Groups that end up with no junction
//! node at all are not intersections; [`take_nodeless_groups`] separates them
//! so their fragments can go back to their roads.

use geo::{BoundingRect, Coord, Distance, Euclidean, LineString, Point, Rect};
use log::{debug, info};

use crate::buffers::IntersectionBuffer;
use crate::index::GeometryIndex;
use crate::splitting::IntersectionFragment;
use crate::{log_progress, UnionFind};

/// A set of fragments (and the junction nodes seeding them) forming one
/// intersection. Indices are positions into the slices the group was built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentGroup {
    pub nodes: Vec<usize>,
    pub fragments: Vec<usize>,
}

#[derive(Clone, Copy)]
enum Member<'a> {
    Node(&'a Point<f64>),
    Line(&'a LineString<f64>),
}

fn member_distance(a: Member<'_>, b: Member<'_>) -> f64 {
    match (a, b) {
        (Member::Node(p), Member::Node(q)) => Euclidean.distance(p, q),
        (Member::Node(p), Member::Line(l)) | (Member::Line(l), Member::Node(p)) => {
            Euclidean.distance(p, l)
        }
        (Member::Line(l), Member::Line(m)) => Euclidean.distance(l, m),
    }
}

fn members<'a>(
    group: &'a FragmentGroup,
    points: &'a [Point<f64>],
    fragments: &'a [LineString<f64>],
) -> impl Iterator<Item = Member<'a>> + 'a {
    group
        .nodes
        .iter()
        .map(move |&n| Member::Node(&points[n]))
        .chain(group.fragments.iter().map(move |&f| Member::Line(&fragments[f])))
}

fn touches_group(
    group: &FragmentGroup,
    candidate: Member<'_>,
    points: &[Point<f64>],
    fragments: &[LineString<f64>],
    tolerance: f64,
) -> bool {
    members(group, points, fragments).any(|m| member_distance(m, candidate) < tolerance)
}

fn groups_touch(
    a: &FragmentGroup,
    b: &FragmentGroup,
    points: &[Point<f64>],
    fragments: &[LineString<f64>],
    tolerance: f64,
) -> bool {
    if a.fragments.iter().any(|f| b.fragments.contains(f)) {
        return true;
    }
    members(a, points, fragments).any(|m| touches_group(b, m, points, fragments, tolerance))
}

/// Merge each union-find component of `groups` into one group with sorted members.
fn collapse(groups: &[FragmentGroup], components: Vec<Vec<usize>>) -> Vec<FragmentGroup> {
    let mut merged: Vec<FragmentGroup> = components
        .into_iter()
        .map(|component| {
            let mut group = FragmentGroup::default();
            for i in component {
                group.nodes.extend_from_slice(&groups[i].nodes);
                group.fragments.extend_from_slice(&groups[i].fragments);
            }
            group.nodes.sort_unstable();
            group.nodes.dedup();
            group.fragments.sort_unstable();
            group.fragments.dedup();
            group
        })
        .collect();
    merged.sort_by(|a, b| a.fragments.cmp(&b.fragments).then_with(|| a.nodes.cmp(&b.nodes)));
    merged
}

fn group_rect(
    group: &FragmentGroup,
    points: &[Point<f64>],
    fragments: &[LineString<f64>],
) -> Option<Rect<f64>> {
    let rects = group
        .nodes
        .iter()
        .map(|&n| Some(points[n].bounding_rect()))
        .chain(group.fragments.iter().map(|&f| fragments[f].bounding_rect()))
        .flatten();

    rects.reduce(|acc, r| {
        Rect::new(
            Coord { x: acc.min().x.min(r.min().x), y: acc.min().y.min(r.min().y) },
            Coord { x: acc.max().x.max(r.max().x), y: acc.max().y.max(r.max().y) },
        )
    })
}

/// Seed phase: one cluster per node, fragments attached in a single ordered pass
/// against each cluster's growing extent. Fragments touching no cluster are left out.
pub fn attach_fragments(
    points: &[Point<f64>],
    fragments: &[LineString<f64>],
    tolerance: f64,
) -> Vec<FragmentGroup> {
    let mut clusters: Vec<FragmentGroup> = (0..points.len())
        .map(|n| FragmentGroup { nodes: vec![n], fragments: vec![] })
        .collect();

    for (f, fragment) in fragments.iter().enumerate() {
        for cluster in clusters.iter_mut() {
            if touches_group(cluster, Member::Line(fragment), points, fragments, tolerance) {
                cluster.fragments.push(f);
            }
        }
    }

    clusters
}

/// Group the fragments inside one buffer into intersections.
///
/// Every fragment ends up in exactly one group and every group holds at least
/// one fragment. Nodes that never touch a fragment are dropped.
pub fn group_fragments(
    points: &[Point<f64>],
    fragments: &[LineString<f64>],
    tolerance: f64,
) -> Vec<FragmentGroup> {
    let mut groups = attach_fragments(points, fragments, tolerance);

    let mut attached = vec![false; fragments.len()];
    for group in &groups {
        for &f in &group.fragments {
            attached[f] = true;
        }
    }
    for (f, _) in attached.iter().enumerate().filter(|(_, a)| !**a) {
        groups.push(FragmentGroup { nodes: vec![], fragments: vec![f] });
    }

    loop {
        let mut components = UnionFind::new(groups.len());
        let mut merged_any = false;
        for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                if components.find(i) == components.find(j) {
                    continue;
                }
                if groups_touch(&groups[i], &groups[j], points, fragments, tolerance) {
                    components.union(i, j);
                    merged_any = true;
                }
            }
        }
        if !merged_any {
            break;
        }
        groups = collapse(&groups, components.groups());
    }

    groups.retain(|group| {
        if group.fragments.is_empty() {
            debug!("Dropping junction cluster {:?} with no road fragments", group.nodes);
            false
        } else {
            true
        }
    });
    groups.sort_by(|a, b| a.fragments.cmp(&b.fragments).then_with(|| a.nodes.cmp(&b.nodes)));
    groups
}

/// Merge groups (typically from different buffers) whose geometry touches.
///
/// Candidate pairs come from an R-tree over each group's bounding box.
pub fn merge_touching_groups(
    groups: Vec<FragmentGroup>,
    points: &[Point<f64>],
    fragments: &[LineString<f64>],
    tolerance: f64,
) -> Vec<FragmentGroup> {
    let rects: Vec<Option<Rect<f64>>> =
        groups.iter().map(|g| group_rect(g, points, fragments)).collect();
    let index = GeometryIndex::from_rects(rects.iter().copied());
    let mut components = UnionFind::new(groups.len());

    for (i, rect) in rects.iter().enumerate() {
        let Some(rect) = rect else {
            continue;
        };
        for j in index.query_expanded(rect, tolerance) {
            if j <= i || components.find(i) == components.find(j) {
                continue;
            }
            if groups_touch(&groups[i], &groups[j], points, fragments, tolerance) {
                components.union(i, j);
            }
        }
    }

    let merged = collapse(&groups, components.groups());
    if merged.len() < groups.len() {
        info!(
            "Merged {} touching intersection groups into {}",
            groups.len(),
            merged.len()
        );
    }
    merged
}

/// Group the fragments of every buffer, then merge touching groups across buffers.
///
/// Returned indices are global: nodes index `points`, fragments index `fragments`.
pub fn group_buffers(
    buffers: &[IntersectionBuffer],
    fragments: &[IntersectionFragment],
    points: &[Point<f64>],
    tolerance: f64,
    progress_interval: usize,
) -> Vec<FragmentGroup> {
    let mut per_buffer: Vec<Vec<usize>> = vec![vec![]; buffers.len()];
    for (f, fragment) in fragments.iter().enumerate() {
        per_buffer[fragment.buffer].push(f);
    }

    let mut groups = Vec::new();
    for (b, (buffer, members)) in buffers.iter().zip(&per_buffer).enumerate() {
        log_progress(b, progress_interval, buffers.len(), "buffers grouped");
        if members.is_empty() {
            debug!("No roads cross intersection buffer {} ({} junctions)", b, buffer.nodes.len());
            continue;
        }

        let local_points: Vec<Point<f64>> = buffer.nodes.iter().map(|&n| points[n]).collect();
        let local_lines: Vec<LineString<f64>> =
            members.iter().map(|&f| fragments[f].geometry.clone()).collect();

        for group in group_fragments(&local_points, &local_lines, tolerance) {
            groups.push(FragmentGroup {
                nodes: group.nodes.iter().map(|&n| buffer.nodes[n]).collect(),
                fragments: group.fragments.iter().map(|&f| members[f]).collect(),
            });
        }
    }

    let lines: Vec<LineString<f64>> = fragments.iter().map(|f| f.geometry.clone()).collect();
    merge_touching_groups(groups, points, &lines, tolerance)
}

/// Split off groups holding no junction node.
///
/// Returns the remaining groups and the sorted fragment positions of the
/// removed ones.
pub fn take_nodeless_groups(groups: Vec<FragmentGroup>) -> (Vec<FragmentGroup>, Vec<usize>) {
    let (kept, nodeless): (Vec<_>, Vec<_>) =
        groups.into_iter().partition(|g| !g.nodes.is_empty());

    let mut fragments: Vec<usize> = nodeless.into_iter().flat_map(|g| g.fragments).collect();
    fragments.sort_unstable();
    if !fragments.is_empty() {
        debug!(
            "{} fragments touch no junction and go back to their roads",
            fragments.len()
        );
    }
    (kept, fragments)
}
