//! Phase two: river endpoints onto boundary segments, then cut the segments.
//!
//! Requests are collected for the whole forest against the unmodified
//! boundary, then every segment is cut once, at all of its requests, in order
//! of position along the segment.

use crate::boundary::{SegmentHandle, SplitBoundary};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::geometry::ops::{
    close, coord_key, distance, first, is_vertex, last, locate_point, xy, Segment, VERTEX_TOL,
};
use crate::hydrography::{NodeId, RiverForest, RiverTree};
use crate::mesh_error::MeshError;
use crate::spatial::EdgeIndex;
use geo::{Coord, LineString};
use std::collections::BTreeMap;

/// Requests closer than this to an earlier one on the same segment are dropped.
pub const DUPLICATE_TOL: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Inlet,
    Outlet,
}

/// A pending cut, and the river end that asked for it.
#[derive(Debug, Clone, Copy)]
struct Request {
    point: Coord<f64>,
    tree: usize,
    node: NodeId,
    end: End,
}

/// Set one end of a reach to `to`, first dropping interior vertices that are
/// closer to `to` than the current endpoint.
fn retarget(seg: &Segment, to: Coord<f64>, end: End) -> Segment {
    let mut coords = seg.0.clone();
    match end {
        End::Inlet => {
            while coords.len() > 2 && distance(to, coords[1]) < distance(to, coords[0]) {
                coords.remove(0);
            }
            coords[0] = to;
        }
        End::Outlet => {
            while coords.len() > 2
                && distance(to, coords[coords.len() - 2]) < distance(to, coords[coords.len() - 1])
            {
                coords.pop();
            }
            let n = coords.len();
            coords[n - 1] = to;
        }
    }
    LineString::new(coords)
}

fn retarget_node(tree: &mut RiverTree, id: NodeId, to: Coord<f64>, end: End) {
    if let Some(seg) = tree.segment(id) {
        let moved = retarget(seg, to, end);
        tree.replace_segment(id, moved);
    }
}

/// Move the given end of a node, and every reach meeting it at that
/// junction, onto `to`.
fn move_junction(tree: &mut RiverTree, id: NodeId, to: Coord<f64>, end: End) {
    match end {
        End::Inlet => {
            retarget_node(tree, id, to, End::Inlet);
            for child in tree.children(id).to_vec() {
                retarget_node(tree, child, to, End::Outlet);
            }
        }
        End::Outlet => match tree.parent(id) {
            Some(parent) => {
                retarget_node(tree, parent, to, End::Inlet);
                for sibling in tree.children(parent).to_vec() {
                    retarget_node(tree, sibling, to, End::Outlet);
                }
            }
            None => retarget_node(tree, id, to, End::Outlet),
        },
    }
}

/// Snap river endpoints within `tol` of the boundary onto it and cut the
/// boundary there. Returns `(snapped endpoints, split segments)`.
pub fn snap_river_endpoints(
    boundary: &mut SplitBoundary,
    forest: &mut RiverForest,
    tol: f64,
    diag: &mut Diagnostics,
) -> Result<(usize, usize), MeshError> {
    let index = EdgeIndex::from_segments(boundary.segments().map(|(h, s)| (h.0, s)));
    if index.is_empty() {
        return Ok((0, 0));
    }

    let mut requests: BTreeMap<SegmentHandle, Vec<Request>> = BTreeMap::new();
    let mut snapped = 0;
    for (tree_index, tree) in forest.trees_mut().iter_mut().enumerate() {
        for id in tree.pre_order() {
            for end in [End::Inlet, End::Outlet] {
                let Some(seg) = tree.segment(id) else { continue };
                let p = match end {
                    End::Inlet => first(seg),
                    End::Outlet => last(seg),
                };
                let Some((owner, _)) = index.nearest_owner_within(xy(p), tol) else {
                    continue;
                };
                let handle = SegmentHandle(owner);
                let Some(target) = boundary.segment(handle) else {
                    continue;
                };
                let Some(loc) = locate_point(target, p) else {
                    continue;
                };
                if loc.distance >= tol {
                    continue;
                }
                let pending = requests.get(&handle);
                if loc.distance < VERTEX_TOL
                    && (is_vertex(target, p, VERTEX_TOL)
                        || pending.is_some_and(|r| r.iter().any(|q| close(q.point, p, VERTEX_TOL))))
                {
                    continue;
                }
                move_junction(tree, id, loc.point, end);
                diag.record(DiagnosticEvent::RiverEndpointSnapped {
                    segment: handle.0,
                    from: xy(p),
                    to: xy(loc.point),
                });
                requests.entry(handle).or_default().push(Request {
                    point: loc.point,
                    tree: tree_index,
                    node: id,
                    end,
                });
                snapped += 1;
            }
        }
    }

    let mut split = 0;
    for (handle, points) in requests {
        let mut unique: Vec<Coord<f64>> = Vec::with_capacity(points.len());
        for request in points {
            match unique.iter().find(|q| close(**q, request.point, DUPLICATE_TOL)).copied() {
                Some(kept) => {
                    diag.record(DiagnosticEvent::DuplicateSnapDropped {
                        segment: handle.0,
                        at: xy(request.point),
                    });
                    if let Some(tree) = forest.trees_mut().get_mut(request.tree) {
                        move_junction(tree, request.node, kept, request.end);
                    }
                }
                None => unique.push(request.point),
            }
        }
        let Some(seg) = boundary.segment(handle) else {
            return Err(MeshError::DanglingHandle(handle.0));
        };
        let mut pieces = cut_segment(seg, &unique);
        if pieces.len() == 1 {
            // a loop cut once is only re-seamed
            if let Some(rotated) = pieces.pop().filter(|p| p != seg) {
                boundary.replace_segment(handle, rotated)?;
            }
        } else if pieces.len() > 1 {
            diag.record(DiagnosticEvent::SegmentSplit {
                segment: handle.0,
                pieces: pieces.len(),
            });
            boundary.split_segment(handle, pieces)?;
            split += 1;
        }
    }
    Ok((snapped, split))
}

/// A coordinate of the cut polyline and whether the cut happens there.
type Marked = (Coord<f64>, bool);

/// Cut `seg` at `points`, all of which lie on it.
///
/// Points coinciding with an interior vertex cut at that vertex; points at
/// the segment's own endpoints are ignored. A closed segment is first
/// rotated so that its first cut becomes the new seam.
pub fn cut_segment(seg: &Segment, points: &[Coord<f64>]) -> Vec<Segment> {
    let coords = &seg.0;
    let n = coords.len();
    let closed = n > 3 && coord_key(coords[0]) == coord_key(coords[n - 1]);

    let mut vertex_cuts = vec![false; n];
    let mut edge_cuts: Vec<(usize, f64, Coord<f64>)> = Vec::new();
    for p in points {
        if let Some(k) = coords.iter().position(|c| close(*c, *p, VERTEX_TOL)) {
            vertex_cuts[k] = true;
        } else if let Some(loc) = locate_point(seg, *p) {
            edge_cuts.push((loc.edge, loc.t, *p));
        }
    }
    vertex_cuts[0] = false;
    vertex_cuts[n - 1] = false;
    edge_cuts.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut marked: Vec<Marked> = Vec::with_capacity(n + edge_cuts.len());
    let mut cuts = edge_cuts.iter().peekable();
    for k in 0..n {
        marked.push((coords[k], vertex_cuts[k]));
        while let Some((_, _, p)) = cuts.next_if(|(e, _, _)| *e == k) {
            marked.push((*p, true));
        }
    }

    if closed {
        let open = &marked[..marked.len() - 1];
        let Some(seam) = open.iter().position(|(_, b)| *b) else {
            return vec![seg.clone()];
        };
        let mut rotated: Vec<Marked> = open[seam..].iter().chain(&open[..=seam]).copied().collect();
        let last = rotated.len() - 1;
        rotated[0].1 = false;
        rotated[last].1 = false;
        marked = rotated;
    }

    let mut pieces = Vec::new();
    let mut current: Vec<Coord<f64>> = Vec::new();
    for (c, is_cut) in marked {
        current.push(c);
        if is_cut && current.len() > 1 {
            pieces.push(LineString::new(std::mem::replace(&mut current, vec![c])));
        }
    }
    if current.len() > 1 {
        pieces.push(LineString::new(current));
    }
    pieces
}
