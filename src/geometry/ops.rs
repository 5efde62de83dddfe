//! Polyline helpers on top of the `geo` primitives.
//!
//! `geo` supplies the value types and the standard algorithms (length,
//! centroid, Douglas–Peucker). The helpers here add what conflation needs
//! on top: nearest point *with* its edge location, arclength projection,
//! exact coordinate keys, directed line merging and densification.

use geo::kernels::RobustKernel;
use geo::{Centroid, Coord, EuclideanLength, Intersects, Kernel, Line, LineString, Orientation, Simplify};
use itertools::Itertools;
use std::collections::HashMap;

/// A polyline of at least two coordinates.
pub type Segment = LineString<f64>;

/// Tolerance used to decide that two coordinates are the same vertex.
pub const VERTEX_TOL: f64 = 1e-7;

/// Plain array form of a coordinate, used in diagnostics and errors.
#[inline]
pub fn xy(c: Coord<f64>) -> [f64; 2] {
    [c.x, c.y]
}

#[inline]
pub fn coord(p: [f64; 2]) -> Coord<f64> {
    Coord { x: p[0], y: p[1] }
}

/// Exact hashable key of a coordinate; `-0.0` and `0.0` map to the same key.
#[inline]
pub fn coord_key(c: Coord<f64>) -> (u64, u64) {
    ((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
}

#[inline]
pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// True when `a` and `b` are within `tol` of each other.
#[inline]
pub fn close(a: Coord<f64>, b: Coord<f64>, tol: f64) -> bool {
    distance(a, b) <= tol
}

pub fn first(seg: &Segment) -> Coord<f64> {
    seg.0[0]
}

pub fn last(seg: &Segment) -> Coord<f64> {
    seg.0[seg.0.len() - 1]
}

pub fn segment_length(seg: &Segment) -> f64 {
    seg.euclidean_length()
}

/// Length-weighted centroid of a polyline, falling back to its first vertex.
pub fn centroid(seg: &Segment) -> [f64; 2] {
    seg.centroid()
        .map(|p| [p.x(), p.y()])
        .or_else(|| seg.0.first().map(|c| xy(*c)))
        .unwrap_or([f64::NAN, f64::NAN])
}

/// Douglas–Peucker simplification preserving both endpoints.
pub fn simplify(seg: &Segment, tol: f64) -> Segment {
    if tol <= 0.0 || seg.0.len() <= 2 {
        return seg.clone();
    }
    let simplified = seg.simplify(&tol);
    if simplified.0.len() < 2 {
        LineString::new(vec![first(seg), last(seg)])
    } else {
        simplified
    }
}

/// Smallest distance between any two consecutive vertices.
pub fn min_edge_length(seg: &Segment) -> f64 {
    seg.0
        .iter()
        .tuple_windows()
        .map(|(a, b)| distance(*a, *b))
        .fold(f64::INFINITY, f64::min)
}

/// Location of the point of a polyline nearest to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineLocation {
    /// Index of the edge `coords[edge] -> coords[edge + 1]`.
    pub edge: usize,
    /// Parameter along that edge, in `[0, 1]`.
    pub t: f64,
    /// The nearest point itself.
    pub point: Coord<f64>,
    /// Distance from the query point to `point`.
    pub distance: f64,
}

impl LineLocation {
    /// Sort key ordering locations along the polyline.
    pub fn position(&self) -> (usize, f64) {
        (self.edge, self.t)
    }
}

/// Nearest point on a single edge, as `(t, point)`.
pub fn nearest_on_edge(a: Coord<f64>, b: Coord<f64>, p: Coord<f64>) -> (f64, Coord<f64>) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return (0.0, a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    if t == 0.0 {
        (0.0, a)
    } else if t == 1.0 {
        (1.0, b)
    } else {
        (t, Coord { x: a.x + t * dx, y: a.y + t * dy })
    }
}

/// Locate the nearest point of `seg` to `p`. The first minimum wins on ties.
pub fn locate_point(seg: &Segment, p: Coord<f64>) -> Option<LineLocation> {
    let mut best: Option<LineLocation> = None;
    for (edge, w) in seg.0.windows(2).enumerate() {
        let (t, point) = nearest_on_edge(w[0], w[1], p);
        let d = distance(point, p);
        if best.is_none_or(|b| d < b.distance) {
            best = Some(LineLocation {
                edge,
                t,
                point,
                distance: d,
            });
        }
    }
    best
}

/// Nearest point of `seg` to `p`.
pub fn nearest_point(seg: &Segment, p: Coord<f64>) -> Option<Coord<f64>> {
    locate_point(seg, p).map(|loc| loc.point)
}

/// Arclength along `seg` of the point nearest to `p`.
pub fn project(seg: &Segment, p: Coord<f64>) -> f64 {
    match locate_point(seg, p) {
        Some(loc) => {
            let before: f64 = seg.0[..=loc.edge]
                .windows(2)
                .map(|w| distance(w[0], w[1]))
                .sum();
            before + distance(seg.0[loc.edge], loc.point)
        }
        None => 0.0,
    }
}

/// True when `p` coincides (within `tol`) with one of the vertices of `seg`.
pub fn is_vertex(seg: &Segment, p: Coord<f64>, tol: f64) -> bool {
    seg.0.iter().any(|c| close(*c, p, tol))
}

/// Round every coordinate to `digits` decimal places.
pub fn round_coords(seg: &Segment, digits: i32) -> Segment {
    let scale = 10f64.powi(digits);
    seg.0
        .iter()
        .map(|c| Coord {
            x: (c.x * scale).round() / scale,
            y: (c.y * scale).round() / scale,
        })
        .collect::<Vec<_>>()
        .into()
}

/// Remove consecutive duplicate vertices.
pub fn dedup_consecutive(coords: &mut Vec<Coord<f64>>) {
    coords.dedup_by(|b, a| coord_key(*a) == coord_key(*b));
}

/// Insert vertices so that no edge is longer than `max_len`.
pub fn densify(seg: &Segment, max_len: f64) -> Segment {
    if !(max_len > 0.0) || seg.0.len() < 2 {
        return seg.clone();
    }
    let mut out = Vec::with_capacity(seg.0.len());
    out.push(seg.0[0]);
    for (&a, &b) in seg.0.iter().tuple_windows() {
        let pieces = (distance(a, b) / max_len).ceil().max(1.0) as usize;
        for k in 1..pieces {
            let t = k as f64 / pieces as f64;
            out.push(Coord {
                x: a.x + t * (b.x - a.x),
                y: a.y + t * (b.y - a.y),
            });
        }
        out.push(b);
    }
    LineString::new(out)
}

/// Merge directed polylines that chain end-to-start through junctions where
/// exactly one line ends and exactly one line starts.
///
/// Output order follows the index of each chain's first line.
pub fn line_merge(lines: Vec<Segment>) -> Vec<Segment> {
    let mut starts: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    let mut ends: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        if line.0.len() < 2 {
            continue;
        }
        starts.entry(coord_key(first(line))).or_default().push(i);
        ends.entry(coord_key(last(line))).or_default().push(i);
    }

    let next_of = |i: usize| -> Option<usize> {
        let key = coord_key(last(&lines[i]));
        match (starts.get(&key), ends.get(&key)) {
            (Some(s), Some(e)) if s.len() == 1 && e.len() == 1 && s[0] != i => Some(s[0]),
            _ => None,
        }
    };

    let mut has_prev = vec![false; lines.len()];
    let mut next = vec![None; lines.len()];
    for i in 0..lines.len() {
        if lines[i].0.len() < 2 {
            continue;
        }
        if let Some(j) = next_of(i) {
            next[i] = Some(j);
            has_prev[j] = true;
        }
    }

    let mut used = vec![false; lines.len()];
    let mut merged = Vec::new();
    let walk = |head: usize, used: &mut Vec<bool>| {
        let mut coords: Vec<Coord<f64>> = Vec::new();
        let mut cur = Some(head);
        while let Some(i) = cur {
            if used[i] {
                break;
            }
            used[i] = true;
            if coords.is_empty() {
                coords.extend(lines[i].0.iter().copied());
            } else {
                coords.extend(lines[i].0.iter().skip(1).copied());
            }
            cur = next[i];
        }
        LineString::new(coords)
    };

    for i in 0..lines.len() {
        if lines[i].0.len() < 2 || used[i] || has_prev[i] {
            continue;
        }
        merged.push((i, walk(i, &mut used)));
    }
    // whatever is left forms closed chains
    for i in 0..lines.len() {
        if lines[i].0.len() < 2 || used[i] {
            continue;
        }
        merged.push((i, walk(i, &mut used)));
    }
    merged.sort_by_key(|(i, _)| *i);
    merged.into_iter().map(|(_, l)| l).collect()
}

/// True when `a`, `b` and `c` lie on one line, decided with the robust
/// orientation predicate.
#[inline]
pub fn collinear(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> bool {
    RobustKernel::orient2d(a, b, c) == Orientation::Collinear
}

/// True when the closed edges `a0-a1` and `b0-b1` share at least one point.
pub fn edges_intersect(a0: Coord<f64>, a1: Coord<f64>, b0: Coord<f64>, b1: Coord<f64>) -> bool {
    Line::new(a0, a1).intersects(&Line::new(b0, b1))
}

/// Unit tangent of the edge `a -> b`, or `None` for a zero-length edge.
pub fn unit_tangent(a: Coord<f64>, b: Coord<f64>) -> Option<[f64; 2]> {
    let len = distance(a, b);
    (len > 0.0).then(|| [(b.x - a.x) / len, (b.y - a.y) / len])
}
