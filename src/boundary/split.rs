//! Split-form boundary: polygons as rings of shared, directed segments.
//!
//! Every polygon edge chain lives exactly once in a segment pool. Polygons
//! reference pooled segments by [`SegmentHandle`] together with the
//! [`Direction`] in which their ring traverses it. Editing a pooled segment
//! therefore edits every polygon using it.
//!
//! Two derived indices group handles by the polygons using them:
//! `boundaries` (outer hull, one owning polygon) and `intersections`
//! (interior edges, keyed by the polygon pair `(i, j)` with `i < j`).

use crate::debug_invariants::DebugInvariants;
use crate::geometry::ops::{
    collinear, coord_key, edges_intersect, first, last, simplify, xy, Segment,
};
use crate::mesh_error::MeshError;
use crate::spatial::EdgeIndex;
use geo::{Area, Coord, LineString, Polygon};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Stable handle of a pooled segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentHandle(pub usize);

/// Traversal direction of a pooled segment within a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectedSegment {
    pub handle: SegmentHandle,
    pub direction: Direction,
}

/// A group of handles used by the same polygon set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Component {
    /// Outer hull segments owned by a single polygon.
    Boundary(usize),
    /// Segments shared by exactly the two polygons `(i, j)`, `i < j`.
    Intersection(usize, usize),
}

/// Polygon set in split form.
#[derive(Debug, Clone, Default)]
pub struct SplitBoundary {
    pub(crate) segments: Vec<Option<Segment>>,
    pub(crate) rings: Vec<Vec<DirectedSegment>>,
    pub(crate) boundaries: BTreeMap<usize, Vec<SegmentHandle>>,
    pub(crate) intersections: BTreeMap<(usize, usize), Vec<SegmentHandle>>,
}

impl SplitBoundary {
    pub fn polygon_count(&self) -> usize {
        self.rings.len()
    }

    /// Number of live pooled segments.
    pub fn segment_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_some()).count()
    }

    pub fn segment(&self, handle: SegmentHandle) -> Option<&Segment> {
        self.segments.get(handle.0).and_then(|s| s.as_ref())
    }

    /// Live segments in handle order.
    pub fn segments(&self) -> impl Iterator<Item = (SegmentHandle, &Segment)> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (SegmentHandle(i), s)))
    }

    pub fn handles(&self) -> Vec<SegmentHandle> {
        self.segments().map(|(h, _)| h).collect()
    }

    /// Directed handles forming the ring of polygon `polygon`.
    pub fn ring(&self, polygon: usize) -> &[DirectedSegment] {
        self.rings.get(polygon).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn boundaries(&self) -> &BTreeMap<usize, Vec<SegmentHandle>> {
        &self.boundaries
    }

    pub fn intersections(&self) -> &BTreeMap<(usize, usize), Vec<SegmentHandle>> {
        &self.intersections
    }

    /// All components in a fixed order: boundaries first, then intersections.
    pub fn components(&self) -> Vec<(Component, &[SegmentHandle])> {
        self.boundaries
            .iter()
            .map(|(k, v)| (Component::Boundary(*k), v.as_slice()))
            .chain(
                self.intersections
                    .iter()
                    .map(|((i, j), v)| (Component::Intersection(*i, *j), v.as_slice())),
            )
            .collect()
    }

    /// Polygons whose rings reference `handle`, ascending.
    pub fn referencing_polygons(&self, handle: SegmentHandle) -> Vec<usize> {
        self.rings
            .iter()
            .enumerate()
            .filter(|(_, ring)| ring.iter().any(|d| d.handle == handle))
            .map(|(i, _)| i)
            .collect()
    }

    /// Replace the geometry of a pooled segment, returning the old one.
    pub fn replace_segment(
        &mut self,
        handle: SegmentHandle,
        segment: Segment,
    ) -> Result<Segment, MeshError> {
        let slot = self
            .segments
            .get_mut(handle.0)
            .and_then(|s| s.as_mut())
            .ok_or(MeshError::DanglingHandle(handle.0))?;
        if segment.0.len() < 2 {
            return Err(MeshError::DegenerateSegment(format!(
                "replacement for segment {} has {} coordinates",
                handle.0,
                segment.0.len()
            )));
        }
        Ok(std::mem::replace(slot, segment))
    }

    /// Split a pooled segment into consecutive `pieces`.
    ///
    /// The first piece keeps `handle`; the others receive fresh handles,
    /// returned in order. Every referencing ring gets the new handles in
    /// traversal order and every component listing `handle` lists the new
    /// handles right after it.
    pub fn split_segment(
        &mut self,
        handle: SegmentHandle,
        mut pieces: Vec<Segment>,
    ) -> Result<Vec<SegmentHandle>, MeshError> {
        if self.segment(handle).is_none() {
            return Err(MeshError::DanglingHandle(handle.0));
        }
        if pieces.is_empty() || pieces.iter().any(|p| p.0.len() < 2) {
            return Err(MeshError::DegenerateSegment(format!(
                "invalid split of segment {}",
                handle.0
            )));
        }
        let head = pieces.remove(0);
        self.segments[handle.0] = Some(head);
        let new_handles: Vec<SegmentHandle> = pieces
            .into_iter()
            .map(|p| {
                self.segments.push(Some(p));
                SegmentHandle(self.segments.len() - 1)
            })
            .collect();
        if new_handles.is_empty() {
            return Ok(new_handles);
        }

        for ring in &mut self.rings {
            let mut pos = 0;
            while pos < ring.len() {
                if ring[pos].handle != handle {
                    pos += 1;
                    continue;
                }
                let direction = ring[pos].direction;
                let mut run: Vec<DirectedSegment> = std::iter::once(handle)
                    .chain(new_handles.iter().copied())
                    .map(|h| DirectedSegment {
                        handle: h,
                        direction,
                    })
                    .collect();
                if direction == Direction::Backward {
                    run.reverse();
                }
                let len = run.len();
                ring.splice(pos..=pos, run);
                pos += len;
            }
        }

        let lists = self
            .boundaries
            .values_mut()
            .chain(self.intersections.values_mut());
        for list in lists {
            if let Some(pos) = list.iter().position(|h| *h == handle) {
                list.splice(pos + 1..pos + 1, new_handles.iter().copied());
            }
        }
        Ok(new_handles)
    }

    /// Douglas–Peucker simplify every pooled segment once.
    ///
    /// Endpoints are kept, so rings stay closed and shared edges stay shared.
    /// A segment keeps its original geometry when simplifying it would leave
    /// a referencing ring without area.
    pub fn simplify(&mut self, tol: f64) {
        for i in 0..self.segments.len() {
            let handle = SegmentHandle(i);
            let Some(seg) = self.segment(handle) else { continue };
            let simplified = simplify(seg, tol);
            if simplified.0.len() == seg.0.len() {
                continue;
            }
            let original = std::mem::replace(&mut self.segments[i], Some(simplified));
            let collapsed = self
                .referencing_polygons(handle)
                .into_iter()
                .any(|p| !self.ring_has_area(p));
            if collapsed {
                log::debug!("segment {i} left unsimplified, a ring would collapse");
                self.segments[i] = original;
            }
        }
    }

    fn ring_has_area(&self, polygon: usize) -> bool {
        self.polygon_ring(polygon)
            .is_ok_and(|ring| Polygon::new(ring, Vec::new()).unsigned_area() > 0.0)
    }

    /// Coordinates of a pooled segment as traversed in `direction`.
    pub(crate) fn directed_coords(
        &self,
        d: DirectedSegment,
    ) -> Result<Vec<Coord<f64>>, MeshError> {
        let seg = self
            .segment(d.handle)
            .ok_or(MeshError::DanglingHandle(d.handle.0))?;
        let mut coords = seg.0.clone();
        if d.direction == Direction::Backward {
            coords.reverse();
        }
        Ok(coords)
    }

    /// Re-walk the ring of one polygon, checking every junction and closure.
    pub fn polygon_ring(&self, polygon: usize) -> Result<LineString<f64>, MeshError> {
        let ring = self.ring(polygon);
        let mut coords: Vec<Coord<f64>> = Vec::new();
        for (position, d) in ring.iter().enumerate() {
            let piece = self.directed_coords(*d)?;
            match coords.last() {
                None => coords.extend(piece),
                Some(end) => {
                    if coord_key(*end) != coord_key(piece[0]) {
                        return Err(MeshError::RingGap {
                            polygon,
                            position: position - 1,
                        });
                    }
                    coords.extend(piece.into_iter().skip(1));
                }
            }
        }
        match (coords.first(), coords.last()) {
            (Some(s), Some(e)) if coords.len() >= 4 && coord_key(*s) == coord_key(*e) => {
                Ok(LineString::new(coords))
            }
            (Some(s), Some(e)) => Err(MeshError::RingNotClosed {
                polygon,
                start: xy(*s),
                end: xy(*e),
            }),
            _ => Err(MeshError::RingNotClosed {
                polygon,
                start: [f64::NAN; 2],
                end: [f64::NAN; 2],
            }),
        }
    }

    /// Reconstruct every polygon, failing on the first ring that does not close.
    pub fn polygons(&self) -> Result<Vec<Polygon<f64>>, MeshError> {
        (0..self.rings.len())
            .map(|i| self.polygon_ring(i).map(|r| Polygon::new(r, Vec::new())))
            .collect()
    }

    /// Outer hull of the polygon set as closed rings, built from the
    /// `boundaries` index in the owning polygons' orientation.
    pub fn exterior(&self) -> Result<Vec<LineString<f64>>, MeshError> {
        let mut pieces: Vec<(usize, Vec<Coord<f64>>)> = Vec::new();
        for (owner, handles) in &self.boundaries {
            for h in handles {
                let d = self
                    .ring(*owner)
                    .iter()
                    .find(|d| d.handle == *h)
                    .copied()
                    .ok_or(MeshError::ReferenceMismatch { handle: h.0 })?;
                pieces.push((*owner, self.directed_coords(d)?));
            }
        }

        let mut by_start: HashMap<(u64, u64), Vec<usize>> = HashMap::new();
        for (i, (_, c)) in pieces.iter().enumerate() {
            by_start.entry(coord_key(c[0])).or_default().push(i);
        }
        let mut used = vec![false; pieces.len()];
        let mut rings = Vec::new();
        for start in 0..pieces.len() {
            if used[start] {
                continue;
            }
            used[start] = true;
            let (owner, ref c) = pieces[start];
            let origin = coord_key(c[0]);
            let mut coords = c.clone();
            loop {
                let end = *coords.last().unwrap_or(&c[0]);
                if coord_key(end) == origin && coords.len() > 1 {
                    break;
                }
                let next = by_start
                    .get(&coord_key(end))
                    .and_then(|cands| cands.iter().copied().find(|k| !used[*k]));
                match next {
                    Some(k) => {
                        used[k] = true;
                        coords.extend(pieces[k].1.iter().skip(1).copied());
                    }
                    None => {
                        return Err(MeshError::RingNotClosed {
                            polygon: owner,
                            start: xy(coords[0]),
                            end: xy(end),
                        });
                    }
                }
            }
            rings.push(LineString::new(coords));
        }
        Ok(rings)
    }

    /// Check that no ring touches itself away from its consecutive junctions.
    fn check_simple(&self, polygon: usize, ring: &LineString<f64>) -> Result<(), MeshError> {
        let c = &ring.0;
        let n = c.len() - 1;
        let edges = EdgeIndex::from_segments([(polygon, ring)]);
        for k in 0..n {
            let (a0, a1) = (c[k], c[k + 1]);
            if coord_key(a0) == coord_key(a1) {
                continue;
            }
            let min = [a0.x.min(a1.x), a0.y.min(a1.y)];
            let max = [a0.x.max(a1.x), a0.y.max(a1.y)];
            for hit in edges.in_envelope(min, max) {
                let j = hit.edge;
                if j <= k {
                    continue;
                }
                let (b0, b1) = (c[j], c[j + 1]);
                if coord_key(b0) == coord_key(b1) {
                    continue;
                }
                let adjacent_after = j == k + 1;
                let adjacent_before = k == 0 && j == n - 1;
                let bad = if adjacent_after {
                    folds_back(a0, a1, b1)
                } else if adjacent_before {
                    folds_back(b0, b1, a1)
                } else {
                    edges_intersect(a0, a1, b0, b1)
                };
                if bad {
                    return Err(MeshError::SelfIntersectingRing {
                        polygon,
                        first: k,
                        second: j,
                    });
                }
            }
        }
        Ok(())
    }

    /// Check that handles and component indices agree with the rings.
    fn check_references(&self) -> Result<(), MeshError> {
        let mut users: BTreeMap<SegmentHandle, BTreeSet<usize>> = BTreeMap::new();
        for (p, ring) in self.rings.iter().enumerate() {
            for d in ring {
                if self.segment(d.handle).is_none() {
                    return Err(MeshError::DanglingHandle(d.handle.0));
                }
                users.entry(d.handle).or_default().insert(p);
            }
        }
        let mut listed: BTreeMap<SegmentHandle, Component> = BTreeMap::new();
        for (component, handles) in self.components() {
            for h in handles {
                if listed.insert(*h, component).is_some() {
                    return Err(MeshError::ReferenceMismatch { handle: h.0 });
                }
            }
        }
        for (h, _) in self.segments() {
            let expected = match users.get(&h).map(|s| s.iter().copied().collect::<Vec<_>>()) {
                Some(v) if v.len() == 1 => Component::Boundary(v[0]),
                Some(v) if v.len() == 2 => Component::Intersection(v[0], v[1]),
                _ => return Err(MeshError::ReferenceMismatch { handle: h.0 }),
            };
            if listed.get(&h) != Some(&expected) {
                return Err(MeshError::ReferenceMismatch { handle: h.0 });
            }
        }
        if listed.len() != self.segment_count() {
            let stray = listed
                .keys()
                .find(|h| self.segment(**h).is_none())
                .map(|h| h.0)
                .unwrap_or(0);
            return Err(MeshError::DanglingHandle(stray));
        }
        Ok(())
    }
}

/// True when `c`, continuing the edge `a -> b` from `b`, doubles back over it.
fn folds_back(a: Coord<f64>, b: Coord<f64>, c: Coord<f64>) -> bool {
    if !collinear(a, b, c) {
        return false;
    }
    let dot = (a.x - b.x) * (c.x - b.x) + (a.y - b.y) * (c.y - b.y);
    dot > 0.0
}

impl DebugInvariants for SplitBoundary {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "SplitBoundary invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshError> {
        self.check_references()?;
        for polygon in 0..self.rings.len() {
            let ring = self.polygon_ring(polygon)?;
            self.check_simple(polygon, &ring)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn two_squares() -> SplitBoundary {
        SplitBoundary::from_polygons(&[
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
            polygon![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0)],
        ])
        .unwrap()
    }

    #[test]
    fn split_updates_every_referencing_ring() {
        let mut b = two_squares();
        let shared = b.intersections()[&(0, 1)][0];
        let seg = b.segment(shared).unwrap().clone();
        let mid = Coord { x: 1.0, y: 0.5 };
        let pieces = vec![
            LineString::new(vec![seg.0[0], mid]),
            LineString::new(vec![mid, seg.0[1]]),
        ];
        let new = b.split_segment(shared, pieces).unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(b.intersections()[&(0, 1)], vec![shared, new[0]]);
        assert_eq!(b.referencing_polygons(new[0]), vec![0, 1]);
        assert!(b.validate_invariants().is_ok());
        for p in b.polygons().unwrap() {
            assert!(p.exterior().0.contains(&mid));
        }
    }

    #[test]
    fn broken_junction_is_reported() {
        let mut b = two_squares();
        let shared = b.intersections()[&(0, 1)][0];
        b.replace_segment(shared, vec![(1.0, 0.0), (1.0, 0.9)].into())
            .unwrap();
        assert!(matches!(
            b.polygons(),
            Err(MeshError::RingGap { .. }) | Err(MeshError::RingNotClosed { .. })
        ));
    }

    #[test]
    fn exterior_is_the_outer_hull() {
        let b = two_squares();
        let hull = b.exterior().unwrap();
        assert_eq!(hull.len(), 1);
        // six corners plus closing coordinate
        assert_eq!(hull[0].0.len(), 7);
        assert_eq!(hull[0].0.first(), hull[0].0.last());
    }

    #[test]
    fn dangling_handle_is_rejected() {
        let mut b = two_squares();
        assert_eq!(
            b.replace_segment(SegmentHandle(99), vec![(0.0, 0.0), (1.0, 0.0)].into()),
            Err(MeshError::DanglingHandle(99))
        );
    }
}
