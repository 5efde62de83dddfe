//! Decomposition of a polygon set into split form.
//!
//! A vertex is a *node* when its degree over all rings differs from two, or
//! when its two incident edges are used by different polygon sets. Rings are
//! cut at nodes into chains; each chain is pooled once and referenced by every
//! polygon traversing it. A ring without any node becomes one closed loop
//! segment.

use super::split::{DirectedSegment, Direction, SegmentHandle, SplitBoundary};
use crate::debug_invariants::DebugInvariants;
use crate::geometry::ops::{coord_key, xy, Segment};
use crate::mesh_error::MeshError;
use geo::{Coord, LineString, Polygon};
use std::collections::{BTreeMap, BTreeSet, HashMap};

type VertexKey = (u64, u64);
type EdgeKey = (VertexKey, VertexKey);

fn edge_key(a: Coord<f64>, b: Coord<f64>) -> EdgeKey {
    let (ka, kb) = (coord_key(a), coord_key(b));
    if ka <= kb { (ka, kb) } else { (kb, ka) }
}

/// Open ring without the closing coordinate or consecutive duplicates.
fn open_ring(index: usize, polygon: &Polygon<f64>) -> Result<Vec<Coord<f64>>, MeshError> {
    if !polygon.interiors().is_empty() {
        return Err(MeshError::UnsupportedGeometry(format!(
            "polygon {index} has {} interior rings",
            polygon.interiors().len()
        )));
    }
    let mut coords: Vec<Coord<f64>> = polygon.exterior().0.clone();
    coords.dedup_by(|b, a| coord_key(*a) == coord_key(*b));
    while coords.len() > 1 && coord_key(coords[0]) == coord_key(coords[coords.len() - 1]) {
        coords.pop();
    }
    if coords.len() < 3 {
        return Err(MeshError::DegenerateSegment(format!(
            "polygon {index} has only {} distinct vertices",
            coords.len()
        )));
    }
    Ok(coords)
}

fn shoelace(coords: &[Coord<f64>]) -> f64 {
    coords
        .windows(2)
        .map(|w| w[0].x * w[1].y - w[1].x * w[0].y)
        .sum()
}

/// Direction in which `chain` traverses the already pooled `stored` segment.
fn direction_of(stored: &Segment, chain: &[Coord<f64>]) -> Direction {
    let s = &stored.0;
    let closed = coord_key(s[0]) == coord_key(s[s.len() - 1]);
    let same = if closed {
        (shoelace(s) >= 0.0) == (shoelace(chain) >= 0.0)
    } else {
        coord_key(s[0]) == coord_key(chain[0])
    };
    if same { Direction::Forward } else { Direction::Backward }
}

impl SplitBoundary {
    /// Decompose simple polygons (no holes) into split form.
    ///
    /// Fails on polygons with holes, rings with fewer than three distinct
    /// vertices, edges used by more than two polygons, and rings that are not
    /// simple.
    pub fn from_polygons(polygons: &[Polygon<f64>]) -> Result<Self, MeshError> {
        let rings: Vec<Vec<Coord<f64>>> = polygons
            .iter()
            .enumerate()
            .map(|(i, p)| open_ring(i, p))
            .collect::<Result<_, _>>()?;

        let mut edge_users: HashMap<EdgeKey, Vec<usize>> = HashMap::new();
        let mut neighbors: HashMap<VertexKey, BTreeSet<VertexKey>> = HashMap::new();
        for (p, ring) in rings.iter().enumerate() {
            let n = ring.len();
            for k in 0..n {
                let (a, b) = (ring[k], ring[(k + 1) % n]);
                let users = edge_users.entry(edge_key(a, b)).or_default();
                users.push(p);
                if users.len() > 2 {
                    return Err(MeshError::NonManifoldEdge {
                        from: xy(a),
                        to: xy(b),
                        count: users.len(),
                    });
                }
                neighbors.entry(coord_key(a)).or_default().insert(coord_key(b));
                neighbors.entry(coord_key(b)).or_default().insert(coord_key(a));
            }
        }
        for users in edge_users.values_mut() {
            users.sort_unstable();
            users.dedup();
        }

        let mut boundary = SplitBoundary::default();
        let mut pooled: HashMap<EdgeKey, SegmentHandle> = HashMap::new();
        for ring in &rings {
            let n = ring.len();
            let users_of = |k: usize| edge_users.get(&edge_key(ring[k % n], ring[(k + 1) % n]));
            let nodes: Vec<usize> = (0..n)
                .filter(|&k| {
                    let degree = neighbors.get(&coord_key(ring[k])).map_or(0, BTreeSet::len);
                    degree != 2 || users_of(k + n - 1) != users_of(k)
                })
                .collect();
            let starts = if nodes.is_empty() { vec![0] } else { nodes };

            let mut directed = Vec::with_capacity(starts.len());
            for (idx, &s) in starts.iter().enumerate() {
                let e = match starts.get(idx + 1) {
                    Some(next) => *next,
                    None => starts[0] + n,
                };
                let chain: Vec<Coord<f64>> = (s..=e).map(|k| ring[k % n]).collect();
                let key = edge_key(chain[0], chain[1]);
                let d = match pooled.get(&key) {
                    Some(&handle) => {
                        let stored = boundary
                            .segment(handle)
                            .ok_or(MeshError::DanglingHandle(handle.0))?;
                        DirectedSegment {
                            handle,
                            direction: direction_of(stored, &chain),
                        }
                    }
                    None => {
                        let handle = SegmentHandle(boundary.segments.len());
                        for w in chain.windows(2) {
                            pooled.insert(edge_key(w[0], w[1]), handle);
                        }
                        boundary.segments.push(Some(LineString::new(chain)));
                        DirectedSegment {
                            handle,
                            direction: Direction::Forward,
                        }
                    }
                };
                directed.push(d);
            }
            boundary.rings.push(directed);
        }

        let mut users: BTreeMap<SegmentHandle, BTreeSet<usize>> = BTreeMap::new();
        for (p, ring) in boundary.rings.iter().enumerate() {
            for d in ring {
                users.entry(d.handle).or_default().insert(p);
            }
        }
        for (handle, polys) in users {
            let polys: Vec<usize> = polys.into_iter().collect();
            match polys.as_slice() {
                [owner] => boundary.boundaries.entry(*owner).or_default().push(handle),
                [i, j] => boundary.intersections.entry((*i, *j)).or_default().push(handle),
                _ => return Err(MeshError::ReferenceMismatch { handle: handle.0 }),
            }
        }

        boundary.validate_invariants()?;
        log::debug!(
            "split {} polygons into {} segments ({} hull components, {} shared components)",
            polygons.len(),
            boundary.segment_count(),
            boundary.boundaries.len(),
            boundary.intersections.len()
        );
        Ok(boundary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn two_squares() -> Vec<Polygon<f64>> {
        vec![
            polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)],
            polygon![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 1.0, y: 1.0)],
        ]
    }

    #[test]
    fn shared_edge_is_pooled_once() {
        let b = SplitBoundary::from_polygons(&two_squares()).unwrap();
        assert_eq!(b.segment_count(), 3);
        assert_eq!(b.intersections().len(), 1);
        let shared = &b.intersections()[&(0, 1)];
        assert_eq!(shared.len(), 1);
        assert_eq!(b.referencing_polygons(shared[0]), vec![0, 1]);
        let dirs: Vec<Direction> = (0..2)
            .map(|p| b.ring(p).iter().find(|d| d.handle == shared[0]).unwrap().direction)
            .collect();
        assert_ne!(dirs[0], dirs[1]);
    }

    #[test]
    fn isolated_polygon_is_one_loop() {
        let b = SplitBoundary::from_polygons(&two_squares()[..1]).unwrap();
        assert_eq!(b.segment_count(), 1);
        assert_eq!(b.boundaries()[&0].len(), 1);
        let ring = b.polygon_ring(0).unwrap();
        assert_eq!(ring.0.len(), 5);
    }

    #[test]
    fn holes_are_rejected() {
        let outer = LineString::from(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]);
        let hole = LineString::from(vec![(1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (1.0, 1.0)]);
        let p = Polygon::new(outer, vec![hole]);
        assert!(matches!(
            SplitBoundary::from_polygons(&[p]),
            Err(MeshError::UnsupportedGeometry(_))
        ));
    }

    #[test]
    fn self_intersecting_ring_is_rejected() {
        let bowtie = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 1.0), (x: 1.0, y: 0.0), (x: 0.0, y: 1.0)];
        assert!(matches!(
            SplitBoundary::from_polygons(&[bowtie]),
            Err(MeshError::SelfIntersectingRing { .. })
        ));
    }
}
