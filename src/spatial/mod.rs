//! R-tree backed spatial indices.
//!
//! Both indices are bulk-loaded once per operator invocation and are
//! read-only afterwards. Queries that may return several hits are sorted so
//! results never depend on the tree's internal layout.

use crate::geometry::ops::{nearest_on_edge, Segment};
use geo::Coord;
use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Index of labelled points.
#[derive(Debug, Clone)]
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    pub fn new<I>(points: I) -> Self
    where
        I: IntoIterator<Item = ([f64; 2], usize)>,
    {
        let entries = points
            .into_iter()
            .map(|(p, id)| GeomWithData::new(p, id))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Labels of all points within `tol` of `p`, ascending.
    pub fn within(&self, p: [f64; 2], tol: f64) -> Vec<usize> {
        let mut ids: Vec<usize> = self
            .tree
            .locate_within_distance(p, tol * tol)
            .map(|e| e.data)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Nearest point within `tol` of `p` as `(label, position, distance)`.
    ///
    /// Equidistant candidates resolve to the lowest label.
    pub fn nearest_within(&self, p: [f64; 2], tol: f64) -> Option<(usize, [f64; 2], f64)> {
        self.tree
            .locate_within_distance(p, tol * tol)
            .map(|e| (e.data, *e.geom(), e.geom().distance_2(&p).sqrt()))
            .min_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)))
    }
}

/// A single polyline edge tagged with its owner and position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexedEdge {
    pub a: [f64; 2],
    pub b: [f64; 2],
    /// Label of the polyline the edge belongs to.
    pub owner: usize,
    /// Position of the edge within its polyline.
    pub edge: usize,
}

impl IndexedEdge {
    fn nearest(&self, p: [f64; 2]) -> [f64; 2] {
        let (_, c) = nearest_on_edge(
            Coord { x: self.a[0], y: self.a[1] },
            Coord { x: self.b[0], y: self.b[1] },
            Coord { x: p[0], y: p[1] },
        );
        [c.x, c.y]
    }
}

impl RTreeObject for IndexedEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a, self.b)
    }
}

impl PointDistance for IndexedEdge {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let c = self.nearest(*point);
        let dx = c[0] - point[0];
        let dy = c[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Index of polyline edges.
#[derive(Debug, Clone)]
pub struct EdgeIndex {
    tree: RTree<IndexedEdge>,
}

impl EdgeIndex {
    /// Index every edge of the given labelled polylines.
    pub fn from_segments<'a, I>(segments: I) -> Self
    where
        I: IntoIterator<Item = (usize, &'a Segment)>,
    {
        let mut edges = Vec::new();
        for (owner, seg) in segments {
            for (edge, w) in seg.0.windows(2).enumerate() {
                edges.push(IndexedEdge {
                    a: [w[0].x, w[0].y],
                    b: [w[1].x, w[1].y],
                    owner,
                    edge,
                });
            }
        }
        Self {
            tree: RTree::bulk_load(edges),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Distance from `p` to the nearest indexed edge.
    pub fn distance(&self, p: [f64; 2]) -> Option<f64> {
        self.tree
            .nearest_neighbor(&p)
            .map(|e| e.distance_2(&p).sqrt())
    }

    /// Nearest owner within `tol` of `p` as `(owner, distance)`.
    ///
    /// Equidistant owners resolve to the lowest label.
    pub fn nearest_owner_within(&self, p: [f64; 2], tol: f64) -> Option<(usize, f64)> {
        self.tree
            .locate_within_distance(p, tol * tol)
            .map(|e| (e.owner, e.distance_2(&p).sqrt()))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
    }

    /// Edges whose bounding box intersects the box `[min, max]`.
    pub fn in_envelope(&self, min: [f64; 2], max: [f64; 2]) -> Vec<IndexedEdge> {
        let envelope = AABB::from_corners(min, max);
        let mut hits: Vec<IndexedEdge> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .copied()
            .collect();
        hits.sort_by_key(|e| (e.owner, e.edge));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_index_breaks_ties_by_label() {
        let idx = PointIndex::new([([1.0, 0.0], 7), ([-1.0, 0.0], 2), ([5.0, 5.0], 0)]);
        assert_eq!(idx.within([0.0, 0.0], 1.5), vec![2, 7]);
        let (id, pos, d) = idx.nearest_within([0.0, 0.0], 1.5).unwrap();
        assert_eq!(id, 2);
        assert_eq!(pos, [-1.0, 0.0]);
        assert!((d - 1.0).abs() < 1e-12);
        assert!(idx.nearest_within([0.0, 0.0], 0.5).is_none());
    }

    #[test]
    fn edge_index_measures_distance_to_segments() {
        let a: Segment = vec![(0.0, 0.0), (10.0, 0.0)].into();
        let b: Segment = vec![(0.0, 3.0), (10.0, 3.0)].into();
        let idx = EdgeIndex::from_segments([(0, &a), (1, &b)]);
        assert!((idx.distance([5.0, 1.0]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(idx.nearest_owner_within([5.0, 2.5], 1.0), Some((1, 0.5)));
        assert_eq!(idx.in_envelope([4.0, -1.0], [6.0, 1.0]).len(), 1);
    }
}
