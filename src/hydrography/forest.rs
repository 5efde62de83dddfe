//! River forest and its construction from unordered reaches.

use crate::debug_invariants::{validate_each, DebugInvariants};
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::geometry::ops::{first, last, unit_tangent, xy, Segment};
use crate::hydrography::tree::{NodeId, RiverTree};
use crate::mesh_error::MeshError;
use crate::spatial::PointIndex;

/// Ordered collection of independently rooted river trees.
#[derive(Debug, Clone, Default)]
pub struct RiverForest {
    trees: Vec<RiverTree>,
}

impl RiverForest {
    pub fn new(trees: Vec<RiverTree>) -> Self {
        Self { trees }
    }

    /// Build a forest from unordered reaches by matching each reach's last
    /// coordinate to the first coordinate of another reach within `tol`.
    ///
    /// A reach with several candidate parents joins the one whose initial
    /// direction best continues its own final direction; exact ties go to the
    /// lowest input index. Reaches caught in a parent cycle are kept: the
    /// lowest index of each cycle becomes a root. Roots appear in input order.
    pub fn from_segments(
        segments: Vec<Segment>,
        tol: f64,
        diag: &mut Diagnostics,
    ) -> Result<Self, MeshError> {
        if !(tol >= 0.0) {
            return Err(MeshError::invalid_parameter(format!(
                "join tolerance must be non-negative, got {tol}"
            )));
        }
        if let Some((i, s)) = segments.iter().enumerate().find(|(_, s)| s.0.len() < 2) {
            return Err(MeshError::DegenerateSegment(format!(
                "reach {i} has {} coordinates",
                s.0.len()
            )));
        }
        let n = segments.len();
        if n == 0 {
            return Ok(Self::default());
        }

        let starts = PointIndex::new(segments.iter().enumerate().map(|(i, s)| (xy(first(s)), i)));
        let mut parent_of: Vec<Option<usize>> = vec![None; n];
        for (i, seg) in segments.iter().enumerate() {
            let candidates: Vec<usize> = starts
                .within(xy(last(seg)), tol)
                .into_iter()
                .filter(|c| *c != i)
                .collect();
            parent_of[i] = match candidates.as_slice() {
                [] => None,
                [only] => Some(*only),
                _ => Some(pick_by_tangent(i, seg, &candidates, &segments, diag)),
            };
        }

        break_cycles(&mut parent_of, diag);

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, p) in parent_of.iter().enumerate() {
            if let Some(p) = p {
                children[*p].push(i);
            }
        }

        let trees = (0..n)
            .filter(|i| parent_of[*i].is_none())
            .map(|root| {
                let mut tree = RiverTree::new(segments[root].clone());
                let mut stack: Vec<(usize, Option<NodeId>)> =
                    children[root].iter().rev().map(|c| (*c, tree.root())).collect();
                while let Some((i, parent)) = stack.pop() {
                    let Some(parent) = parent else { continue };
                    let mut seg = segments[i].clone();
                    if let Some(p_seg) = tree.segment(parent) {
                        let outlet = first(p_seg);
                        if let Some(end) = seg.0.last_mut() {
                            *end = outlet;
                        }
                    }
                    let id = tree.add_child(parent, seg);
                    stack.extend(children[i].iter().rev().map(|c| (*c, id)));
                }
                tree
            })
            .collect();

        let forest = Self { trees };
        forest.debug_assert_invariants();
        Ok(forest)
    }

    pub fn trees(&self) -> &[RiverTree] {
        &self.trees
    }

    pub fn trees_mut(&mut self) -> &mut [RiverTree] {
        &mut self.trees
    }

    pub fn into_trees(self) -> Vec<RiverTree> {
        self.trees
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Total number of reaches over all trees.
    pub fn reach_count(&self) -> usize {
        self.trees.iter().map(RiverTree::len).sum()
    }

    /// All reaches, tree by tree in pre-order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.trees.iter().flat_map(RiverTree::segments)
    }

    /// Drop trees that have become empty.
    pub fn drop_empty(&mut self) {
        self.trees.retain(|t| !t.is_empty());
    }

    /// Keep only the trees matching a predicate.
    pub fn retain(&mut self, f: impl FnMut(&RiverTree) -> bool) {
        self.trees.retain(f);
    }
}

fn pick_by_tangent(
    reach: usize,
    seg: &Segment,
    candidates: &[usize],
    segments: &[Segment],
    diag: &mut Diagnostics,
) -> usize {
    let c = &seg.0;
    let mine = unit_tangent(c[c.len() - 2], c[c.len() - 1]);
    let dots: Vec<(usize, f64)> = candidates
        .iter()
        .map(|&k| {
            let other = &segments[k].0;
            let dot = match (mine, unit_tangent(other[0], other[1])) {
                (Some(a), Some(b)) => a[0] * b[0] + a[1] * b[1],
                _ => f64::NEG_INFINITY,
            };
            (k, dot)
        })
        .collect();
    // candidates are ascending, so a strict comparison keeps the lowest index on ties
    let mut best = 0;
    for (pos, (_, dot)) in dots.iter().enumerate().skip(1) {
        if *dot > dots[best].1 {
            best = pos;
        }
    }
    let chosen = dots[best].0;
    let discarded = dots.into_iter().filter(|(k, _)| *k != chosen).collect();
    diag.record(DiagnosticEvent::AmbiguousJoin {
        reach,
        outlet: xy(last(seg)),
        chosen,
        discarded,
    });
    chosen
}

/// Promote the lowest index of every parent cycle to a root.
fn break_cycles(parent_of: &mut [Option<usize>], diag: &mut Diagnostics) {
    const UNSEEN: u8 = 0;
    const ON_PATH: u8 = 1;
    const DONE: u8 = 2;
    let mut state = vec![UNSEEN; parent_of.len()];
    for start in 0..parent_of.len() {
        if state[start] != UNSEEN {
            continue;
        }
        let mut path = Vec::new();
        let mut cur = Some(start);
        while let Some(i) = cur {
            match state[i] {
                DONE => break,
                ON_PATH => {
                    let pos = path.iter().position(|p| *p == i).unwrap_or(0);
                    let lowest = path[pos..].iter().copied().min().unwrap_or(i);
                    parent_of[lowest] = None;
                    diag.record(DiagnosticEvent::CycleBroken { reach: lowest });
                    break;
                }
                _ => {
                    state[i] = ON_PATH;
                    path.push(i);
                    cur = parent_of[i];
                }
            }
        }
        for i in path {
            state[i] = DONE;
        }
    }
}

impl DebugInvariants for RiverForest {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "RiverForest invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshError> {
        validate_each(&self.trees).map_err(|(tree, e)| {
            log::debug!("river tree {tree} failed validation");
            e
        })
    }
}
