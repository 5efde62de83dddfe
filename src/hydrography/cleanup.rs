//! In-place cleanup operators: simplify, merge and prune.
//!
//! None of these can fail. Each preserves tree connectivity: simplification
//! keeps endpoints, merging re-targets children onto the grandparent's inlet,
//! and pruning only removes leaves.

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::geometry::ops::{centroid, first, segment_length, simplify as simplify_segment};
use crate::hydrography::forest::RiverForest;
use crate::hydrography::tree::RiverTree;
use crate::mesh_error::MeshError;
use serde::{Deserialize, Serialize};

/// Tolerances for [`cleanup`]. `None` disables a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupOptions {
    pub simplify_tol: Option<f64>,
    pub merge_tol: Option<f64>,
    pub prune_tol: Option<f64>,
    /// Repeat pruning until no short leaf remains.
    pub cascade_prune: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            simplify_tol: Some(0.1),
            merge_tol: Some(10.0),
            prune_tol: Some(10.0),
            cascade_prune: false,
        }
    }
}

impl CleanupOptions {
    pub fn validate(&self) -> Result<(), MeshError> {
        for (name, tol) in [
            ("simplify_tol", self.simplify_tol),
            ("merge_tol", self.merge_tol),
            ("prune_tol", self.prune_tol),
        ] {
            if let Some(t) = tol {
                if !(t >= 0.0) || !t.is_finite() {
                    return Err(MeshError::invalid_parameter(format!(
                        "{name} must be a finite non-negative number, got {t}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Replace every reach with its Douglas–Peucker simplification.
pub fn simplify(tree: &mut RiverTree, tol: f64) {
    for id in tree.pre_order() {
        if let Some(seg) = tree.segment(id) {
            let simplified = simplify_segment(seg, tol);
            tree.replace_segment(id, simplified);
        }
    }
}

/// Collapse every non-root reach shorter than `tol` into its parent.
///
/// The removed reach's children are re-targeted so that they end at the
/// parent's inlet. Runs of short reaches collapse in a single call because
/// the pre-order snapshot visits a re-parented child after its old parent.
pub fn merge(tree: &mut RiverTree, tol: f64, diag: &mut Diagnostics) {
    for id in tree.pre_order() {
        let Some(parent) = tree.parent(id) else {
            continue;
        };
        let Some(seg) = tree.segment(id) else {
            continue;
        };
        let length = segment_length(seg);
        if length >= tol {
            continue;
        }
        let at = centroid(seg);
        let Some(inlet) = tree.segment(parent).map(first) else {
            continue;
        };
        for child in tree.children(id).to_vec() {
            tree.set_last_coord(child, inlet);
        }
        tree.collapse_into_parent(id);
        diag.record(DiagnosticEvent::MergedReach {
            length,
            centroid: at,
        });
    }
}

/// Remove every leaf shorter than `tol`, considering only the leaves present
/// when the call starts. Returns the number of removed reaches.
pub fn prune(tree: &mut RiverTree, tol: f64, diag: &mut Diagnostics) -> usize {
    let mut removed = 0;
    for leaf in tree.leaves() {
        let Some(seg) = tree.segment(leaf) else {
            continue;
        };
        let length = segment_length(seg);
        if length < tol {
            let at = centroid(seg);
            tree.remove_leaf(leaf);
            diag.record(DiagnosticEvent::PrunedLeaf {
                length,
                centroid: at,
            });
            removed += 1;
        }
    }
    removed
}

/// Prune repeatedly until no leaf shorter than `tol` remains.
pub fn prune_cascading(tree: &mut RiverTree, tol: f64, diag: &mut Diagnostics) -> usize {
    let mut total = 0;
    loop {
        let removed = prune(tree, tol, diag);
        if removed == 0 {
            return total;
        }
        total += removed;
    }
}

/// Prune every tree of a forest and drop the trees that become empty.
pub fn prune_forest(forest: &mut RiverForest, tol: f64, cascade: bool, diag: &mut Diagnostics) {
    for tree in forest.trees_mut() {
        if cascade {
            prune_cascading(tree, tol, diag);
        } else {
            prune(tree, tol, diag);
        }
    }
    forest.drop_empty();
}

/// Drop whole rivers with fewer than `min_reaches` reaches.
pub fn prune_small_rivers(forest: &mut RiverForest, min_reaches: usize, diag: &mut Diagnostics) {
    forest.retain(|tree| {
        let keep = tree.len() >= min_reaches;
        if !keep {
            diag.record(DiagnosticEvent::RiverDropped {
                reaches: tree.len(),
            });
        }
        keep
    });
}

/// Simplify, then merge, then prune each tree of the forest.
///
/// Pruning is skipped when its tolerance equals the merge tolerance.
pub fn cleanup(forest: &mut RiverForest, options: &CleanupOptions, diag: &mut Diagnostics) {
    if let Some(tol) = options.simplify_tol {
        for tree in forest.trees_mut() {
            simplify(tree, tol);
        }
    }
    for tree in forest.trees_mut() {
        if let Some(tol) = options.merge_tol {
            merge(tree, tol, diag);
        }
        if let Some(tol) = options.prune_tol {
            if options.merge_tol != Some(tol) {
                if options.cascade_prune {
                    prune_cascading(tree, tol, diag);
                } else {
                    prune(tree, tol, diag);
                }
            }
        }
    }
    forest.drop_empty();
}
