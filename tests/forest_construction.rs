mod util;
use util::*;

use watershed_mesh::diagnostics::{DiagnosticEvent, Diagnostics};
use watershed_mesh::geometry::ops::{first, last};
use watershed_mesh::hydrography::cleanup::{prune, prune_forest};
use watershed_mesh::hydrography::RiverForest;
use watershed_mesh::DebugInvariants;

#[test]
fn downstream_reach_becomes_parent_and_cascading_prune_empties_forest() {
    let a = line(&[(0.0, 0.0), (1.0, 1.0)]);
    let b = line(&[(1.0, 1.0), (2.0, 2.0)]);
    let mut diag = Diagnostics::new();
    let mut forest = RiverForest::from_segments(vec![a.clone(), b.clone()], 0.01, &mut diag).unwrap();
    assert_eq!(forest.len(), 1);
    let tree = &forest.trees()[0];
    let root = tree.root().unwrap();
    assert_eq!(tree.segment(root), Some(&b));
    assert_eq!(tree.children(root).len(), 1);
    assert_eq!(tree.segment(tree.children(root)[0]), Some(&a));

    prune_forest(&mut forest, 2.0, true, &mut diag);
    assert!(forest.is_empty());
    assert_eq!(
        diag.count(|e| matches!(e, DiagnosticEvent::PrunedLeaf { .. })),
        2
    );
}

#[test]
fn single_prune_pass_only_takes_initial_leaves() {
    let a = line(&[(0.0, 0.0), (1.0, 1.0)]);
    let b = line(&[(1.0, 1.0), (2.0, 2.0)]);
    let mut diag = Diagnostics::new();
    let mut forest = RiverForest::from_segments(vec![a, b.clone()], 0.01, &mut diag).unwrap();
    let tree = &mut forest.trees_mut()[0];
    assert_eq!(prune(tree, 2.0, &mut diag), 1);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.segment(tree.root().unwrap()), Some(&b));
}

#[test]
fn dendritic_network_builds_one_connected_tree() {
    let reaches = dendritic(5.0, 4, 2.0, 7);
    let n = reaches.len();
    let mut diag = Diagnostics::new();
    let forest = RiverForest::from_segments(reaches, 1e-6, &mut diag).unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest.reach_count(), n);
    assert_eq!(forest.trees()[0].leaves().len(), 8);
    forest.validate_invariants().unwrap();
    assert!(diag.is_empty());

    let tree = &forest.trees()[0];
    for id in tree.pre_order() {
        if let Some(parent) = tree.parent(id) {
            let child_end = last(tree.segment(id).unwrap());
            let parent_start = first(tree.segment(parent).unwrap());
            assert_eq!(child_end, parent_start);
        }
    }
}

#[test]
fn near_miss_is_snapped_on_attach() {
    let up = line(&[(0.0, 5.0), (0.0, 1.005)]);
    let down = line(&[(0.0, 1.0), (0.0, 0.0)]);
    let mut diag = Diagnostics::new();
    let forest = RiverForest::from_segments(vec![up, down], 0.01, &mut diag).unwrap();
    assert_eq!(forest.len(), 1);
    let tree = &forest.trees()[0];
    let child = tree.children(tree.root().unwrap())[0];
    assert_eq!(last(tree.segment(child).unwrap()), c(0.0, 1.0));
    forest.validate_invariants().unwrap();
}

#[test]
fn separate_rivers_keep_input_order() {
    let mut reaches = dendritic(0.0, 2, 1.0, 1);
    reaches.extend(dendritic(100.0, 2, 1.0, 2));
    let mut diag = Diagnostics::new();
    let forest = RiverForest::from_segments(reaches, 1e-6, &mut diag).unwrap();
    assert_eq!(forest.len(), 2);
    assert_eq!(forest.trees()[0].outlet(), Some(c(0.0, 0.0)));
    assert_eq!(forest.trees()[1].outlet(), Some(c(100.0, 0.0)));
}
