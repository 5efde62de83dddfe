mod util;
use util::*;

use watershed_mesh::boundary::SplitBoundary;
use watershed_mesh::conflation::{snap, ConflationPhase, SnapOptions};
use watershed_mesh::diagnostics::{DiagnosticEvent, Diagnostics};
use watershed_mesh::geometry::ops::{first, last};
use watershed_mesh::hydrography::RiverForest;
use watershed_mesh::{DebugInvariants, MeshError};

fn watershed() -> SplitBoundary {
    SplitBoundary::from_polygons(&[square(0.0, 0.0, 10.0), square(10.0, 0.0, 10.0)]).unwrap()
}

fn forest(reaches: Vec<watershed_mesh::geometry::Segment>) -> RiverForest {
    RiverForest::from_segments(reaches, 1e-6, &mut Diagnostics::new()).unwrap()
}

#[test]
fn snapped_outlet_coincides_with_new_boundary_vertex() {
    let mut boundary = watershed();
    let mut rivers = forest(vec![
        line(&[(3.0, 8.0), (5.0, 5.0)]),
        line(&[(7.0, 8.0), (5.0, 5.0)]),
        line(&[(5.0, 5.0), (5.0, 2.0), (5.0, 0.04)]),
    ]);
    let options = SnapOptions { tol: 0.1, tol_triples: None };
    let mut diag = Diagnostics::new();
    let summary = snap(&mut boundary, &mut rivers, &options, &mut diag).unwrap();

    assert_eq!(summary.boundary_endpoints_moved, 0);
    assert_eq!(summary.river_endpoints_snapped, 1);
    assert_eq!(summary.segments_split, 1);
    let outlet = rivers.trees()[0].outlet().unwrap();
    assert_eq!(outlet, c(5.0, 0.0));
    let hits = boundary
        .segments()
        .filter(|(_, s)| first(s) == outlet || last(s) == outlet)
        .count();
    assert_eq!(hits, 2);
    assert_eq!(boundary.segment_count(), 4);
    boundary.validate_invariants().unwrap();
    rivers.validate_invariants().unwrap();
}

#[test]
fn boundary_node_moves_onto_nearby_outlet() {
    let mut boundary = watershed();
    let mut rivers = forest(vec![line(&[(8.0, 6.0), (10.2, 0.1)])]);
    let options = SnapOptions { tol: 0.1, tol_triples: Some(0.5) };
    let mut diag = Diagnostics::new();
    let summary = snap(&mut boundary, &mut rivers, &options, &mut diag).unwrap();

    // the shared edge and both outer arcs meet at (10, 0)
    assert_eq!(summary.boundary_endpoints_moved, 3);
    assert_eq!(summary.segments_split, 0);
    assert_eq!(
        diag.count(|e| matches!(e, DiagnosticEvent::BoundaryEndpointMoved { .. })),
        3
    );
    let polygons = boundary.polygons().unwrap();
    assert!(polygons
        .iter()
        .all(|p| p.exterior().0.contains(&c(10.2, 0.1))));
}

#[test]
fn several_requests_on_one_segment_cut_in_order() {
    let mut boundary = watershed();
    let mut rivers = forest(vec![
        line(&[(3.0, 5.0), (3.0, 0.05)]),
        line(&[(6.0, 5.0), (6.0, 0.05)]),
    ]);
    let options = SnapOptions { tol: 0.1, tol_triples: None };
    let summary = snap(&mut boundary, &mut rivers, &options, &mut Diagnostics::new()).unwrap();
    assert_eq!(summary.river_endpoints_snapped, 2);
    assert_eq!(summary.segments_split, 1);
    assert_eq!(boundary.segment_count(), 5);
    boundary.polygons().unwrap();
}

#[test]
fn rivers_far_from_the_boundary_are_untouched() {
    let mut boundary = watershed();
    let reach = line(&[(4.0, 6.0), (5.0, 5.0)]);
    let mut rivers = forest(vec![reach.clone()]);
    let summary = snap(
        &mut boundary,
        &mut rivers,
        &SnapOptions::default(),
        &mut Diagnostics::new(),
    )
    .unwrap();
    assert_eq!(summary, Default::default());
    assert_eq!(rivers.segments().next(), Some(&reach));
    assert_eq!(boundary.segment_count(), 3);
}

#[test]
fn negative_tolerance_is_rejected() {
    let mut boundary = watershed();
    let mut rivers = forest(vec![line(&[(4.0, 6.0), (5.0, 5.0)])]);
    let options = SnapOptions { tol: -1.0, tol_triples: None };
    let err = snap(&mut boundary, &mut rivers, &options, &mut Diagnostics::new());
    assert!(matches!(err, Err(MeshError::InvalidParameter(_))));
    assert_ne!(ConflationPhase::BoundaryToRivers, ConflationPhase::RiversToBoundary);
}

#[test]
fn near_duplicate_requests_land_on_the_kept_cut() {
    let mut boundary = watershed();
    let mut rivers = forest(vec![
        line(&[(3.0, 5.0), (3.0, 0.05)]),
        line(&[(3.5, 5.0), (3.000005, 0.05)]),
    ]);
    let options = SnapOptions { tol: 0.1, tol_triples: None };
    let mut diag = Diagnostics::new();
    let summary = snap(&mut boundary, &mut rivers, &options, &mut diag).unwrap();

    assert_eq!(summary.river_endpoints_snapped, 2);
    assert_eq!(summary.segments_split, 1);
    assert_eq!(
        diag.count(|e| matches!(e, DiagnosticEvent::DuplicateSnapDropped { .. })),
        1
    );
    let vertices: Vec<_> = boundary
        .segments()
        .flat_map(|(_, s)| s.0.iter().copied())
        .collect();
    for tree in rivers.trees() {
        let outlet = tree.outlet().unwrap();
        assert_eq!(outlet, c(3.0, 0.0));
        assert!(vertices.contains(&outlet));
    }
    boundary.validate_invariants().unwrap();
    rivers.validate_invariants().unwrap();
}
