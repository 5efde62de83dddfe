mod util;
use util::*;

use watershed_mesh::boundary::SplitBoundary;
use watershed_mesh::diagnostics::Diagnostics;
use watershed_mesh::geometry::quality::{signed_area, triangle_quality};
use watershed_mesh::geometry::Segment;
use watershed_mesh::hydrography::RiverForest;
use watershed_mesh::triangulation::{
    triangle_diagnostics, triangulate, triangulate_lines, Mesh2, RefinementCriterion,
    TriangulationOptions,
};
use watershed_mesh::{DebugInvariants, MeshError};

fn vertex_of(mesh: &Mesh2, p: [f64; 2]) -> Option<usize> {
    mesh.vertices.iter().position(|v| *v == p)
}

fn no_rivers() -> RiverForest {
    RiverForest::default()
}

fn on_edge(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> bool {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len = dx.hypot(dy);
    let cross = (dx * (p[1] - a[1]) - dy * (p[0] - a[0])).abs() / len;
    let t = (dx * (p[0] - a[0]) + dy * (p[1] - a[1])) / (len * len);
    cross < 1e-9 && t > -1e-12 && t < 1.0 + 1e-12
}

/// Walk `chain` through the mesh edges, one input edge at a time, moving
/// only to neighbors on that edge and closer to its end.
fn assert_chain_in_mesh(mesh: &Mesh2, chain: &Segment) {
    let edges = mesh.edges();
    let dist = |u: usize, q: [f64; 2]| {
        let p = mesh.xy(u);
        (q[0] - p[0]).hypot(q[1] - p[1])
    };
    let start = [chain.0[0].x, chain.0[0].y];
    let mut cur = vertex_of(mesh, start).unwrap_or_else(|| panic!("{start:?} is not a vertex"));
    for w in chain.0.windows(2) {
        let (a, b) = ([w[0].x, w[0].y], [w[1].x, w[1].y]);
        let end = vertex_of(mesh, b).unwrap_or_else(|| panic!("{b:?} is not a vertex"));
        while cur != end {
            let next = edges
                .iter()
                .filter_map(|&(u, v)| match (u == cur, v == cur) {
                    (true, _) => Some(v),
                    (_, true) => Some(u),
                    _ => None,
                })
                .filter(|&n| on_edge(mesh.xy(n), a, b) && dist(n, b) < dist(cur, b))
                .min_by(|&x, &y| dist(x, b).total_cmp(&dist(y, b)));
            cur = next.unwrap_or_else(|| panic!("chain {a:?} -> {b:?} breaks at {:?}", mesh.xy(cur)));
        }
    }
}

fn winding_river() -> RiverForest {
    RiverForest::from_segments(
        vec![line(&[(0.2, 0.2), (0.5, 0.6), (0.8, 0.5), (1.4, 0.7)])],
        1e-6,
        &mut Diagnostics::new(),
    )
    .unwrap()
}

#[test]
fn unrefined_mesh_covers_the_polygons_exactly() {
    let boundary = SplitBoundary::from_polygons(&two_squares()).unwrap();
    let result = triangulate(&boundary, &no_rivers(), &TriangulationOptions::default()).unwrap();
    let mesh = &result.mesh;
    mesh.validate_invariants().unwrap();
    assert_close(mesh.area(), 2.0, 1e-12);
    assert_eq!(mesh.vertex_count(), 6);
    assert_eq!(mesh.triangle_count(), 4);
    assert!(result.warnings.is_empty());
    for corner in [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [2.0, 1.0], [1.0, 1.0], [0.0, 1.0]] {
        assert!(vertex_of(mesh, corner).is_some());
    }
}

#[test]
fn concave_domain_drops_outside_triangles() {
    // L-shape: the notch (1..2, 1..2) is inside the convex hull only
    let polygons = vec![square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0), square(0.0, 1.0, 1.0)];
    let boundary = SplitBoundary::from_polygons(&polygons).unwrap();
    let result = triangulate(&boundary, &no_rivers(), &TriangulationOptions::default()).unwrap();
    assert_close(result.mesh.area(), 3.0, 1e-12);
}

#[test]
fn area_refinement_bounds_every_triangle() {
    let boundary = SplitBoundary::from_polygons(&two_squares()).unwrap();
    let options = TriangulationOptions {
        criteria: vec![RefinementCriterion::MaxArea { max_area: 0.02 }],
        ..Default::default()
    };
    let result = triangulate(&boundary, &no_rivers(), &options).unwrap();
    assert!(result.warnings.is_empty());
    assert!(result.stats.inserted_vertices > 0);
    let mesh = &result.mesh;
    assert_close(mesh.area(), 2.0, 1e-9);
    for t in 0..mesh.triangle_count() {
        assert!(signed_area(&mesh.triangle_xy(t)) <= 0.02);
    }
    let diagnostics = triangle_diagnostics(mesh, &no_rivers(), &options.criteria);
    assert_eq!(diagnostics.len(), mesh.triangle_count());
    assert!(diagnostics.iter().all(|d| !d.needs_refinement));
    assert!(diagnostics.iter().all(|d| d.river_distance.is_infinite()));
}

#[test]
fn edge_length_refinement_bounds_every_edge() {
    let boundary = SplitBoundary::from_polygons(&two_squares()).unwrap();
    let options = TriangulationOptions {
        criteria: vec![RefinementCriterion::MaxEdgeLength { max_edge_length: 0.3 }],
        ..Default::default()
    };
    let result = triangulate(&boundary, &no_rivers(), &options).unwrap();
    assert!(result.warnings.is_empty());
    let mesh = &result.mesh;
    for (a, b) in mesh.edges() {
        let (p, q) = (mesh.xy(a), mesh.xy(b));
        assert!((q[0] - p[0]).hypot(q[1] - p[1]) <= 0.3 + 1e-9);
    }
}

#[test]
fn river_reaches_become_mesh_edges() {
    let boundary = SplitBoundary::from_polygons(&two_squares()).unwrap();
    let rivers = RiverForest::from_segments(
        vec![line(&[(0.2, 0.5), (0.8, 0.5)])],
        1e-6,
        &mut Diagnostics::new(),
    )
    .unwrap();
    let result = triangulate(&boundary, &rivers, &TriangulationOptions::default()).unwrap();
    let mesh = &result.mesh;
    let a = vertex_of(mesh, [0.2, 0.5]).unwrap();
    let b = vertex_of(mesh, [0.8, 0.5]).unwrap();
    assert!(mesh.edges().contains(&(a.min(b), a.max(b))));
}

#[test]
fn graded_refinement_is_finer_near_rivers() {
    let boundary = SplitBoundary::from_polygons(&[square(0.0, 0.0, 10.0)]).unwrap();
    let rivers = RiverForest::from_segments(
        vec![line(&[(1.0, 1.0), (1.0, 4.0)])],
        1e-6,
        &mut Diagnostics::new(),
    )
    .unwrap();
    let criteria = vec![RefinementCriterion::DistanceGradedArea {
        near_distance: 1.0,
        near_area: 0.1,
        far_distance: 6.0,
        far_area: 5.0,
    }];
    let options = TriangulationOptions {
        criteria: criteria.clone(),
        ..Default::default()
    };
    let result = triangulate(&boundary, &rivers, &options).unwrap();
    assert!(result.warnings.is_empty());
    let diagnostics = triangle_diagnostics(&result.mesh, &rivers, &criteria);
    for d in &diagnostics {
        if d.river_distance <= 1.0 {
            assert!(d.area <= 0.1 + 1e-12);
        }
        assert!(d.area <= 5.0 + 1e-12);
    }
}

#[test]
fn crossing_constraints_fail_unless_splitting() {
    let polygons = two_squares();
    let boundary_lines = SplitBoundary::from_polygons(&polygons)
        .unwrap()
        .segments()
        .map(|(_, s)| s.clone())
        .collect::<Vec<_>>();
    let rivers = vec![line(&[(0.5, 0.5), (1.5, 0.5)])];

    let strict = TriangulationOptions {
        split_crossings: false,
        ..Default::default()
    };
    let err = triangulate_lines(polygons.clone(), boundary_lines.clone(), rivers.clone(), &strict);
    assert!(matches!(err, Err(MeshError::ConstraintCrossing { .. })));

    let result =
        triangulate_lines(polygons, boundary_lines, rivers, &TriangulationOptions::default())
            .unwrap();
    assert!(vertex_of(&result.mesh, [1.0, 0.5]).is_some());
    assert_close(result.mesh.area(), 2.0, 1e-9);
}

#[test]
fn vertex_budget_stops_refinement_with_a_warning() {
    let boundary = SplitBoundary::from_polygons(&two_squares()).unwrap();
    let options = TriangulationOptions {
        criteria: vec![RefinementCriterion::MaxArea { max_area: 1e-4 }],
        max_vertices: 50,
        ..Default::default()
    };
    let result = triangulate(&boundary, &no_rivers(), &options).unwrap();
    assert!(result.mesh.vertex_count() <= 50);
    assert!(!result.warnings.is_empty());
}

#[test]
fn invalid_options_are_rejected() {
    let boundary = SplitBoundary::from_polygons(&two_squares()).unwrap();
    let options = TriangulationOptions {
        min_angle_deg: Some(75.0),
        ..Default::default()
    };
    assert!(matches!(
        triangulate(&boundary, &no_rivers(), &options),
        Err(MeshError::InvalidParameter(_))
    ));
}

#[test]
fn refined_mesh_keeps_every_boundary_and_river_chain() {
    let boundary = SplitBoundary::from_polygons(&two_squares()).unwrap();
    let rivers = winding_river();
    for criterion in [
        RefinementCriterion::MaxArea { max_area: 0.01 },
        RefinementCriterion::MaxEdgeLength { max_edge_length: 0.15 },
    ] {
        let options = TriangulationOptions {
            criteria: vec![criterion],
            ..Default::default()
        };
        let result = triangulate(&boundary, &rivers, &options).unwrap();
        assert!(result.stats.inserted_vertices > 0);
        for (_, segment) in boundary.segments() {
            assert_chain_in_mesh(&result.mesh, segment);
        }
        for reach in rivers.segments() {
            assert_chain_in_mesh(&result.mesh, reach);
        }
    }
}

#[test]
fn split_crossing_keeps_both_chains() {
    let polygons = two_squares();
    let boundary_lines = SplitBoundary::from_polygons(&polygons)
        .unwrap()
        .segments()
        .map(|(_, s)| s.clone())
        .collect::<Vec<_>>();
    let rivers = vec![line(&[(0.5, 0.3), (1.5, 0.6)])];
    let options = TriangulationOptions {
        criteria: vec![RefinementCriterion::MaxArea { max_area: 0.05 }],
        ..Default::default()
    };
    let result =
        triangulate_lines(polygons, boundary_lines.clone(), rivers.clone(), &options).unwrap();
    for chain in boundary_lines.iter().chain(&rivers) {
        assert_chain_in_mesh(&result.mesh, chain);
    }
}

#[test]
fn min_angle_refinement_reaches_the_limit() {
    // the middle square of a 3x3 block is two constraint layers deep
    let polygons: Vec<_> = (0..9)
        .map(|i| square((i % 3) as f64, (i / 3) as f64, 1.0))
        .collect();
    let boundary = SplitBoundary::from_polygons(&polygons).unwrap();
    let rivers = RiverForest::from_segments(
        vec![line(&[(1.1, 1.2), (1.5, 1.5), (1.9, 1.6)])],
        1e-6,
        &mut Diagnostics::new(),
    )
    .unwrap();
    let options = TriangulationOptions {
        min_angle_deg: Some(20.0),
        ..Default::default()
    };
    let result = triangulate(&boundary, &rivers, &options).unwrap();
    assert!(result.warnings.is_empty());
    let mesh = &result.mesh;
    mesh.validate_invariants().unwrap();
    assert_close(mesh.area(), 9.0, 1e-9);
    for t in 0..mesh.triangle_count() {
        assert!(triangle_quality(&mesh.triangle_xy(t)).min_angle_deg >= 20.0 - 1e-6);
    }
    for reach in rivers.segments() {
        assert_chain_in_mesh(mesh, reach);
    }
}

#[test]
fn enforce_delaunay_preserves_the_domain() {
    let boundary = SplitBoundary::from_polygons(&two_squares()).unwrap();
    let rivers = winding_river();
    let options = TriangulationOptions {
        enforce_delaunay: true,
        ..Default::default()
    };
    let result = triangulate(&boundary, &rivers, &options).unwrap();
    assert!(result.warnings.is_empty());
    result.mesh.validate_invariants().unwrap();
    assert_close(result.mesh.area(), 2.0, 1e-9);
    for (_, segment) in boundary.segments() {
        assert_chain_in_mesh(&result.mesh, segment);
    }
    for reach in rivers.segments() {
        assert_chain_in_mesh(&result.mesh, reach);
    }
}
