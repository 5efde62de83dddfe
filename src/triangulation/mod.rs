//! Constrained triangulation of a conflated boundary and river network.
//!
//! Every pooled boundary segment and every river reach becomes a chain of
//! constraint edges in a constrained Delaunay triangulation. Triangles whose
//! centroid lies outside the polygon set are discarded. The remaining
//! triangles are refined by inserting points until no refinement criterion
//! fires or the iteration/vertex budget is exhausted.

pub mod mesh;
pub mod refine;

pub use mesh::{Mesh2, Mesh3, TriangleMesh};
pub use refine::{RefinementCriterion, RefinementPredicate};

use crate::boundary::SplitBoundary;
use crate::debug_invariants::DebugInvariants;
use crate::geometry::ops::{densify, Segment};
use crate::geometry::quality::{centroid, signed_area};
use crate::hydrography::RiverForest;
use crate::mesh_error::MeshError;
use crate::spatial::EdgeIndex;
use geo::{BoundingRect, Contains, Coord, Polygon};
use refine::Failure;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};
use serde::{Deserialize, Serialize};
use spade::handles::FixedVertexHandle;
use spade::{
    AngleLimit, ConstrainedDelaunayTriangulation, Point2, RefinementParameters, Triangulation,
};

type Cdt = ConstrainedDelaunayTriangulation<Point2<f64>>;

/// Options for [`triangulate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriangulationOptions {
    /// A triangle is refined when any of these fires.
    pub criteria: Vec<RefinementCriterion>,
    /// Minimum interior angle to reach by Delaunay refinement, in degrees.
    pub min_angle_deg: Option<f64>,
    /// Split encroached constraint edges so that the result is Delaunay
    /// rather than only constrained Delaunay. Best effort.
    pub enforce_delaunay: bool,
    /// Split constraint edges where they cross instead of failing with
    /// [`MeshError::ConstraintCrossing`].
    pub split_crossings: bool,
    /// Upper bound on criteria-driven refinement rounds.
    pub max_iterations: usize,
    /// Upper bound on the number of vertices in the triangulation.
    pub max_vertices: usize,
}

impl Default for TriangulationOptions {
    fn default() -> Self {
        Self {
            criteria: Vec::new(),
            min_angle_deg: None,
            enforce_delaunay: false,
            split_crossings: true,
            max_iterations: 64,
            max_vertices: 2_000_000,
        }
    }
}

impl TriangulationOptions {
    pub fn validate(&self) -> Result<(), MeshError> {
        self.criteria.iter().try_for_each(RefinementCriterion::validate)?;
        if let Some(a) = self.min_angle_deg {
            if !(a > 0.0 && a < 60.0) {
                return Err(MeshError::invalid_parameter(format!(
                    "min_angle_deg must lie in (0, 60), got {a}"
                )));
            }
        }
        Ok(())
    }

    fn max_edge_length(&self) -> Option<f64> {
        self.criteria
            .iter()
            .filter_map(|c| match c {
                RefinementCriterion::MaxEdgeLength { max_edge_length } => Some(*max_edge_length),
                _ => None,
            })
            .reduce(f64::min)
    }
}

/// Non-fatal outcome of a refinement that did not fully converge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QualityWarning {
    /// Criteria still fired on `failing` triangles after `iterations` rounds.
    NotConverged { iterations: usize, failing: usize },
    /// The vertex budget stopped refinement.
    VertexBudgetExhausted { vertices: usize },
    /// Angle refinement stopped before reaching the minimum angle.
    AngleRefinementIncomplete { min_angle_deg: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangulationStats {
    pub iterations: usize,
    pub inserted_vertices: usize,
    pub constraint_edges: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriangulationResult {
    pub mesh: Mesh2,
    pub warnings: Vec<QualityWarning>,
    pub stats: TriangulationStats,
}

/// Per-triangle refinement diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangleDiagnostics {
    pub centroid: [f64; 2],
    pub river_distance: f64,
    pub area: f64,
    pub needs_refinement: bool,
}

/// Point-in-polygon-set test backed by an R-tree of polygon bounding boxes.
struct Domain {
    polygons: Vec<Polygon<f64>>,
    boxes: RTree<GeomWithData<Rectangle<[f64; 2]>, usize>>,
}

impl Domain {
    fn new(polygons: Vec<Polygon<f64>>) -> Self {
        let boxes = polygons
            .iter()
            .enumerate()
            .filter_map(|(i, p)| {
                p.bounding_rect().map(|r| {
                    GeomWithData::new(
                        Rectangle::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y]),
                        i,
                    )
                })
            })
            .collect();
        Self {
            polygons,
            boxes: RTree::bulk_load(boxes),
        }
    }

    fn contains(&self, p: [f64; 2]) -> bool {
        let c = Coord { x: p[0], y: p[1] };
        self.boxes
            .locate_in_envelope_intersecting(&AABB::from_point(p))
            .any(|b| self.polygons[b.data].contains(&c))
    }
}

fn face_xy(face: [Point2<f64>; 3]) -> [[f64; 2]; 3] {
    face.map(|p| [p.x, p.y])
}

/// Insert constraint polylines, returning the number of constraint edges added.
fn insert_constraints(
    cdt: &mut Cdt,
    lines: &[Segment],
    split_crossings: bool,
) -> Result<usize, MeshError> {
    let mut handles: Vec<Vec<FixedVertexHandle>> = Vec::with_capacity(lines.len());
    for line in lines {
        let hs = line
            .0
            .iter()
            .map(|c| cdt.insert(Point2::new(c.x, c.y)))
            .collect::<Result<Vec<_>, _>>()?;
        handles.push(hs);
    }
    let mut added = 0;
    for (line, hs) in lines.iter().zip(&handles) {
        for (k, w) in hs.windows(2).enumerate() {
            let (from, to) = (w[0], w[1]);
            if from == to || cdt.exists_constraint(from, to) {
                continue;
            }
            if cdt.can_add_constraint(from, to) {
                cdt.add_constraint(from, to);
            } else if split_crossings {
                cdt.add_constraint_and_split(from, to, |p| p);
            } else {
                return Err(MeshError::ConstraintCrossing {
                    from: [line.0[k].x, line.0[k].y],
                    to: [line.0[k + 1].x, line.0[k + 1].y],
                });
            }
            added += 1;
        }
    }
    Ok(added)
}

/// Points to insert for every in-domain triangle that fails the predicate.
fn refinement_points(cdt: &Cdt, domain: &Domain, predicate: &RefinementPredicate<'_>) -> Vec<Point2<f64>> {
    let mut points = Vec::new();
    for face in cdt.inner_faces() {
        let tri = face_xy(face.vertices().map(|v| v.position()));
        let c = centroid(&tri);
        if !domain.contains(c) {
            continue;
        }
        match predicate.evaluate(&tri) {
            Some(Failure::Area) => points.push(Point2::new(c[0], c[1])),
            Some(Failure::EdgeLength) => {
                let (a, b) = [(0, 1), (1, 2), (2, 0)]
                    .into_iter()
                    .map(|(i, j)| (tri[i], tri[j]))
                    .max_by(|x, y| {
                        let lx = (x.1[0] - x.0[0]).hypot(x.1[1] - x.0[1]);
                        let ly = (y.1[0] - y.0[0]).hypot(y.1[1] - y.0[1]);
                        lx.total_cmp(&ly)
                    })
                    .unwrap_or((tri[0], tri[1]));
                points.push(Point2::new(0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1])));
            }
            None => {}
        }
    }
    points
}

/// Compact the in-domain faces into a mesh, keeping spade's vertex order.
/// Angle refinement limited to `room` new vertices. Returns whether it
/// completed.
///
/// Faces spade classifies as outer are skipped, unless that classification
/// drops part of the domain (nested polygon layers flip the parity), in which
/// case every face is refined.
fn refine_angles(cdt: &mut Cdt, domain: &Domain, limit: AngleLimit, room: usize) -> bool {
    let params = || {
        RefinementParameters::<f64>::new()
            .with_angle_limit(limit)
            .with_max_additional_vertices(room)
    };
    let mut trial = cdt.clone();
    let result = trial.refine(params().exclude_outer_faces(true));
    let drops_domain = result.excluded_faces.iter().any(|f| {
        let tri = face_xy(trial.face(*f).vertices().map(|v| v.position()));
        signed_area(&tri) != 0.0 && domain.contains(centroid(&tri))
    });
    if !drops_domain {
        *cdt = trial;
        return result.refinement_complete;
    }
    log::debug!("outer-face exclusion overlaps the domain, refining all faces");
    cdt.refine(params()).refinement_complete
}

fn extract_mesh(cdt: &Cdt, domain: &Domain) -> Mesh2 {
    let mut faces: Vec<[usize; 3]> = Vec::new();
    for face in cdt.inner_faces() {
        let vs = face.vertices();
        let tri = face_xy(vs.map(|v| v.position()));
        let area = signed_area(&tri);
        if area == 0.0 || !domain.contains(centroid(&tri)) {
            continue;
        }
        let [a, b, c] = vs.map(|v| v.fix().index());
        faces.push(if area > 0.0 { [a, b, c] } else { [a, c, b] });
    }

    let mut remap = vec![usize::MAX; cdt.num_vertices()];
    for f in &faces {
        for &v in f {
            remap[v] = 0;
        }
    }
    let mut vertices = Vec::new();
    for (old, v) in cdt.vertices().enumerate() {
        if remap[old] == 0 {
            remap[old] = vertices.len();
            let p = v.position();
            vertices.push([p.x, p.y]);
        }
    }
    let triangles = faces
        .into_iter()
        .map(|f| f.map(|v| remap[v]))
        .collect();
    let mesh = Mesh2 {
        vertices,
        triangles,
    };
    mesh.debug_assert_invariants();
    mesh
}

/// Triangulate a conflated boundary and river forest.
pub fn triangulate(
    boundary: &SplitBoundary,
    forest: &RiverForest,
    options: &TriangulationOptions,
) -> Result<TriangulationResult, MeshError> {
    options.validate()?;
    let polygons = boundary.polygons()?;
    let rivers: Vec<Segment> = forest.segments().cloned().collect();
    let boundary_lines: Vec<Segment> = boundary.segments().map(|(_, s)| s.clone()).collect();
    triangulate_lines(polygons, boundary_lines, rivers, options)
}

/// Triangulate the polygon set `polygons` with `boundary_lines` and `rivers`
/// as constraints. Distances for graded refinement are measured to `rivers`.
pub fn triangulate_lines(
    polygons: Vec<Polygon<f64>>,
    boundary_lines: Vec<Segment>,
    rivers: Vec<Segment>,
    options: &TriangulationOptions,
) -> Result<TriangulationResult, MeshError> {
    options.validate()?;
    log::info!(
        "triangulating {} polygons with {} boundary segments and {} river reaches",
        polygons.len(),
        boundary_lines.len(),
        rivers.len()
    );
    let domain = Domain::new(polygons);
    let river_index = EdgeIndex::from_segments(rivers.iter().enumerate());

    let mut constraints: Vec<Segment> = boundary_lines.into_iter().chain(rivers).collect();
    if let Some(len) = options.max_edge_length() {
        constraints = constraints.iter().map(|s| densify(s, len)).collect();
    }

    let mut cdt = Cdt::new();
    let mut stats = TriangulationStats {
        constraint_edges: insert_constraints(&mut cdt, &constraints, options.split_crossings)?,
        ..TriangulationStats::default()
    };
    let initial_vertices = cdt.num_vertices();
    let mut warnings = Vec::new();

    let predicate = RefinementPredicate::new(&options.criteria, &river_index);
    if !predicate.is_empty() {
        let mut pending = refinement_points(&cdt, &domain, &predicate);
        while !pending.is_empty() {
            if stats.iterations == options.max_iterations {
                warnings.push(QualityWarning::NotConverged {
                    iterations: stats.iterations,
                    failing: pending.len(),
                });
                break;
            }
            let room = options.max_vertices.saturating_sub(cdt.num_vertices());
            let exhausted = pending.len() > room;
            for p in pending.into_iter().take(room) {
                cdt.insert(p)?;
            }
            stats.iterations += 1;
            if exhausted {
                warnings.push(QualityWarning::VertexBudgetExhausted {
                    vertices: cdt.num_vertices(),
                });
                break;
            }
            pending = refinement_points(&cdt, &domain, &predicate);
        }
        log::debug!("criteria refinement ran {} rounds", stats.iterations);
    }

    let angle_limit = match (options.min_angle_deg, options.enforce_delaunay) {
        (Some(a), _) => Some(AngleLimit::from_deg(a)),
        (None, true) => Some(AngleLimit::from_deg(0.0)),
        (None, false) => None,
    };
    if let Some(limit) = angle_limit {
        let room = options.max_vertices.saturating_sub(cdt.num_vertices());
        let complete = refine_angles(&mut cdt, &domain, limit, room);
        if !complete {
            let min_angle_deg = options.min_angle_deg.unwrap_or(0.0);
            log::warn!("angle refinement stopped early (target {min_angle_deg} degrees)");
            warnings.push(QualityWarning::AngleRefinementIncomplete { min_angle_deg });
        }
    }

    stats.inserted_vertices = cdt.num_vertices() - initial_vertices;
    let mesh = extract_mesh(&cdt, &domain);
    for w in &warnings {
        log::warn!("triangulation quality warning: {w:?}");
    }
    log::info!(
        "mesh has {} vertices and {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(TriangulationResult {
        mesh,
        warnings,
        stats,
    })
}

/// Centroid distance to the rivers, area and predicate outcome per triangle.
pub fn triangle_diagnostics(
    mesh: &Mesh2,
    rivers: &RiverForest,
    criteria: &[RefinementCriterion],
) -> Vec<TriangleDiagnostics> {
    let index = EdgeIndex::from_segments(rivers.segments().enumerate());
    let predicate = RefinementPredicate::new(criteria, &index);
    (0..mesh.triangle_count())
        .map(|t| {
            let tri = mesh.triangle_xy(t);
            TriangleDiagnostics {
                centroid: centroid(&tri),
                river_distance: predicate.river_distance(&tri),
                area: signed_area(&tri).abs(),
                needs_refinement: predicate.evaluate(&tri).is_some(),
            }
        })
        .collect()
}
