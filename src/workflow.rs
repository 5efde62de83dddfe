//! High-level pipeline: raw polygons and reaches in, conflated structures and
//! a planar mesh out.

use crate::boundary::SplitBoundary;
use crate::conflation::{snap, SnapOptions, SnapSummary};
use crate::diagnostics::Diagnostics;
use crate::elevation::Interpolation;
use crate::geometry::ops::{dedup_consecutive, min_edge_length, round_coords, Segment};
use crate::hydrography::cleanup::{cleanup, prune_small_rivers, CleanupOptions};
use crate::hydrography::filter::{filter_long_reaches, filter_reaches_to_boundary};
use crate::hydrography::RiverForest;
use crate::mesh_error::MeshError;
use crate::triangulation::{triangulate, TriangulationOptions, TriangulationResult};
use geo::{LineString, Polygon};
use serde::{Deserialize, Serialize};

/// Options for [`simplify_and_prune`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyOptions {
    /// Simplification, merge, prune and snap distance.
    pub tol: f64,
    /// Rivers with fewer reaches than this are dropped.
    pub prune_reach_size: usize,
    /// Distance within which a reach outlet joins another reach's inlet.
    pub join_tol: f64,
    /// Reaches longer than this are dropped before the forest is built.
    pub max_reach_length: Option<f64>,
    /// Repeat leaf pruning until no short leaf remains.
    pub cascade_prune: bool,
}

impl Default for SimplifyOptions {
    fn default() -> Self {
        Self {
            tol: 10.0,
            prune_reach_size: 0,
            join_tol: 0.1,
            max_reach_length: None,
            cascade_prune: false,
        }
    }
}

impl SimplifyOptions {
    pub fn validate(&self) -> Result<(), MeshError> {
        for (name, t) in [("tol", self.tol), ("join_tol", self.join_tol)] {
            if !(t >= 0.0) || !t.is_finite() {
                return Err(MeshError::invalid_parameter(format!(
                    "{name} must be a finite non-negative number, got {t}"
                )));
            }
        }
        if let Some(l) = self.max_reach_length {
            if !(l > 0.0) {
                return Err(MeshError::invalid_parameter(format!(
                    "max_reach_length must be positive, got {l}"
                )));
            }
        }
        Ok(())
    }

    /// Cleanup tolerances derived from `tol`.
    pub fn cleanup_options(&self) -> CleanupOptions {
        CleanupOptions {
            simplify_tol: Some(self.tol),
            merge_tol: Some(self.tol),
            prune_tol: Some(self.tol),
            cascade_prune: self.cascade_prune,
        }
    }

    /// Snap tolerances derived from `tol`; boundary endpoints reach three
    /// times as far.
    pub fn snap_options(&self) -> SnapOptions {
        SnapOptions {
            tol: self.tol,
            tol_triples: Some(3.0 * self.tol),
        }
    }
}

/// Everything needed to go from raw shapes to a planar mesh.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Decimal digits to round input coordinates to.
    pub round_digits: Option<i32>,
    pub simplify: SimplifyOptions,
    /// Overrides the cleanup tolerances derived from `simplify.tol`.
    pub cleanup: Option<CleanupOptions>,
    /// Overrides the snap tolerances derived from `simplify.tol`.
    pub snap: Option<SnapOptions>,
    pub triangulation: TriangulationOptions,
    pub interpolation: Interpolation,
}

impl WorkflowConfig {
    pub fn from_json_str(json: &str) -> Result<Self, MeshError> {
        let config: WorkflowConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, MeshError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        if let Some(d) = self.round_digits {
            if !(0..=15).contains(&d) {
                return Err(MeshError::invalid_parameter(format!(
                    "round_digits must lie in 0..=15, got {d}"
                )));
            }
        }
        self.simplify.validate()?;
        if let Some(c) = &self.cleanup {
            c.validate()?;
        }
        if let Some(s) = &self.snap {
            s.validate()?;
        }
        self.triangulation.validate()
    }

    fn cleanup_options(&self) -> CleanupOptions {
        self.cleanup.unwrap_or_else(|| self.simplify.cleanup_options())
    }

    fn snap_options(&self) -> SnapOptions {
        self.snap.unwrap_or_else(|| self.simplify.snap_options())
    }
}

/// Minimum and median over per-segment shortest edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentLengthSummary {
    pub segments: usize,
    pub min: f64,
    pub median: f64,
}

impl SegmentLengthSummary {
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a Segment>) -> Option<Self> {
        let mut mins: Vec<f64> = segments.into_iter().map(min_edge_length).collect();
        if mins.is_empty() {
            return None;
        }
        mins.sort_by(f64::total_cmp);
        let n = mins.len();
        let median = if n % 2 == 1 {
            mins[n / 2]
        } else {
            0.5 * (mins[n / 2 - 1] + mins[n / 2])
        };
        Some(Self {
            segments: n,
            min: mins[0],
            median,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SimplificationSummary {
    pub rivers: Option<SegmentLengthSummary>,
    pub boundary: Option<SegmentLengthSummary>,
    pub snap: SnapSummary,
}

/// Clean up a boundary and a set of raw reaches so they can be meshed together.
///
/// Reaches away from the boundary are filtered out, the rest are assembled
/// into a forest, small rivers are dropped, both sides are simplified with
/// the same tolerance and finally snapped onto each other. The boundary is
/// edited in place.
pub fn simplify_and_prune(
    boundary: &mut SplitBoundary,
    reaches: Vec<Segment>,
    options: &SimplifyOptions,
    diag: &mut Diagnostics,
) -> Result<(RiverForest, SimplificationSummary), MeshError> {
    let cleanup_options = options.cleanup_options();
    let snap_options = options.snap_options();
    run_simplification(boundary, reaches, options, &cleanup_options, &snap_options, diag)
}

fn run_simplification(
    boundary: &mut SplitBoundary,
    reaches: Vec<Segment>,
    options: &SimplifyOptions,
    cleanup_options: &CleanupOptions,
    snap_options: &SnapOptions,
    diag: &mut Diagnostics,
) -> Result<(RiverForest, SimplificationSummary), MeshError> {
    options.validate()?;
    log::info!("simplifying and pruning");

    let hull: Vec<Polygon<f64>> = boundary
        .exterior()?
        .into_iter()
        .map(|ring| Polygon::new(ring, vec![]))
        .collect();
    log::info!("filtering {} reaches outside of the boundary", reaches.len());
    let mut reaches = filter_reaches_to_boundary(reaches, &hull, options.tol, diag);
    if let Some(max_len) = options.max_reach_length {
        reaches = filter_long_reaches(reaches, max_len, diag);
    }

    log::info!("generating river trees from {} reaches", reaches.len());
    let mut forest = RiverForest::from_segments(reaches, options.join_tol, diag)?;
    log::info!(
        "removing rivers with fewer than {} reaches",
        options.prune_reach_size
    );
    prune_small_rivers(&mut forest, options.prune_reach_size, diag);

    log::info!("simplifying rivers");
    cleanup(&mut forest, cleanup_options, diag);
    log::info!("simplifying boundary");
    boundary.simplify(options.tol);

    log::info!("snapping rivers and boundary");
    let snap_summary = snap(boundary, &mut forest, snap_options, diag)?;

    let summary = SimplificationSummary {
        rivers: SegmentLengthSummary::from_segments(forest.segments()),
        boundary: SegmentLengthSummary::from_segments(boundary.segments().map(|(_, s)| s)),
        snap: snap_summary,
    };
    if let Some(r) = summary.rivers {
        log::info!("  river min seg length: {}", r.min);
        log::info!("  river median seg length: {}", r.median);
    }
    if let Some(b) = summary.boundary {
        log::info!("  boundary min seg length: {}", b.min);
        log::info!("  boundary median seg length: {}", b.median);
    }
    Ok((forest, summary))
}

/// Round a polygon's exterior, dropping vertices that collapse together.
pub fn round_polygon(polygon: &Polygon<f64>, digits: i32) -> Polygon<f64> {
    let mut coords = round_coords(polygon.exterior(), digits).0;
    dedup_consecutive(&mut coords);
    let interiors = polygon
        .interiors()
        .iter()
        .map(|r| {
            let mut c = round_coords(r, digits).0;
            dedup_consecutive(&mut c);
            LineString::new(c)
        })
        .collect();
    Polygon::new(LineString::new(coords), interiors)
}

/// Output of [`run`].
#[derive(Debug, Clone)]
pub struct WorkflowOutput {
    pub boundary: SplitBoundary,
    pub forest: RiverForest,
    pub summary: SimplificationSummary,
    pub triangulation: TriangulationResult,
}

/// Build the split boundary, simplify and snap, then triangulate.
pub fn run(
    polygons: &[Polygon<f64>],
    reaches: Vec<Segment>,
    config: &WorkflowConfig,
    diag: &mut Diagnostics,
) -> Result<WorkflowOutput, MeshError> {
    config.validate()?;
    let (polygons, reaches) = match config.round_digits {
        Some(d) => (
            polygons.iter().map(|p| round_polygon(p, d)).collect(),
            reaches
                .iter()
                .map(|r| {
                    let mut c = round_coords(r, d).0;
                    dedup_consecutive(&mut c);
                    LineString::new(c)
                })
                .filter(|r| r.0.len() >= 2)
                .collect(),
        ),
        None => (polygons.to_vec(), reaches),
    };

    let mut boundary = SplitBoundary::from_polygons(&polygons)?;
    let (forest, summary) = run_simplification(
        &mut boundary,
        reaches,
        &config.simplify,
        &config.cleanup_options(),
        &config.snap_options(),
        diag,
    )?;
    let triangulation = triangulate(&boundary, &forest, &config.triangulation)?;
    for w in &triangulation.warnings {
        log::warn!("triangulation: {w:?}");
    }
    Ok(WorkflowOutput {
        boundary,
        forest,
        summary,
        triangulation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn summary_reports_min_and_median() {
        let a: Segment = vec![(0.0, 0.0), (1.0, 0.0), (4.0, 0.0)].into();
        let b: Segment = vec![(0.0, 0.0), (2.0, 0.0)].into();
        let c: Segment = vec![(0.0, 0.0), (5.0, 0.0)].into();
        let s = SegmentLengthSummary::from_segments([&a, &b, &c]).unwrap();
        assert_eq!(s.segments, 3);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.median, 2.0);
        assert!(SegmentLengthSummary::from_segments(std::iter::empty()).is_none());
    }

    #[test]
    fn derived_options_follow_tol() {
        let o = SimplifyOptions {
            tol: 2.0,
            ..Default::default()
        };
        assert_eq!(o.snap_options().triples_tolerance(), 6.0);
        assert_eq!(o.cleanup_options().merge_tol, Some(2.0));
    }

    #[test]
    fn config_rejects_bad_values() {
        let mut c = WorkflowConfig::default();
        c.simplify.tol = -1.0;
        assert!(matches!(c.validate(), Err(MeshError::InvalidParameter(_))));
        assert!(WorkflowConfig::from_json_str("{\"round_digits\": 40}").is_err());
    }

    #[test]
    fn rounding_drops_collapsed_vertices() {
        let p = polygon![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)];
        let r = round_polygon(&p, 1);
        assert_eq!(r.exterior().0.len(), 4);
    }

    #[test]
    fn reaches_far_from_boundary_are_dropped() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)];
        let mut boundary = SplitBoundary::from_polygons(&[square]).unwrap();
        let inside: Segment = vec![(5.0, 8.0), (5.0, 5.0), (5.0, 0.0)].into();
        let far: Segment = vec![(50.0, 50.0), (60.0, 60.0)].into();
        let options = SimplifyOptions {
            tol: 0.5,
            ..Default::default()
        };
        let mut diag = Diagnostics::new();
        let (forest, summary) =
            simplify_and_prune(&mut boundary, vec![inside, far], &options, &mut diag).unwrap();
        assert_eq!(forest.len(), 1);
        assert!(summary.rivers.is_some());
        assert_eq!(summary.snap.river_endpoints_snapped, 1);
        let (_, ring) = boundary.segments().next().unwrap();
        assert!(ring.0.iter().any(|c| c.x == 5.0 && c.y == 0.0));
    }
}
