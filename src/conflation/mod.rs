//! Conflation of a river forest with a split-form boundary.
//!
//! Snapping runs in two phases. Phase one pulls boundary segment endpoints
//! onto nearby river outlets and inlets. Phase two pulls river endpoints onto
//! nearby boundary segments and cuts those segments at the snapped points.
//! Both structures are re-validated after each phase; a failure aborts with
//! [`MeshError::ConflationFailed`] naming the phase. Nothing is rolled back.

pub mod cut;
pub mod endpoints;

use crate::boundary::SplitBoundary;
use crate::debug_invariants::DebugInvariants;
use crate::diagnostics::Diagnostics;
use crate::hydrography::RiverForest;
use crate::mesh_error::MeshError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two passes of [`snap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflationPhase {
    /// Boundary segment endpoints moved onto river endpoints.
    BoundaryToRivers,
    /// River endpoints moved onto boundary segments, segments cut.
    RiversToBoundary,
}

impl fmt::Display for ConflationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflationPhase::BoundaryToRivers => write!(f, "boundary-to-river endpoint snapping"),
            ConflationPhase::RiversToBoundary => write!(f, "river-to-boundary snap-and-cut"),
        }
    }
}

/// Tolerances for [`snap`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapOptions {
    /// Distance within which river endpoints snap onto boundary segments.
    pub tol: f64,
    /// Distance within which boundary endpoints snap onto river endpoints.
    /// Defaults to `tol` when unset.
    pub tol_triples: Option<f64>,
}

impl Default for SnapOptions {
    fn default() -> Self {
        Self {
            tol: 0.1,
            tol_triples: None,
        }
    }
}

impl SnapOptions {
    pub fn triples_tolerance(&self) -> f64 {
        self.tol_triples.unwrap_or(self.tol)
    }

    pub fn validate(&self) -> Result<(), MeshError> {
        for (name, t) in [("tol", self.tol), ("tol_triples", self.triples_tolerance())] {
            if !(t >= 0.0) || !t.is_finite() {
                return Err(MeshError::invalid_parameter(format!(
                    "{name} must be a finite non-negative number, got {t}"
                )));
            }
        }
        Ok(())
    }
}

/// Counts of the edits made by [`snap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapSummary {
    pub boundary_endpoints_moved: usize,
    pub river_endpoints_snapped: usize,
    pub segments_split: usize,
}

fn check(
    phase: ConflationPhase,
    boundary: &SplitBoundary,
    forest: &RiverForest,
) -> Result<(), MeshError> {
    let wrap = |e: MeshError| MeshError::ConflationFailed {
        phase,
        source: Box::new(e),
    };
    if let Err(e) = forest.validate_invariants() {
        log::info!("  ...{phase} resulted in inconsistent rivers");
        return Err(wrap(e));
    }
    if let Err(e) = boundary.polygons() {
        log::info!("  ...{phase} resulted in inconsistent boundary");
        return Err(wrap(e));
    }
    Ok(())
}

/// Snap a river forest and a boundary onto each other in place.
///
/// An empty forest leaves the boundary untouched.
pub fn snap(
    boundary: &mut SplitBoundary,
    forest: &mut RiverForest,
    options: &SnapOptions,
    diag: &mut Diagnostics,
) -> Result<SnapSummary, MeshError> {
    options.validate()?;
    boundary.polygons()?;
    forest.validate_invariants()?;

    let mut summary = SnapSummary::default();
    if forest.is_empty() {
        return Ok(summary);
    }

    let phase = ConflationPhase::BoundaryToRivers;
    log::info!("snapping polygon segment boundaries to river endpoints");
    summary.boundary_endpoints_moved =
        endpoints::snap_boundary_endpoints(boundary, forest, options.triples_tolerance(), diag)
            .map_err(|e| MeshError::ConflationFailed {
                phase,
                source: Box::new(e),
            })?;
    check(phase, boundary, forest)?;

    let phase = ConflationPhase::RiversToBoundary;
    log::info!("snapping river endpoints to the polygon");
    let (snapped, split) = cut::snap_river_endpoints(boundary, forest, options.tol, diag)
        .map_err(|e| MeshError::ConflationFailed {
            phase,
            source: Box::new(e),
        })?;
    summary.river_endpoints_snapped = snapped;
    summary.segments_split = split;
    check(phase, boundary, forest)?;

    Ok(summary)
}
