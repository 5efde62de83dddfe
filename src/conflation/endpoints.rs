//! Phase one: boundary segment endpoints onto river endpoints.

use crate::boundary::SplitBoundary;
use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::geometry::ops::{coord, coord_key, first, last, xy};
use crate::hydrography::RiverForest;
use crate::mesh_error::MeshError;
use crate::spatial::PointIndex;

/// River outlets (root outlets) followed by leaf inlets, tree by tree.
pub fn river_endpoints(forest: &RiverForest) -> Vec<[f64; 2]> {
    let outlets = forest.trees().iter().filter_map(|t| t.outlet());
    let inlets = forest.trees().iter().flat_map(|t| t.inlets());
    outlets.chain(inlets).map(xy).collect()
}

/// Move every boundary segment endpoint lying strictly within `tol` of a
/// river endpoint onto that endpoint. Returns the number of moved endpoints.
///
/// Nearest-point selection is deterministic, so the endpoints of all
/// segments meeting at one boundary node move together.
pub fn snap_boundary_endpoints(
    boundary: &mut SplitBoundary,
    forest: &RiverForest,
    tol: f64,
    diag: &mut Diagnostics,
) -> Result<usize, MeshError> {
    let targets = river_endpoints(forest);
    if targets.is_empty() {
        return Ok(0);
    }
    let index = PointIndex::new(targets.iter().enumerate().map(|(i, p)| (*p, i)));
    let target_for = |p: [f64; 2]| {
        index
            .nearest_within(p, tol)
            .filter(|(_, q, d)| *d < tol && *q != p)
            .map(|(_, q, _)| q)
    };

    let mut moved = 0;
    for handle in boundary.handles() {
        let Some(seg) = boundary.segment(handle) else {
            continue;
        };
        let (start, end) = (xy(first(seg)), xy(last(seg)));
        let new_start = target_for(start);
        let new_end = target_for(end);
        if new_start.is_none() && new_end.is_none() {
            continue;
        }
        let mut coords = seg.0.clone();
        let n = coords.len();
        for (pos, from, to) in [(0, start, new_start), (n - 1, end, new_end)] {
            if let Some(to) = to {
                coords[pos] = coord(to);
                diag.record(DiagnosticEvent::BoundaryEndpointMoved {
                    segment: handle.0,
                    from,
                    to,
                });
                moved += 1;
            }
        }
        coords.dedup_by(|b, a| coord_key(*a) == coord_key(*b));
        if coords.len() < 2 {
            return Err(MeshError::DegenerateSegment(format!(
                "boundary segment {} collapsed onto river endpoint {:?}",
                handle.0, start
            )));
        }
        boundary.replace_segment(handle, coords.into())?;
    }
    Ok(moved)
}
