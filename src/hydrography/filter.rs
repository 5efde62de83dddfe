//! Pre-processing of raw reaches before forest construction.

use crate::diagnostics::{DiagnosticEvent, Diagnostics, FilterReason};
use crate::geometry::ops::{line_merge, locate_point, segment_length, simplify, xy, Segment};
use crate::spatial::EdgeIndex;
use geo::{BoundingRect, Coord, Intersects, Polygon};

/// Keep the reaches that intersect the polygon set or come within `tol` of it.
pub fn filter_reaches_to_boundary(
    reaches: Vec<Segment>,
    polygons: &[Polygon<f64>],
    tol: f64,
    diag: &mut Diagnostics,
) -> Vec<Segment> {
    let rings: Vec<&Segment> = polygons.iter().map(|p| p.exterior()).collect();
    let edges = EdgeIndex::from_segments(rings.iter().enumerate().map(|(i, r)| (i, *r)));
    let ring_vertices: Vec<Coord<f64>> = rings.iter().flat_map(|r| r.0.iter().copied()).collect();

    reaches
        .into_iter()
        .enumerate()
        .filter_map(|(i, reach)| {
            let touches = polygons.iter().any(|p| reach.intersects(p))
                || reach
                    .0
                    .iter()
                    .any(|c| edges.distance(xy(*c)).is_some_and(|d| d <= tol))
                || near_any_vertex(&reach, &ring_vertices, tol);
            if touches {
                Some(reach)
            } else {
                diag.record(DiagnosticEvent::ReachFiltered {
                    reach: i,
                    reason: FilterReason::OutsideBoundary,
                });
                None
            }
        })
        .collect()
}

fn near_any_vertex(reach: &Segment, vertices: &[Coord<f64>], tol: f64) -> bool {
    let Some(rect) = reach.bounding_rect() else {
        return false;
    };
    vertices
        .iter()
        .filter(|v| {
            v.x >= rect.min().x - tol
                && v.x <= rect.max().x + tol
                && v.y >= rect.min().y - tol
                && v.y <= rect.max().y + tol
        })
        .any(|v| locate_point(reach, *v).is_some_and(|loc| loc.distance <= tol))
}

/// Drop reaches longer than `max_length`.
pub fn filter_long_reaches(
    reaches: Vec<Segment>,
    max_length: f64,
    diag: &mut Diagnostics,
) -> Vec<Segment> {
    reaches
        .into_iter()
        .enumerate()
        .filter_map(|(i, reach)| {
            if segment_length(&reach) > max_length {
                diag.record(DiagnosticEvent::ReachFiltered {
                    reach: i,
                    reason: FilterReason::TooLong,
                });
                None
            } else {
                Some(reach)
            }
        })
        .collect()
}

/// Merge reaches through degree-2 junctions, then simplify each result.
pub fn quick_cleanup(reaches: Vec<Segment>, tol: f64) -> Vec<Segment> {
    log::info!("quick cleaning {} reaches", reaches.len());
    line_merge(reaches)
        .iter()
        .map(|r| simplify(r, tol))
        .collect()
}
