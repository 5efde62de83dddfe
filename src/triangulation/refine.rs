//! Refinement criteria.
//!
//! A triangle is refined when any configured criterion fires. Criteria are
//! evaluated in order and the first that fires decides how the triangle is
//! split (centroid insertion for area, longest-edge midpoint for length).

use crate::geometry::quality::{centroid, edge_lengths, signed_area};
use crate::mesh_error::MeshError;
use crate::spatial::EdgeIndex;
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// One refinement rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RefinementCriterion {
    /// Refine when the triangle area exceeds `max_area`.
    MaxArea { max_area: f64 },
    /// Refine when the area exceeds a limit that grows linearly with the
    /// centroid's distance to the river network, from `near_area` at
    /// `near_distance` to `far_area` at `far_distance`, constant outside.
    DistanceGradedArea {
        near_distance: f64,
        near_area: f64,
        far_distance: f64,
        far_area: f64,
    },
    /// Refine when any edge is longer than `max_edge_length`.
    MaxEdgeLength { max_edge_length: f64 },
}

/// How a failing triangle should be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Area,
    EdgeLength,
}

impl RefinementCriterion {
    pub fn validate(&self) -> Result<(), MeshError> {
        let positive = |name: &str, v: f64| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(MeshError::invalid_parameter(format!(
                    "{name} must be positive and finite, got {v}"
                )))
            }
        };
        match *self {
            RefinementCriterion::MaxArea { max_area } => positive("max_area", max_area),
            RefinementCriterion::MaxEdgeLength { max_edge_length } => {
                positive("max_edge_length", max_edge_length)
            }
            RefinementCriterion::DistanceGradedArea {
                near_distance,
                near_area,
                far_distance,
                far_area,
            } => {
                positive("near_area", near_area)?;
                positive("far_area", far_area)?;
                if !(near_distance >= 0.0) || !(far_distance > near_distance) {
                    return Err(MeshError::invalid_parameter(format!(
                        "distance grading needs 0 <= near_distance < far_distance, got {near_distance} and {far_distance}"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Evaluate this criterion on one triangle.
    ///
    /// `river_distance` is only called by the distance-graded criterion.
    pub fn fails(&self, tri: &[[f64; 2]; 3], river_distance: impl FnOnce() -> f64) -> Option<Failure> {
        match *self {
            RefinementCriterion::MaxArea { max_area } => {
                (signed_area(tri).abs() > max_area).then_some(Failure::Area)
            }
            RefinementCriterion::MaxEdgeLength { max_edge_length } => edge_lengths(tri)
                .iter()
                .any(|l| *l > max_edge_length)
                .then_some(Failure::EdgeLength),
            RefinementCriterion::DistanceGradedArea {
                near_distance,
                near_area,
                far_distance,
                far_area,
            } => {
                let limit = graded_area(
                    river_distance(),
                    near_distance,
                    near_area,
                    far_distance,
                    far_area,
                );
                (signed_area(tri).abs() > limit).then_some(Failure::Area)
            }
        }
    }
}

/// Piecewise linear area limit as a function of distance.
pub fn graded_area(d: f64, near_distance: f64, near_area: f64, far_distance: f64, far_area: f64) -> f64 {
    if d <= near_distance {
        near_area
    } else if d >= far_distance {
        far_area
    } else {
        let s = (d - near_distance) / (far_distance - near_distance);
        near_area + (far_area - near_area) * s
    }
}

/// OR over a list of criteria, with lazily computed river distance.
pub struct RefinementPredicate<'a> {
    criteria: &'a [RefinementCriterion],
    rivers: &'a EdgeIndex,
}

impl<'a> RefinementPredicate<'a> {
    pub fn new(criteria: &'a [RefinementCriterion], rivers: &'a EdgeIndex) -> Self {
        Self { criteria, rivers }
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Distance from a triangle's centroid to the river network, infinite
    /// when there are no rivers.
    pub fn river_distance(&self, tri: &[[f64; 2]; 3]) -> f64 {
        self.rivers
            .distance(centroid(tri))
            .unwrap_or(f64::INFINITY)
    }

    /// First failure among the criteria, if any.
    pub fn evaluate(&self, tri: &[[f64; 2]; 3]) -> Option<Failure> {
        let cached: Cell<Option<f64>> = Cell::new(None);
        self.criteria.iter().find_map(|c| {
            c.fails(tri, || match cached.get() {
                Some(d) => d,
                None => {
                    let d = self.river_distance(tri);
                    cached.set(Some(d));
                    d
                }
            })
        })
    }
}
