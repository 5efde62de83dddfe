//! Triangle quality utilities.
//!
//! Triangles are given as three planar vertices `[v0, v1, v2]`, expected
//! counter-clockwise. Quality is reported per triangle and aggregated over a
//! mesh by [`QualitySummary`].
//!
//! # Examples
//! ```rust
//! use watershed_mesh::geometry::quality::{triangle_quality, validate_triangle};
//!
//! let q = triangle_quality(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
//! assert!(q.signed_area > 0.0);
//! assert!((q.min_angle_deg - 45.0).abs() < 1e-9);
//! validate_triangle(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]])?;
//! # Ok::<(), watershed_mesh::mesh_error::MeshError>(())
//! ```

use crate::mesh_error::MeshError;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const EPS: f64 = 1e-12;

/// Basic quality metrics for a single triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleQuality {
    /// Ratio of the longest edge length to the shortest edge length.
    pub aspect_ratio: f64,
    /// Minimum corner angle in degrees.
    pub min_angle_deg: f64,
    /// Signed area. Negative values indicate clockwise orientation; zero
    /// indicates degenerate geometry.
    pub signed_area: f64,
}

/// Signed area of a triangle, positive when counter-clockwise.
#[inline]
pub fn signed_area(v: &[[f64; 2]; 3]) -> f64 {
    0.5 * ((v[1][0] - v[0][0]) * (v[2][1] - v[0][1])
        - (v[2][0] - v[0][0]) * (v[1][1] - v[0][1]))
}

#[inline]
pub fn centroid(v: &[[f64; 2]; 3]) -> [f64; 2] {
    [
        (v[0][0] + v[1][0] + v[2][0]) / 3.0,
        (v[0][1] + v[1][1] + v[2][1]) / 3.0,
    ]
}

fn edge_len(a: [f64; 2], b: [f64; 2]) -> f64 {
    (b[0] - a[0]).hypot(b[1] - a[1])
}

/// Edge lengths in the order `v0-v1`, `v1-v2`, `v2-v0`.
pub fn edge_lengths(v: &[[f64; 2]; 3]) -> [f64; 3] {
    [edge_len(v[0], v[1]), edge_len(v[1], v[2]), edge_len(v[2], v[0])]
}

fn angle_at(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    let u = [b[0] - a[0], b[1] - a[1]];
    let w = [c[0] - a[0], c[1] - a[1]];
    let nu = u[0].hypot(u[1]);
    let nw = w[0].hypot(w[1]);
    if nu <= EPS || nw <= EPS {
        return 0.0;
    }
    let cos = ((u[0] * w[0] + u[1] * w[1]) / (nu * nw)).clamp(-1.0, 1.0);
    cos.acos() * 180.0 / PI
}

/// Compute quality metrics of a triangle.
pub fn triangle_quality(v: &[[f64; 2]; 3]) -> TriangleQuality {
    let lens = edge_lengths(v);
    let max = lens.iter().copied().fold(0.0, f64::max);
    let min = lens.iter().copied().fold(f64::INFINITY, f64::min);
    let aspect_ratio = if min <= EPS { f64::INFINITY } else { max / min };
    let min_angle_deg = angle_at(v[0], v[1], v[2])
        .min(angle_at(v[1], v[2], v[0]))
        .min(angle_at(v[2], v[0], v[1]));
    TriangleQuality {
        aspect_ratio,
        min_angle_deg,
        signed_area: signed_area(v),
    }
}

/// Validate that a triangle is neither inverted nor degenerate.
///
/// Returns the computed quality metrics on success.
pub fn validate_triangle(v: &[[f64; 2]; 3]) -> Result<TriangleQuality, MeshError> {
    let quality = triangle_quality(v);
    if !quality.signed_area.is_finite() || quality.signed_area.abs() <= EPS {
        return Err(MeshError::InvalidGeometry(format!(
            "degenerate triangle: area = {}",
            quality.signed_area
        )));
    }
    if quality.signed_area < 0.0 {
        return Err(MeshError::InvalidGeometry(format!(
            "inverted triangle: area = {}",
            quality.signed_area
        )));
    }
    if !quality.min_angle_deg.is_finite() || quality.min_angle_deg <= 0.0 {
        return Err(MeshError::InvalidGeometry(format!(
            "invalid triangle: min angle = {}",
            quality.min_angle_deg
        )));
    }
    Ok(quality)
}

/// Aggregate quality over a set of triangles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub triangles: usize,
    pub min_angle_deg: f64,
    pub max_aspect_ratio: f64,
    pub min_area: f64,
    pub max_area: f64,
}

impl QualitySummary {
    /// Summarize an iterator of triangles. Returns `None` when it is empty.
    pub fn from_triangles<I>(triangles: I) -> Option<Self>
    where
        I: IntoIterator<Item = [[f64; 2]; 3]>,
    {
        let mut summary: Option<Self> = None;
        for tri in triangles {
            let q = triangle_quality(&tri);
            let area = q.signed_area.abs();
            let s = summary.get_or_insert(QualitySummary {
                triangles: 0,
                min_angle_deg: f64::INFINITY,
                max_aspect_ratio: 0.0,
                min_area: f64::INFINITY,
                max_area: 0.0,
            });
            s.triangles += 1;
            s.min_angle_deg = s.min_angle_deg.min(q.min_angle_deg);
            s.max_aspect_ratio = s.max_aspect_ratio.max(q.aspect_ratio);
            s.min_area = s.min_area.min(area);
            s.max_area = s.max_area.max(area);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equilateral_triangle_has_sixty_degree_angles() {
        let h = 3f64.sqrt() / 2.0;
        let q = triangle_quality(&[[0.0, 0.0], [1.0, 0.0], [0.5, h]]);
        assert!((q.min_angle_deg - 60.0).abs() < 1e-9);
        assert!((q.aspect_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_inverted_and_degenerate() {
        assert!(matches!(
            validate_triangle(&[[0.0, 0.0], [0.0, 1.0], [1.0, 0.0]]),
            Err(MeshError::InvalidGeometry(_))
        ));
        assert!(matches!(
            validate_triangle(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]),
            Err(MeshError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn summary_tracks_extremes() {
        let s = QualitySummary::from_triangles([
            [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
            [[0.0, 0.0], [2.0, 0.0], [0.0, 2.0]],
        ])
        .unwrap();
        assert_eq!(s.triangles, 2);
        assert!((s.min_area - 0.5).abs() < 1e-12);
        assert!((s.max_area - 2.0).abs() < 1e-12);
        assert!(QualitySummary::from_triangles(std::iter::empty()).is_none());
    }
}
