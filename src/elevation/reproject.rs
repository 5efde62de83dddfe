//! Coordinate reprojection seam.

use super::raster::Crs;
use crate::mesh_error::MeshError;

/// Moves points from one coordinate reference system to another.
///
/// `None` on either side means "unspecified" and is treated as matching
/// anything.
pub trait Reproject {
    fn reproject(
        &self,
        points: &[[f64; 2]],
        from: Option<&Crs>,
        to: Option<&Crs>,
    ) -> Result<Vec<[f64; 2]>, MeshError>;
}

/// Passes points through unchanged and rejects differing systems.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityReprojection;

impl Reproject for IdentityReprojection {
    fn reproject(
        &self,
        points: &[[f64; 2]],
        from: Option<&Crs>,
        to: Option<&Crs>,
    ) -> Result<Vec<[f64; 2]>, MeshError> {
        match (from, to) {
            (Some(a), Some(b)) if a != b => Err(MeshError::CrsMismatch {
                source_crs: a.to_string(),
                target_crs: b.to_string(),
            }),
            _ => Ok(points.to_vec()),
        }
    }
}

impl<F> Reproject for F
where
    F: Fn([f64; 2]) -> [f64; 2],
{
    fn reproject(
        &self,
        points: &[[f64; 2]],
        _from: Option<&Crs>,
        _to: Option<&Crs>,
    ) -> Result<Vec<[f64; 2]>, MeshError> {
        Ok(points.iter().map(|p| self(*p)).collect())
    }
}
