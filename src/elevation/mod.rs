//! Elevation sampling: lift a planar mesh onto a raster surface.

pub mod raster;
pub mod reproject;

pub use raster::{rasterize_shapes, AffineTransform, Crs, Interpolation, Raster};
pub use reproject::{IdentityReprojection, Reproject};

use crate::mesh_error::MeshError;
use crate::triangulation::{Mesh2, Mesh3};

/// Sample `raster` at every point, in input order.
///
/// Points are first moved from `points_crs` into the raster's system.
/// Points outside the grid take the value of the nearest edge pixel.
pub fn values_from_raster(
    points: &[[f64; 2]],
    points_crs: Option<&Crs>,
    raster: &Raster,
    interpolation: Interpolation,
    reproject: &dyn Reproject,
) -> Result<Vec<f64>, MeshError> {
    let local = reproject.reproject(points, points_crs, raster.crs())?;
    if local.len() != points.len() {
        return Err(MeshError::invalid_parameter(format!(
            "reprojection returned {} points for {} inputs",
            local.len(),
            points.len()
        )));
    }

    #[cfg(feature = "rayon")]
    let values: Vec<f64> = {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
        local
            .par_iter()
            .map(|p| raster.sample(p[0], p[1], interpolation))
            .collect()
    };
    #[cfg(not(feature = "rayon"))]
    let values: Vec<f64> = local
        .iter()
        .map(|p| raster.sample(p[0], p[1], interpolation))
        .collect();

    let missing = values.iter().filter(|v| raster.is_nodata(**v)).count();
    if missing > 0 {
        log::warn!("{missing} of {} samples hit nodata pixels", values.len());
    }
    Ok(values)
}

/// Attach raster elevations to every vertex of `mesh`.
pub fn elevate(
    mesh: &Mesh2,
    mesh_crs: Option<&Crs>,
    raster: &Raster,
    interpolation: Interpolation,
    reproject: &dyn Reproject,
) -> Result<Mesh3, MeshError> {
    log::info!(
        "sampling {} vertices from a {}x{} raster",
        mesh.vertex_count(),
        raster.width(),
        raster.height()
    );
    let z = values_from_raster(&mesh.vertices, mesh_crs, raster, interpolation, reproject)?;
    mesh.with_z(&z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(v: f64) -> Raster {
        Raster::new(vec![v; 12], 4, 3, AffineTransform::from_origin(0.0, 3.0, 1.0, 1.0)).unwrap()
    }

    #[test]
    fn values_keep_input_order() {
        let values = vec![0.0, 1.0, 2.0, 3.0];
        let r = Raster::new(values, 4, 1, AffineTransform::from_origin(0.0, 1.0, 1.0, 1.0)).unwrap();
        let pts = [[3.5, 0.5], [0.5, 0.5], [2.5, 0.5]];
        let z = values_from_raster(&pts, None, &r, Interpolation::Nearest, &IdentityReprojection)
            .unwrap();
        assert_eq!(z, vec![3.0, 0.0, 2.0]);
    }

    #[test]
    fn elevate_adds_third_coordinate() {
        let mesh = Mesh2::new(
            vec![[0.0, 0.0], [4.0, 0.0], [4.0, 3.0]],
            vec![[0, 1, 2]],
        )
        .unwrap();
        let m3 = elevate(&mesh, None, &flat(7.0), Interpolation::PiecewiseBilinear, &IdentityReprojection)
            .unwrap();
        assert!(m3.vertices.iter().all(|v| (v[2] - 7.0).abs() < 1e-12));
        assert_eq!(m3.triangles, mesh.triangles);
    }

    #[test]
    fn mismatched_crs_is_an_error() {
        let r = flat(1.0).with_crs(Crs("EPSG:26915".into()));
        let err = values_from_raster(
            &[[0.0, 0.0]],
            Some(&Crs("EPSG:4326".into())),
            &r,
            Interpolation::Nearest,
            &IdentityReprojection,
        );
        assert!(matches!(err, Err(MeshError::CrsMismatch { .. })));
    }
}
