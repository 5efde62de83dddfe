//! Triangle meshes with vertices embedded in `D` dimensions.
//!
//! Only the first two coordinates take part in connectivity checks, so a
//! [`Mesh3`] produced by elevation keeps the planar structure of the
//! [`Mesh2`] it came from.

use crate::debug_invariants::DebugInvariants;
use crate::geometry::quality::{signed_area, QualitySummary};
use crate::mesh_error::MeshError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Unique vertex coordinates plus counter-clockwise index triples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh<const D: usize> {
    #[serde(with = "vertex_rows")]
    pub vertices: Vec<[f64; D]>,
    pub triangles: Vec<[usize; 3]>,
}

pub type Mesh2 = TriangleMesh<2>;
pub type Mesh3 = TriangleMesh<3>;

impl<const D: usize> Default for TriangleMesh<D> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }
}

impl<const D: usize> TriangleMesh<D> {
    pub fn new(vertices: Vec<[f64; D]>, triangles: Vec<[usize; 3]>) -> Result<Self, MeshError> {
        let mesh = Self {
            vertices,
            triangles,
        };
        mesh.validate_invariants()?;
        Ok(mesh)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    #[inline]
    pub fn xy(&self, v: usize) -> [f64; 2] {
        [self.vertices[v][0], self.vertices[v][1]]
    }

    /// Planar corners of triangle `t`.
    pub fn triangle_xy(&self, t: usize) -> [[f64; 2]; 3] {
        let [a, b, c] = self.triangles[t];
        [self.xy(a), self.xy(b), self.xy(c)]
    }

    /// Unique undirected edges as sorted index pairs.
    pub fn edges(&self) -> BTreeSet<(usize, usize)> {
        self.triangles
            .iter()
            .flat_map(|&[a, b, c]| [(a, b), (b, c), (c, a)])
            .map(|(u, v)| if u < v { (u, v) } else { (v, u) })
            .collect()
    }

    /// Total planar area.
    pub fn area(&self) -> f64 {
        (0..self.triangles.len())
            .map(|t| signed_area(&self.triangle_xy(t)).abs())
            .sum()
    }

    pub fn quality(&self) -> Option<QualitySummary> {
        QualitySummary::from_triangles((0..self.triangles.len()).map(|t| self.triangle_xy(t)))
    }
}

impl Mesh2 {
    /// Append a `z` value to every vertex.
    pub fn with_z(&self, z: &[f64]) -> Result<Mesh3, MeshError> {
        if z.len() != self.vertices.len() {
            return Err(MeshError::invalid_parameter(format!(
                "expected {} elevations, got {}",
                self.vertices.len(),
                z.len()
            )));
        }
        Ok(Mesh3 {
            vertices: self
                .vertices
                .iter()
                .zip(z)
                .map(|(v, z)| [v[0], v[1], *z])
                .collect(),
            triangles: self.triangles.clone(),
        })
    }
}

impl<const D: usize> DebugInvariants for TriangleMesh<D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "TriangleMesh invalid");
    }

    fn validate_invariants(&self) -> Result<(), MeshError> {
        if D < 2 {
            return Err(MeshError::invalid_parameter(format!(
                "mesh vertices need at least two coordinates, got {D}"
            )));
        }
        let n = self.vertices.len();
        for (t, tri) in self.triangles.iter().enumerate() {
            if tri.iter().any(|&v| v >= n) {
                return Err(MeshError::InvalidGeometry(format!(
                    "triangle {t} references a vertex outside 0..{n}: {tri:?}"
                )));
            }
            if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
                return Err(MeshError::InvalidGeometry(format!(
                    "triangle {t} repeats a vertex: {tri:?}"
                )));
            }
            let area = signed_area(&self.triangle_xy(t));
            if !(area > 0.0) {
                return Err(MeshError::InvalidGeometry(format!(
                    "triangle {t} is not counter-clockwise: area = {area}"
                )));
            }
        }
        Ok(())
    }
}

/// Serialize `[f64; D]` rows as plain JSON arrays for any `D`.
mod vertex_rows {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer, const D: usize>(
        rows: &Vec<[f64; D]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let rows: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, De: Deserializer<'de>, const D: usize>(
        deserializer: De,
    ) -> Result<Vec<[f64; D]>, De::Error> {
        let rows: Vec<Vec<f64>> = Vec::deserialize(deserializer)?;
        rows.into_iter()
            .map(|r| {
                let len = r.len();
                <[f64; D]>::try_from(r)
                    .map_err(|_| De::Error::custom(format!("expected {D} coordinates, got {len}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Mesh2 {
        Mesh2::new(
            vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            vec![[0, 1, 2], [0, 2, 3]],
        )
        .unwrap()
    }

    #[test]
    fn edges_are_unique() {
        let m = square();
        assert_eq!(m.edges().len(), 5);
        assert!((m.area() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn clockwise_triangle_is_rejected() {
        let err = Mesh2::new(vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]], vec![[0, 2, 1]]);
        assert!(matches!(err, Err(MeshError::InvalidGeometry(_))));
    }

    #[test]
    fn with_z_keeps_connectivity() {
        let m = square();
        let m3 = m.with_z(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(m3.triangles, m.triangles);
        assert_eq!(m3.vertices[2], [1.0, 1.0, 3.0]);
        assert!(m.with_z(&[1.0]).is_err());
    }

    #[test]
    fn mesh_serializes_as_rows() {
        let m = square();
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.starts_with("{\"vertices\":[[0.0,0.0],"));
        let back: Mesh2 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }
}
