//! Read-only raster with an affine pixel-to-world transform.

use crate::mesh_error::MeshError;
use geo::{BoundingRect, Contains, Coord, Polygon};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Affine transform in the usual GDAL/rasterio coefficient order:
/// `x = a·col + b·row + c`, `y = d·col + e·row + f`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl AffineTransform {
    /// North-up transform with the top-left corner at `(west, north)`.
    pub fn from_origin(west: f64, north: f64, xsize: f64, ysize: f64) -> Self {
        Self {
            a: xsize,
            b: 0.0,
            c: west,
            d: 0.0,
            e: -ysize,
            f: north,
        }
    }

    /// World coordinates of fractional pixel position `(col, row)`.
    pub fn apply(&self, col: f64, row: f64) -> [f64; 2] {
        [
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        ]
    }

    pub fn inverse(&self) -> Result<AffineTransform, MeshError> {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 || !det.is_finite() {
            return Err(MeshError::InvalidRaster(format!(
                "transform {self:?} is not invertible"
            )));
        }
        let (a, b, d, e) = (self.e / det, -self.b / det, -self.d / det, self.a / det);
        Ok(Self {
            a,
            b,
            c: -(a * self.c + b * self.f),
            d,
            e,
            f: -(d * self.c + e * self.f),
        })
    }
}

/// Coordinate reference system tag, compared verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs(pub String);

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How raster values are looked up at a point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Value of the containing pixel.
    Nearest,
    /// Bilinear interpolation between the four surrounding pixel centers.
    #[default]
    PiecewiseBilinear,
}

/// Row-major grid of values.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    values: Vec<f64>,
    width: usize,
    height: usize,
    transform: AffineTransform,
    inverse: AffineTransform,
    nodata: Option<f64>,
    crs: Option<Crs>,
}

/// Keeps fractional pixel positions strictly inside the grid of centers.
const EDGE_EPS: f64 = 1e-10;

impl Raster {
    pub fn new(
        values: Vec<f64>,
        width: usize,
        height: usize,
        transform: AffineTransform,
    ) -> Result<Self, MeshError> {
        if width == 0 || height == 0 {
            return Err(MeshError::InvalidRaster(format!(
                "raster must not be empty, got {width}x{height}"
            )));
        }
        if values.len() != width * height {
            return Err(MeshError::InvalidRaster(format!(
                "{} values do not fill a {width}x{height} grid",
                values.len()
            )));
        }
        let inverse = transform.inverse()?;
        Ok(Self {
            values,
            width,
            height,
            transform,
            inverse,
            nodata: None,
            crs: None,
        })
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    pub fn transform(&self) -> &AffineTransform {
        &self.transform
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn is_nodata(&self, v: f64) -> bool {
        self.nodata.is_some_and(|n| n == v || (n.is_nan() && v.is_nan()))
    }

    /// Value at integer pixel `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        (row < self.height && col < self.width).then(|| self.values[row * self.width + col])
    }

    /// Fractional pixel position `(col, row)` of world point `(x, y)`.
    pub fn inverse_transform(&self, x: f64, y: f64) -> [f64; 2] {
        self.inverse.apply(x, y)
    }

    /// Sample the raster at world point `(x, y)`, clamping to the grid.
    pub fn sample(&self, x: f64, y: f64, interpolation: Interpolation) -> f64 {
        let [col, row] = self.inverse_transform(x, y);
        match interpolation {
            Interpolation::Nearest => {
                let clamp = |v: f64, n: usize| (v.floor().max(0.0) as usize).min(n - 1);
                let (r, c) = (clamp(row, self.height), clamp(col, self.width));
                self.values[r * self.width + c]
            }
            Interpolation::PiecewiseBilinear => {
                let clamp = |v: f64, n: usize| {
                    (v - 0.5).clamp(0.5 * EDGE_EPS, (n as f64 - 1.0 - EDGE_EPS).max(0.5 * EDGE_EPS))
                };
                let i = clamp(row, self.height);
                let j = clamp(col, self.width);
                let (i0, j0) = (i.floor() as usize, j.floor() as usize);
                let i1 = (i.ceil() as usize).min(self.height - 1);
                let j1 = (j.ceil() as usize).min(self.width - 1);
                let at = |r: usize, c: usize| self.values[r * self.width + c];
                let (di, dj) = (i - i.floor(), j - j.floor());
                let up = at(i0, j0) + dj * (at(i0, j1) - at(i0, j0));
                let dn = at(i1, j0) + dj * (at(i1, j1) - at(i1, j0));
                up + (dn - up) * di
            }
        }
    }
}

/// Burn polygon ids into a new raster covering `bounds` at pixel size `dx`.
///
/// `bounds` is `[xmin, ymin, xmax, ymax]`. The grid origin is rounded to
/// whole units and padded by half a pixel. A pixel takes the color of the
/// last shape containing its center, or `nodata` when none does.
pub fn rasterize_shapes(
    bounds: [f64; 4],
    dx: f64,
    shapes: &[Polygon<f64>],
    colors: &[f64],
    nodata: f64,
    crs: Option<Crs>,
) -> Result<Raster, MeshError> {
    if shapes.len() != colors.len() {
        return Err(MeshError::invalid_parameter(format!(
            "{} shapes but {} colors",
            shapes.len(),
            colors.len()
        )));
    }
    if !(dx > 0.0) || bounds[2] < bounds[0] || bounds[3] < bounds[1] {
        return Err(MeshError::invalid_parameter(format!(
            "invalid canvas {bounds:?} with pixel size {dx}"
        )));
    }
    let x0 = (bounds[0] - dx / 2.0).round_ties_even();
    let y1 = (bounds[3] + dx / 2.0).round_ties_even();
    let width = ((bounds[2] + dx / 2.0 - x0) / dx).ceil().max(1.0) as usize;
    let height = ((y1 - bounds[1] - dx / 2.0) / dx).ceil().max(1.0) as usize;
    log::info!("coloring {} shapes onto a {width}x{height} raster", shapes.len());

    let transform = AffineTransform::from_origin(x0, y1, dx, dx);
    let inverse = transform.inverse()?;
    let mut values = vec![nodata; width * height];
    for (shape, color) in shapes.iter().zip(colors) {
        let Some(rect) = shape.bounding_rect() else {
            continue;
        };
        let [c_min, r_max] = inverse.apply(rect.min().x, rect.min().y);
        let [c_max, r_min] = inverse.apply(rect.max().x, rect.max().y);
        let cols = (c_min.floor().max(0.0) as usize)..(c_max.ceil().max(0.0) as usize).min(width);
        let rows = (r_min.floor().max(0.0) as usize)..(r_max.ceil().max(0.0) as usize).min(height);
        for row in rows {
            for col in cols.clone() {
                let [x, y] = transform.apply(col as f64 + 0.5, row as f64 + 0.5);
                if shape.contains(&Coord { x, y }) {
                    values[row * width + col] = *color;
                }
            }
        }
    }
    let raster = Raster::new(values, width, height, transform)?.with_nodata(nodata);
    Ok(match crs {
        Some(crs) => raster.with_crs(crs),
        None => raster,
    })
}
