//! Geometry helpers: polyline operations on `geo` types and triangle quality.

pub mod ops;
pub mod quality;

pub use ops::{LineLocation, Segment, VERTEX_TOL};
pub use quality::{QualitySummary, TriangleQuality};
