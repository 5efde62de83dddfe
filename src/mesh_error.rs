//! MeshError: unified error type for watershed-mesh public APIs
//!
//! Every fallible operation in the crate (boundary construction, conflation,
//! triangulation, raster sampling) reports through this type so that callers
//! can match on the failure class instead of parsing messages.

use crate::conflation::ConflationPhase;
use thiserror::Error;

/// Unified error type for watershed-mesh operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    /// A polygon ring does not end where it started.
    #[error("ring of polygon {polygon} is not closed: starts at {start:?}, ends at {end:?}")]
    RingNotClosed {
        polygon: usize,
        start: [f64; 2],
        end: [f64; 2],
    },
    /// Two consecutive segments of a polygon ring do not meet.
    #[error("ring of polygon {polygon} has a gap after ring position {position}")]
    RingGap { polygon: usize, position: usize },
    /// A polygon ring crosses itself.
    #[error("ring of polygon {polygon} self-intersects between edges {first} and {second}")]
    SelfIntersectingRing {
        polygon: usize,
        first: usize,
        second: usize,
    },
    /// A ring or index references a segment handle that is not in the pool.
    #[error("segment handle {0} is not present in the segment pool")]
    DanglingHandle(usize),
    /// A segment handle's referencing polygons disagree with the ring lists.
    #[error("segment handle {handle} has an inconsistent reference set")]
    ReferenceMismatch { handle: usize },
    /// A river node's outlet does not coincide with its parent's inlet.
    #[error("river node {node} does not connect to its parent {parent}")]
    TreeConnectivity { node: usize, parent: usize },
    /// Parent/child bookkeeping of a river tree is inconsistent.
    #[error("river tree parentage is inconsistent at node {0}")]
    TreeParentage(usize),
    /// A polyline with fewer than two distinct coordinates.
    #[error("degenerate segment: {0}")]
    DegenerateSegment(String),
    /// A triangle is degenerate or inverted.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// An edge is used by more than two polygons.
    #[error("edge {from:?} -> {to:?} is shared by {count} polygons")]
    NonManifoldEdge {
        from: [f64; 2],
        to: [f64; 2],
        count: usize,
    },
    /// Input geometry that the split form cannot represent.
    #[error("unsupported geometry: {0}")]
    UnsupportedGeometry(String),
    /// A parameter outside of its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Two constraint edges cross away from a shared vertex.
    #[error("constraint edge {from:?} -> {to:?} crosses an existing constraint")]
    ConstraintCrossing { from: [f64; 2], to: [f64; 2] },
    /// The triangulation engine rejected a vertex.
    #[error("triangulation insertion failed: {0}")]
    Insertion(String),
    /// Reprojection between two coordinate systems is not available.
    #[error("cannot reproject from `{source_crs}` to `{target_crs}`")]
    CrsMismatch {
        source_crs: String,
        target_crs: String,
    },
    /// Raster shape and value buffer disagree, or the transform is singular.
    #[error("invalid raster: {0}")]
    InvalidRaster(String),
    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
    /// A conflation phase left one of the structures inconsistent.
    #[error("conflation failed during {phase}: {source}")]
    ConflationFailed {
        phase: ConflationPhase,
        #[source]
        source: Box<MeshError>,
    },
}

impl MeshError {
    /// Convenience constructor for [`MeshError::InvalidParameter`].
    pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
        MeshError::InvalidParameter(message.into())
    }
}

impl From<serde_json::Error> for MeshError {
    fn from(err: serde_json::Error) -> Self {
        MeshError::Config(err.to_string())
    }
}

impl From<spade::InsertionError> for MeshError {
    fn from(err: spade::InsertionError) -> Self {
        MeshError::Insertion(format!("{err:?}"))
    }
}
