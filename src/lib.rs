//! # watershed-mesh
//!
//! watershed-mesh turns a set of adjacent watershed polygons and a raw river
//! network into a conforming 2D triangulation, optionally lifted onto a
//! raster elevation surface.
//!
//! ## Pipeline
//! 1. Decompose the polygons into a split-form [`boundary::SplitBoundary`]
//!    whose shared edges are stored once.
//! 2. Assemble reaches into a [`hydrography::RiverForest`] and clean it up
//!    (simplify, merge short reaches, prune short leaves).
//! 3. Snap the boundary and the forest onto each other
//!    ([`conflation::snap`]) so that every river endpoint near the boundary
//!    lies on it exactly.
//! 4. Triangulate with boundary segments and reaches as constraints and
//!    refine by area, distance to rivers or edge length
//!    ([`triangulation::triangulate`]).
//! 5. Sample elevations at the mesh vertices ([`elevation::elevate`]).
//!
//! [`workflow::run`] chains steps 1 to 4 from a [`workflow::WorkflowConfig`].
//!
//! ## Features
//! - `rayon`: parallel raster sampling.
//! - `strict-invariants` / `check-invariants`: keep invariant assertions in
//!   release builds.
//!
//! ## Determinism
//!
//! Every operation is deterministic for a given input order. Ties are broken
//! by input index, never by hash order.

pub mod boundary;
pub mod conflation;
pub mod debug_invariants;
pub mod diagnostics;
pub mod elevation;
pub mod geometry;
pub mod hydrography;
pub mod mesh_error;
pub mod spatial;
pub mod triangulation;
pub mod workflow;

pub use debug_invariants::DebugInvariants;
pub use mesh_error::MeshError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::boundary::{Component, SegmentHandle, SplitBoundary};
    pub use crate::conflation::{snap, SnapOptions, SnapSummary};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::diagnostics::{DiagnosticEvent, Diagnostics};
    pub use crate::elevation::{
        elevate, rasterize_shapes, values_from_raster, AffineTransform, Crs,
        IdentityReprojection, Interpolation, Raster, Reproject,
    };
    pub use crate::geometry::Segment;
    pub use crate::hydrography::{CleanupOptions, NodeId, RiverForest, RiverTree};
    pub use crate::mesh_error::MeshError;
    pub use crate::triangulation::{
        triangulate, Mesh2, Mesh3, RefinementCriterion, TriangulationOptions,
        TriangulationResult,
    };
    pub use crate::workflow::{simplify_and_prune, SimplifyOptions, WorkflowConfig};
}
