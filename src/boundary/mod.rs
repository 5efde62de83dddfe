//! Split-form representation of a partitioned polygon set.

pub mod build;
pub mod split;

pub use split::{Component, DirectedSegment, Direction, SegmentHandle, SplitBoundary};
