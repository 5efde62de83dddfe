use crate::mesh_error::MeshError;

/// Trait for validating the topological invariants of a structure.
///
/// Implemented by river trees and forests (outlet/inlet coincidence, parent
/// bookkeeping), the split-form boundary (ring closure, simplicity, handle
/// reference sets) and triangle meshes (index ranges, non-degenerate cells).
pub trait DebugInvariants {
    /// Assert invariants in debug builds or when invariant checking is enabled.
    fn debug_assert_invariants(&self);
    /// Validate invariants and return the first error encountered.
    fn validate_invariants(&self) -> Result<(), MeshError>;
}

/// Helper macro to run a fallible check and panic on error when invariant
/// checking is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}

/// Validate a collection of structures, stopping at the first violation.
///
/// Returns the index of the offending item alongside its error.
pub fn validate_each<'a, T, I>(items: I) -> Result<(), (usize, MeshError)>
where
    T: DebugInvariants + 'a,
    I: IntoIterator<Item = &'a T>,
{
    for (idx, item) in items.into_iter().enumerate() {
        item.validate_invariants().map_err(|e| (idx, e))?;
    }
    Ok(())
}
