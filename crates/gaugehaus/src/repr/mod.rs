//! Canonical representation of the pre-trained price forest.
//!
//! Storage is structure-of-arrays for cache-friendly traversal. Trees carry
//! optional per-node cover statistics; attribution requires them, plain
//! prediction does not.

mod forest;
mod tree;

pub use forest::{Forest, ForestValidationError};
pub use tree::{Tree, TreeValidationError};

/// Node identifier, local to a tree (0 = root).
pub type NodeId = u32;

/// Read-only access to one row of feature values during traversal.
///
/// Implemented for plain slices and for `ndarray` row views, so the same
/// traversal serves the single-request path and strided batch input.
pub trait RowAccessor {
    /// Number of features in the row.
    fn n_features(&self) -> usize;

    /// Value of the feature at `index`.
    fn feature(&self, index: usize) -> f32;
}

impl RowAccessor for [f32] {
    #[inline]
    fn n_features(&self) -> usize {
        self.len()
    }

    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self[index]
    }
}

impl RowAccessor for ndarray::ArrayView1<'_, f32> {
    #[inline]
    fn n_features(&self) -> usize {
        self.len()
    }

    #[inline]
    fn feature(&self, index: usize) -> f32 {
        self[index]
    }
}
