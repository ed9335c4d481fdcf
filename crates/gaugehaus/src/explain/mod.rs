//! Per-feature attribution for forest predictions.
//!
//! Implements the tree SHAP algorithm from Lundberg et al. (2020):
//! "From local explanations to global understanding with explainable AI for
//! trees". Contributions are exact: for every row,
//! `baseline + Σ contributions` equals the forest prediction up to floating
//! point rounding.

mod attribution;
mod path;
mod tree_shap;

pub use attribution::{AttributionVector, FeatureAttribution};
pub use path::PathState;
pub use tree_shap::TreeExplainer;

use crate::repr::NodeId;

/// Errors preventing attribution for a forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplainError {
    /// A required per-node statistic is absent.
    MissingNodeStats(&'static str),
    /// Cover statistics are not sized to the tree.
    CoverLenMismatch {
        tree_idx: usize,
        expected: usize,
        got: usize,
    },
    /// A node cover is zero, negative, or non-finite.
    NonPositiveCover { tree_idx: usize, node: NodeId },
}

impl std::fmt::Display for ExplainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingNodeStats(what) => write!(f, "missing node statistics: {}", what),
            Self::CoverLenMismatch {
                tree_idx,
                expected,
                got,
            } => write!(
                f,
                "tree {} has {} cover entries, expected {}",
                tree_idx, got, expected
            ),
            Self::NonPositiveCover { tree_idx, node } => {
                write!(f, "tree {} node {} has a non-positive cover", tree_idx, node)
            }
        }
    }
}

impl std::error::Error for ExplainError {}
