//! Forest of regression trees.

use super::{tree::TreeValidationError, RowAccessor, Tree};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq)]
pub enum ForestValidationError {
    /// Base score must be a finite number.
    NonFiniteBaseScore { value: f32 },
    /// A member tree failed structural validation.
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// Additive ensemble of regression trees with a base score.
///
/// The prediction for a row is `base_score + Σ leaf values`, accumulated in
/// f64 so large price magnitudes do not lose precision over many trees.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    trees: Vec<Tree>,
    base_score: f32,
}

impl Forest {
    /// Create an empty forest for regression.
    pub fn for_regression() -> Self {
        Self::default()
    }

    /// Set the base score.
    pub fn with_base_score(mut self, base_score: f32) -> Self {
        self.base_score = base_score;
        self
    }

    /// Add a tree to the forest.
    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Get the base score.
    #[inline]
    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    /// Get a reference to a specific tree.
    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    /// Iterate over trees.
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Validate structural invariants for this forest.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if !self.base_score.is_finite() {
            return Err(ForestValidationError::NonFiniteBaseScore {
                value: self.base_score,
            });
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|e| ForestValidationError::InvalidTree {
                    tree_idx: i,
                    error: e,
                })?;
        }

        Ok(())
    }

    /// Predict for a single row of features.
    pub fn predict_row<R: RowAccessor + ?Sized>(&self, row: &R) -> f64 {
        let mut output = self.base_score as f64;
        for tree in &self.trees {
            output += tree.predict_row(row) as f64;
        }
        output
    }

    /// Maximum depth across member trees (0 for an empty forest).
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::max_depth).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_simple_tree(left_val: f32, right_val: f32, threshold: f32) -> Tree {
        Tree::new(
            vec![0, 0, 0],
            vec![threshold, 0.0, 0.0],
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![0.0, left_val, right_val],
        )
    }

    #[test]
    fn forest_single_tree_regression() {
        let mut forest = Forest::for_regression();
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));

        assert_eq!(forest.predict_row(&[0.3f32] as &[f32]), 1.0);
        assert_eq!(forest.predict_row(&[0.7f32] as &[f32]), 2.0);
    }

    #[test]
    fn forest_multiple_trees_sum() {
        let mut forest = Forest::for_regression();
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(build_simple_tree(0.5, 1.5, 0.5));

        assert_eq!(forest.predict_row(&[0.3f32] as &[f32]), 1.5);
        assert_eq!(forest.predict_row(&[0.7f32] as &[f32]), 3.5);
    }

    #[test]
    fn forest_with_base_score() {
        let mut forest = Forest::for_regression().with_base_score(0.5);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));

        assert_eq!(forest.predict_row(&[0.3f32] as &[f32]), 1.5);
    }

    #[test]
    fn validate_flags_bad_member_tree() {
        let mut forest = Forest::for_regression();
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(Tree::new(
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
            vec![],
        ));

        assert_eq!(
            forest.validate(),
            Err(ForestValidationError::InvalidTree {
                tree_idx: 1,
                error: TreeValidationError::EmptyTree
            })
        );
    }

    #[test]
    fn validate_flags_non_finite_base_score() {
        let forest = Forest::for_regression().with_base_score(f32::NAN);
        assert!(matches!(
            forest.validate(),
            Err(ForestValidationError::NonFiniteBaseScore { .. })
        ));
    }
}
