//! Immutable SoA tree storage and traversal.

// Allow many constructor arguments for creating trees with all their fields.
#![allow(clippy::too_many_arguments)]

use super::{NodeId, RowAccessor};

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeValidationError {
    /// Tree has no nodes.
    EmptyTree,
    /// A child pointer references an out-of-bounds node.
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    /// A node references itself as a child.
    SelfLoop { node: NodeId },
    /// A node was reached by more than one path (DAG) or due to a cycle.
    DuplicateVisit { node: NodeId },
    /// A cycle was detected during traversal.
    CycleDetected { node: NodeId },
    /// A node exists in storage but is unreachable from the root.
    UnreachableNode { node: NodeId },
    /// Cover statistics are present but not sized to nodes.
    CoversLenMismatch { covers_len: usize, n_nodes: usize },
}

/// Structure-of-Arrays decision tree with numeric splits and scalar leaves.
///
/// Child indices are local to this tree (0 = root). Categorical inputs are
/// integer-encoded upstream, so every split compares a numeric value against
/// a threshold.
#[derive(Debug, Clone)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f32]>,
    left_children: Box<[u32]>,
    right_children: Box<[u32]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f32]>,
    /// Optional cover (training sample weight) at each node, required for
    /// attribution.
    covers: Option<Box<[f32]>>,
}

impl Tree {
    /// Create a new tree from parallel arrays.
    ///
    /// All arrays must have the same length (number of nodes).
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<f32>,
    ) -> Self {
        let n_nodes = split_indices.len();
        debug_assert_eq!(n_nodes, split_thresholds.len());
        debug_assert_eq!(n_nodes, left_children.len());
        debug_assert_eq!(n_nodes, right_children.len());
        debug_assert_eq!(n_nodes, default_left.len());
        debug_assert_eq!(n_nodes, is_leaf.len());
        debug_assert_eq!(n_nodes, leaf_values.len());

        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            covers: None,
        }
    }

    /// Set the covers for this tree (builder pattern).
    ///
    /// Length is checked by [`Tree::validate`], not here.
    pub fn with_covers(mut self, covers: Vec<f32>) -> Self {
        self.covers = Some(covers.into_boxed_slice());
        self
    }

    /// Check if this tree has cover statistics.
    #[inline]
    pub fn has_covers(&self) -> bool {
        self.covers.is_some()
    }

    /// Get read-only access to the covers slice.
    ///
    /// Cover is the training sample weight reaching each node.
    pub fn covers(&self) -> Option<&[f32]> {
        self.covers.as_deref()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of nodes in the tree.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Check if a node is a leaf.
    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    /// Get the feature index for a split node.
    #[inline]
    pub fn split_index(&self, node: NodeId) -> u32 {
        self.split_indices[node as usize]
    }

    /// Get the split threshold.
    #[inline]
    pub fn split_threshold(&self, node: NodeId) -> f32 {
        self.split_thresholds[node as usize]
    }

    /// Get the left child node index.
    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    /// Get the right child node index.
    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    /// Get the default direction for missing values.
    #[inline]
    pub fn default_left(&self, node: NodeId) -> bool {
        self.default_left[node as usize]
    }

    /// Get the leaf value at a leaf node.
    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> f32 {
        self.leaf_values[node as usize]
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate basic structural invariants for this tree.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        if let Some(covers) = self.covers() {
            if covers.len() != n_nodes {
                return Err(TreeValidationError::CoversLenMismatch {
                    covers_len: covers.len(),
                    n_nodes,
                });
            }
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, u8)> = vec![(0, 0)];

        while let Some((node, phase)) = stack.pop() {
            let node_usize = node as usize;

            match phase {
                0 => {
                    match color[node_usize] {
                        0 => {}
                        1 => return Err(TreeValidationError::CycleDetected { node }),
                        2 => return Err(TreeValidationError::DuplicateVisit { node }),
                        _ => unreachable!(),
                    }

                    color[node_usize] = 1;
                    stack.push((node, 1));

                    if !self.is_leaf(node) {
                        let left = self.left_child(node);
                        let right = self.right_child(node);

                        if left == node || right == node {
                            return Err(TreeValidationError::SelfLoop { node });
                        }

                        if left as usize >= n_nodes {
                            return Err(TreeValidationError::ChildOutOfBounds {
                                node,
                                side: "left",
                                child: left,
                                n_nodes,
                            });
                        }
                        if right as usize >= n_nodes {
                            return Err(TreeValidationError::ChildOutOfBounds {
                                node,
                                side: "right",
                                child: right,
                                n_nodes,
                            });
                        }

                        stack.push((right, 0));
                        stack.push((left, 0));
                    }
                }
                1 => {
                    color[node_usize] = 2;
                }
                _ => unreachable!(),
            }
        }

        for (i, &c) in color.iter().enumerate() {
            if c == 0 {
                return Err(TreeValidationError::UnreachableNode { node: i as NodeId });
            }
        }

        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Traverse the tree to find the leaf node for a row.
    ///
    /// NaN feature values follow the node's default direction.
    #[inline]
    pub fn traverse_to_leaf<R: RowAccessor + ?Sized>(&self, row: &R) -> NodeId {
        let mut node: NodeId = 0;

        while !self.is_leaf(node) {
            let fvalue = row.feature(self.split_index(node) as usize);

            node = if fvalue.is_nan() {
                if self.default_left(node) {
                    self.left_child(node)
                } else {
                    self.right_child(node)
                }
            } else if fvalue < self.split_threshold(node) {
                self.left_child(node)
            } else {
                self.right_child(node)
            };
        }

        node
    }

    /// Leaf value reached by a single row.
    pub fn predict_row<R: RowAccessor + ?Sized>(&self, row: &R) -> f32 {
        self.leaf_value(self.traverse_to_leaf(row))
    }

    /// Maximum root-to-leaf depth (a single-leaf tree has depth 1).
    ///
    /// Assumes a structurally valid tree.
    pub fn max_depth(&self) -> usize {
        let mut max = 0usize;
        let mut stack: Vec<(NodeId, usize)> = vec![(0, 1)];

        while let Some((node, depth)) = stack.pop() {
            if self.is_leaf(node) {
                max = max.max(depth);
            } else {
                stack.push((self.left_child(node), depth + 1));
                stack.push((self.right_child(node), depth + 1));
            }
        }

        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Single split on feature 0, two leaves.
    fn stump(threshold: f32, left_val: f32, right_val: f32) -> Tree {
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
    fn predict_simple_tree() {
        let tree = stump(0.5, 1.0, 2.0);

        assert_eq!(tree.predict_row(&[0.3f32] as &[f32]), 1.0);
        assert_eq!(tree.predict_row(&[0.7f32] as &[f32]), 2.0);
        // Boundary goes right.
        assert_eq!(tree.predict_row(&[0.5f32] as &[f32]), 2.0);
    }

    #[test]
    fn nan_follows_default_direction() {
        let tree = stump(0.5, 1.0, 2.0);
        assert_eq!(tree.predict_row(&[f32::NAN] as &[f32]), 1.0);
    }

    #[test]
    fn max_depth_counts_nodes_on_path() {
        let leaf = Tree::new(
            vec![0],
            vec![0.0],
            vec![0],
            vec![0],
            vec![false],
            vec![true],
            vec![3.0],
        );
        assert_eq!(leaf.max_depth(), 1);
        assert_eq!(stump(0.5, 1.0, 2.0).max_depth(), 2);
    }

    #[test]
    fn validate_accepts_well_formed_tree() {
        assert_eq!(stump(0.5, 1.0, 2.0).validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_empty_tree() {
        let tree = Tree::new(vec![], vec![], vec![], vec![], vec![], vec![], vec![]);
        assert_eq!(tree.validate(), Err(TreeValidationError::EmptyTree));
    }

    #[test]
    fn validate_rejects_self_loop() {
        let tree = Tree::new(
            vec![0, 0, 0],
            vec![0.5, 0.0, 0.0],
            vec![0, 0, 0], // root's left child is itself
            vec![2, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![0.0, 1.0, 2.0],
        );
        assert_eq!(
            tree.validate(),
            Err(TreeValidationError::SelfLoop { node: 0 })
        );
    }

    #[test]
    fn validate_rejects_out_of_bounds_child() {
        let tree = Tree::new(
            vec![0, 0, 0],
            vec![0.5, 0.0, 0.0],
            vec![1, 0, 0],
            vec![9, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![0.0, 1.0, 2.0],
        );
        assert!(matches!(
            tree.validate(),
            Err(TreeValidationError::ChildOutOfBounds {
                node: 0,
                side: "right",
                child: 9,
                ..
            })
        ));
    }

    #[test]
    fn validate_rejects_unreachable_node() {
        // Node 3 exists but nothing points at it.
        let tree = Tree::new(
            vec![0, 0, 0, 0],
            vec![0.5, 0.0, 0.0, 0.0],
            vec![1, 0, 0, 0],
            vec![2, 0, 0, 0],
            vec![true, false, false, false],
            vec![false, true, true, true],
            vec![0.0, 1.0, 2.0, 3.0],
        );
        assert_eq!(
            tree.validate(),
            Err(TreeValidationError::UnreachableNode { node: 3 })
        );
    }

    #[test]
    fn validate_rejects_shared_child() {
        // Both children of the root point at node 1.
        let tree = Tree::new(
            vec![0, 0],
            vec![0.5, 0.0],
            vec![1, 0],
            vec![1, 0],
            vec![true, false],
            vec![false, true],
            vec![0.0, 1.0],
        );
        assert_eq!(
            tree.validate(),
            Err(TreeValidationError::DuplicateVisit { node: 1 })
        );
    }

    #[test]
    fn validate_rejects_mis_sized_covers() {
        let tree = stump(0.5, 1.0, 2.0).with_covers(vec![10.0, 5.0, 5.0, 1.0]);
        assert_eq!(
            tree.validate(),
            Err(TreeValidationError::CoversLenMismatch {
                covers_len: 4,
                n_nodes: 3
            })
        );
    }

    #[test]
    fn covers_accessors() {
        let tree = stump(0.5, 1.0, 2.0);
        assert!(!tree.has_covers());
        assert!(tree.covers().is_none());

        let tree = tree.with_covers(vec![100.0, 40.0, 60.0]);
        assert!(tree.has_covers());
        assert_eq!(tree.covers().unwrap(), &[100.0, 40.0, 60.0]);
    }

    #[test]
    fn traverse_accepts_ndarray_rows() {
        use ndarray::array;

        let tree = stump(0.5, -1.0, 1.0);
        let data = array![[0.3f32, 9.0], [0.7, 9.0]];

        assert_eq!(tree.predict_row(&data.row(0)), -1.0);
        assert_eq!(tree.predict_row(&data.row(1)), 1.0);
    }
}
