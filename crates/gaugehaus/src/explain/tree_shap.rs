use crate::explain::path::PathState;
use crate::explain::ExplainError;
use crate::repr::{Forest, NodeId, Tree};

/// Exact per-feature attribution over a validated forest.
///
/// Construction checks that every tree carries positive, correctly sized
/// cover statistics and computes the cover-weighted expected prediction of
/// the forest (the attribution baseline).
pub struct TreeExplainer<'a> {
    forest: &'a Forest,
    baseline: f64,
}

impl<'a> TreeExplainer<'a> {
    pub fn new(forest: &'a Forest) -> Result<Self, ExplainError> {
        let mut baseline = forest.base_score() as f64;
        for (tree_idx, tree) in forest.trees().enumerate() {
            let covers = tree.covers().ok_or(ExplainError::MissingNodeStats(
                "cover statistics are required for attribution",
            ))?;
            if covers.len() != tree.n_nodes() {
                return Err(ExplainError::CoverLenMismatch {
                    tree_idx,
                    expected: tree.n_nodes(),
                    got: covers.len(),
                });
            }
            for (node, &cover) in covers.iter().enumerate() {
                if !cover.is_finite() || cover <= 0.0 {
                    return Err(ExplainError::NonPositiveCover {
                        tree_idx,
                        node: node as NodeId,
                    });
                }
            }
            baseline += tree_expected_value(tree, covers);
        }
        Ok(Self { forest, baseline })
    }

    /// Reconstructs an explainer for a forest whose covers were already
    /// validated, with the baseline computed at that time.
    pub(crate) fn from_validated(forest: &'a Forest, baseline: f64) -> Self {
        Self { forest, baseline }
    }

    /// Cover-weighted expected prediction, including the base score.
    #[inline]
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Contribution of each feature to the prediction for `row`.
    ///
    /// The returned vector has one entry per feature and satisfies
    /// `baseline() + sum(phi)` = prediction for `row`. `row` must cover every
    /// feature index the forest splits on.
    pub fn shap_values(&self, row: &[f32]) -> Vec<f64> {
        let mut phi = vec![0.0; row.len()];
        let capacity = self.forest.max_depth();
        for tree in self.forest.trees() {
            let covers = tree
                .covers()
                .expect("covers are validated when the explainer is constructed");
            let path = PathState::with_capacity(capacity);
            recurse(tree, covers, row, &mut phi, 0, path, 1.0, 1.0, -1);
        }
        phi
    }
}

/// Expected leaf value of a single tree under its cover distribution.
fn tree_expected_value(tree: &Tree, covers: &[f32]) -> f64 {
    let mut acc = 0.0;
    let mut stack: Vec<(NodeId, f64)> = vec![(0, 1.0)];
    while let Some((node, weight)) = stack.pop() {
        if tree.is_leaf(node) {
            acc += weight * tree.leaf_value(node) as f64;
        } else {
            let parent = covers[node as usize] as f64;
            let left = tree.left_child(node);
            let right = tree.right_child(node);
            stack.push((left, weight * covers[left as usize] as f64 / parent));
            stack.push((right, weight * covers[right as usize] as f64 / parent));
        }
    }
    acc
}

/// Core tree SHAP recursion over one tree.
///
/// `path` is owned by each invocation: the hot branch gets a clone, the cold
/// branch consumes it. Fractions are carried from the parent edge and folded
/// into the path on entry.
#[allow(clippy::too_many_arguments)]
fn recurse(
    tree: &Tree,
    covers: &[f32],
    row: &[f32],
    phi: &mut [f64],
    node: NodeId,
    mut path: PathState,
    parent_zero_fraction: f64,
    parent_one_fraction: f64,
    parent_feature: i32,
) {
    path.extend(parent_zero_fraction, parent_one_fraction, parent_feature);

    if tree.is_leaf(node) {
        let leaf_value = tree.leaf_value(node) as f64;
        for i in 1..=path.depth() {
            let weight = path.unwound_sum(i);
            let el = path.element(i);
            phi[el.feature as usize] += weight * (el.one_fraction - el.zero_fraction) * leaf_value;
        }
        return;
    }

    let split_index = tree.split_index(node);
    let fvalue = row[split_index as usize];
    let go_left = if fvalue.is_nan() {
        tree.default_left(node)
    } else {
        fvalue < tree.split_threshold(node)
    };
    let (hot, cold) = if go_left {
        (tree.left_child(node), tree.right_child(node))
    } else {
        (tree.right_child(node), tree.left_child(node))
    };

    let parent_cover = covers[node as usize] as f64;
    let hot_zero_fraction = covers[hot as usize] as f64 / parent_cover;
    let cold_zero_fraction = covers[cold as usize] as f64 / parent_cover;
    let mut incoming_zero_fraction = 1.0;
    let mut incoming_one_fraction = 1.0;

    // A feature split on twice along one path must be unwound and re-extended
    // so its fractions multiply instead of appearing as two path entries.
    if let Some(path_index) = path.position(split_index as i32) {
        incoming_zero_fraction = path.element(path_index).zero_fraction;
        incoming_one_fraction = path.element(path_index).one_fraction;
        path.unwind(path_index);
    }

    recurse(
        tree,
        covers,
        row,
        phi,
        hot,
        path.clone(),
        hot_zero_fraction * incoming_zero_fraction,
        incoming_one_fraction,
        split_index as i32,
    );
    recurse(
        tree,
        covers,
        row,
        phi,
        cold,
        path,
        cold_zero_fraction * incoming_zero_fraction,
        0.0,
        split_index as i32,
    );
}

// ============================================================================
// Tests
// ============================================================================
