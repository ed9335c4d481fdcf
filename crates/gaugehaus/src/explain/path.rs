//! Weighted feature-path bookkeeping for tree SHAP.
//!
//! A [`PathState`] records the unique features split on along a root-to-node
//! walk together with the proportion of subsets of each cardinality that flow
//! through the node. `extend` appends a feature, `unwind` removes one from the
//! middle, and both are exact inverses of each other.

/// One unique feature on the current decision path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PathElement {
    /// Feature index, or -1 for the root sentinel.
    pub(crate) feature: i32,
    /// Fraction of background paths ("zero" paths) that stay on this route.
    pub(crate) zero_fraction: f64,
    /// 1.0 when the explained row follows this route, 0.0 otherwise.
    pub(crate) one_fraction: f64,
    /// Proportion of feature subsets of a given size on this path.
    pub(crate) pweight: f64,
}

/// The unique-feature path maintained during the tree SHAP recursion.
#[derive(Debug, Clone)]
pub struct PathState {
    elems: Vec<PathElement>,
}

impl PathState {
    pub fn with_capacity(max_depth: usize) -> Self {
        Self {
            elems: Vec::with_capacity(max_depth + 2),
        }
    }

    /// Number of elements past the root sentinel. Valid after the first
    /// `extend`.
    #[inline]
    pub fn depth(&self) -> usize {
        self.elems.len().saturating_sub(1)
    }

    #[inline]
    pub(crate) fn element(&self, index: usize) -> &PathElement {
        &self.elems[index]
    }

    /// Position of `feature` on the path, if it was already split on.
    pub(crate) fn position(&self, feature: i32) -> Option<usize> {
        self.elems.iter().position(|el| el.feature == feature)
    }

    /// Grows the path by one feature, updating the subset-size weights.
    pub fn extend(&mut self, zero_fraction: f64, one_fraction: f64, feature: i32) {
        let depth = self.elems.len();
        self.elems.push(PathElement {
            feature,
            zero_fraction,
            one_fraction,
            pweight: if depth == 0 { 1.0 } else { 0.0 },
        });
        let d1 = depth as f64 + 1.0;
        for i in (0..depth).rev() {
            self.elems[i + 1].pweight += one_fraction * self.elems[i].pweight * (i as f64 + 1.0) / d1;
            self.elems[i].pweight *= zero_fraction * (depth - i) as f64 / d1;
        }
    }

    /// Removes the element at `path_index`, restoring the weights to the state
    /// before the matching `extend`.
    pub fn unwind(&mut self, path_index: usize) {
        let unique_depth = self.elems.len() - 1;
        let one_fraction = self.elems[path_index].one_fraction;
        let zero_fraction = self.elems[path_index].zero_fraction;
        let mut next_one_portion = self.elems[unique_depth].pweight;
        let d1 = unique_depth as f64 + 1.0;

        for i in (0..unique_depth).rev() {
            if one_fraction != 0.0 {
                let tmp = self.elems[i].pweight;
                self.elems[i].pweight = next_one_portion * d1 / ((i as f64 + 1.0) * one_fraction);
                next_one_portion =
                    tmp - self.elems[i].pweight * zero_fraction * (unique_depth - i) as f64 / d1;
            } else {
                self.elems[i].pweight /= zero_fraction * (unique_depth - i) as f64 / d1;
            }
        }

        for i in path_index..unique_depth {
            self.elems[i].feature = self.elems[i + 1].feature;
            self.elems[i].zero_fraction = self.elems[i + 1].zero_fraction;
            self.elems[i].one_fraction = self.elems[i + 1].one_fraction;
        }
        self.elems.pop();
    }

    /// Total weight the path would carry with the element at `path_index`
    /// removed, without mutating the path.
    pub fn unwound_sum(&self, path_index: usize) -> f64 {
        let unique_depth = self.elems.len() - 1;
        let one_fraction = self.elems[path_index].one_fraction;
        let zero_fraction = self.elems[path_index].zero_fraction;
        let mut next_one_portion = self.elems[unique_depth].pweight;
        let d1 = unique_depth as f64 + 1.0;
        let mut total = 0.0;

        for i in (0..unique_depth).rev() {
            if one_fraction != 0.0 {
                let tmp = next_one_portion * d1 / ((i as f64 + 1.0) * one_fraction);
                total += tmp;
                next_one_portion =
                    self.elems[i].pweight - tmp * zero_fraction * (unique_depth - i) as f64 / d1;
            } else {
                total += self.elems[i].pweight / (zero_fraction * (unique_depth - i) as f64 / d1);
            }
        }

        total
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rooted() -> PathState {
        let mut path = PathState::with_capacity(8);
        path.extend(1.0, 1.0, -1);
        path
    }

    #[test]
    fn extend_root_sentinel() {
        let path = rooted();
        assert_eq!(path.depth(), 0);
        assert_relative_eq!(path.element(0).pweight, 1.0);
    }

    #[test]
    fn extend_known_weights() {
        let mut path = rooted();
        path.extend(0.4, 1.0, 3);
        assert_relative_eq!(path.element(0).pweight, 0.2);
        assert_relative_eq!(path.element(1).pweight, 0.5);

        path.extend(0.5, 0.0, 7);
        assert_relative_eq!(path.element(0).pweight, 0.4 * 0.5 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(path.element(1).pweight, 0.5 * 0.5 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(path.element(2).pweight, 0.0);
    }

    #[test]
    fn unwind_inverts_extend() {
        let mut path = rooted();
        path.extend(0.4, 1.0, 3);
        let snapshot = path.clone();
        path.extend(0.7, 0.0, 5);
        path.unwind(2);

        assert_eq!(path.depth(), snapshot.depth());
        for i in 0..=path.depth() {
            assert_eq!(path.element(i).feature, snapshot.element(i).feature);
            assert_relative_eq!(
                path.element(i).pweight,
                snapshot.element(i).pweight,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn unwind_from_middle_shifts_features() {
        let mut path = rooted();
        path.extend(0.4, 1.0, 3);
        path.extend(0.5, 1.0, 5);
        path.unwind(1);

        assert_eq!(path.depth(), 1);
        assert_eq!(path.element(1).feature, 5);
        assert_eq!(path.position(3), None);
        assert_eq!(path.position(5), Some(1));
    }

    #[test]
    fn unwound_sum_matches_destructive_unwind() {
        for one_fraction in [1.0, 0.0] {
            let mut path = rooted();
            path.extend(0.4, 1.0, 3);
            path.extend(0.5, one_fraction, 7);

            let sum = path.unwound_sum(2);
            path.unwind(2);
            let direct: f64 = (0..=path.depth()).map(|i| path.element(i).pweight).sum();
            assert_relative_eq!(sum, direct, epsilon = 1e-12);
        }
    }

    #[test]
    fn position_finds_features_on_the_path() {
        let mut path = rooted();
        path.extend(0.4, 1.0, 0);
        assert_eq!(path.position(-1), Some(0));
        assert_eq!(path.position(0), Some(1));
        assert_eq!(path.position(9), None);
    }
}
