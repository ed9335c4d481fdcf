//! The price model: a validated forest plus its attribution baseline.

use ndarray::ArrayView2;
use thiserror::Error;

use crate::explain::{AttributionVector, ExplainError, FeatureAttribution, TreeExplainer};
use crate::features::{FeatureField, FeatureVector, N_FEATURES};
use crate::parallel::run_with_threads;
use crate::repr::{Forest, ForestValidationError, NodeId};

/// A model that cannot be trusted to predict or explain.
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("forest validation failed: {0:?}")]
    Forest(ForestValidationError),
    #[error(transparent)]
    Explain(#[from] ExplainError),
    #[error("tree {tree} splits on feature {feature}, model input has {n_features} columns")]
    SplitIndexOutOfRange {
        tree: usize,
        feature: u32,
        n_features: usize,
    },
    #[error("bundle declares {got} feature columns, runtime expects {expected}")]
    WrongFeatureCount { expected: usize, got: usize },
    #[error("feature column {index} is '{got}', runtime expects '{expected}'")]
    FeatureOrderMismatch {
        index: usize,
        expected: &'static str,
        got: String,
    },
    #[error("vocabulary for {field}: {source}")]
    Vocabulary {
        field: &'static str,
        source: crate::encode::VocabularyError,
    },
    #[error("tree {tree} node arrays are inconsistently sized")]
    MalformedTreeArrays { tree: usize },
    #[error("duplicate location statistic for '{city}'")]
    DuplicateLocationStat { city: String },
    #[error("location statistic for '{city}' is not finite: {value}")]
    NonFiniteLocationStat { city: String, value: f64 },
    #[error("location fallback is not finite: {value}")]
    NonFiniteFallback { value: f64 },
}

/// Prediction-time failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("input has {got} feature columns, model expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("model produced an invalid price: {value}")]
    InvalidPrediction { value: f64 },
}

/// Tree-ensemble price model over the fixed nine-column input.
///
/// Construction validates forest structure, split-index bounds, and the
/// cover statistics attribution depends on, and precomputes the baseline.
/// A constructed model predicts and attributes infallibly.
#[derive(Debug, Clone)]
pub struct PriceModel {
    forest: Forest,
    baseline: f64,
}

impl PriceModel {
    pub fn new(forest: Forest) -> Result<Self, IntegrityError> {
        forest.validate().map_err(IntegrityError::Forest)?;

        for (tree_idx, tree) in forest.trees().enumerate() {
            for node in 0..tree.n_nodes() as NodeId {
                if !tree.is_leaf(node) {
                    let feature = tree.split_index(node);
                    if feature as usize >= N_FEATURES {
                        return Err(IntegrityError::SplitIndexOutOfRange {
                            tree: tree_idx,
                            feature,
                            n_features: N_FEATURES,
                        });
                    }
                }
            }
        }

        let baseline = TreeExplainer::new(&forest)?.baseline();
        Ok(Self { forest, baseline })
    }

    #[inline]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Expected prediction over the training distribution, including the
    /// base score.
    #[inline]
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        N_FEATURES
    }

    /// Predict the price for one encoded request.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.forest.predict_row(features.values())
    }

    /// Predict prices for a batch of pre-encoded rows.
    ///
    /// `n_threads` = 0 uses all available cores, 1 stays on the calling
    /// thread.
    pub fn predict_batch(
        &self,
        rows: ArrayView2<'_, f32>,
        n_threads: usize,
    ) -> Result<Vec<f64>, ModelError> {
        if rows.ncols() != N_FEATURES {
            return Err(ModelError::DimensionMismatch {
                expected: N_FEATURES,
                got: rows.ncols(),
            });
        }

        Ok(run_with_threads(n_threads, |parallelism| {
            parallelism.maybe_par_map(0..rows.nrows(), |i| self.forest.predict_row(&rows.row(i)))
        }))
    }

    /// Per-feature price contributions for one encoded request.
    ///
    /// Items follow [`FeatureField::ORDER`] and reconstruct the prediction:
    /// `baseline + Σ contributions = predict(features)`.
    pub fn attribute(&self, features: &FeatureVector) -> AttributionVector {
        let explainer = TreeExplainer::from_validated(&self.forest, self.baseline);
        let phi = explainer.shap_values(features.values());

        let items = FeatureField::ORDER
            .iter()
            .map(|&field| FeatureAttribution {
                name: field.display_name(),
                value: features.display(field).to_owned(),
                contribution: phi[field.index()],
            })
            .collect();

        AttributionVector::new(self.baseline, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::Tree;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// Stump on `feature` with equal covers.
    fn stump(feature: u32, threshold: f32, left: f32, right: f32) -> Tree {
        Tree::new(
            vec![feature, 0, 0],
            vec![threshold, 0.0, 0.0],
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![0.0, left, right],
        )
        .with_covers(vec![100.0, 50.0, 50.0])
    }

    fn model() -> PriceModel {
        let mut forest = Forest::for_regression().with_base_score(1_000.0);
        forest.push_tree(stump(3, 100.0, -50.0, 80.0));
        forest.push_tree(stump(8, 10_000.0, -20.0, 40.0));
        PriceModel::new(forest).unwrap()
    }

    fn vector(values: [f32; N_FEATURES]) -> FeatureVector {
        let display = std::array::from_fn(|i| values[i].to_string());
        FeatureVector::from_parts(values, display)
    }

    #[test]
    fn rejects_split_index_beyond_input_width() {
        let mut forest = Forest::for_regression().with_base_score(0.0);
        forest.push_tree(stump(9, 0.0, -1.0, 1.0));
        assert!(matches!(
            PriceModel::new(forest),
            Err(IntegrityError::SplitIndexOutOfRange {
                tree: 0,
                feature: 9,
                ..
            })
        ));
    }

    #[test]
    fn rejects_forest_without_covers() {
        let mut forest = Forest::for_regression().with_base_score(0.0);
        forest.push_tree(Tree::new(
            vec![0, 0, 0],
            vec![0.5, 0.0, 0.0],
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![true, false, false],
            vec![false, true, true],
            vec![0.0, 1.0, 2.0],
        ));
        assert!(matches!(
            PriceModel::new(forest),
            Err(IntegrityError::Explain(ExplainError::MissingNodeStats(_)))
        ));
    }

    #[test]
    fn rejects_structurally_broken_forest() {
        let mut forest = Forest::for_regression().with_base_score(0.0);
        forest.push_tree(
            Tree::new(
                vec![0, 0],
                vec![0.5, 0.0],
                vec![1, 0],
                vec![1, 0],
                vec![true, false],
                vec![false, true],
                vec![0.0, 1.0],
            )
            .with_covers(vec![10.0, 10.0]),
        );
        assert!(matches!(
            PriceModel::new(forest),
            Err(IntegrityError::Forest(_))
        ));
    }

    #[test]
    fn predict_sums_trees_and_base_score() {
        let model = model();
        // area = 150 (>= 100, right), price_per_sqm = 9000 (< 10000, left)
        let features = vector([0.0, 3.0, 2.0, 150.0, 1.0, 4.0, 0.0, 1.0, 9_000.0]);
        assert_relative_eq!(model.predict(&features), 1_000.0 + 80.0 - 20.0);
    }

    #[test]
    fn attribution_reconstructs_prediction() {
        let model = model();
        let features = vector([0.0, 3.0, 2.0, 150.0, 1.0, 4.0, 0.0, 1.0, 9_000.0]);

        let attribution = model.attribute(&features);
        let prediction = model.predict(&features);

        assert!(attribution.verify(prediction, 1e-6));
        assert_relative_eq!(attribution.baseline(), model.baseline());

        let names: Vec<&str> = attribution.iter().map(|item| item.name).collect();
        assert_eq!(
            names,
            vec![
                "Type",
                "Bedrooms",
                "Bathrooms",
                "Area",
                "Furnished",
                "Level",
                "Delivery_Term",
                "City",
                "Price_per_sqm"
            ]
        );
    }

    #[test]
    fn attribution_lands_on_split_features_only() {
        let model = model();
        let features = vector([0.0, 3.0, 2.0, 150.0, 1.0, 4.0, 0.0, 1.0, 9_000.0]);

        let attribution = model.attribute(&features);
        for (position, item) in attribution.iter().enumerate() {
            if position == 3 || position == 8 {
                assert!(item.contribution.abs() > 0.0);
            } else {
                assert_relative_eq!(item.contribution, 0.0);
            }
        }
    }

    #[test]
    fn predict_batch_matches_single_rows() {
        let model = model();
        let rows = array![
            [0.0f32, 3.0, 2.0, 150.0, 1.0, 4.0, 0.0, 1.0, 9_000.0],
            [0.0, 2.0, 1.0, 80.0, 0.0, 1.0, 1.0, 0.0, 12_000.0],
        ];

        for n_threads in [1, 2] {
            let batch = model.predict_batch(rows.view(), n_threads).unwrap();
            assert_eq!(batch.len(), 2);
            for (i, &prediction) in batch.iter().enumerate() {
                let row: [f32; N_FEATURES] = std::array::from_fn(|j| rows[[i, j]]);
                assert_relative_eq!(prediction, model.predict(&vector(row)));
            }
        }
    }

    #[test]
    fn predict_batch_rejects_wrong_width() {
        let model = model();
        let rows = array![[1.0f32, 2.0, 3.0]];
        assert_eq!(
            model.predict_batch(rows.view(), 1),
            Err(ModelError::DimensionMismatch {
                expected: N_FEATURES,
                got: 3
            })
        );
    }
}
