//! End-to-end inference: request to priced, explained result.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::bundle::ModelBundle;
use crate::describe::compose_description;
use crate::features::{FeatureVectorBuilder, InputError, PropertyRequest};
use crate::model::ModelError;
use crate::render::{ArtifactError, ArtifactHandle, ExplanationRenderer};

/// A failed prediction run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Who is at fault for a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request is invalid; the error message is safe to show the caller.
    InvalidInput,
    /// The model or environment failed; the caller sees a generic error.
    Internal,
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Input(_) => ErrorClass::InvalidInput,
            Self::Model(_) | Self::Artifact(_) => ErrorClass::Internal,
        }
    }

    /// Request field at fault, for input errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Input(err) => Some(err.field()),
            _ => None,
        }
    }
}

/// One completed prediction.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResult {
    /// Predicted price in output units. Always finite and non-negative.
    pub predicted_price: f64,
    /// Public URL of the waterfall artifact.
    pub image_url: String,
    /// Plain-text factor summary, one line per feature.
    pub factors_description: String,
    /// The written artifact.
    pub artifact: ArtifactHandle,
}

/// Request-to-result orchestration over a loaded bundle.
///
/// The pipeline is immutable after construction and safe to share across
/// threads.
#[derive(Debug)]
pub struct PredictionPipeline {
    bundle: ModelBundle,
    renderer: ExplanationRenderer,
}

impl PredictionPipeline {
    pub fn new(bundle: ModelBundle, renderer: ExplanationRenderer) -> Self {
        Self { bundle, renderer }
    }

    #[inline]
    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    /// Run one request through encoding, prediction, attribution, and
    /// artifact generation.
    ///
    /// The prediction and the attribution artifacts all describe the same
    /// number: the attribution reconstructs the price, the SVG and the
    /// description are derived from the attribution.
    pub fn run(&self, request: &PropertyRequest) -> Result<PredictionResult, PipelineError> {
        let builder = FeatureVectorBuilder::new(self.bundle.encoders(), self.bundle.stats());
        let features = builder.build(request)?;

        let model = self.bundle.model();
        let price = model.predict(&features);
        if !price.is_finite() || price < 0.0 {
            return Err(ModelError::InvalidPrediction { value: price }.into());
        }

        let attribution = model.attribute(&features);
        let artifact = self.renderer.render(&attribution)?;
        let factors_description = compose_description(&attribution);

        debug!(
            price,
            artifact = %artifact.file_name,
            "prediction complete"
        );

        Ok(PredictionResult {
            predicted_price: price,
            image_url: artifact.url.clone(),
            factors_description,
            artifact,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{CategoryEncoders, Vocabulary};
    use crate::model::PriceModel;
    use crate::render::RendererConfig;
    use crate::repr::{Forest, Tree};
    use crate::stats::LocationStatTable;
    use crate::testing;

    fn pipeline_with(bundle: ModelBundle, dir: &std::path::Path) -> PredictionPipeline {
        let config = RendererConfig::builder().artifact_dir(dir).build().unwrap();
        let renderer = ExplanationRenderer::new(config).unwrap();
        PredictionPipeline::new(bundle, renderer)
    }

    #[test]
    fn pipeline_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PredictionPipeline>();
    }

    #[test]
    fn run_produces_consistent_result() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(testing::synthetic_bundle(17), dir.path());

        let result = pipeline.run(&testing::sample_request()).unwrap();
        assert!(result.predicted_price.is_finite());
        assert!(result.predicted_price >= 0.0);
        assert!(result.image_url.ends_with(".svg"));
        assert_eq!(result.image_url, result.artifact.url);
        assert!(result
            .factors_description
            .starts_with("Factors influencing the predicted price:\n"));
        assert!(result.artifact.path.exists());
    }

    #[test]
    fn unknown_city_is_a_client_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(testing::synthetic_bundle(17), dir.path());

        let mut request = testing::sample_request();
        request.city = "Atlantis".to_owned();

        let err = pipeline.run(&request).unwrap_err();
        assert_eq!(err.class(), ErrorClass::InvalidInput);
        assert_eq!(err.field(), Some("city"));
        assert!(err.to_string().contains("Atlantis"));
    }

    #[test]
    fn negative_prediction_is_an_internal_error() {
        // A forest that always predicts below zero.
        let mut forest = Forest::for_regression().with_base_score(100_000.0);
        forest.push_tree(
            Tree::new(
                vec![0],
                vec![0.0],
                vec![0],
                vec![0],
                vec![false],
                vec![true],
                vec![-300_000.0],
            )
            .with_covers(vec![500.0]),
        );
        let model = PriceModel::new(forest).unwrap();
        let encoders = CategoryEncoders::new(
            Vocabulary::from_labels(["Cairo"]).unwrap(),
            Vocabulary::from_labels(["Apartment"]).unwrap(),
            Vocabulary::from_labels(["No", "Yes"]).unwrap(),
            Vocabulary::from_labels(["Finished"]).unwrap(),
        );
        let stats = LocationStatTable::from_samples([("Cairo", 10_000.0)]);
        let bundle = ModelBundle::new(model, encoders, stats).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with(bundle, dir.path());

        let request = PropertyRequest {
            city: "Cairo".to_owned(),
            property_type: "Apartment".to_owned(),
            furnished: "Yes".to_owned(),
            delivery_term: "Finished".to_owned(),
            bedrooms: 2,
            bathrooms: 1,
            area: 90.0,
            level: 2,
        };

        let err = pipeline.run(&request).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Internal);
        assert!(matches!(
            err,
            PipelineError::Model(ModelError::InvalidPrediction { .. })
        ));
        // No artifact should exist for a failed run.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
