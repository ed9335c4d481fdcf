//! gaugehaus: explainable real-estate price inference.
//!
//! Takes a property listing (city, type, size, finishing state), runs it
//! through a tree-ensemble price model, and explains the resulting price with
//! exact per-feature attributions rendered as a waterfall SVG and a plain-text
//! summary.
//!
//! # Key Types
//!
//! - [`PredictionPipeline`] - Request-to-result orchestration
//! - [`ModelBundle`] - Loaded model, encoders, and location statistics
//! - [`PriceModel`] - Validated forest with prediction and attribution
//! - [`RendererConfig`] / [`ExplanationRenderer`] - Artifact output
//!
//! # Typical Use
//!
//! Load a bundle with [`bundle::read_binary_file`], build an
//! [`ExplanationRenderer`] from a `RendererConfig::builder()`, wrap both in a
//! [`PredictionPipeline`], and call [`PredictionPipeline::run`] per request.
//! The pipeline is immutable and shares across threads.
//!
//! # Guarantees
//!
//! For every successful prediction, `baseline + Σ contributions` equals the
//! predicted price up to floating point rounding, and the SVG, the text
//! summary, and the numeric result are all derived from that one attribution.

// Re-export approx traits for users who want to compare predictions
pub use approx;

pub mod bundle;
pub mod describe;
pub mod encode;
pub mod explain;
pub mod features;
pub mod model;
pub mod parallel;
pub mod pipeline;
pub mod render;
pub mod repr;
pub mod stats;
pub mod testing;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Pipeline types (most users want these)
pub use pipeline::{ErrorClass, PipelineError, PredictionPipeline, PredictionResult};

// Bundle assembly and storage
pub use bundle::ModelBundle;

// Model and attribution
pub use explain::{AttributionVector, FeatureAttribution, TreeExplainer};
pub use model::{IntegrityError, ModelError, PriceModel};

// Request schema and encoding
pub use encode::{CategoricalField, CategoryEncoders, UnknownCategory, Vocabulary};
pub use features::{
    FeatureField, FeatureVector, FeatureVectorBuilder, InputError, PropertyRequest, N_FEATURES,
};
pub use stats::LocationStatTable;

// Artifact output
pub use render::{ArtifactHandle, ExplanationRenderer, RendererConfig};

// Shared utilities
pub use parallel::{run_with_threads, Parallelism};
