//! Request schema and the fixed-order model feature vector.
//!
//! The model consumes exactly nine features in a fixed order. Categorical
//! fields are integer codes from [`CategoryEncoders`], numeric fields pass
//! through, and one derived feature (price per square meter for the city) is
//! resolved from a [`LocationStatTable`]. Each slot keeps a display string so
//! downstream artifacts can show original labels instead of codes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encode::{CategoricalField, CategoryEncoders, UnknownCategory};
use crate::stats::LocationStatTable;

/// Number of model input features.
pub const N_FEATURES: usize = 9;

/// Model input features, in model column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureField {
    PropertyType,
    Bedrooms,
    Bathrooms,
    Area,
    Furnished,
    Level,
    DeliveryTerm,
    City,
    PricePerSqm,
}

impl FeatureField {
    /// Model column order. Attribution and artifacts follow this order.
    pub const ORDER: [FeatureField; N_FEATURES] = [
        FeatureField::PropertyType,
        FeatureField::Bedrooms,
        FeatureField::Bathrooms,
        FeatureField::Area,
        FeatureField::Furnished,
        FeatureField::Level,
        FeatureField::DeliveryTerm,
        FeatureField::City,
        FeatureField::PricePerSqm,
    ];

    /// Column position in the model input.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::PropertyType => 0,
            Self::Bedrooms => 1,
            Self::Bathrooms => 2,
            Self::Area => 3,
            Self::Furnished => 4,
            Self::Level => 5,
            Self::DeliveryTerm => 6,
            Self::City => 7,
            Self::PricePerSqm => 8,
        }
    }

    /// Schema identifier, used to pin bundle column order.
    pub fn name(self) -> &'static str {
        match self {
            Self::PropertyType => "property_type",
            Self::Bedrooms => "bedrooms",
            Self::Bathrooms => "bathrooms",
            Self::Area => "area",
            Self::Furnished => "furnished",
            Self::Level => "level",
            Self::DeliveryTerm => "delivery_term",
            Self::City => "city",
            Self::PricePerSqm => "price_per_sqm",
        }
    }

    /// Human-facing name used in artifacts and descriptions.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::PropertyType => "Type",
            Self::Bedrooms => "Bedrooms",
            Self::Bathrooms => "Bathrooms",
            Self::Area => "Area",
            Self::Furnished => "Furnished",
            Self::Level => "Level",
            Self::DeliveryTerm => "Delivery_Term",
            Self::City => "City",
            Self::PricePerSqm => "Price_per_sqm",
        }
    }
}

/// One property to price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRequest {
    pub city: String,
    pub property_type: String,
    pub furnished: String,
    pub delivery_term: String,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub area: f64,
    pub level: u32,
}

/// Rejected request input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),
    #[error("{field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },
}

impl InputError {
    /// Request field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::UnknownCategory(err) => err.field,
            Self::OutOfRange { field, .. } => field,
        }
    }
}

/// Encoded model input plus display strings, in [`FeatureField::ORDER`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: [f32; N_FEATURES],
    display: [String; N_FEATURES],
}

impl FeatureVector {
    #[cfg(test)]
    pub(crate) fn from_parts(values: [f32; N_FEATURES], display: [String; N_FEATURES]) -> Self {
        Self { values, display }
    }

    /// Numeric values in model column order.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn value(&self, field: FeatureField) -> f32 {
        self.values[field.index()]
    }

    /// Display form of a feature, e.g. the original category label.
    pub fn display(&self, field: FeatureField) -> &str {
        &self.display[field.index()]
    }
}

/// Builds [`FeatureVector`]s from requests against fixed encoders and stats.
#[derive(Debug, Clone, Copy)]
pub struct FeatureVectorBuilder<'a> {
    encoders: &'a CategoryEncoders,
    stats: &'a LocationStatTable,
}

impl<'a> FeatureVectorBuilder<'a> {
    pub fn new(encoders: &'a CategoryEncoders, stats: &'a LocationStatTable) -> Self {
        Self { encoders, stats }
    }

    /// Validate and encode one request.
    ///
    /// Categorical fields are checked in schema order; the first invalid one
    /// is reported. The derived price-per-sqm feature resolves through the
    /// location table and never fails for a known city.
    pub fn build(&self, request: &PropertyRequest) -> Result<FeatureVector, InputError> {
        if !request.area.is_finite() || request.area <= 0.0 {
            return Err(InputError::OutOfRange {
                field: "area",
                reason: format!("must be a positive number, got {}", request.area),
            });
        }

        let property_type = self
            .encoders
            .encode(CategoricalField::PropertyType, &request.property_type)?;
        let furnished = self
            .encoders
            .encode(CategoricalField::Furnished, &request.furnished)?;
        let delivery_term = self
            .encoders
            .encode(CategoricalField::DeliveryTerm, &request.delivery_term)?;
        let city = self.encoders.encode(CategoricalField::City, &request.city)?;
        let price_per_sqm = self.stats.resolve(&request.city);

        Ok(FeatureVector {
            values: [
                property_type as f32,
                request.bedrooms as f32,
                request.bathrooms as f32,
                request.area as f32,
                furnished as f32,
                request.level as f32,
                delivery_term as f32,
                city as f32,
                price_per_sqm as f32,
            ],
            display: [
                request.property_type.clone(),
                request.bedrooms.to_string(),
                request.bathrooms.to_string(),
                request.area.to_string(),
                request.furnished.clone(),
                request.level.to_string(),
                request.delivery_term.clone(),
                request.city.clone(),
                price_per_sqm.to_string(),
            ],
        })
    }
}
