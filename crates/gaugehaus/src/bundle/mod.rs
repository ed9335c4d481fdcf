//! Model bundle assembly and storage.
//!
//! A bundle is everything inference needs: the validated [`PriceModel`], the
//! categorical vocabularies, and the location statistic table. [`schema`]
//! defines the serde payload types shared by the binary and JSON formats;
//! [`codec`] wraps the binary payload in a checksummed fixed-size header.

mod codec;
mod schema;

pub use codec::{
    from_bytes, read_binary_file, read_json_file, to_bytes, write_binary_file, write_json_file,
    BundleReadError, BundleWriteError, FormatHeader, CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR,
    HEADER_SIZE, MAGIC,
};
pub use schema::{
    ForestPayload, LocationStatEntry, LocationStatsPayload, Payload, PayloadV1, TreePayload,
    VocabularyPayload,
};

use crate::encode::CategoryEncoders;
use crate::model::{IntegrityError, PriceModel};
use crate::stats::LocationStatTable;

/// A complete inference artifact: model, encoders, and location statistics.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    model: PriceModel,
    encoders: CategoryEncoders,
    stats: LocationStatTable,
}

impl ModelBundle {
    /// Assemble a bundle, rejecting non-finite location statistics.
    ///
    /// The model itself is validated by [`PriceModel::new`].
    pub fn new(
        model: PriceModel,
        encoders: CategoryEncoders,
        stats: LocationStatTable,
    ) -> Result<Self, IntegrityError> {
        if !stats.fallback().is_finite() {
            return Err(IntegrityError::NonFiniteFallback {
                value: stats.fallback(),
            });
        }
        for (city, value) in stats.iter() {
            if !value.is_finite() {
                return Err(IntegrityError::NonFiniteLocationStat {
                    city: city.to_owned(),
                    value,
                });
            }
        }

        Ok(Self {
            model,
            encoders,
            stats,
        })
    }

    #[inline]
    pub fn model(&self) -> &PriceModel {
        &self.model
    }

    #[inline]
    pub fn encoders(&self) -> &CategoryEncoders {
        &self.encoders
    }

    #[inline]
    pub fn stats(&self) -> &LocationStatTable {
        &self.stats
    }
}
