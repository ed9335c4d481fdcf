//! Binary and JSON storage for model bundles.
//!
//! The binary format is a 32-byte header followed by a Postcard-encoded
//! [`Payload`]:
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("GHPB")
//! 4       1     Version major
//! 5       1     Version minor
//! 6       2     Reserved
//! 8       2     Flags (reserved, zero)
//! 10      2     Reserved
//! 12      4     Payload size (bytes, little-endian)
//! 16      4     CRC32 checksum of payload
//! 20      4     Number of features
//! 24      4     Number of trees
//! 28      4     Reserved
//! ```
//!
//! The JSON format serializes the same [`Payload`] tree and exists for
//! inspection and hand-editing during development.

use std::path::Path;

use thiserror::Error;
use tracing::info;

use super::schema::{Payload, PayloadV1};
use super::ModelBundle;
use crate::model::IntegrityError;

// ============================================================================
// Constants
// ============================================================================

/// Magic bytes identifying a bundle file.
pub const MAGIC: &[u8; 4] = b"GHPB";

/// Current format version (major).
pub const CURRENT_VERSION_MAJOR: u8 = 1;

/// Current format version (minor).
pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the format header in bytes.
pub const HEADER_SIZE: usize = 32;

// ============================================================================
// Format Header
// ============================================================================

/// Fixed-size header preceding the binary payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    /// Reserved bitfield, currently always zero.
    pub flags: u16,
    /// Size of the payload in bytes.
    pub payload_size: u32,
    /// CRC32 checksum of the payload.
    pub checksum: u32,
    /// Number of model input features.
    pub n_features: u32,
    /// Number of trees in the forest.
    pub n_trees: u32,
}

impl FormatHeader {
    /// Create a header with the current version and zeroed payload fields.
    pub fn new(n_features: u32, n_trees: u32) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            flags: 0,
            payload_size: 0,
            checksum: 0,
            n_features,
            n_trees,
        }
    }

    /// Serialize the header to its 32-byte form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        // 6..8 reserved
        buf[8..10].copy_from_slice(&self.flags.to_le_bytes());
        // 10..12 reserved
        buf[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf[20..24].copy_from_slice(&self.n_features.to_le_bytes());
        buf[24..28].copy_from_slice(&self.n_trees.to_le_bytes());
        // 28..32 reserved
        buf
    }

    /// Parse a header, checking magic and version compatibility.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, BundleReadError> {
        if &buf[0..4] != MAGIC {
            return Err(BundleReadError::NotABundle);
        }

        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(BundleReadError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }

        Ok(Self {
            version_major,
            version_minor,
            flags: u16::from_le_bytes([buf[8], buf[9]]),
            payload_size: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            checksum: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            n_features: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
            n_trees: u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]),
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors while writing a bundle.
#[derive(Debug, Error)]
pub enum BundleWriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors while reading a bundle.
#[derive(Debug, Error)]
pub enum BundleReadError {
    /// Wrong magic bytes.
    #[error("not a price model bundle")]
    NotABundle,

    #[error("bundle requires format version {major}.{minor} or later")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("bundle truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),

    #[error("JSON decoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bundle failed validation: {0}")]
    Integrity(#[from] IntegrityError),
}

// ============================================================================
// Binary codec
// ============================================================================

/// Serialize a bundle to the binary format.
pub fn to_bytes(bundle: &ModelBundle) -> Result<Vec<u8>, BundleWriteError> {
    let payload = Payload::V1(PayloadV1::from(bundle));
    let payload_bytes = postcard::to_allocvec(&payload)?;

    let mut header = FormatHeader::new(
        bundle.model().n_features() as u32,
        bundle.model().forest().n_trees() as u32,
    );
    header.payload_size = payload_bytes.len() as u32;
    header.checksum = crc32fast::hash(&payload_bytes);

    let mut out = Vec::with_capacity(HEADER_SIZE + payload_bytes.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&payload_bytes);
    Ok(out)
}

/// Deserialize and validate a bundle from the binary format.
pub fn from_bytes(bytes: &[u8]) -> Result<ModelBundle, BundleReadError> {
    if bytes.len() < HEADER_SIZE {
        return Err(BundleReadError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    let mut header_buf = [0u8; HEADER_SIZE];
    header_buf.copy_from_slice(&bytes[..HEADER_SIZE]);
    let header = FormatHeader::from_bytes(&header_buf)?;

    let expected_len = HEADER_SIZE + header.payload_size as usize;
    if bytes.len() < expected_len {
        return Err(BundleReadError::Truncated {
            expected: expected_len,
            actual: bytes.len(),
        });
    }
    let payload_bytes = &bytes[HEADER_SIZE..expected_len];

    let actual_checksum = crc32fast::hash(payload_bytes);
    if actual_checksum != header.checksum {
        return Err(BundleReadError::ChecksumMismatch {
            expected: header.checksum,
            actual: actual_checksum,
        });
    }

    let Payload::V1(payload) = postcard::from_bytes(payload_bytes)?;
    check_header_consistency(&header, &payload)?;

    Ok(ModelBundle::try_from(payload)?)
}

fn check_header_consistency(
    header: &FormatHeader,
    payload: &PayloadV1,
) -> Result<(), BundleReadError> {
    if header.n_features as usize != payload.feature_names.len() {
        return Err(BundleReadError::CorruptPayload(format!(
            "header declares {} features, payload has {}",
            header.n_features,
            payload.feature_names.len()
        )));
    }
    if header.n_trees as usize != payload.forest.trees.len() {
        return Err(BundleReadError::CorruptPayload(format!(
            "header declares {} trees, payload has {}",
            header.n_trees,
            payload.forest.trees.len()
        )));
    }
    Ok(())
}

// ============================================================================
// File-level API
// ============================================================================

/// Write a bundle to a binary file.
pub fn write_binary_file<P: AsRef<Path>>(
    bundle: &ModelBundle,
    path: P,
) -> Result<(), BundleWriteError> {
    let bytes = to_bytes(bundle)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Read and validate a bundle from a binary file.
pub fn read_binary_file<P: AsRef<Path>>(path: P) -> Result<ModelBundle, BundleReadError> {
    let bytes = std::fs::read(&path)?;
    let bundle = from_bytes(&bytes)?;
    info!(
        path = %path.as_ref().display(),
        n_trees = bundle.model().forest().n_trees(),
        "loaded price model bundle"
    );
    Ok(bundle)
}

/// Write a bundle as indented JSON.
pub fn write_json_file<P: AsRef<Path>>(
    bundle: &ModelBundle,
    path: P,
) -> Result<(), BundleWriteError> {
    let payload = Payload::V1(PayloadV1::from(bundle));
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), &payload)?;
    Ok(())
}

/// Read and validate a bundle from its JSON form.
pub fn read_json_file<P: AsRef<Path>>(path: P) -> Result<ModelBundle, BundleReadError> {
    let file = std::fs::File::open(&path)?;
    let payload: Payload = serde_json::from_reader(std::io::BufReader::new(file))?;
    let Payload::V1(payload) = payload;
    let bundle = ModelBundle::try_from(payload)?;
    info!(
        path = %path.as_ref().display(),
        n_trees = bundle.model().forest().n_trees(),
        "loaded price model bundle from JSON"
    );
    Ok(bundle)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn header_roundtrip() {
        let header = FormatHeader {
            version_major: 1,
            version_minor: 3,
            flags: 0,
            payload_size: 12345,
            checksum: 0xDEADBEEF,
            n_features: 9,
            n_trees: 40,
        };

        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(FormatHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn header_rejects_wrong_magic() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            FormatHeader::from_bytes(&buf),
            Err(BundleReadError::NotABundle)
        ));
    }

    #[test]
    fn header_rejects_future_version() {
        let mut header = FormatHeader::new(9, 1);
        header.version_major = 99;
        let bytes = header.to_bytes();
        assert!(matches!(
            FormatHeader::from_bytes(&bytes),
            Err(BundleReadError::UnsupportedVersion { major: 99, .. })
        ));
    }

    #[test]
    fn bytes_roundtrip() {
        let bundle = testing::synthetic_bundle(5);
        let bytes = to_bytes(&bundle).unwrap();
        let restored = from_bytes(&bytes).unwrap();

        assert_eq!(
            restored.model().forest().n_trees(),
            bundle.model().forest().n_trees()
        );
        assert_eq!(restored.encoders(), bundle.encoders());
    }

    #[test]
    fn serialization_is_deterministic() {
        let bundle = testing::synthetic_bundle(5);
        assert_eq!(to_bytes(&bundle).unwrap(), to_bytes(&bundle).unwrap());
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let bundle = testing::synthetic_bundle(5);
        let mut bytes = to_bytes(&bundle).unwrap();
        let target = HEADER_SIZE + 7;
        bytes[target] ^= 0xFF;

        assert!(matches!(
            from_bytes(&bytes),
            Err(BundleReadError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn truncation_detected() {
        let bundle = testing::synthetic_bundle(5);
        let bytes = to_bytes(&bundle).unwrap();

        assert!(matches!(
            from_bytes(&bytes[..10]),
            Err(BundleReadError::Truncated {
                expected: HEADER_SIZE,
                actual: 10
            })
        ));
        assert!(matches!(
            from_bytes(&bytes[..bytes.len() - 4]),
            Err(BundleReadError::Truncated { .. })
        ));
    }

    #[test]
    fn header_feature_count_cross_checked() {
        let bundle = testing::synthetic_bundle(5);
        let mut bytes = to_bytes(&bundle).unwrap();
        // Overwrite n_features in the header and fix nothing else: the
        // checksum covers only the payload, so this must be caught by the
        // consistency check.
        bytes[20..24].copy_from_slice(&100u32.to_le_bytes());

        assert!(matches!(
            from_bytes(&bytes),
            Err(BundleReadError::CorruptPayload(_))
        ));
    }
}
