//! Payload structures shared by the binary and JSON bundle formats.
//!
//! These structs mirror the runtime types but are plain data: every field
//! serializes unconditionally so the same schema round-trips through both
//! Postcard and JSON. Conversion into runtime types performs full validation.

use serde::{Deserialize, Serialize};

use super::ModelBundle;
use crate::encode::{CategoricalField, CategoryEncoders, Vocabulary};
use crate::features::{FeatureField, N_FEATURES};
use crate::model::{IntegrityError, PriceModel};
use crate::repr::{Forest, NodeId, Tree};
use crate::stats::LocationStatTable;

/// Version-tagged payload for forward compatibility.
///
/// New format versions add variants; old readers reject unknown discriminants
/// during decoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    V1(PayloadV1),
}

/// Version 1 payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadV1 {
    /// Model column names, pinning the feature order the forest was trained
    /// with.
    pub feature_names: Vec<String>,
    pub forest: ForestPayload,
    pub vocabularies: VocabularyPayload,
    pub location_stats: LocationStatsPayload,
}

/// Tree ensemble payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestPayload {
    pub base_score: f32,
    pub trees: Vec<TreePayload>,
}

/// Single tree as parallel per-node arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreePayload {
    /// Split feature indices (one per node, 0 for leaves).
    pub split_indices: Vec<u32>,
    /// Split thresholds (one per node, 0.0 for leaves).
    pub thresholds: Vec<f32>,
    pub left_children: Vec<u32>,
    pub right_children: Vec<u32>,
    /// Default direction for missing values.
    pub default_left: Vec<bool>,
    pub is_leaf: Vec<bool>,
    /// Leaf values (0.0 for internal nodes).
    pub leaf_values: Vec<f32>,
    /// Cover at each node. Required: attribution depends on it.
    pub covers: Vec<f32>,
}

/// Labels for each categorical field, in code order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyPayload {
    pub city: Vec<String>,
    pub property_type: Vec<String>,
    pub furnished: Vec<String>,
    pub delivery_term: Vec<String>,
}

/// Per-city statistics, sorted by city for deterministic bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStatsPayload {
    pub entries: Vec<LocationStatEntry>,
    pub fallback: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStatEntry {
    pub city: String,
    pub value: f64,
}

// ============================================================================
// Runtime -> payload
// ============================================================================

fn tree_to_payload(tree: &Tree) -> TreePayload {
    let n_nodes = tree.n_nodes();
    let mut payload = TreePayload {
        split_indices: Vec::with_capacity(n_nodes),
        thresholds: Vec::with_capacity(n_nodes),
        left_children: Vec::with_capacity(n_nodes),
        right_children: Vec::with_capacity(n_nodes),
        default_left: Vec::with_capacity(n_nodes),
        is_leaf: Vec::with_capacity(n_nodes),
        leaf_values: Vec::with_capacity(n_nodes),
        // Empty only for hand-built trees without covers; rejected on load.
        covers: tree.covers().map(<[f32]>::to_vec).unwrap_or_default(),
    };
    for node in 0..n_nodes as NodeId {
        payload.split_indices.push(tree.split_index(node));
        payload.thresholds.push(tree.split_threshold(node));
        payload.left_children.push(tree.left_child(node));
        payload.right_children.push(tree.right_child(node));
        payload.default_left.push(tree.default_left(node));
        payload.is_leaf.push(tree.is_leaf(node));
        payload.leaf_values.push(tree.leaf_value(node));
    }
    payload
}

impl From<&ModelBundle> for PayloadV1 {
    fn from(bundle: &ModelBundle) -> Self {
        let forest = bundle.model().forest();
        let encoders = bundle.encoders();

        let labels =
            |field: CategoricalField| encoders.vocabulary(field).labels().to_vec();

        let mut entries: Vec<LocationStatEntry> = bundle
            .stats()
            .iter()
            .map(|(city, value)| LocationStatEntry {
                city: city.to_owned(),
                value,
            })
            .collect();
        entries.sort_by(|a, b| a.city.cmp(&b.city));

        Self {
            feature_names: FeatureField::ORDER
                .iter()
                .map(|field| field.name().to_owned())
                .collect(),
            forest: ForestPayload {
                base_score: forest.base_score(),
                trees: forest.trees().map(tree_to_payload).collect(),
            },
            vocabularies: VocabularyPayload {
                city: labels(CategoricalField::City),
                property_type: labels(CategoricalField::PropertyType),
                furnished: labels(CategoricalField::Furnished),
                delivery_term: labels(CategoricalField::DeliveryTerm),
            },
            location_stats: LocationStatsPayload {
                entries,
                fallback: bundle.stats().fallback(),
            },
        }
    }
}

// ============================================================================
// Payload -> runtime
// ============================================================================

fn tree_from_payload(tree_idx: usize, payload: TreePayload) -> Result<Tree, IntegrityError> {
    let n_nodes = payload.is_leaf.len();
    let consistent = payload.split_indices.len() == n_nodes
        && payload.thresholds.len() == n_nodes
        && payload.left_children.len() == n_nodes
        && payload.right_children.len() == n_nodes
        && payload.default_left.len() == n_nodes
        && payload.leaf_values.len() == n_nodes;
    if !consistent {
        return Err(IntegrityError::MalformedTreeArrays { tree: tree_idx });
    }

    Ok(Tree::new(
        payload.split_indices,
        payload.thresholds,
        payload.left_children,
        payload.right_children,
        payload.default_left,
        payload.is_leaf,
        payload.leaf_values,
    )
    .with_covers(payload.covers))
}

fn vocabulary_from_labels(
    field: CategoricalField,
    labels: Vec<String>,
) -> Result<Vocabulary, IntegrityError> {
    Vocabulary::from_labels(labels).map_err(|source| IntegrityError::Vocabulary {
        field: field.name(),
        source,
    })
}

impl TryFrom<PayloadV1> for ModelBundle {
    type Error = IntegrityError;

    fn try_from(payload: PayloadV1) -> Result<Self, Self::Error> {
        if payload.feature_names.len() != N_FEATURES {
            return Err(IntegrityError::WrongFeatureCount {
                expected: N_FEATURES,
                got: payload.feature_names.len(),
            });
        }
        for (index, (got, field)) in payload
            .feature_names
            .iter()
            .zip(FeatureField::ORDER)
            .enumerate()
        {
            if got != field.name() {
                return Err(IntegrityError::FeatureOrderMismatch {
                    index,
                    expected: field.name(),
                    got: got.clone(),
                });
            }
        }

        let mut forest = Forest::for_regression().with_base_score(payload.forest.base_score);
        for (tree_idx, tree) in payload.forest.trees.into_iter().enumerate() {
            forest.push_tree(tree_from_payload(tree_idx, tree)?);
        }
        let model = PriceModel::new(forest)?;

        let encoders = CategoryEncoders::new(
            vocabulary_from_labels(CategoricalField::City, payload.vocabularies.city)?,
            vocabulary_from_labels(
                CategoricalField::PropertyType,
                payload.vocabularies.property_type,
            )?,
            vocabulary_from_labels(CategoricalField::Furnished, payload.vocabularies.furnished)?,
            vocabulary_from_labels(
                CategoricalField::DeliveryTerm,
                payload.vocabularies.delivery_term,
            )?,
        );

        let mut stats = std::collections::HashMap::with_capacity(
            payload.location_stats.entries.len(),
        );
        for entry in payload.location_stats.entries {
            if stats.insert(entry.city.clone(), entry.value).is_some() {
                return Err(IntegrityError::DuplicateLocationStat { city: entry.city });
            }
        }
        let stats = LocationStatTable::new(stats, payload.location_stats.fallback);

        ModelBundle::new(model, encoders, stats)
    }
}
