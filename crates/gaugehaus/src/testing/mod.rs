//! Deterministic fixtures for tests and benchmarks.
//!
//! All generators are seeded: the same seed always produces the same forest,
//! bundle, or row block.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bundle::ModelBundle;
use crate::encode::{CategoryEncoders, Vocabulary};
use crate::features::{PropertyRequest, N_FEATURES};
use crate::model::PriceModel;
use crate::repr::{Forest, Tree};
use crate::stats::LocationStatTable;

/// City labels used by synthetic bundles. The last one deliberately gets no
/// location statistic so fallback resolution stays exercised.
pub const CITIES: &[&str] = &[
    "6th of October",
    "Alexandria",
    "Cairo",
    "Giza",
    "New Cairo - El Tagamoa",
];

pub const PROPERTY_TYPES: &[&str] = &[
    "Apartment",
    "Chalet",
    "Duplex",
    "Penthouse",
    "Studio",
    "Townhouse",
    "Twin House",
    "Villa",
];

pub const FURNISHED: &[&str] = &["No", "Yes"];

pub const DELIVERY_TERMS: &[&str] = &[
    "Core & Shell",
    "Finished",
    "Not Finished",
    "Semi Finished",
];

/// Plausible split threshold for a feature column.
fn threshold_for(rng: &mut StdRng, feature: usize) -> f32 {
    match feature {
        0 => rng.gen_range(0.5..7.5),
        1 => rng.gen_range(0.5..6.5),
        2 => rng.gen_range(0.5..5.5),
        3 => rng.gen_range(40.0..400.0),
        4 => rng.gen_range(0.3..0.8),
        5 => rng.gen_range(0.5..12.5),
        6 => rng.gen_range(0.5..3.5),
        7 => rng.gen_range(0.5..4.5),
        _ => rng.gen_range(4_000.0..30_000.0),
    }
}

/// Plausible encoded feature value for a column.
fn value_for(rng: &mut StdRng, feature: usize) -> f32 {
    match feature {
        0 => rng.gen_range(0..PROPERTY_TYPES.len() as u32) as f32,
        1 => rng.gen_range(0..7) as f32,
        2 => rng.gen_range(0..6) as f32,
        3 => rng.gen_range(40.0..400.0),
        4 => rng.gen_range(0..2) as f32,
        5 => rng.gen_range(0..13) as f32,
        6 => rng.gen_range(0..DELIVERY_TERMS.len() as u32) as f32,
        7 => rng.gen_range(0..CITIES.len() as u32) as f32,
        _ => rng.gen_range(4_000.0..30_000.0),
    }
}

#[allow(clippy::too_many_arguments)]
fn grow_node(
    rng: &mut StdRng,
    depth: usize,
    cover: f32,
    split_indices: &mut Vec<u32>,
    thresholds: &mut Vec<f32>,
    left_children: &mut Vec<u32>,
    right_children: &mut Vec<u32>,
    default_left: &mut Vec<bool>,
    is_leaf: &mut Vec<bool>,
    leaf_values: &mut Vec<f32>,
    covers: &mut Vec<f32>,
) -> u32 {
    let id = is_leaf.len() as u32;
    split_indices.push(0);
    thresholds.push(0.0);
    left_children.push(0);
    right_children.push(0);
    default_left.push(false);
    is_leaf.push(true);
    leaf_values.push(0.0);
    covers.push(cover);

    if depth == 0 || rng.gen_bool(0.2) {
        leaf_values[id as usize] = rng.gen_range(-40_000.0..80_000.0);
    } else {
        let fraction: f32 = rng.gen_range(0.2..0.8);
        let left = grow_node(
            rng,
            depth - 1,
            cover * fraction,
            split_indices,
            thresholds,
            left_children,
            right_children,
            default_left,
            is_leaf,
            leaf_values,
            covers,
        );
        let right = grow_node(
            rng,
            depth - 1,
            cover * (1.0 - fraction),
            split_indices,
            thresholds,
            left_children,
            right_children,
            default_left,
            is_leaf,
            leaf_values,
            covers,
        );

        let feature = rng.gen_range(0..N_FEATURES);
        split_indices[id as usize] = feature as u32;
        thresholds[id as usize] = threshold_for(rng, feature);
        left_children[id as usize] = left;
        right_children[id as usize] = right;
        default_left[id as usize] = rng.gen_bool(0.5);
        is_leaf[id as usize] = false;
    }

    id
}

/// A random, structurally valid tree with positive covers throughout.
pub fn synthetic_tree(rng: &mut StdRng, max_depth: usize) -> Tree {
    let mut split_indices = Vec::new();
    let mut thresholds = Vec::new();
    let mut left_children = Vec::new();
    let mut right_children = Vec::new();
    let mut default_left = Vec::new();
    let mut is_leaf = Vec::new();
    let mut leaf_values = Vec::new();
    let mut covers = Vec::new();

    grow_node(
        rng,
        max_depth,
        1_000.0,
        &mut split_indices,
        &mut thresholds,
        &mut left_children,
        &mut right_children,
        &mut default_left,
        &mut is_leaf,
        &mut leaf_values,
        &mut covers,
    );

    Tree::new(
        split_indices,
        thresholds,
        left_children,
        right_children,
        default_left,
        is_leaf,
        leaf_values,
    )
    .with_covers(covers)
}

/// A seeded forest over the nine-column price feature space.
pub fn synthetic_forest(n_trees: usize, max_depth: usize, seed: u64) -> Forest {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut forest = Forest::for_regression().with_base_score(1_000_000.0);
    for _ in 0..n_trees {
        forest.push_tree(synthetic_tree(&mut rng, max_depth));
    }
    forest
}

/// A complete, validated bundle: seeded forest, the fixture vocabularies,
/// and seeded location statistics.
pub fn synthetic_bundle(seed: u64) -> ModelBundle {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(0x5EED));
    let forest = synthetic_forest(8, 4, seed);
    let model = PriceModel::new(forest).expect("generated forest always validates");

    let vocab = |labels: &[&str]| {
        Vocabulary::from_labels(labels.iter().copied())
            .expect("fixture labels are unique and non-empty")
    };
    let encoders = CategoryEncoders::new(
        vocab(CITIES),
        vocab(PROPERTY_TYPES),
        vocab(FURNISHED),
        vocab(DELIVERY_TERMS),
    );

    // Two samples per city, except the last city which stays uncovered.
    let mut samples = Vec::new();
    for city in &CITIES[..CITIES.len() - 1] {
        samples.push((*city, rng.gen_range(5_000.0..25_000.0)));
        samples.push((*city, rng.gen_range(5_000.0..25_000.0)));
    }
    let stats = LocationStatTable::from_samples(samples);

    ModelBundle::new(model, encoders, stats).expect("generated bundle always validates")
}

/// A block of plausible pre-encoded feature rows.
pub fn synthetic_rows(n_rows: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((n_rows, N_FEATURES), |(_, feature)| {
        value_for(&mut rng, feature)
    })
}

/// A request every synthetic bundle accepts.
pub fn sample_request() -> PropertyRequest {
    PropertyRequest {
        city: "Cairo".to_owned(),
        property_type: "Apartment".to_owned(),
        furnished: "Yes".to_owned(),
        delivery_term: "Semi Finished".to_owned(),
        bedrooms: 3,
        bathrooms: 2,
        area: 150.0,
        level: 4,
    }
}
