/// Contribution of a single input feature to one prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureAttribution {
    /// Human-readable feature name.
    pub name: &'static str,
    /// Display form of the feature value, e.g. the original category label.
    pub value: String,
    /// Signed price contribution in output units.
    pub contribution: f64,
}

/// Per-feature contributions for one prediction, in input feature order.
///
/// The invariant `baseline + Σ contributions = prediction` holds to floating
/// point rounding; [`AttributionVector::verify`] checks it.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributionVector {
    baseline: f64,
    items: Vec<FeatureAttribution>,
}

impl AttributionVector {
    pub fn new(baseline: f64, items: Vec<FeatureAttribution>) -> Self {
        Self { baseline, items }
    }

    /// Expected prediction before any feature is known.
    #[inline]
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn items(&self) -> &[FeatureAttribution] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureAttribution> {
        self.items.iter()
    }

    /// Sum of all signed contributions.
    pub fn contribution_sum(&self) -> f64 {
        self.items.iter().map(|item| item.contribution).sum()
    }

    /// Prediction implied by the attribution.
    pub fn reconstructed_prediction(&self) -> f64 {
        self.baseline + self.contribution_sum()
    }

    /// Whether the attribution reconstructs `prediction` within `tolerance`.
    pub fn verify(&self, prediction: f64, tolerance: f64) -> bool {
        (self.reconstructed_prediction() - prediction).abs() <= tolerance
    }
}

impl<'a> IntoIterator for &'a AttributionVector {
    type Item = &'a FeatureAttribution;
    type IntoIter = std::slice::Iter<'a, FeatureAttribution>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample() -> AttributionVector {
        AttributionVector::new(
            100.0,
            vec![
                FeatureAttribution {
                    name: "Area",
                    value: "120".to_owned(),
                    contribution: 25.0,
                },
                FeatureAttribution {
                    name: "City",
                    value: "Alexandria".to_owned(),
                    contribution: -5.0,
                },
            ],
        )
    }

    #[test]
    fn reconstruction_sums_baseline_and_contributions() {
        let av = sample();
        assert_relative_eq!(av.contribution_sum(), 20.0);
        assert_relative_eq!(av.reconstructed_prediction(), 120.0);
    }

    #[test]
    fn verify_respects_tolerance() {
        let av = sample();
        assert!(av.verify(120.0, 1e-9));
        assert!(av.verify(120.1, 0.2));
        assert!(!av.verify(121.0, 0.5));
    }

    #[test]
    fn iterates_in_input_order() {
        let av = sample();
        let names: Vec<&str> = av.iter().map(|item| item.name).collect();
        assert_eq!(names, vec!["Area", "City"]);
    }
}
