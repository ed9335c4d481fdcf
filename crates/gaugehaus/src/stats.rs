//! Per-location price-per-square-meter statistics.
//!
//! The table maps a city label to the mean price per square meter observed at
//! training time. Cities that were in the categorical vocabulary but produced
//! no usable samples resolve to a global fallback (the median over all
//! samples), so a valid request can always be completed.

use std::collections::HashMap;

use tracing::warn;

/// City label to mean price-per-sqm, with a global fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationStatTable {
    stats: HashMap<String, f64>,
    fallback: f64,
}

impl LocationStatTable {
    pub fn new(stats: HashMap<String, f64>, fallback: f64) -> Self {
        Self { stats, fallback }
    }

    /// Build from `(city, price_per_sqm)` samples: per-city mean, global
    /// median as the fallback.
    ///
    /// An empty input produces an empty table with a zero fallback.
    pub fn from_samples<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
        let mut all: Vec<f64> = Vec::new();

        for (city, value) in samples {
            let entry = sums.entry(city.to_owned()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
            all.push(value);
        }

        let stats = sums
            .into_iter()
            .map(|(city, (sum, count))| (city, sum / count as f64))
            .collect();

        Self {
            stats,
            fallback: median(&mut all),
        }
    }

    /// Statistic for a city, falling back to the global median for cities
    /// without one.
    pub fn resolve(&self, city: &str) -> f64 {
        match self.stats.get(city) {
            Some(&value) => value,
            None => {
                warn!(
                    city = %city,
                    fallback = self.fallback,
                    "no location statistic for city, using global fallback"
                );
                self.fallback
            }
        }
    }

    /// Statistic for a city without applying the fallback.
    pub fn get(&self, city: &str) -> Option<f64> {
        self.stats.get(city).copied()
    }

    #[inline]
    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// Iterate over `(city, statistic)` entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.stats.iter().map(|(city, &value)| (city.as_str(), value))
    }
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
