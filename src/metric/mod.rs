//! §4.C Distance kernels and their whole-vector composition.
//!
//! A [`VectorMetric`] picks, per feature column, the [`Kernel`] that
//! produces that feature's contribution, multiplies it by the
//! feature's weight, and sums — with an early-cutoff short circuit once
//! the running total exceeds the best-so-far threshold, mirroring how
//! `DistanceTester` in the reference implementation bails out of a
//! comparison early rather than scoring every feature.
//!
//! [`Composition::DotProduct`] and [`Composition::Cosine`] are the
//! exception: they score the whole feature vector in one shot and
//! require every per-feature kernel to be [`Kernel::Ignore`] (§4.H).

pub mod kernel;

pub use kernel::Kernel;
pub use kernel::MvdmDefault;

use crate::instance::Instance;
use crate::symbol::FeatureTable;
use crate::symbol::TargetTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    /// sum of per-feature weighted kernel distances.
    Additive,
    /// whole-vector dot product; larger is "closer", so the trie search
    /// negates it before comparing against the best-array threshold.
    DotProduct,
    /// cosine similarity, same sign convention as [`Composition::DotProduct`].
    Cosine,
}

#[derive(Debug, Clone)]
pub struct VectorMetric {
    composition: Composition,
    kernels: Vec<Kernel>,
    weights: Vec<f64>,
}

impl VectorMetric {
    pub fn new(composition: Composition, kernels: Vec<Kernel>, weights: Vec<f64>) -> crate::Result<Self> {
        if kernels.len() != weights.len() {
            return Err(crate::MemlearnError::Config(
                crate::error::ConfigError::IllegalCombination(
                    "per-feature kernel and weight vectors must be the same length".into(),
                ),
            ));
        }
        if !matches!(composition, Composition::Additive)
            && !kernels.iter().all(|k| matches!(k, Kernel::Ignore))
        {
            return Err(crate::MemlearnError::Config(
                crate::error::ConfigError::IllegalCombination(
                    "DotProduct/Cosine composition requires every per-feature metric to be Ignore".into(),
                ),
            ));
        }
        Ok(Self {
            composition,
            kernels,
            weights,
        })
    }

    pub fn num_features(&self) -> usize {
        self.kernels.len()
    }

    pub fn composition(&self) -> Composition {
        self.composition
    }

    pub fn kernel(&self, pos: usize) -> &Kernel {
        &self.kernels[pos]
    }

    /// one feature's weighted contribution to the additive distance;
    /// the primitive the trie search's branch-and-bound walk prunes on.
    pub fn feature_distance(
        &self,
        pos: usize,
        a: crate::symbol::FeatureValue,
        b: crate::symbol::FeatureValue,
        table: &crate::symbol::FeatureValueTable,
        targets: &TargetTable,
    ) -> f64 {
        self.weights[pos] * self.kernels[pos].distance(a, b, table, targets)
    }

    /// full, non-short-circuited distance between two instances, used by
    /// exhaustive comparisons (e.g. tests and `LOO`/`CV` bookkeeping).
    pub fn distance(
        &self,
        a: &Instance,
        b: &Instance,
        permutation: &[usize],
        features: &FeatureTable,
        targets: &TargetTable,
    ) -> f64 {
        match self.composition {
            Composition::Additive => {
                self.additive(a, b, permutation, features, targets, f64::INFINITY).0
            }
            Composition::DotProduct => -self.dot_product(a, b, permutation, features),
            Composition::Cosine => -self.cosine(a, b, permutation, features),
        }
    }

    /// additive distance with early cutoff: stops accumulating and
    /// returns as soon as the running total exceeds `cutoff`, along with
    /// the number of features actually scored (the stop index used by
    /// the trie search to decide how far up the path it must backtrack).
    pub fn additive(
        &self,
        a: &Instance,
        b: &Instance,
        permutation: &[usize],
        features: &FeatureTable,
        targets: &TargetTable,
        cutoff: f64,
    ) -> (f64, usize) {
        let mut total = 0.0;
        for pos in 0..self.kernels.len() {
            let av = a.at(pos, permutation);
            let bv = b.at(pos, permutation);
            let original = if permutation.is_empty() { pos } else { permutation[pos] };
            let column = features.column(original);
            let d = self.kernels[pos].distance(av, bv, column, targets);
            total += self.weights[pos] * d;
            if total > cutoff {
                return (total, pos + 1);
            }
        }
        (total, self.kernels.len())
    }

    fn dot_product(&self, a: &Instance, b: &Instance, permutation: &[usize], features: &FeatureTable) -> f64 {
        let mut total = 0.0;
        for pos in 0..self.kernels.len() {
            let av: f64 = numeric_component(a, pos, permutation, features);
            let bv: f64 = numeric_component(b, pos, permutation, features);
            total += self.weights[pos] * av * bv;
        }
        total
    }

    fn cosine(&self, a: &Instance, b: &Instance, permutation: &[usize], features: &FeatureTable) -> f64 {
        let dot = self.dot_product(a, b, permutation, features);
        let norm_a: f64 = (0..self.kernels.len())
            .map(|p| numeric_component(a, p, permutation, features).powi(2))
            .sum::<f64>()
            .sqrt();
        let norm_b: f64 = (0..self.kernels.len())
            .map(|p| numeric_component(b, p, permutation, features).powi(2))
            .sum::<f64>()
            .sqrt();
        let denom = norm_a * norm_b;
        if denom <= crate::EPSILON as f64 {
            0.0
        } else {
            dot / denom
        }
    }
}

/// DotProduct/Cosine operate on raw numeric components — the same
/// reading `Kernel::Numeric` uses, not the feature value's interning
/// order (which only reflects first-occurrence during training and has
/// no relation to magnitude).
fn numeric_component(instance: &Instance, pos: usize, permutation: &[usize], features: &FeatureTable) -> f64 {
    let value = instance.at(pos, permutation);
    let original = if permutation.is_empty() { pos } else { permutation[pos] };
    kernel::numeric_reading(value, features.column(original))
}
