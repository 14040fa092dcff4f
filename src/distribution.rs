//! Weighted multinomial over class labels (§4.B).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::error::MemlearnError;
use crate::error::Result;
use crate::symbol::target::TargetTable;
use crate::symbol::target::TargetValue;

/// A distribution over [`TargetValue`]s. Keyed by a `BTreeMap` so that
/// iteration is always in ascending label-index order, which both the
/// textual save format and the deterministic tie-break in
/// [`Distribution::best_target`] depend on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution(BTreeMap<TargetValue, f64>);

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// a "deleted" sentinel: present in the map but every weight is
    /// (within epsilon of) zero.
    pub fn is_zero(&self) -> bool {
        self.0.values().all(|&w| w.abs() <= crate::EPSILON as f64)
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn weight(&self, target: TargetValue) -> f64 {
        self.0.get(&target).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetValue, f64)> + '_ {
        self.0.iter().map(|(&t, &w)| (t, w))
    }

    pub fn inc(&mut self, target: TargetValue, weight: f64) {
        *self.0.entry(target).or_insert(0.0) += weight;
    }

    /// decrements `target`'s weight. Fails with
    /// [`MemlearnError::Distribution`] if doing so would drive the
    /// weight negative by more than [`crate::EPSILON`]; a result that
    /// is negative only by rounding noise is clamped to zero.
    pub fn dec(&mut self, target: TargetValue, weight: f64) -> Result<()> {
        let entry = self.0.entry(target).or_insert(0.0);
        let next = *entry - weight;
        if next < -(crate::EPSILON as f64) {
            return Err(MemlearnError::Distribution(format!(
                "decrementing target {} by {weight} would underflow (have {entry})",
                target.index()
            )));
        }
        *entry = next.max(0.0);
        Ok(())
    }

    /// pointwise sum of `other` into `self`.
    pub fn merge(&mut self, other: &Distribution) {
        for (&target, &weight) in other.0.iter() {
            *self.0.entry(target).or_insert(0.0) += weight;
        }
    }

    /// argmax over weights. `tied` is true when two or more weights are
    /// within epsilon of the maximum. With `random = false` the
    /// lowest-indexed tied target wins (first hit in ascending-index
    /// iteration); with `random = true` a uniform pick among the tied
    /// set wins, seeded from the caller-supplied rng.
    pub fn best_target(&self, random: bool, rng: &mut impl rand::Rng) -> Option<(TargetValue, bool)> {
        let max = self
            .0
            .values()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return None;
        }
        let eps = crate::EPSILON as f64;
        let tied: Vec<TargetValue> = self
            .0
            .iter()
            .filter(|&(_, &w)| (w - max).abs() <= eps)
            .map(|(&t, _)| t)
            .collect();
        let is_tied = tied.len() > 1;
        let winner = if random && is_tied {
            use rand::seq::IndexedRandom;
            *tied.choose(rng).expect("tied is non-empty")
        } else {
            tied[0]
        };
        Some((winner, is_tied))
    }

    /// promotes a count distribution to a weight distribution. Under
    /// this crate's unified f64 representation weights and counts share
    /// a storage type, so this is a defensive clone rather than a type
    /// change — kept as an explicit operation because callers (e.g. the
    /// IGTree top-distribution cache) rely on getting an owned copy
    /// that is safe to mutate independently of the source.
    pub fn to_weighted_copy(&self) -> Distribution {
        self.clone()
    }

    /// canonical textual form: `{ label count, label count, ... }` in
    /// ascending label index.
    pub fn save(&self, targets: &TargetTable) -> String {
        let mut out = String::from("{ ");
        for (i, (target, weight)) in self.0.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{} {}", targets.name(*target), weight);
        }
        out.push_str(" }");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn targets3() -> (TargetTable, TargetValue, TargetValue, TargetValue) {
        let mut t = TargetTable::new();
        let a = t.intern("a");
        let b = t.intern("b");
        let c = t.intern("c");
        (t, a, b, c)
    }

    #[test]
    fn inc_and_merge() {
        let (_, a, b, _) = targets3();
        let mut d1 = Distribution::new();
        d1.inc(a, 2.0);
        let mut d2 = Distribution::new();
        d2.inc(a, 1.0);
        d2.inc(b, 3.0);
        d1.merge(&d2);
        assert_eq!(d1.weight(a), 3.0);
        assert_eq!(d1.weight(b), 3.0);
    }

    #[test]
    fn dec_underflow_fails() {
        let (_, a, _, _) = targets3();
        let mut d = Distribution::new();
        d.inc(a, 1.0);
        assert!(d.dec(a, 5.0).is_err());
        assert!(d.dec(a, 1.0).is_ok());
        assert_eq!(d.weight(a), 0.0);
    }

    #[test]
    fn best_target_breaks_ties_on_lowest_index() {
        let (_, a, b, _) = targets3();
        let mut d = Distribution::new();
        d.inc(a, 1.0);
        d.inc(b, 1.0);
        let mut rng = rand::rngs::SmallRng::seed_from_u64(0);
        let (winner, tied) = d.best_target(false, &mut rng).unwrap();
        assert_eq!(winner, a);
        assert!(tied);
    }

    #[test]
    fn zero_distribution_is_deleted_sentinel() {
        let (_, a, _, _) = targets3();
        let mut d = Distribution::new();
        d.inc(a, 1.0);
        d.dec(a, 1.0).unwrap();
        assert!(d.is_zero());
    }
}
