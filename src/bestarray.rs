//! Bounded top-k neighbor container (§4.D). Admits candidates in
//! ascending-distance order, keeping every candidate within epsilon of
//! the current k-th best (ties are never silently dropped), and decays
//! admitted neighbors into a single [`Distribution`] when classification
//! needs a final vote.

use crate::distribution::Distribution;
use crate::symbol::TargetValue;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decay {
    /// every neighbor counts equally regardless of distance.
    Zero,
    /// weight = 1 / (rank + 1), rank being the neighbor's 0-based
    /// position in ascending-distance order.
    InverseLinear,
    /// weight = 1 / (distance + epsilon).
    InverseDistance,
    /// weight = exp(-alpha * distance).
    ExponentialDecay { alpha: f64 },
}

#[derive(Debug, Clone)]
struct Candidate {
    distance: f64,
    target: TargetValue,
    weight: f64,
}

/// a bounded, ascending-distance-ordered set of nearest neighbors. `k`
/// is the nominal size, but ties at the boundary mean `len()` can exceed
/// `k` (§4.D "tie-inclusive admission").
#[derive(Debug, Clone)]
pub struct BestArray {
    k: usize,
    entries: Vec<Candidate>,
}

impl BestArray {
    pub fn new(k: usize) -> Self {
        assert!(k > 0, "k must be positive");
        Self {
            k,
            entries: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// the distance beyond which a candidate cannot possibly be
    /// admitted: `+infinity` while the array isn't yet full, otherwise
    /// the current k-th smallest distance. The trie search uses this as
    /// its early-cutoff bound.
    pub fn threshold(&self) -> f64 {
        if self.entries.len() < self.k {
            f64::INFINITY
        } else {
            self.entries[self.k - 1].distance
        }
    }

    /// offers a candidate instance at `distance` with class `target` and
    /// exemplar `weight`. Admits it if the array isn't full yet, or if
    /// its distance is within epsilon of (or better than) the current
    /// threshold; evicts any entries that fall strictly outside the new
    /// k-th-distance boundary afterward.
    pub fn offer(&mut self, distance: f64, target: TargetValue, weight: f64) {
        let eps = crate::EPSILON as f64;
        if self.entries.len() >= self.k && distance > self.threshold() + eps {
            return;
        }
        let pos = self
            .entries
            .partition_point(|c| c.distance < distance - eps);
        self.entries.insert(
            pos,
            Candidate {
                distance,
                target,
                weight,
            },
        );
        if self.entries.len() > self.k {
            let boundary = self.entries[self.k - 1].distance;
            self.entries.retain(|c| c.distance <= boundary + eps);
        }
    }

    pub fn distances(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|c| c.distance)
    }

    /// decays every admitted neighbor into one vote distribution.
    pub fn extract(&self, decay: Decay) -> Distribution {
        let mut dist = Distribution::new();
        for (rank, candidate) in self.entries.iter().enumerate() {
            let w = candidate.weight
                * match decay {
                    Decay::Zero => 1.0,
                    Decay::InverseLinear => 1.0 / (rank as f64 + 1.0),
                    Decay::InverseDistance => 1.0 / (candidate.distance + crate::EPSILON as f64),
                    Decay::ExponentialDecay { alpha } => (-alpha * candidate.distance).exp(),
                };
            dist.inc(candidate.target, w);
        }
        dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::target::TargetTable;

    #[test]
    fn offer_keeps_k_smallest_in_ascending_order() {
        let mut targets = TargetTable::new();
        let a = targets.intern("a");
        let mut best = BestArray::new(2);
        best.offer(3.0, a, 1.0);
        best.offer(1.0, a, 1.0);
        best.offer(2.0, a, 1.0);
        assert_eq!(best.len(), 2);
        let ds: Vec<f64> = best.distances().collect();
        assert_eq!(ds, vec![1.0, 2.0]);
    }

    #[test]
    fn ties_at_the_boundary_are_all_kept() {
        let mut targets = TargetTable::new();
        let a = targets.intern("a");
        let mut best = BestArray::new(1);
        best.offer(1.0, a, 1.0);
        best.offer(1.0, a, 1.0);
        assert_eq!(best.len(), 2);
    }

    #[test]
    fn threshold_is_infinite_until_full() {
        let mut targets = TargetTable::new();
        let a = targets.intern("a");
        let mut best = BestArray::new(2);
        assert_eq!(best.threshold(), f64::INFINITY);
        best.offer(5.0, a, 1.0);
        assert_eq!(best.threshold(), f64::INFINITY);
        best.offer(5.0, a, 1.0);
        assert_eq!(best.threshold(), 5.0);
    }

    #[test]
    fn inverse_linear_decay_weights_closer_ranks_more() {
        let mut targets = TargetTable::new();
        let a = targets.intern("a");
        let b = targets.intern("b");
        let mut best = BestArray::new(2);
        best.offer(1.0, a, 1.0);
        best.offer(2.0, b, 1.0);
        let dist = best.extract(Decay::InverseLinear);
        assert!(dist.weight(a) > dist.weight(b));
    }
}
