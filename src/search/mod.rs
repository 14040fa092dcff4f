//! IB1 nearest-neighbor search over a [`TrieRoot`] (§6): a depth-first,
//! branch-and-bound walk that prunes any subtree whose partial distance
//! already exceeds the current k-th-best threshold. Functionally this
//! is the same backtracking the reference tester drives with an
//! explicit per-level iterator/skip/restart scratchpad; expressed here
//! as ordinary recursion, since Rust's call stack already gives us that
//! bookkeeping for free.

use crate::bestarray::BestArray;
use crate::instance::Instance;
use crate::metric::VectorMetric;
use crate::symbol::FeatureTable;
use crate::symbol::TargetTable;
use crate::trie::node::TrieNode;
use crate::trie::root::TrieRoot;

pub struct Searcher<'a> {
    trie: &'a TrieRoot,
    metric: &'a VectorMetric,
    features: &'a FeatureTable,
    targets: &'a TargetTable,
}

impl<'a> Searcher<'a> {
    pub fn new(
        trie: &'a TrieRoot,
        metric: &'a VectorMetric,
        features: &'a FeatureTable,
        targets: &'a TargetTable,
    ) -> Self {
        Self {
            trie,
            metric,
            features,
            targets,
        }
    }

    /// returns the k (or more, on a boundary tie) nearest neighbors of
    /// `instance`, transparently skipping tombstoned (zero-distribution)
    /// leaves as though they were never inserted.
    pub fn search(&self, instance: &Instance, k: usize) -> BestArray {
        let mut best = BestArray::new(k);
        self.visit(self.trie.root(), instance, 0, 0.0, &mut best, true, None);
        best
    }

    /// like [`Self::search`], but if `instance`'s own exact feature path
    /// is present in the trie, its own `(target, weight)` contribution is
    /// subtracted out of that leaf before its neighbors are offered —
    /// leave-one-out self-exclusion (§4.B). The trie itself is never
    /// mutated; the adjustment only exists for the duration of this call,
    /// which matters because a [`crate::trie::TrieRoot`] is shared
    /// read-only (`Arc`) across concurrently classifying sessions.
    pub fn search_excluding_self(&self, instance: &Instance, k: usize) -> BestArray {
        let mut best = BestArray::new(k);
        self.visit(self.trie.root(), instance, 0, 0.0, &mut best, true, Some(instance));
        best
    }

    /// same as [`Self::search`], but starting partway down the trie —
    /// the hand-off point TRIBL/TRIBL2 switch to k-NN search from.
    pub fn search_subtree(&self, node: &TrieNode, start_depth: usize, instance: &Instance, k: usize) -> BestArray {
        let mut best = BestArray::new(k);
        self.visit(node, instance, start_depth, 0.0, &mut best, true, None);
        best
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        &self,
        node: &TrieNode,
        instance: &Instance,
        depth: usize,
        acc: f64,
        best: &mut BestArray,
        exact_so_far: bool,
        exclude: Option<&Instance>,
    ) {
        match node {
            TrieNode::Leaf(dist) => {
                if dist.is_zero() {
                    return;
                }
                if exact_so_far {
                    if let Some(excluded) = exclude {
                        let mut adjusted = dist.clone();
                        let _ = adjusted.dec(excluded.target, excluded.weight);
                        if adjusted.is_zero() {
                            return;
                        }
                        for (target, weight) in adjusted.iter() {
                            best.offer(acc, target, weight);
                        }
                        return;
                    }
                }
                for (target, weight) in dist.iter() {
                    best.offer(acc, target, weight);
                }
            }
            TrieNode::Branch { children, distribution } => {
                if children.is_empty() {
                    if !distribution.is_zero() {
                        for (target, weight) in distribution.iter() {
                            best.offer(acc, target, weight);
                        }
                    }
                    return;
                }
                let permutation = self.trie.permutation();
                let test_value = instance.at(depth, permutation);
                let original = if permutation.is_empty() { depth } else { permutation[depth] };
                let column = self.features.column(original);

                // exact match first, then every other child in ascending
                // partial-distance order, so the tightest threshold is
                // established as early as possible and prunes the rest.
                let mut ordered: Vec<_> = children
                    .iter()
                    .map(|(&value, child)| {
                        let d = self.metric.feature_distance(depth, test_value, value, column, self.targets);
                        (value != test_value, d, child)
                    })
                    .collect();
                ordered.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.partial_cmp(&b.1).unwrap()));

                let eps = crate::EPSILON as f64;
                for (differs, d, child) in ordered {
                    let next_acc = acc + d;
                    if best.len() >= 1 && next_acc > best.threshold() + eps {
                        continue;
                    }
                    self.visit(child, instance, depth + 1, next_acc, best, exact_so_far && !differs, exclude);
                }
            }
        }
    }
}
