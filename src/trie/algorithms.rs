//! Trie-traversal classification algorithms (§6) that don't need a full
//! nearest-neighbor search: IGTree follows the path to its end and
//! returns whatever distribution it lands on; TRIBL and TRIBL2 follow
//! an IGTree-style path partway down, then hand off to the k-NN
//! [`Searcher`] for the remaining, less-informative features.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::bestarray::Decay;
use crate::distribution::Distribution;
use crate::instance::Instance;
use crate::metric::VectorMetric;
use crate::search::Searcher;
use crate::symbol::FeatureTable;
use crate::symbol::TargetTable;
use crate::trie::node::TrieNode;
use crate::trie::root::TrieRoot;

/// IGTree classification: descend the trie along the test instance's
/// feature path, stopping at the first unseen value (returning that
/// node's default distribution) or at a leaf (returning its distribution).
pub fn igtree_classify(trie: &TrieRoot, instance: &Instance) -> Distribution {
    let mut node = trie.root();
    for pos in 0..trie.num_features() {
        match node {
            TrieNode::Leaf(d) => return d.clone(),
            TrieNode::Branch { children, distribution } => {
                let value = instance.at(pos, trie.permutation());
                match children.get(&value) {
                    Some(child) => node = child,
                    None => return distribution.clone(),
                }
            }
        }
    }
    node.distribution().clone()
}

/// walks an IGTree-style path for `switch_depth` features, then runs a
/// full k-NN search over the subtree reached for the remaining ones.
pub fn tribl_classify(
    trie: &TrieRoot,
    instance: &Instance,
    switch_depth: usize,
    searcher: &Searcher,
    k: usize,
    decay: Decay,
) -> Distribution {
    let (node, depth) = descend(trie, instance, switch_depth);
    match node {
        TrieNode::Leaf(d) => d.clone(),
        TrieNode::Branch { .. } => searcher.search_subtree(node, depth, instance, k).extract(decay),
    }
}

/// like [`tribl_classify`], but the switch point is wherever the
/// per-feature information-gain ratio (supplied in the trie's
/// permutation order) first falls below `threshold`, rather than a
/// fixed depth.
pub fn tribl2_classify(
    trie: &TrieRoot,
    instance: &Instance,
    gain_ratios: &[f64],
    threshold: f64,
    searcher: &Searcher,
    k: usize,
    decay: Decay,
) -> Distribution {
    let switch_depth = gain_ratios
        .iter()
        .position(|&g| g < threshold)
        .unwrap_or(gain_ratios.len());
    tribl_classify(trie, instance, switch_depth, searcher, k, decay)
}

/// IB2 training (§4.D, §8 boundary case): the first `bootstrap`
/// instances that register as new information (`TrieRoot::insert`
/// returning `true`) are inserted unconditionally. Every instance after
/// that is classified against the trie built so far, with the same
/// IB1 search the finished model uses at query time, and is inserted
/// only when that classification disagrees with its own label. Leaf
/// count therefore grows monotonically and plateaus once the trie
/// covers enough of the instance space to classify new instances
/// correctly on its own.
#[allow(clippy::too_many_arguments)]
pub fn build_ib2(
    instances: &[Instance],
    num_features: usize,
    bootstrap: usize,
    metric: &VectorMetric,
    features: &FeatureTable,
    targets: &TargetTable,
    k: usize,
    decay: Decay,
    seed: u64,
) -> TrieRoot {
    let mut trie = TrieRoot::new(num_features);
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut bootstrapped = 0usize;

    for instance in instances {
        if bootstrapped < bootstrap {
            if trie.insert(instance) {
                bootstrapped += 1;
            }
            continue;
        }
        let searcher = Searcher::new(&trie, metric, features, targets);
        let dist = searcher.search(instance, k).extract(decay);
        let predicted = dist.best_target(false, &mut rng).map(|(t, _)| t);
        if predicted != Some(instance.target) {
            trie.insert(instance);
        }
    }
    trie.redo_distributions();
    trie
}

fn descend<'a>(trie: &'a TrieRoot, instance: &Instance, switch_depth: usize) -> (&'a TrieNode, usize) {
    let mut node = trie.root();
    let mut depth = 0;
    while depth < switch_depth {
        match node {
            TrieNode::Leaf(_) => break,
            TrieNode::Branch { children, .. } => {
                let value = instance.at(depth, trie.permutation());
                match children.get(&value) {
                    Some(child) => {
                        node = child;
                        depth += 1;
                    }
                    None => break,
                }
            }
        }
    }
    (node, depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Composition;
    use crate::metric::Kernel;
    use crate::metric::VectorMetric;
    use crate::symbol::target::TargetTable;
    use crate::symbol::FeatureTable;

    fn two_feature_trie() -> (TrieRoot, FeatureTable, TargetTable, Instance) {
        let mut features = FeatureTable::new(&["a".into(), "b".into()]);
        let v0a = features.intern(0, "0");
        let v1a = features.intern(0, "1");
        let v0b = features.intern(1, "0");
        let v1b = features.intern(1, "1");
        let mut targets = TargetTable::new();
        let pos = targets.intern("+");
        let neg = targets.intern("-");
        let mut trie = TrieRoot::new(2);
        trie.insert(&Instance::new(vec![v0a, v0b], pos));
        trie.insert(&Instance::new(vec![v1a, v1b], neg));
        trie.redo_distributions();
        let query = Instance::new(vec![v0a, v0b], pos);
        (trie, features, targets, query)
    }

    #[test]
    fn igtree_returns_exact_leaf_when_path_is_known() {
        let (trie, _, targets, query) = two_feature_trie();
        let dist = igtree_classify(&trie, &query);
        let pos = targets.lookup("+").unwrap();
        assert_eq!(dist.weight(pos), 1.0);
    }

    #[test]
    fn igtree_falls_back_to_default_on_unseen_value() {
        let (trie, mut features, targets, _) = two_feature_trie();
        let unseen = features.intern(0, "unknown");
        let pos = targets.lookup("+").unwrap();
        let query = Instance::new(vec![unseen, unseen], pos);
        let dist = igtree_classify(&trie, &query);
        assert_eq!(dist.total(), 2.0);
    }

    #[test]
    fn build_ib2_grows_monotonically_then_plateaus() {
        let mut features = FeatureTable::new(&["a".into(), "b".into()]);
        let v0a = features.intern(0, "0");
        let v1a = features.intern(0, "1");
        let v0b = features.intern(1, "0");
        let v1b = features.intern(1, "1");
        let mut targets = TargetTable::new();
        let pos = targets.intern("+");
        let neg = targets.intern("-");
        let metric = VectorMetric::new(
            Composition::Additive,
            vec![Kernel::Overlap, Kernel::Overlap],
            vec![1.0, 1.0],
        )
        .unwrap();

        let pass = vec![
            Instance::new(vec![v0a, v0b], neg),
            Instance::new(vec![v0a, v1b], pos),
            Instance::new(vec![v1a, v0b], pos),
            Instance::new(vec![v1a, v1b], neg),
        ];
        let mut stream = pass.clone();
        stream.extend(pass.clone());
        stream.extend(pass.clone());

        let bootstrap = 2;
        let leaf_counts: Vec<usize> = [4, 8, 12]
            .iter()
            .map(|&n| {
                build_ib2(&stream[..n], 2, bootstrap, &metric, &features, &targets, 1, Decay::Zero, 0)
                    .size_info()
                    .leaves
            })
            .collect();

        assert!(leaf_counts[0] <= leaf_counts[1]);
        assert!(leaf_counts[1] <= leaf_counts[2]);
        // every instance in `pass` is already classified correctly after
        // one full pass, so a second and third pass insert nothing new.
        assert_eq!(leaf_counts[1], leaf_counts[2]);
        assert_eq!(leaf_counts[1], 4);
    }

    #[test]
    fn tribl_with_zero_switch_depth_behaves_like_full_search() {
        let (trie, features, targets, query) = two_feature_trie();
        let metric = VectorMetric::new(
            Composition::Additive,
            vec![Kernel::Overlap, Kernel::Overlap],
            vec![1.0, 1.0],
        )
        .unwrap();
        let searcher = Searcher::new(&trie, &metric, &features, &targets);
        let dist = tribl_classify(&trie, &query, 0, &searcher, 1, Decay::Zero);
        let pos = targets.lookup("+").unwrap();
        assert_eq!(dist.weight(pos), 1.0);
    }
}
