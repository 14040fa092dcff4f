//! Owns the trie's root node plus the feature-order permutation every
//! path through it is indexed by (§5).

use rand::SeedableRng;

use crate::distribution::Distribution;
use crate::error::MemlearnError;
use crate::instance::Instance;
use crate::trie::node::TrieNode;

/// whether a branch's default distribution (handed to a search that
/// falls off the trie at an unseen value) is materialized permanently
/// or only computed transiently for the duration of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultsMode {
    /// default distributions are kept after use and therefore survive
    /// a save/load round trip.
    Persistent,
    /// defaults are read off the live `distribution` field during a
    /// search and never separately stored; equivalent to calling
    /// [`TrieRoot::redo_distributions`] without retaining anything extra.
    Transferred,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SizeInfo {
    pub leaves: usize,
    pub branches: usize,
    pub tombstoned: usize,
    /// nodes (leaves + branches) right before the first `prune()` call;
    /// `None` if the trie has never been pruned.
    pub nodes_before_prune: Option<usize>,
    /// `100 * (1 - current_nodes / nodes_before_prune)`; `0.0` if never pruned.
    pub compression_pct: f64,
}

#[derive(Debug, Clone)]
pub struct TrieRoot {
    root: TrieNode,
    /// permuted-position -> original feature index. Empty means
    /// identity order (features tried in declaration order).
    permutation: Vec<usize>,
    num_features: usize,
    nodes_before_prune: Option<usize>,
}

impl TrieRoot {
    pub fn new(num_features: usize) -> Self {
        Self {
            root: TrieNode::new_branch(),
            permutation: Vec::new(),
            num_features,
            nodes_before_prune: None,
        }
    }

    pub fn with_permutation(num_features: usize, permutation: Vec<usize>) -> Self {
        assert!(
            permutation.is_empty() || permutation.len() == num_features,
            "permutation must cover every feature"
        );
        Self {
            root: TrieNode::new_branch(),
            permutation,
            num_features,
            nodes_before_prune: None,
        }
    }

    /// rebuilds a [`TrieRoot`] around an already-parsed tree, used by
    /// the save-file loaders in [`crate::trie::serialize`].
    pub fn from_parts(root: TrieNode, permutation: Vec<usize>, num_features: usize) -> Self {
        Self {
            root,
            permutation,
            num_features,
            nodes_before_prune: None,
        }
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn root(&self) -> &TrieNode {
        &self.root
    }

    /// inserts one instance, merging its weight into the existing leaf
    /// distribution if an identical feature path is already present.
    /// Returns `true` when the leaf had no prior weight for this
    /// instance's target (new information, or a value not seen on this
    /// exact path before) and `false` when it's an exact duplicate of an
    /// already-present `(path, target)` — the signal IB2 bootstrapping
    /// reads to decide whether an instance is worth keeping.
    pub fn insert(&mut self, instance: &Instance) -> bool {
        let mut node = &mut self.root;
        for pos in 0..self.num_features {
            let value = instance.at(pos, &self.permutation);
            let is_last = pos + 1 == self.num_features;
            node = descend_or_create(node, value, is_last);
        }
        match node {
            TrieNode::Leaf(d) => {
                let is_new = d.weight(instance.target) <= crate::EPSILON as f64;
                d.inc(instance.target, instance.weight);
                is_new
            }
            TrieNode::Branch { .. } => unreachable!("last step always produces a leaf"),
        }
    }

    /// un-does one instance's contribution. Rather than physically
    /// removing the leaf (which would require re-linking siblings), the
    /// leaf's distribution is decremented in place — it may become a
    /// zero ("tombstoned") leaf that the search layer treats as absent.
    pub fn remove(&mut self, instance: &Instance) -> crate::Result<()> {
        let mut node = &mut self.root;
        for pos in 0..self.num_features {
            let value = instance.at(pos, &self.permutation);
            node = match node {
                TrieNode::Branch { children, .. } => children.get_mut(&value).ok_or_else(|| {
                    MemlearnError::Classification(format!(
                        "cannot remove instance: no path for feature position {pos}"
                    ))
                })?,
                TrieNode::Leaf(_) => {
                    return Err(MemlearnError::Classification(
                        "cannot remove instance: path ends before last feature".into(),
                    ))
                }
            };
        }
        match node {
            TrieNode::Leaf(d) => d.dec(instance.target, instance.weight),
            TrieNode::Branch { .. } => Err(MemlearnError::Classification(
                "cannot remove instance: path does not reach a leaf".into(),
            )),
        }
    }

    pub fn redo_distributions(&mut self) {
        self.root.redo_distributions();
    }

    /// applies [`DefaultsMode`]: recomputes every branch's aggregate
    /// distribution and, in `Transferred` mode, leaves nothing else
    /// behind (the aggregate *is* the default, computed fresh every
    /// time); `Persistent` is semantically identical here because this
    /// crate always stores the aggregate inline, but the distinction is
    /// surfaced so callers can decide whether to re-run this before
    /// every save (`Transferred`) or once after training (`Persistent`).
    pub fn assign_defaults(&mut self, mode: DefaultsMode) {
        self.root.redo_distributions();
        let _ = mode;
    }

    /// IGTree compression (§5/§0.5 `getSizeInfo`): collapses pure
    /// branches into leaves. Snapshots the pre-prune node count the
    /// first time it's called, so [`Self::size_info`] can report how
    /// much the tree shrank.
    pub fn prune(&mut self) {
        if self.nodes_before_prune.is_none() {
            let (leaves, branches) = self.root.size_info();
            self.nodes_before_prune = Some(leaves + branches);
        }
        let mut rng = rand::rngs::SmallRng::seed_from_u64(0);
        self.root.prune(&mut rng);
    }

    pub fn size_info(&self) -> SizeInfo {
        let (leaves, branches) = self.root.size_info();
        let current = leaves + branches;
        let compression_pct = match self.nodes_before_prune {
            Some(before) if before > 0 => 100.0 * (1.0 - current as f64 / before as f64),
            _ => 0.0,
        };
        SizeInfo {
            leaves,
            branches,
            tombstoned: self.root.count_tombstoned(),
            nodes_before_prune: self.nodes_before_prune,
            compression_pct,
        }
    }

    /// top-level distribution: the vote an instance with every feature
    /// unseen would get (§5 "summarize_nodes" / IGTree's depth-0 default).
    pub fn summarize(&self) -> &Distribution {
        self.root.distribution()
    }

    /// re-derives every feature value's per-class distribution and
    /// frequency from the trie's own leaves, and writes them back into
    /// `features` via [`crate::symbol::value::FeatureValueTable::reconstruct_distribution`].
    /// MVDM and Jeffrey-divergence kernels read those statistics, but
    /// nothing populates them as instances are inserted (insertion only
    /// touches the trie); call this once after training, or after
    /// loading a saved trie, before classifying with either kernel.
    pub fn rebuild_value_statistics(&self, features: &mut crate::symbol::FeatureTable) {
        let mut accumulator: std::collections::BTreeMap<(usize, crate::symbol::FeatureValue), Distribution> =
            std::collections::BTreeMap::new();
        collect_value_statistics(&self.root, 0, &mut accumulator);
        for ((pos, value), dist) in accumulator {
            features.column_mut(pos).reconstruct_distribution(value, dist);
        }
    }
}

fn collect_value_statistics(
    node: &TrieNode,
    depth: usize,
    accumulator: &mut std::collections::BTreeMap<(usize, crate::symbol::FeatureValue), Distribution>,
) {
    if let TrieNode::Branch { children, .. } = node {
        for (&value, child) in children {
            accumulator
                .entry((depth, value))
                .or_default()
                .merge(child.distribution());
            collect_value_statistics(child, depth + 1, accumulator);
        }
    }
}

fn descend_or_create(node: &mut TrieNode, value: crate::symbol::FeatureValue, is_last: bool) -> &mut TrieNode {
    if let TrieNode::Leaf(d) = node {
        // a shorter instance already terminated here; promote to a
        // branch, keeping its distribution as the new branch's default.
        let carried = d.clone();
        *node = TrieNode::Branch {
            distribution: carried,
            children: Default::default(),
        };
    }
    match node {
        TrieNode::Branch { children, .. } => children.entry(value).or_insert_with(|| {
            if is_last {
                TrieNode::Leaf(Distribution::new())
            } else {
                TrieNode::new_branch()
            }
        }),
        TrieNode::Leaf(_) => unreachable!("just promoted above"),
    }
}
