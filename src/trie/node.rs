//! Trie node shape (§5): a tagged `Leaf`/`Branch` variant, children kept
//! in a [`BTreeMap`] so iteration is always in ascending feature-value
//! index order — required by both the save format and IGTree's
//! information-gain ordering of children.

use std::collections::BTreeMap;

use crate::distribution::Distribution;
use crate::symbol::FeatureValue;

#[derive(Debug, Clone)]
pub enum TrieNode {
    /// a fully specified instance path; holds the (possibly merged,
    /// possibly tombstoned-to-zero) class distribution of every
    /// instance that shares this path.
    Leaf(Distribution),
    /// an internal node. `distribution` is the aggregate over every
    /// leaf beneath it — kept current by [`super::root::TrieRoot::redo_distributions`]
    /// — and doubles as the default distribution handed to a search that
    /// falls off the trie at an unseen feature value.
    Branch {
        distribution: Distribution,
        children: BTreeMap<FeatureValue, TrieNode>,
    },
}

impl TrieNode {
    pub fn new_branch() -> Self {
        TrieNode::Branch {
            distribution: Distribution::new(),
            children: BTreeMap::new(),
        }
    }

    pub fn distribution(&self) -> &Distribution {
        match self {
            TrieNode::Leaf(d) => d,
            TrieNode::Branch { distribution, .. } => distribution,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TrieNode::Leaf(_))
    }

    /// recomputes `distribution` bottom-up. For a leaf this is a no-op;
    /// for a branch it sums the (already-recomputed) distributions of
    /// every child. Returns a reference to the now-current distribution.
    pub fn redo_distributions(&mut self) -> &Distribution {
        if let TrieNode::Branch { distribution, children } = self {
            let mut total = Distribution::new();
            for child in children.values_mut() {
                total.merge(child.redo_distributions());
            }
            *distribution = total;
        }
        self.distribution()
    }

    /// counts (leaves, branches) in the subtree rooted here.
    pub fn size_info(&self) -> (usize, usize) {
        match self {
            TrieNode::Leaf(_) => (1, 0),
            TrieNode::Branch { children, .. } => {
                let mut leaves = 0;
                let mut branches = 1;
                for child in children.values() {
                    let (l, b) = child.size_info();
                    leaves += l;
                    branches += b;
                }
                (leaves, branches)
            }
        }
    }

    /// counts leaves whose distribution has decayed to all-zero (§5
    /// "tombstoned deletions" — a deleted instance's leaf is zeroed
    /// rather than physically removed, so sibling paths stay intact).
    pub fn count_tombstoned(&self) -> usize {
        match self {
            TrieNode::Leaf(d) if d.is_zero() => 1,
            TrieNode::Leaf(_) => 0,
            TrieNode::Branch { children, .. } => {
                children.values().map(TrieNode::count_tombstoned).sum()
            }
        }
    }

    /// the IGTree compression rule (§4.D "Prune"): post-order, a leaf
    /// child is removed if its best target agrees with its parent's —
    /// the feature that distinguishes them carried no information. A
    /// branch left with no children after that is itself replaced by a
    /// leaf holding its own aggregate distribution. Idempotent: running
    /// it again finds nothing left to remove.
    pub fn prune(&mut self, rng: &mut impl rand::Rng) {
        if let TrieNode::Branch { distribution, children } = self {
            for child in children.values_mut() {
                child.prune(rng);
            }
            // a tied parent has no unambiguous "default" to compare a
            // child against, so a tie suppresses pruning at this level.
            let parent_best = distribution
                .best_target(false, rng)
                .filter(|&(_, tied)| !tied)
                .map(|(t, _)| t);
            children.retain(|_, child| match (child, parent_best) {
                (TrieNode::Leaf(child_dist), Some(pb)) => {
                    child_dist.best_target(false, rng).map(|(t, _)| t) != Some(pb)
                }
                _ => true,
            });
        }
        let collapse = matches!(self, TrieNode::Branch { children, .. } if children.is_empty());
        if collapse {
            let dist = self.distribution().clone();
            *self = TrieNode::Leaf(dist);
        }
    }
}
