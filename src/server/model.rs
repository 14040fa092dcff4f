//! A single trained, frozen model (§4.I "single-producer training phase
//! builds the model; thereafter the model is frozen and shared by
//! reference across many sessions"). Everything here is read-only once
//! constructed; a [`Session`](super::session::Session) holds an `Arc`
//! to it plus its own mutable scratchpad.

use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::bestarray::Decay;
use crate::distribution::Distribution;
use crate::instance::Instance;
use crate::metric::VectorMetric;
use crate::options::Algorithm;
use crate::options::Options;
use crate::search::Searcher;
use crate::symbol::FeatureTable;
use crate::symbol::TargetTable;
use crate::trie::algorithms;
use crate::trie::TrieRoot;

pub struct TrainedModel {
    pub name: String,
    pub trie: TrieRoot,
    pub features: FeatureTable,
    pub targets: TargetTable,
    pub metric: VectorMetric,
    pub default_options: Options,
    /// per-original-feature-index information-gain ratio, in the same
    /// order the trie's permutation reads them; only consulted by
    /// TRIBL2.
    pub gain_ratios: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ClassificationResult {
    pub category: String,
    pub distribution: Option<Distribution>,
    pub distance: Option<f64>,
}

impl TrainedModel {
    /// parses one instance line into feature values. The model is
    /// frozen and shared (`Arc`), so an unseen name can't be interned
    /// into its table; for a `Numeric`-kernel feature that's fine — the
    /// kernel computes distance from the literal reading directly (§8
    /// scenario 2: classify `6` against trained values `1, 2, 10, 11`)
    /// via [`crate::symbol::FeatureValue::raw_numeric`]. Any other
    /// kernel requires an exact match against the trained vocabulary.
    /// This is the wire-level counterpart of the out-of-scope bulk
    /// instance-file parser (§1), scoped to a single line.
    pub fn parse_query_instance(&self, fields: &[&str]) -> crate::Result<Vec<crate::symbol::FeatureValue>> {
        if fields.len() != self.features.len() {
            return Err(crate::MemlearnError::Classification(format!(
                "expected {} features, got {}",
                self.features.len(),
                fields.len()
            )));
        }
        fields
            .iter()
            .enumerate()
            .map(|(pos, name)| {
                if let Some(fv) = self.features.column(pos).lookup(name) {
                    return Ok(fv);
                }
                if matches!(self.metric.kernel(pos), crate::metric::Kernel::Numeric { .. }) {
                    if let Ok(value) = name.parse::<f64>() {
                        return Ok(crate::symbol::FeatureValue::raw_numeric(value));
                    }
                }
                Err(crate::MemlearnError::Classification(format!(
                    "unknown value {name:?} for feature position {pos}"
                )))
            })
            .collect()
    }

    pub fn classify(&self, options: &Options, feature_values: Vec<crate::symbol::FeatureValue>) -> ClassificationResult {
        let query = Instance::new(feature_values, dummy_target(&self.targets));
        let searcher = Searcher::new(&self.trie, &self.metric, &self.features, &self.targets);
        let mut rng = SmallRng::seed_from_u64(options.post.seed);

        let (dist, distance) = match options.algorithm {
            Algorithm::IgTree => {
                let dist = algorithms::igtree_classify(&self.trie, &query);
                (dist, None)
            }
            Algorithm::Tribl => {
                let switch_depth = self.trie.num_features() / 2;
                let dist = algorithms::tribl_classify(
                    &self.trie,
                    &query,
                    switch_depth,
                    &searcher,
                    options.post.k,
                    options.post.decay,
                );
                (dist, None)
            }
            Algorithm::Tribl2 => {
                let threshold = options
                    .pre
                    .ig_threshold
                    .map(|t| t as f64)
                    .unwrap_or(0.0);
                let dist = algorithms::tribl2_classify(
                    &self.trie,
                    &query,
                    &self.gain_ratios,
                    threshold,
                    &searcher,
                    options.post.k,
                    options.post.decay,
                );
                (dist, None)
            }
            // IB2's distinctive behavior is how its trie was *built*
            // (`trie::algorithms::build_ib2`'s bootstrap-then-insert-on-
            // misclassification pass, §4.D); once trained, classifying
            // against it is plain IB1 search.
            Algorithm::Ib1 | Algorithm::Ib2 => {
                let best = searcher.search(&query, options.post.k);
                let distance = best.distances().next();
                (best.extract(options.post.decay), distance)
            }
            // LOO/CV both classify by excluding the query's own exact
            // leaf contribution before voting (§4.B); this crate exposes
            // no batch N-fold evaluation command (§4.I only has
            // CLASSIFY/BASE/SET/QUERY/EXIT), so CV is treated as LOO's
            // degenerate single-fold case at the single-query level.
            Algorithm::Loo | Algorithm::Cv => {
                let best = searcher.search_excluding_self(&query, options.post.k);
                let distance = best.distances().next();
                (best.extract(options.post.decay), distance)
            }
        };

        let (best_target, _tied) = dist
            .best_target(false, &mut rng)
            .unwrap_or((dummy_target(&self.targets), false));
        ClassificationResult {
            category: self.targets.name(best_target).to_owned(),
            distribution: if options.pre.keep_distributions { Some(dist) } else { None },
            distance,
        }
    }
}

/// a placeholder target handle for the query instance, which has no
/// real label; `Instance` always carries a `TargetValue` slot, but
/// classification never reads it back.
fn dummy_target(targets: &TargetTable) -> crate::symbol::TargetValue {
    targets
        .reverse_lookup(1)
        .unwrap_or_else(|| panic!("model has no interned classes"))
}

pub type SharedModel = Arc<TrainedModel>;

/// standalone default-decay helper exposed for the HTTP layer, which
/// renders a distribution even when a session hasn't explicitly `SET`
/// a decay function.
pub fn default_decay() -> Decay {
    Decay::Zero
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Composition;
    use crate::metric::Kernel;
    use crate::symbol::FeatureValue;
    use crate::trie::TrieRoot;

    fn two_point_model() -> TrainedModel {
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
        TrainedModel {
            name: "loo".to_owned(),
            trie,
            features,
            targets,
            metric: VectorMetric::new(
                Composition::Additive,
                vec![Kernel::Overlap, Kernel::Overlap],
                vec![1.0, 1.0],
            )
            .unwrap(),
            default_options: Options::new(),
            gain_ratios: vec![1.0, 1.0],
        }
    }

    #[test]
    fn loo_and_cv_exclude_the_querys_own_leaf_unlike_ib1() {
        let model = two_point_model();
        let query: Vec<FeatureValue> = vec![
            model.features.column(0).lookup("0").unwrap(),
            model.features.column(1).lookup("0").unwrap(),
        ];

        let mut ib1 = Options::new();
        ib1.algorithm = Algorithm::Ib1;
        ib1.set_post(|p| p.k = 1);
        assert_eq!(model.classify(&ib1, query.clone()).category, "+");

        let mut loo = Options::new();
        loo.algorithm = Algorithm::Loo;
        loo.set_post(|p| p.k = 1);
        assert_eq!(model.classify(&loo, query.clone()).category, "-");

        let mut cv = Options::new();
        cv.algorithm = Algorithm::Cv;
        cv.set_post(|p| p.k = 1);
        assert_eq!(model.classify(&cv, query).category, "-");
    }
}
