//! §4.H Options state: the declarative configuration record, its
//! single-assignment/overridable field split, and the pairwise
//! validation that runs identically whether the options came from the
//! CLI, a persisted trie header, or a session `SET` command (§9
//! "duck-typed option parsing" redesign note).

use crate::bestarray::Decay;
use crate::error::ConfigError;
use crate::metric::Composition;
use crate::metric::MvdmDefault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Ib1,
    Ib2,
    Loo,
    Cv,
    IgTree,
    Tribl,
    Tribl2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Columns,
    Sparse,
    SparseBinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    None,
    Gainratio,
    InfoGain,
    ChiSquare,
    SharedVariance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    None,
    MinMax,
    ZScore,
}

/// per-feature-metric slots the pre-realization validator checks
/// combinations of (§4.H "Cosine/DotProduct may only combine with
/// per-feature metric Ignore").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerFeatureMetric {
    Overlap,
    ValueDiff,
    JeffreyDiv,
    Numeric,
    Levenshtein,
    Ignore,
}

/// fields that may only be set before the model is first realized
/// (§3 Options, §4.H phase 1).
#[derive(Debug, Clone)]
pub struct PreRealization {
    pub input_format: InputFormat,
    pub num_features: Option<usize>,
    pub target_position: TargetPosition,
    pub tree_order: Weighting,
    pub keep_distributions: bool,
    pub ig_threshold: Option<usize>,
    pub exemplar_weights: bool,
    pub global_composition: Composition,
    pub per_feature_metric: Vec<PerFeatureMetric>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPosition {
    Last,
    First,
    At(usize),
}

impl Default for PreRealization {
    fn default() -> Self {
        Self {
            input_format: InputFormat::Columns,
            num_features: None,
            target_position: TargetPosition::Last,
            tree_order: Weighting::None,
            keep_distributions: true,
            ig_threshold: None,
            exemplar_weights: false,
            global_composition: Composition::Additive,
            per_feature_metric: Vec::new(),
        }
    }
}

/// fields overridable per session after realization (§4.H phase 2).
#[derive(Debug, Clone)]
pub struct Overridable {
    pub k: usize,
    pub decay: Decay,
    pub weights: Vec<f64>,
    pub verbosity: u32,
    pub mvdm_threshold: usize,
    pub mvdm_default: MvdmDefault,
    pub bin_size: usize,
    pub beam_size: Option<usize>,
    pub ib2_bootstrap: usize,
    pub clip_frequency: usize,
    pub seed: u64,
    pub progress_interval: usize,
    pub normalization: Normalization,
    pub sloppy_loo: bool,
    pub silly: bool,
    pub diversify: bool,
}

impl Default for Overridable {
    fn default() -> Self {
        Self {
            k: 1,
            decay: Decay::Zero,
            weights: Vec::new(),
            verbosity: 0,
            mvdm_threshold: 1,
            mvdm_default: MvdmDefault::Overlap,
            bin_size: 0,
            beam_size: None,
            ib2_bootstrap: 0,
            clip_frequency: 0,
            seed: 0,
            progress_interval: 0,
            normalization: Normalization::None,
            sloppy_loo: false,
            silly: false,
            diversify: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub algorithm: Algorithm,
    pub pre: PreRealization,
    pub post: Overridable,
    realized: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Ib1,
            pre: PreRealization::default(),
            post: Overridable::default(),
            realized: false,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_realized(&self) -> bool {
        self.realized
    }

    /// freezes the single-assignment fields; subsequent attempts to
    /// touch `pre` through [`Self::set_pre`] fail with `Locked`.
    pub fn realize(&mut self) -> crate::Result<()> {
        self.validate()?;
        self.realized = true;
        Ok(())
    }

    pub fn set_pre(&mut self, edit: impl FnOnce(&mut PreRealization)) -> crate::Result<()> {
        if self.realized {
            return Err(crate::MemlearnError::Config(ConfigError::Locked(
                "pre-realization option changed after the model was realized".into(),
            )));
        }
        edit(&mut self.pre);
        Ok(())
    }

    pub fn set_post(&mut self, edit: impl FnOnce(&mut Overridable)) {
        edit(&mut self.post);
    }

    /// clones a session-local copy for per-session `SET` overrides; the
    /// trie/feature tables are never part of this record, only borrowed
    /// read-only by the caller.
    pub fn session_clone(&self) -> Options {
        self.clone()
    }

    /// runs every pairwise check named in §4.H. Returns every violation
    /// found, not just the first — callers surface the whole list.
    pub fn validate(&self) -> crate::Result<()> {
        let mut errors = Vec::new();

        if matches!(self.pre.input_format, InputFormat::Sparse | InputFormat::SparseBinary)
            && self.pre.num_features.is_none()
        {
            errors.push(ConfigError::IllegalCombination(
                "sparse/binary-sparse input format requires an explicit feature count".into(),
            ));
        }

        if self.post.sloppy_loo && self.algorithm != Algorithm::Loo {
            errors.push(ConfigError::IllegalCombination(
                "sloppy-LOO requires algorithm = LOO".into(),
            ));
        }

        if self.pre.ig_threshold.is_some() && self.algorithm != Algorithm::IgTree {
            errors.push(ConfigError::IllegalCombination(
                "IG-threshold requires algorithm = IGTree".into(),
            ));
        }

        if !matches!(self.pre.global_composition, Composition::Additive)
            && self
                .pre
                .per_feature_metric
                .iter()
                .any(|m| *m != PerFeatureMetric::Ignore)
        {
            errors.push(ConfigError::IllegalCombination(
                "DotProduct/Cosine composition requires every per-feature metric to be Ignore".into(),
            ));
        }

        if let Some(n) = self.pre.num_features {
            if !self.pre.per_feature_metric.is_empty() && self.pre.per_feature_metric.len() != n {
                errors.push(ConfigError::IllegalCombination(
                    "per-feature metric vector must cover every feature".into(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(crate::MemlearnError::Config(ConfigError::IllegalCombination(
                errors
                    .into_iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )))
        }
    }
}
