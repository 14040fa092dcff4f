//! Per-feature distance kernels (§4.C). Each variant computes a
//! non-negative distance between two [`FeatureValue`]s of the *same*
//! feature column; the whole-vector composition (weighting, early
//! cutoff, dot-product/cosine) lives in `metric::mod`.

use crate::symbol::FeatureValue;
use crate::symbol::FeatureValueTable;
use crate::symbol::TargetTable;

/// which kernel falls back to when MVDM's frequency threshold isn't met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MvdmDefault {
    Overlap,
    Levenshtein,
}

#[derive(Debug, Clone)]
pub enum Kernel {
    /// 0 if equal, else 1.
    Overlap,
    /// modified value-difference metric: sum over classes of
    /// |P(c|a) - P(c|b)|, falling back to `default` when either value's
    /// frequency is below `threshold`.
    ValueDiff { threshold: usize, default: MvdmDefault },
    /// symmetrized Jeffrey divergence over the per-class distributions.
    JeffreyDiv,
    /// |a - b| / (max - min), computed over the training range.
    Numeric { min: f64, max: f64 },
    /// edit distance over value *names*, normalized by longer length.
    Levenshtein,
    /// contributes 0 to any additive composition; the only per-feature
    /// metric allowed alongside DotProduct/Cosine (§4.C, §4.H).
    Ignore,
}

impl Kernel {
    /// whole numeric range needed to build a [`Kernel::Numeric`] kernel
    /// for a feature column, parsing every interned value name as a
    /// real number. Fails hard (per spec) on a non-numeric or NaN value.
    pub fn numeric_range(table: &FeatureValueTable) -> crate::Result<(f64, f64)> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for index in 1..=table.len() as u32 {
            let fv = table.reverse_lookup(index).expect("index in range");
            let raw = table.name(fv);
            let parsed: f64 = raw.parse().map_err(|_| {
                crate::MemlearnError::Parse(format!("non-numeric value {raw:?} for numeric feature"))
            })?;
            if parsed.is_nan() {
                return Err(crate::MemlearnError::Parse(format!(
                    "NaN value {raw:?} for numeric feature"
                )));
            }
            min = min.min(parsed);
            max = max.max(parsed);
        }
        Ok((min, max))
    }

    pub fn distance(
        &self,
        a: FeatureValue,
        b: FeatureValue,
        table: &FeatureValueTable,
        targets: &TargetTable,
    ) -> f64 {
        if a == b {
            if !matches!(self, Kernel::Numeric { .. }) {
                return 0.0;
            }
        }
        match self {
            Kernel::Overlap => overlap(a, b),
            Kernel::ValueDiff { threshold, default } => {
                value_diff(a, b, table, targets, *threshold, *default)
            }
            Kernel::JeffreyDiv => jeffrey_divergence(a, b, table, targets),
            Kernel::Numeric { min, max } => numeric(a, b, table, *min, *max),
            Kernel::Levenshtein => levenshtein_normalized(table.name(a), table.name(b)),
            Kernel::Ignore => 0.0,
        }
    }
}

fn overlap(a: FeatureValue, b: FeatureValue) -> f64 {
    if a == b {
        0.0
    } else {
        1.0
    }
}

fn numeric(a: FeatureValue, b: FeatureValue, table: &FeatureValueTable, min: f64, max: f64) -> f64 {
    let av = numeric_reading(a, table);
    let bv = numeric_reading(b, table);
    if (max - min).abs() <= crate::EPSILON as f64 {
        0.0
    } else {
        (av - bv).abs() / (max - min)
    }
}

/// a numeric value's reading: its own literal if it's a transient query
/// value never seen during training (§8 scenario 2), else the parsed
/// name of its table entry. Shared with `metric::mod`'s DotProduct/Cosine
/// composition, which needs the same reading rather than the value's
/// interning order.
pub(crate) fn numeric_reading(value: FeatureValue, table: &FeatureValueTable) -> f64 {
    value
        .raw()
        .unwrap_or_else(|| table.name(value).parse().expect("validated at kernel build time"))
}

fn class_probabilities(value: FeatureValue, table: &FeatureValueTable, targets: &TargetTable) -> Vec<f64> {
    let dist = table.per_class(value);
    let freq = table.frequency(value).max(crate::EPSILON as f64);
    targets
        .targets_in_order()
        .map(|t| dist.weight(t) / freq)
        .collect()
}

fn value_diff(
    a: FeatureValue,
    b: FeatureValue,
    table: &FeatureValueTable,
    targets: &TargetTable,
    threshold: usize,
    default: MvdmDefault,
) -> f64 {
    let fa = table.frequency(a);
    let fb = table.frequency(b);
    if fa.min(fb) < threshold as f64 {
        return match default {
            MvdmDefault::Overlap => overlap(a, b),
            MvdmDefault::Levenshtein => levenshtein_normalized(table.name(a), table.name(b)),
        };
    }
    let pa = class_probabilities(a, table, targets);
    let pb = class_probabilities(b, table, targets);
    pa.iter().zip(pb.iter()).map(|(x, y)| (x - y).abs()).sum()
}

fn jeffrey_divergence(a: FeatureValue, b: FeatureValue, table: &FeatureValueTable, targets: &TargetTable) -> f64 {
    let pa = class_probabilities(a, table, targets);
    let pb = class_probabilities(b, table, targets);
    let mut total = 0.0;
    for (p, q) in pa.iter().zip(pb.iter()) {
        total += term(*p, *p, *q) + term(*q, *q, *p);
    }
    total
}

/// p * log2(2p / (p + q)), with the convention 0 * log(0) = 0.
fn term(p: f64, x: f64, y: f64) -> f64 {
    if x <= 0.0 {
        0.0
    } else {
        p * (2.0 * x / (x + y)).log2()
    }
}

fn levenshtein_normalized(a: &str, b: &str) -> f64 {
    let longer = a.chars().count().max(b.chars().count());
    if longer == 0 {
        return 0.0;
    }
    levenshtein(a, b) as f64 / longer as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, &ca) in a.iter().enumerate() {
        let mut prev_diag = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let tmp = row[j + 1];
            row[j + 1] = if ca == cb {
                prev_diag
            } else {
                1 + prev_diag.min(row[j]).min(row[j + 1])
            };
            prev_diag = tmp;
        }
    }
    row[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::target::TargetTable;
    use crate::symbol::value::FeatureValueTable;

    #[test]
    fn overlap_kernel_matches_spec() {
        let mut table = FeatureValueTable::new("x");
        let a = table.intern("a");
        let b = table.intern("b");
        let targets = TargetTable::new();
        assert_eq!(Kernel::Overlap.distance(a, a, &table, &targets), 0.0);
        assert_eq!(Kernel::Overlap.distance(a, b, &table, &targets), 1.0);
    }

    #[test]
    fn levenshtein_is_normalized_by_longer_length() {
        assert_eq!(levenshtein_normalized("cat", "cat"), 0.0);
        assert_eq!(levenshtein_normalized("cat", "cats"), 0.25);
    }

    #[test]
    fn value_diff_falls_back_below_threshold() {
        let mut table = FeatureValueTable::new("x");
        let mut targets = TargetTable::new();
        let pos = targets.intern("+");
        let a = table.intern("a");
        let b = table.intern("b");
        table.witness(a, pos, 1.0);
        table.witness(b, pos, 1.0);
        let d = value_diff(a, b, &table, &targets, 2, MvdmDefault::Overlap);
        assert_eq!(d, overlap(a, b));
    }

    #[test]
    fn numeric_distance_is_normalized_range() {
        let mut table = FeatureValueTable::new("x");
        let a = table.intern("1");
        let b = table.intern("11");
        let (min, max) = Kernel::numeric_range(&table).unwrap();
        assert_eq!(numeric(a, b, &table, min, max), 1.0);
    }

    #[test]
    fn numeric_distance_accepts_a_query_value_never_trained_on() {
        let mut table = FeatureValueTable::new("x");
        let a = table.intern("1");
        table.intern("11");
        let (min, max) = Kernel::numeric_range(&table).unwrap();
        let query = FeatureValue::raw_numeric(6.0);
        assert_eq!(numeric(a, query, &table, min, max), 0.5);
    }
}
