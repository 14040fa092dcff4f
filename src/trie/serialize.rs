//! On-disk trie format (§5 "serialization"): an S-expression rendering
//! of the tree, in either a *plain* form (value and class names spelled
//! out) or a *hashed* form (every name replaced by its interned index,
//! with `Classes`/`Features` dictionaries up front to recover them).
//! Both start with a version header line so a future format change can
//! be detected before a mismatched parser runs.

use std::fmt::Write as _;

use crate::distribution::Distribution;
use crate::error::MemlearnError;
use crate::instance::Instance;
use crate::symbol::target::TargetTable;
use crate::symbol::value::FeatureValueTable;
use crate::symbol::FeatureTable;
use crate::symbol::FeatureValue;
use crate::symbol::TargetValue;
use crate::trie::node::TrieNode;
use crate::trie::root::TrieRoot;

pub const FORMAT_VERSION: u32 = 1;

pub fn save_plain(trie: &TrieRoot, features: &FeatureTable, targets: &TargetTable) -> String {
    let mut out = format!("# Version {FORMAT_VERSION}\n");
    write_node(&mut out, trie.root(), 0, features, targets, false);
    out.push('\n');
    out
}

pub fn save_hashed(trie: &TrieRoot, features: &FeatureTable, targets: &TargetTable) -> String {
    let mut out = format!("# Version {FORMAT_VERSION} (Hashed)\n");
    out.push_str("Classes\n");
    for t in targets.targets_in_order() {
        let _ = writeln!(out, "{} {}", t.index(), targets.name(t));
    }
    out.push_str("Features\n");
    for pos in 0..features.len() {
        let column = features.column(pos);
        let _ = writeln!(out, "{} {}", pos, column.feature_name());
        for index in 1..=column.len() as u32 {
            if let Some(fv) = column.reverse_lookup(index) {
                let _ = writeln!(out, "  {} {}", index, column.name(fv));
            }
        }
    }
    out.push_str("Tree\n");
    write_node(&mut out, trie.root(), 0, features, targets, true);
    out.push('\n');
    out
}

fn write_node(
    out: &mut String,
    node: &TrieNode,
    depth: usize,
    features: &FeatureTable,
    targets: &TargetTable,
    hashed: bool,
) {
    match node {
        TrieNode::Leaf(dist) => out.push_str(&save_distribution(dist, targets, hashed)),
        TrieNode::Branch { children, .. } => {
            out.push('(');
            let column = features.column(depth);
            for (i, (&value, child)) in children.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                if hashed {
                    let _ = write!(out, "{} ", value.index());
                } else {
                    let _ = write!(out, "{} ", column.name(value));
                }
                write_node(out, child, depth + 1, features, targets, hashed);
            }
            out.push(')');
        }
    }
}

fn save_distribution(dist: &Distribution, targets: &TargetTable, hashed: bool) -> String {
    if !hashed {
        return dist.save(targets);
    }
    let mut out = String::from("{ ");
    for (i, (target, weight)) in dist.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{} {}", target.index(), weight);
    }
    out.push_str(" }");
    out
}

/// parses a plain-format save file back into a [`TrieRoot`], interning
/// any value/class names it encounters into `features`/`targets`.
pub fn load_plain(text: &str, features: &mut FeatureTable, targets: &mut TargetTable) -> crate::Result<TrieRoot> {
    let body = strip_header(text, false)?;
    let mut tokens = tokenize(body);
    let root = parse_node(&mut tokens, 0, features, targets, false)?;
    let mut trie = TrieRoot::from_parts(root, Vec::new(), features.len());
    trie.redo_distributions();
    Ok(trie)
}

/// parses a hashed-format save file, using its `Classes`/`Features`
/// dictionaries to recover names for the indices in the tree body.
pub fn load_hashed(text: &str, features: &mut FeatureTable, targets: &mut TargetTable) -> crate::Result<TrieRoot> {
    let body = strip_header(text, true)?;
    let (dicts, tree_text) = split_dictionaries(body)?;
    for (index, name) in dicts.classes {
        targets.intern(&name);
        let _ = index;
    }
    for (pos, entries) in dicts.features {
        let column: &mut FeatureValueTable = features.column_mut(pos);
        for (index, name) in entries {
            column.intern_by_index(index, &name);
        }
    }
    let mut tokens = tokenize(tree_text);
    let root = parse_node(&mut tokens, 0, features, targets, true)?;
    let mut trie = TrieRoot::from_parts(root, Vec::new(), features.len());
    trie.redo_distributions();
    Ok(trie)
}

fn strip_header(text: &str, hashed: bool) -> crate::Result<&str> {
    let mut lines = text.splitn(2, '\n');
    let header = lines.next().unwrap_or_default();
    let rest = lines.next().unwrap_or_default();
    let expect_suffix = hashed;
    if !header.starts_with("# Version") {
        return Err(MemlearnError::Parse("missing version header".into()));
    }
    if header.contains("(Hashed)") != expect_suffix {
        return Err(MemlearnError::Parse(
            "save file hashing mode does not match loader".into(),
        ));
    }
    Ok(rest)
}

struct Dictionaries {
    classes: Vec<(u32, String)>,
    features: Vec<(usize, Vec<(u32, String)>)>,
}

fn split_dictionaries(text: &str) -> crate::Result<(Dictionaries, &str)> {
    let classes_at = text
        .find("Classes\n")
        .ok_or_else(|| MemlearnError::Parse("missing Classes section".into()))?;
    let features_at = text
        .find("Features\n")
        .ok_or_else(|| MemlearnError::Parse("missing Features section".into()))?;
    let tree_at = text
        .find("Tree\n")
        .ok_or_else(|| MemlearnError::Parse("missing Tree section".into()))?;

    let classes_block = &text[classes_at + "Classes\n".len()..features_at];
    let features_block = &text[features_at + "Features\n".len()..tree_at];
    let tree_block = &text[tree_at + "Tree\n".len()..];

    let classes = classes_block
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(parse_index_name)
        .collect::<crate::Result<Vec<_>>>()?;

    let mut features = Vec::new();
    let mut current: Option<(usize, Vec<(u32, String)>)> = None;
    for line in features_block.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with("  ") {
            let (index, name) = parse_index_name(line.trim())?;
            if let Some((_, entries)) = current.as_mut() {
                entries.push((index, name));
            }
        } else {
            if let Some(done) = current.take() {
                features.push(done);
            }
            let (pos, name) = parse_index_name(line.trim())?;
            let _ = name;
            current = Some((pos as usize, Vec::new()));
        }
    }
    if let Some(done) = current.take() {
        features.push(done);
    }

    Ok((Dictionaries { classes, features }, tree_block))
}

fn parse_index_name(line: &str) -> crate::Result<(u32, String)> {
    let mut parts = line.splitn(2, ' ');
    let index: u32 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| MemlearnError::Parse(format!("bad dictionary line: {line:?}")))?;
    let name = parts.next().unwrap_or_default().to_owned();
    Ok((index, name))
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '(' | ')' | '{' | '}' | ',' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
                tokens.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn parse_node(
    tokens: &mut Vec<String>,
    depth: usize,
    features: &mut FeatureTable,
    targets: &mut TargetTable,
    hashed: bool,
) -> crate::Result<TrieNode> {
    match tokens.first().map(String::as_str) {
        Some("{") => parse_leaf(tokens, targets, hashed),
        Some("(") => parse_branch(tokens, depth, features, targets, hashed),
        other => Err(MemlearnError::Parse(format!("expected '{{' or '(', got {other:?}"))),
    }
}

fn expect(tokens: &mut Vec<String>, tok: &str) -> crate::Result<()> {
    if tokens.first().map(String::as_str) == Some(tok) {
        tokens.remove(0);
        Ok(())
    } else {
        Err(MemlearnError::Parse(format!(
            "expected {tok:?}, got {:?}",
            tokens.first()
        )))
    }
}

fn parse_leaf(tokens: &mut Vec<String>, targets: &mut TargetTable, hashed: bool) -> crate::Result<TrieNode> {
    expect(tokens, "{")?;
    let mut dist = Distribution::new();
    while tokens.first().map(String::as_str) != Some("}") {
        let label = tokens.remove(0);
        let weight_str = tokens.remove(0);
        let weight: f64 = weight_str
            .parse()
            .map_err(|_| MemlearnError::Parse(format!("bad weight {weight_str:?}")))?;
        let target = intern_target(&label, targets, hashed)?;
        dist.inc(target, weight);
        if tokens.first().map(String::as_str) == Some(",") {
            tokens.remove(0);
        }
    }
    expect(tokens, "}")?;
    Ok(TrieNode::Leaf(dist))
}

fn intern_target(label: &str, targets: &mut TargetTable, hashed: bool) -> crate::Result<TargetValue> {
    if hashed {
        let index: u32 = label
            .parse()
            .map_err(|_| MemlearnError::Parse(format!("bad class index {label:?}")))?;
        targets
            .reverse_lookup(index)
            .ok_or_else(|| MemlearnError::Parse(format!("unknown class index {index}")))
    } else {
        Ok(targets.intern(label))
    }
}

fn parse_branch(
    tokens: &mut Vec<String>,
    depth: usize,
    features: &mut FeatureTable,
    targets: &mut TargetTable,
    hashed: bool,
) -> crate::Result<TrieNode> {
    expect(tokens, "(")?;
    let mut children = std::collections::BTreeMap::new();
    while tokens.first().map(String::as_str) != Some(")") {
        let value_tok = tokens.remove(0);
        let value: FeatureValue = if hashed {
            let index: u32 = value_tok
                .parse()
                .map_err(|_| MemlearnError::Parse(format!("bad value index {value_tok:?}")))?;
            features
                .column(depth)
                .reverse_lookup(index)
                .ok_or_else(|| MemlearnError::Parse(format!("unknown value index {index}")))?
        } else {
            features.intern(depth, &value_tok)
        };
        let child = parse_node(tokens, depth + 1, features, targets, hashed)?;
        children.insert(value, child);
    }
    expect(tokens, ")")?;
    Ok(TrieNode::Branch {
        distribution: Distribution::new(),
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (TrieRoot, FeatureTable, TargetTable) {
        let mut features = FeatureTable::new(&["a".into()]);
        let v0 = features.intern(0, "0");
        let v1 = features.intern(0, "1");
        let mut targets = TargetTable::new();
        let pos = targets.intern("+");
        let neg = targets.intern("-");
        let mut trie = TrieRoot::new(1);
        trie.insert(&Instance::new(vec![v0], pos));
        trie.insert(&Instance::new(vec![v1], neg));
        trie.redo_distributions();
        (trie, features, targets)
    }

    #[test]
    fn plain_round_trips() {
        let (trie, features, targets) = sample();
        let text = save_plain(&trie, &features, &targets);
        let mut features2 = FeatureTable::new(&["a".into()]);
        let mut targets2 = TargetTable::new();
        let mut loaded = load_plain(&text, &mut features2, &mut targets2).unwrap();
        loaded.redo_distributions();
        assert_eq!(loaded.summarize().total(), 2.0);
    }

    #[test]
    fn hashed_round_trips() {
        let (trie, features, targets) = sample();
        let text = save_hashed(&trie, &features, &targets);
        let mut features2 = FeatureTable::new(&["a".into()]);
        let mut targets2 = TargetTable::new();
        let mut loaded = load_hashed(&text, &mut features2, &mut targets2).unwrap();
        loaded.redo_distributions();
        assert_eq!(loaded.summarize().total(), 2.0);
    }
}
