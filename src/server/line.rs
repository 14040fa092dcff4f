//! The line protocol (§4.I): `CLASSIFY`, `BASE`, `SET`, `QUERY`, `EXIT`,
//! `#`-comments. Kept free of any socket I/O so it can be exercised
//! directly in tests; [`super::session`] is the thin tokio wrapper that
//! feeds it lines and writes back replies.

use crate::server::bases::BaseTable;
use crate::server::model::SharedModel;
use crate::options::Options;

pub const GREETING: &str = "Welcome to the Timbl server.";

pub enum Outcome {
    Reply(String),
    Exit(String),
}

/// handles one already-trimmed line (CR stripped, no trailing `\n`)
/// against the session's current base and options, both mutated
/// in place as `BASE`/`SET` commands dictate.
pub fn process_line(line: &str, bases: &BaseTable, current: &mut SharedModel, options: &mut Options) -> Outcome {
    let line = line.trim();
    if line.is_empty() {
        return Outcome::Reply(String::new());
    }
    if line.starts_with('#') {
        return Outcome::Reply(format!("SKIP '{line}'\n"));
    }

    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command.to_ascii_uppercase().as_str() {
        "CLASSIFY" => Outcome::Reply(classify_reply(rest, current, options)),
        "BASE" => match bases.get(rest) {
            Ok(model) => {
                *current = model;
                Outcome::Reply("OK\n".to_owned())
            }
            Err(e) => Outcome::Reply(format!("ERROR {{ {e} }}\n")),
        },
        "SET" => match apply_set(rest, options) {
            Ok(()) => Outcome::Reply("OK\n".to_owned()),
            Err(e) => Outcome::Reply(format!("ERROR {{ {e} }}\n")),
        },
        "QUERY" => Outcome::Reply(query_reply(current, options)),
        "EXIT" => Outcome::Exit("OK\n".to_owned()),
        other => Outcome::Reply(format!("ERROR {{ unknown command {other:?} }}\n")),
    }
}

fn classify_reply(instance_text: &str, model: &SharedModel, options: &Options) -> String {
    let fields: Vec<&str> = instance_text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    let values = match model.parse_query_instance(&fields) {
        Ok(v) => v,
        Err(e) => return format!("ERROR {{ {e} }}\n"),
    };
    let result = model.classify(options, values);
    let mut reply = format!("CATEGORY {{ {} }}", result.category);
    if let Some(dist) = &result.distribution {
        reply.push_str(&format!(" DISTRIBUTION {}", dist.save(&model.targets)));
    }
    if let Some(d) = result.distance {
        reply.push_str(&format!(" DISTANCE {{ {d} }}"));
    }
    reply.push('\n');
    reply
}

fn apply_set(spec: &str, options: &mut Options) -> crate::Result<()> {
    let (key, value) = spec
        .split_once(' ')
        .ok_or_else(|| crate::MemlearnError::Classification(format!("malformed SET {spec:?}")))?;
    match key.to_ascii_lowercase().as_str() {
        "k" => {
            let k: usize = value
                .trim()
                .parse()
                .map_err(|_| crate::MemlearnError::Classification(format!("bad k value {value:?}")))?;
            options.set_post(|p| p.k = k);
            Ok(())
        }
        "verbosity" => {
            let v: u32 = value
                .trim()
                .parse()
                .map_err(|_| crate::MemlearnError::Classification(format!("bad verbosity value {value:?}")))?;
            options.set_post(|p| p.verbosity = v);
            Ok(())
        }
        other => Err(crate::MemlearnError::Classification(format!(
            "unknown per-session option {other:?}"
        ))),
    }
}

fn query_reply(model: &SharedModel, options: &Options) -> String {
    format!(
        "STATUS\nbase: {}\nalgorithm: {:?}\nk: {}\nENDSTATUS\n",
        model.name, options.algorithm, options.post.k
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Composition;
    use crate::metric::Kernel;
    use crate::metric::VectorMetric;
    use crate::instance::Instance;
    use crate::symbol::target::TargetTable;
    use crate::symbol::FeatureTable;
    use crate::trie::TrieRoot;
    use std::sync::Arc;

    fn xor_model() -> SharedModel {
        let mut features = FeatureTable::new(&["a".into(), "b".into()]);
        let v0a = features.intern(0, "0");
        let v1a = features.intern(0, "1");
        let v0b = features.intern(1, "0");
        let v1b = features.intern(1, "1");
        let mut targets = TargetTable::new();
        let neg = targets.intern("-");
        let pos = targets.intern("+");
        let mut trie = TrieRoot::new(2);
        trie.insert(&Instance::new(vec![v0a, v0b], neg));
        trie.insert(&Instance::new(vec![v0a, v1b], pos));
        trie.insert(&Instance::new(vec![v1a, v0b], pos));
        trie.insert(&Instance::new(vec![v1a, v1b], neg));
        trie.redo_distributions();
        Arc::new(crate::server::model::TrainedModel {
            name: "xor".to_owned(),
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
        })
    }

    #[test]
    fn classify_xor_matches_scenario_1() {
        let bases = BaseTable::new();
        let mut model = xor_model();
        let mut options = Options::new();
        match process_line("CLASSIFY 0,0", &bases, &mut model, &mut options) {
            Outcome::Reply(r) => assert!(r.starts_with("CATEGORY { - }")),
            Outcome::Exit(_) => panic!("unexpected exit"),
        }
        match process_line("CLASSIFY 1,0", &bases, &mut model, &mut options) {
            Outcome::Reply(r) => assert!(r.starts_with("CATEGORY { + }")),
            Outcome::Exit(_) => panic!("unexpected exit"),
        }
    }

    #[test]
    fn set_k_updates_session_options() {
        let bases = BaseTable::new();
        let mut model = xor_model();
        let mut options = Options::new();
        match process_line("SET k 3", &bases, &mut model, &mut options) {
            Outcome::Reply(r) => assert_eq!(r, "OK\n"),
            Outcome::Exit(_) => panic!("unexpected exit"),
        }
        assert_eq!(options.post.k, 3);
    }

    #[test]
    fn exit_command_ends_session() {
        let bases = BaseTable::new();
        let mut model = xor_model();
        let mut options = Options::new();
        match process_line("exit", &bases, &mut model, &mut options) {
            Outcome::Exit(_) => {}
            Outcome::Reply(_) => panic!("expected exit"),
        }
    }

    #[test]
    fn comment_lines_are_acknowledged() {
        let bases = BaseTable::new();
        let mut model = xor_model();
        let mut options = Options::new();
        match process_line("# a comment", &bases, &mut model, &mut options) {
            Outcome::Reply(r) => assert!(r.starts_with("SKIP")),
            Outcome::Exit(_) => panic!("unexpected exit"),
        }
    }
}
