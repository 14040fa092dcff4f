//! End-to-end scenarios mirroring the literal worked examples: a
//! two-feature XOR with the Overlap metric, a numeric-metric classifier
//! with decayed k=3 voting, MVDM's threshold fallback to Overlap, and a
//! concurrent TCP server honoring `maxConn`.

use std::sync::Arc;

use memlearn::bestarray::Decay;
use memlearn::instance::Instance;
use memlearn::metric::Composition;
use memlearn::metric::Kernel;
use memlearn::metric::MvdmDefault;
use memlearn::metric::VectorMetric;
use memlearn::options::Algorithm;
use memlearn::options::Options;
use memlearn::search::Searcher;
use memlearn::server::bases::BaseTable;
use memlearn::server::model::TrainedModel;
use memlearn::symbol::target::TargetTable;
use memlearn::symbol::FeatureTable;
use memlearn::trie::TrieRoot;

fn xor_model() -> TrainedModel {
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

    TrainedModel {
        name: "xor".into(),
        trie,
        features,
        targets,
        metric: VectorMetric::new(Composition::Additive, vec![Kernel::Overlap, Kernel::Overlap], vec![1.0, 1.0]).unwrap(),
        default_options: {
            let mut o = Options::new();
            o.algorithm = Algorithm::Ib1;
            o.set_post(|p| p.k = 1);
            o
        },
        gain_ratios: vec![1.0, 1.0],
    }
}

#[test]
fn scenario_1_xor_overlap_k1() {
    let model = xor_model();
    let zero = model.parse_query_instance(&["0", "0"]).unwrap();
    let one_zero = model.parse_query_instance(&["1", "0"]).unwrap();

    let result = model.classify(&model.default_options, zero);
    assert_eq!(result.category, "-");

    let result = model.classify(&model.default_options, one_zero);
    assert_eq!(result.category, "+");
}

fn numeric_model() -> TrainedModel {
    let mut features = FeatureTable::new(&["x".into()]);
    let v1 = features.intern(0, "1");
    let v2 = features.intern(0, "2");
    let v10 = features.intern(0, "10");
    let v11 = features.intern(0, "11");
    let mut targets = TargetTable::new();
    let a = targets.intern("A");
    let b = targets.intern("B");
    let mut trie = TrieRoot::new(1);
    trie.insert(&Instance::new(vec![v1], a));
    trie.insert(&Instance::new(vec![v2], a));
    trie.insert(&Instance::new(vec![v10], b));
    trie.insert(&Instance::new(vec![v11], b));
    trie.redo_distributions();

    let (min, max) = Kernel::numeric_range(features.column(0)).unwrap();
    TrainedModel {
        name: "numeric".into(),
        trie,
        features,
        targets,
        metric: VectorMetric::new(Composition::Additive, vec![Kernel::Numeric { min, max }], vec![1.0]).unwrap(),
        default_options: {
            let mut o = Options::new();
            o.algorithm = Algorithm::Ib1;
            o.set_post(|p| p.k = 1);
            o
        },
        gain_ratios: vec![1.0],
    }
}

#[test]
fn scenario_2_numeric_k1_and_k3_with_decay() {
    let model = numeric_model();

    let three = model.parse_query_instance(&["3"]).unwrap();
    let result = model.classify(&model.default_options, three);
    assert_eq!(result.category, "A");

    let nine = model.parse_query_instance(&["9"]).unwrap();
    let result = model.classify(&model.default_options, nine);
    assert_eq!(result.category, "B");

    let mut k3 = model.default_options.session_clone();
    k3.set_post(|p| {
        p.k = 3;
        p.decay = Decay::InverseLinear;
    });
    let six = model.parse_query_instance(&["6"]).unwrap();
    let result = model.classify(&k3, six);
    assert_eq!(result.category, "A");
}

#[test]
fn scenario_4_mvdm_falls_back_to_overlap_below_threshold() {
    let mut features = FeatureTable::new(&["x".into()]);
    let v_rare_a = features.intern(0, "rare_a");
    let v_rare_b = features.intern(0, "rare_b");
    let mut targets = TargetTable::new();
    let pos = targets.intern("+");
    let neg = targets.intern("-");
    let mut trie = TrieRoot::new(1);
    trie.insert(&Instance::new(vec![v_rare_a], pos));
    trie.insert(&Instance::new(vec![v_rare_b], neg));
    trie.redo_distributions();

    let kernel = Kernel::ValueDiff { threshold: 2, default: MvdmDefault::Overlap };
    let overlap = Kernel::Overlap;
    let table = features.column(0);
    let targets_table = &targets;

    // each value's frequency (1) is under threshold, so ValueDiff must
    // report the same distance Overlap would for a mismatch.
    let mvdm_distance = kernel.distance(v_rare_a, v_rare_b, table, targets_table);
    let overlap_distance = overlap.distance(v_rare_a, v_rare_b, table, targets_table);
    assert_eq!(mvdm_distance, overlap_distance);
}

#[tokio::test]
async fn scenario_5_maxconn_rejects_third_connection() {
    use tokio::io::AsyncBufReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::io::BufReader;
    use tokio::net::TcpStream;

    let model = Arc::new(xor_model());
    let mut bases = BaseTable::new();
    bases.register(model);
    let bases = Arc::new(bases);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let server_bases = bases.clone();
    tokio::spawn(async move {
        let _ = memlearn::server::session::run(addr, server_bases, 2).await;
    });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    let mut second = TcpStream::connect(addr).await.unwrap();
    let mut third = TcpStream::connect(addr).await.unwrap();

    let mut first_reader = BufReader::new(&mut first);
    let mut greeting = String::new();
    first_reader.read_line(&mut greeting).await.unwrap();
    assert!(greeting.contains("Welcome"));

    first.write_all(b"CLASSIFY 0,0\r\n").await.unwrap();
    let mut reply = String::new();
    BufReader::new(&mut first).read_line(&mut reply).await.unwrap();
    assert!(reply.starts_with("CATEGORY"));

    let mut third_reply = String::new();
    BufReader::new(&mut third).read_line(&mut third_reply).await.unwrap();
    assert!(third_reply.contains("Maximum connections exceeded"));

    drop(first);
    drop(second);
    drop(third);
}

/// §8 scenario 6: an HTTP query and the equivalent line-protocol session
/// against the same base must agree on the classified category. Drives
/// both real wire layers (`server::line::process_line` and the actual
/// actix-web handler via `actix_web::test`) instead of calling
/// `TrainedModel::classify` twice, which would be true by construction
/// regardless of whether either protocol layer worked.
#[actix_web::test]
async fn scenario_6_http_and_line_protocol_agree() {
    use actix_web::test as actix_test;
    use memlearn::server::http;
    use memlearn::server::line::process_line;
    use memlearn::server::line::Outcome;

    let model = Arc::new(xor_model());
    let mut bases = BaseTable::new();
    bases.register(model.clone());
    let bases = Arc::new(bases);

    let mut line_current = model.clone();
    let mut line_options = Options::new();
    match process_line("SET k 3", &bases, &mut line_current, &mut line_options) {
        Outcome::Reply(r) => assert_eq!(r, "OK\n"),
        Outcome::Exit(_) => panic!("unexpected exit"),
    }
    let line_reply = match process_line("CLASSIFY 1,0", &bases, &mut line_current, &mut line_options) {
        Outcome::Reply(r) => r,
        Outcome::Exit(_) => panic!("unexpected exit"),
    };
    let line_category = line_reply
        .strip_prefix("CATEGORY { ")
        .and_then(|rest| rest.split(' ').next())
        .expect("line reply carries a category")
        .to_owned();

    let app = actix_test::init_service(http::app(bases.clone())).await;
    let req = actix_test::TestRequest::get()
        .uri("/xor?set=k%3D3&classify=1%2C0")
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body = actix_test::read_body(resp).await;
    let xml = String::from_utf8(body.to_vec()).unwrap();
    let http_category = xml
        .lines()
        .find_map(|line| line.trim().strip_prefix("<category>"))
        .and_then(|rest| rest.strip_suffix("</category>"))
        .expect("http reply carries a <category>")
        .to_owned();

    assert_eq!(line_category, http_category);
}
