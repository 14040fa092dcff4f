//! Server entry point. Loads a saved instance trie, wraps it in a
//! [`memlearn::server::TrainedModel`], and serves it over the line
//! protocol or the HTTP protocol depending on `--protocol` (or a
//! `protocol = ...` line in `--config`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use clap::ValueEnum;

use memlearn::bestarray::Decay;
use memlearn::config::Protocol as ConfigProtocol;
use memlearn::config::ServerConfig;
use memlearn::metric::Composition;
use memlearn::metric::Kernel;
use memlearn::metric::VectorMetric;
use memlearn::options::Algorithm;
use memlearn::options::Options;
use memlearn::server::daemon::Daemonize;
use memlearn::server::daemon::Foreground;
use memlearn::server::{self, BaseTable, TrainedModel};
use memlearn::symbol::target::TargetTable;
use memlearn::symbol::FeatureTable;
use memlearn::trie::serialize;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliAlgorithm {
    Ib1,
    Ib2,
    Loo,
    Cv,
    Igtree,
    Tribl,
    Tribl2,
}

impl From<CliAlgorithm> for Algorithm {
    fn from(a: CliAlgorithm) -> Algorithm {
        match a {
            CliAlgorithm::Ib1 => Algorithm::Ib1,
            CliAlgorithm::Ib2 => Algorithm::Ib2,
            CliAlgorithm::Loo => Algorithm::Loo,
            CliAlgorithm::Cv => Algorithm::Cv,
            CliAlgorithm::Igtree => Algorithm::IgTree,
            CliAlgorithm::Tribl => Algorithm::Tribl,
            CliAlgorithm::Tribl2 => Algorithm::Tribl2,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum CliProtocol {
    Tcp,
    Http,
}

/// memory-based classifier server.
#[derive(Parser, Debug)]
#[command(name = "memlearn-server", version, about)]
struct Cli {
    /// path to a saved instance trie (plain or hashed S-expression form).
    #[arg(long)]
    instance_base: PathBuf,

    /// comma-separated feature names, in the order the trie was built
    /// with. Defaults to f0, f1, ... if omitted.
    #[arg(long, value_delimiter = ',')]
    features: Option<Vec<String>>,

    /// number of features, required only when `--features` is omitted.
    #[arg(long)]
    num_features: Option<usize>,

    /// a name this base answers to under `BASE <name>` / `GET /<name>`.
    #[arg(long, default_value = "default")]
    base_name: String,

    /// `key = value` config file; recognized keys (`port`, `maxconn`,
    /// `protocol`) are overridden by any matching CLI flag.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short = 'a', long, value_enum, default_value = "ib1")]
    algorithm: CliAlgorithm,

    #[arg(short = 'k', long, default_value_t = 1)]
    k: usize,

    #[arg(long)]
    protocol: Option<CliProtocol>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    maxconn: Option<usize>,

    /// write the process PID to this file after startup.
    #[arg(long)]
    pidfile: Option<PathBuf>,
}

fn load_base(cli: &Cli) -> anyhow::Result<TrainedModel> {
    let feature_names = match &cli.features {
        Some(names) => names.clone(),
        None => {
            let n = cli
                .num_features
                .ok_or_else(|| anyhow::anyhow!("--features or --num-features is required"))?;
            (0..n).map(|i| format!("f{i}")).collect()
        }
    };
    let mut features = FeatureTable::new(&feature_names);
    let mut targets = TargetTable::new();

    let text = std::fs::read_to_string(&cli.instance_base)?;
    let hashed = text.lines().next().unwrap_or_default().contains("(Hashed)");
    let trie = if hashed {
        serialize::load_hashed(&text, &mut features, &mut targets)?
    } else {
        serialize::load_plain(&text, &mut features, &mut targets)?
    };
    // the save file only carries the trie; MVDM/Jeffrey-divergence need
    // per-value class statistics re-derived from it before they're usable.
    trie.rebuild_value_statistics(&mut features);

    let num_features = features.len();
    let metric = VectorMetric::new(
        Composition::Additive,
        vec![Kernel::Overlap; num_features],
        vec![1.0; num_features],
    )?;

    let mut options = Options::new();
    options.algorithm = cli.algorithm.into();
    options.set_post(|p| {
        p.k = cli.k;
        p.decay = Decay::Zero;
    });
    options.realize()?;

    Ok(TrainedModel {
        name: cli.base_name.clone(),
        trie,
        features,
        targets,
        metric,
        default_options: options,
        gain_ratios: vec![1.0; num_features],
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    memlearn::init_logging()?;
    let cli = Cli::parse();

    let file_config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    let port = cli.port.unwrap_or(file_config.port);
    let maxconn = cli.maxconn.unwrap_or(file_config.maxconn);
    let protocol = cli
        .protocol
        .map(|p| match p {
            CliProtocol::Tcp => ConfigProtocol::Tcp,
            CliProtocol::Http => ConfigProtocol::Http,
        })
        .unwrap_or(file_config.protocol);

    Foreground.daemonize()?;
    if let Some(pidfile) = &cli.pidfile {
        server::daemon::write_pidfile(pidfile)?;
    }

    let model = load_base(&cli)?;
    let mut bases = BaseTable::new();
    bases.register(Arc::new(model));
    let bases = Arc::new(bases);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("serving base {:?} on {addr} ({protocol:?})", cli.base_name);

    match protocol {
        ConfigProtocol::Tcp => server::session::run(addr, bases, maxconn).await?,
        ConfigProtocol::Http => server::http::run(addr, bases).await?,
    }

    Ok(())
}
