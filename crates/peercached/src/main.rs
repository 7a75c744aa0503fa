//! PeerCache Daemon - serves cache groups to peers over HTTP

mod api;
mod client;
mod pool;
mod server;
mod source;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use peercache::{GroupRegistry, PeerPicker};
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::api::ApiServer;
use crate::pool::{normalize_url, HttpPool, PoolOptions, DEFAULT_BASE_PATH, DEFAULT_REPLICAS};
use crate::server::PeerServer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// This node's base URL as seen by its peers
    #[arg(long, env = "PEERCACHE_ADDR", default_value = "http://127.0.0.1:8001")]
    addr: String,

    /// Bind address for the peer server
    #[arg(short, long, env = "PEERCACHE_BIND", default_value = "127.0.0.1:8001")]
    bind: String,

    /// Peer base URLs, comma separated (this node is added if missing)
    #[arg(long, env = "PEERCACHE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Group name
    #[arg(short, long, env = "PEERCACHE_GROUP", default_value = "scores")]
    group: String,

    /// Local cache capacity in bytes (0 = unbounded)
    #[arg(short, long, env = "PEERCACHE_CAPACITY", default_value_t = 2 << 10)]
    capacity: usize,

    /// Virtual nodes per peer on the hash ring
    #[arg(long, default_value_t = DEFAULT_REPLICAS)]
    replicas: usize,

    /// Path prefix for peer requests
    #[arg(long, default_value = DEFAULT_BASE_PATH)]
    base_path: String,

    /// Peer fetch timeout in milliseconds
    #[arg(long, default_value_t = 3000)]
    timeout_ms: u64,

    /// JSON object file with the loader's key/value data
    #[arg(long, env = "PEERCACHE_SOURCE")]
    source: Option<PathBuf>,

    /// Bind address for the front-end API (disabled if unset)
    #[arg(long, env = "PEERCACHE_API")]
    api: Option<String>,

    /// Log level
    #[arg(long, env = "PEERCACHE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log as JSON
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Configured peers with this node included exactly once
    fn peer_list(&self) -> Vec<String> {
        let self_url = normalize_url(&self.addr);
        let mut peers: Vec<String> = self
            .peers
            .iter()
            .map(|p| normalize_url(p.trim()))
            .filter(|p| !p.is_empty())
            .collect();
        if !peers.contains(&self_url) {
            peers.push(self_url);
        }
        peers.dedup();
        peers
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    info!("Starting PeerCache Daemon v{}", env!("CARGO_PKG_VERSION"));

    // Peer state owns a blocking HTTP client, so it is built before the
    // runtime starts and dropped after it stops
    let registry = Arc::new(GroupRegistry::new());
    let data = source::load(args.source.as_deref())?;
    let group = registry.new_group(&args.group, args.capacity, source::loader(data))?;

    let pool = Arc::new(HttpPool::with_options(
        &args.addr,
        PoolOptions {
            base_path: args.base_path.clone(),
            replicas: args.replicas,
            hash: None,
            timeout: Duration::from_millis(args.timeout_ms),
        },
    )?);
    pool.set_peers(&args.peer_list());
    group.register_peers(Arc::clone(&pool) as Arc<dyn PeerPicker>)?;

    info!("Group: {} ({} bytes)", args.group, args.capacity);
    info!("Node address: {}", pool.self_url());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(run(&args, registry, group, &pool))
}

async fn run(
    args: &Args,
    registry: Arc<GroupRegistry>,
    group: Arc<peercache::Group>,
    pool: &HttpPool,
) -> Result<()> {
    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding peer server to {}", args.bind))?;
    let peer_server = Arc::new(PeerServer::new(pool.self_url(), pool.base_path(), registry));

    let api_listener = match &args.api {
        Some(addr) => Some(
            TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding api server to {addr}"))?,
        ),
        None => None,
    };
    let api = async move {
        match api_listener {
            Some(listener) => api::serve_api(listener, Arc::new(ApiServer::new(group))).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        res = server::serve_peers(listener, peer_server) => res,
        res = api => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    }
}

fn init_logging(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}
