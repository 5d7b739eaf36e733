//! rbd-mirror-exporter - Prometheus exporter for Ceph RBD mirroring.
//!
//! Each `/metrics` request runs `rbd mirror pool status` (and, for
//! journal/snapshot images, `rbd mirror image status`) and serves the
//! result as gauges.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod exposition;
mod handlers;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use rbd_mirror_core::collector::MirrorCollector;
use rbd_mirror_core::config::{CollectorConfig, PayloadShape, is_valid_cluster_name};
use rbd_mirror_core::fetcher::RbdCommand;

/// Pool-status payload layout, as accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShapeArg {
    Auto,
    ModeList,
    PeerDescription,
}

impl From<ShapeArg> for PayloadShape {
    fn from(arg: ShapeArg) -> Self {
        match arg {
            ShapeArg::Auto => PayloadShape::Auto,
            ShapeArg::ModeList => PayloadShape::ModeList,
            ShapeArg::PeerDescription => PayloadShape::PeerDescription,
        }
    }
}

/// Prometheus exporter for Ceph RBD mirroring status.
#[derive(Parser)]
#[command(
    name = "rbd-mirror-exporter",
    about = "Prometheus exporter for Ceph RBD mirroring",
    disable_version_flag = true
)]
struct Args {
    /// Pool to scan for mirrored images.
    #[arg(long, env = "RBD_MIRROR_POOL", default_value = rbd_mirror_core::config::DEFAULT_POOL)]
    pool: String,

    /// Address to listen on. Listens on all interfaces when omitted.
    #[arg(long, env = "RBD_MIRROR_IPADDRESS")]
    ipaddress: Option<IpAddr>,

    /// Port to listen on.
    #[arg(long, env = "RBD_MIRROR_PORT", default_value = "9125")]
    port: u16,

    /// Print the version and exit.
    #[arg(short = 'V', long)]
    version: bool,

    /// Log every rbd invocation and the stderr of failed ones.
    #[arg(long, env = "RBD_MIRROR_DEBUG")]
    debug: bool,

    /// Path to the rbd binary.
    #[arg(long, env = "RBD_MIRROR_RBD_PATH", default_value = "rbd")]
    rbd_path: String,

    /// Deadline for one scrape in seconds, shared by all rbd calls.
    #[arg(long, env = "RBD_MIRROR_TIMEOUT", default_value = "15")]
    timeout: u64,

    /// Prefix of every metric name.
    #[arg(long, env = "RBD_MIRROR_PREFIX", default_value = rbd_mirror_core::config::DEFAULT_PREFIX)]
    prefix: String,

    /// Pool-status payload layout.
    #[arg(long, env = "RBD_MIRROR_SHAPE", value_enum, default_value_t = ShapeArg::Auto)]
    shape: ShapeArg,

    /// Cluster passed to `rbd --cluster` when a request names none.
    #[arg(long, env = "RBD_MIRROR_CLUSTER")]
    cluster: Option<String>,

    /// Add a `cluster` label to every metric.
    #[arg(long, env = "RBD_MIRROR_CLUSTER_LABEL")]
    cluster_label: bool,
}

/// Initializes the tracing subscriber. `RUST_LOG` directives are kept;
/// the workspace crates log at INFO, or DEBUG with `--debug`.
fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };

    let mut filter = EnvFilter::from_default_env();
    for target in ["rbd_mirror_exporter", "rbd_mirror_core"] {
        match format!("{}={}", target, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("invalid log directive for {}: {}", target, e),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

// ============================================================
// Main
// ============================================================

fn main() -> ExitCode {
    let args = Args::parse();

    if args.version {
        println!("{}", rbd_mirror_core::VERSION);
        return ExitCode::SUCCESS;
    }

    init_logging(args.debug);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> ExitCode {
    if let Some(cluster) = args.cluster.as_deref()
        && !is_valid_cluster_name(cluster)
    {
        error!(cluster, "invalid --cluster value");
        return ExitCode::FAILURE;
    }

    let config = CollectorConfig::new(args.pool)
        .with_prefix(args.prefix)
        .with_shape(args.shape.into())
        .with_cluster_label(args.cluster_label)
        .with_default_cluster(args.cluster)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_debug(args.debug);
    let fetcher = RbdCommand::from_config(args.rbd_path, &config);
    let collector = MirrorCollector::new(fetcher, config);

    if let Err(e) = exposition::validate_schema(collector.schema()) {
        error!(prefix = %collector.config().prefix, error = %e, "invalid metric schema");
        return ExitCode::FAILURE;
    }

    let config = collector.config();
    info!(
        version = rbd_mirror_core::VERSION,
        pool = %config.pool,
        rbd = %collector.fetcher().program().display(),
        prefix = %config.prefix,
        shape = ?config.shape,
        cluster = ?config.default_cluster,
        cluster_label = config.cluster_label,
        timeout_secs = config.timeout.as_secs(),
        "starting rbd-mirror-exporter"
    );

    let app = handlers::router(Arc::new(collector))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new());

    let addr = SocketAddr::new(
        args.ipaddress.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        args.port,
    );
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            return ExitCode::FAILURE;
        }
    };
    info!(%addr, "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        return ExitCode::FAILURE;
    }

    info!("shutdown complete");
    ExitCode::SUCCESS
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("received shutdown signal");
}
