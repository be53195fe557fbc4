use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use xreg_core::HttpCache;
use xreg_maven::{IndexBuildOptions, MavenAdapter};
use xreg_server::{RefreshConfig, ServerConfig, build_app, run_refresh, serve};

#[derive(Parser)]
#[command(name = "xreg-gateway", version, about = "Read-only xRegistry federation gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the gateway (the default when no subcommand is given).
    Serve(ServeArgs),
    /// Build or refresh the package-name index database.
    Index(IndexArgs),
}

#[derive(Args, Clone)]
struct ServeArgs {
    /// Listen port.
    #[arg(long, default_value_t = 3000, env = "XREG_PORT")]
    port: u16,

    /// Absolute base URL used in `self` links; derived from the request
    /// Host header when unset.
    #[arg(long, env = "XREG_BASE_URL")]
    base_url: Option<String>,

    /// Enables bearer authentication when non-empty.
    #[arg(long, env = "XREG_API_KEY")]
    api_key: Option<String>,

    /// Mounts all routes under this prefix.
    #[arg(long)]
    path_prefix: Option<String>,

    /// Directory for the conditional HTTP cache.
    #[arg(long, default_value = "xreg-cache")]
    cache_dir: PathBuf,

    /// Package-name index database; built in the background when absent.
    #[arg(long, default_value = "maven-index.db")]
    index_db: PathBuf,

    /// Working directory for index rebuilds.
    #[arg(long, default_value = "index-work")]
    workdir: PathBuf,

    /// Force an index rebuild at startup.
    #[arg(long)]
    refresh: bool,

    /// Suppress console logging.
    #[arg(long)]
    quiet: bool,

    /// Structured log sink path (append mode).
    #[arg(long)]
    log: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct IndexArgs {
    /// Working directory for the archive and extractor output.
    #[arg(long, default_value = "index-work")]
    workdir: PathBuf,

    /// Output database path.
    #[arg(long, default_value = "maven-index.db")]
    output: PathBuf,

    /// Rebuild even when the database is fresh.
    #[arg(long)]
    force: bool,

    /// Suppress console logging.
    #[arg(long)]
    quiet: bool,

    /// Structured log sink path (append mode).
    #[arg(long)]
    log: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit = match cli.command {
        Some(Command::Index(args)) => run_index(args).await,
        Some(Command::Serve(args)) => run_serve(args).await,
        None => run_serve(cli.serve).await,
    };
    std::process::exit(exit);
}

async fn run_serve(args: ServeArgs) -> i32 {
    init_logging(args.quiet, args.log.as_deref());

    let cache = Arc::new(HttpCache::new(&args.cache_dir));
    let adapter = match MavenAdapter::new(cache) {
        Ok(adapter) => Arc::new(adapter),
        Err(err) => {
            tracing::error!(error = %err, "failed to load adapter model");
            return 1;
        }
    };

    let config = ServerConfig {
        port: args.port,
        base_url: args.base_url,
        api_key: args.api_key,
        path_prefix: args.path_prefix,
        cache_dir: args.cache_dir,
        index_db: args.index_db.clone(),
    };

    let mut refresh = RefreshConfig::new(IndexBuildOptions::new(&args.workdir, &args.index_db));
    refresh.initial_force = args.refresh;
    tokio::spawn(run_refresh(adapter.clone(), refresh));

    let app = build_app(adapter, &config);
    match serve(app, config.port).await {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "server failed");
            1
        }
    }
}

async fn run_index(args: IndexArgs) -> i32 {
    init_logging(args.quiet, args.log.as_deref());

    let mut options = IndexBuildOptions::new(&args.workdir, &args.output);
    options.force = args.force;

    match xreg_maven::build_index(&options).await {
        Ok(report) if report.skipped => {
            tracing::info!("index is fresh, nothing to do");
            0
        }
        Ok(report) => {
            tracing::info!(
                lines = report.lines_read,
                packages = report.packages_inserted,
                "index build finished"
            );
            0
        }
        Err(err) => {
            tracing::error!(error = %err, "index build failed");
            1
        }
    }
}

fn init_logging(quiet: bool, log_path: Option<&std::path::Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let log_file = log_path.and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    if let Some(file) = log_file {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(file)
            .with_ansi(false)
            .init();
    } else if quiet {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("error"))
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
