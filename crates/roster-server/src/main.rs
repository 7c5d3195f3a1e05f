use std::process;
use std::time::Duration;

use clap::Parser;
use roster_core::{App, AppConfig, Server, ServerConfig};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(
    name = "roster-server",
    about = "Serves the members list over HTTP",
    version
)]
struct Cli {
    /// Host to bind to
    #[arg(long, env = "ROSTER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "ROSTER_PORT", default_value_t = 5000)]
    port: u16,

    /// Verbose error pages and debug-level logging
    #[arg(long, env = "ROSTER_DEBUG")]
    debug: bool,

    /// Runtime worker threads (defaults to the number of CPUs)
    #[arg(long, env = "ROSTER_WORKERS")]
    workers: Option<usize>,

    /// Seconds to wait for open connections on shutdown
    #[arg(long, default_value_t = 5)]
    shutdown_timeout: u64,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        ServerConfig {
            port: self.port,
            hostname: self.host.clone(),
            workers: self.workers.unwrap_or(defaults.workers).max(1),
            debug: self.debug,
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout),
        }
    }
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` in debug mode.
fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run(config: ServerConfig) -> roster_core::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let app = App::new(AppConfig::new().debug(config.debug))?;
        let server = Server::bind(&config, app)?;
        let addr = server.local_addr()?;

        tracing::info!(%addr, workers = config.workers, "listening on http://{addr}");
        if config.debug {
            tracing::warn!("debug mode is on: error pages include diagnostics, do not expose publicly");
        }

        server.serve().await
    })
}

fn main() {
    let cli = Cli::parse();
    let config = cli.server_config();
    init_tracing(config.debug);

    if let Err(e) = run(config) {
        tracing::error!(error = %e, "server error");
        process::exit(1);
    }
}
