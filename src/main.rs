//! netprobe binary: runs the echo server, the probing clients, or both.

use netprobe::client::{Client, Prober};
use netprobe::codec::WireCodec;
use netprobe::config::{Config, LogFormat};
use netprobe::protocols::echo;
use netprobe::rpc::Router;
use netprobe::server::Server;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn, Instrument};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// How long to wait for lifecycles to wind down after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging; the guard flushes the log file on exit
    let _log_guard = init_logging(&config);

    info!(
        mode = ?config.mode,
        listen = %config.server.listen,
        remotes = ?config.client.remotes,
        interval = ?config.client.interval,
        server_auth = config.server.secret.is_some(),
        client_auth = config.client.secret.is_some(),
        "Starting netprobe"
    );

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = config.workers {
        builder.worker_threads(workers);
    }
    let runtime = builder.build()?;

    runtime.block_on(run(config))
}

fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let (writer, guard) = match &config.log_path {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(rolling_file(path));
            (BoxMakeWriter::new(writer), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stdout), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.log_path.is_none())
        .with_writer(writer);

    match config.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    guard
}

/// Daily-rotated appender writing `<dir>/<name>.<date>`.
fn rolling_file(path: &Path) -> tracing_appender::rolling::RollingFileAppender {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    // Validation guarantees a file name.
    let name = path.file_name().unwrap_or(path.as_os_str());
    tracing_appender::rolling::daily(dir, name)
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let codec = WireCodec::default();
    let shutdown = CancellationToken::new();
    let tasks = TaskTracker::new();

    if config.mode.runs_server() {
        let router = echo::register(Router::new());
        // Failing to bind is the only fatal error.
        let server = Server::bind(config.server.clone(), codec, router).await?;
        let span = server.span();
        tasks.spawn(server.run(shutdown.clone()).instrument(span));
    }

    if config.mode.runs_client() {
        for remote in &config.client.remotes {
            let client = Client::new(remote.as_str(), &config.client, codec);
            let prober = Prober::new(client, &config.client);
            let span = prober.span();
            tasks.spawn(prober.run(shutdown.clone()).instrument(span));
        }
    }
    tasks.close();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    shutdown.cancel();

    // In-flight dials and echo calls are not interrupted.
    if tokio::time::timeout(SHUTDOWN_GRACE, tasks.wait()).await.is_err() {
        warn!(grace = ?SHUTDOWN_GRACE, "Lifecycles still busy, exiting anyway");
    }
    Ok(())
}
