use broker_core::{Server, ServerOptions};
use broker_server::cli::Cli;
use broker_server::config;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if cli.cluster.is_some() || !cli.routes.is_empty() {
        tracing::warn!("cluster routing is not implemented; --cluster/--routes are ignored");
    }

    let options = match &cli.config {
        Some(path) => match config::load_options_from_path(path) {
            Ok(options) => options,
            Err(err) => {
                eprintln!("failed to load config '{}': {err}", path.display());
                std::process::exit(1);
            }
        },
        None => ServerOptions::default(),
    };
    let options = cli.apply(options);

    let addr = std::net::SocketAddr::new(options.host, options.port);
    let server = match Server::bind(addr, options).await {
        Ok(server) => server,
        Err(err) => {
            eprintln!("failed to bind {addr}: {err}");
            std::process::exit(1);
        }
    };

    if let Some(pid_path) = &cli.pid_file {
        if let Err(err) = std::fs::write(pid_path, std::process::id().to_string()) {
            tracing::warn!(error = %err, "failed to write pid file");
        }
    }

    info!(%addr, "broker listening");
    let shutdown = server.shutdown_handle();
    let run_handle = tokio::spawn(server.run());

    shutdown_signal().await;
    let _ = shutdown.send(());
    let _ = run_handle.await;
    info!("broker shut down");
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .unwrap_or_else(|e| panic!("failed to open log file '{}': {e}", path.display()));
            subscriber.with_writer(std::sync::Mutex::new(file)).init();
        }
        None => subscriber.init(),
    }
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
