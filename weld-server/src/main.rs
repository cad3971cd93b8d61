// Weld telemetry daemon: stand listener, connection handlers, persistence worker.

mod config;
mod json_sink;
mod listener;
mod logging;
mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use weld_core::StandRegistry;

use crate::json_sink::JsonSink;
use crate::listener::ConnectionSettings;
use crate::worker::{handoff_queue, spawn_worker, Worker};

#[derive(Parser, Debug)]
#[command(author, version, about = "Welding stand telemetry daemon", long_about = None)]
struct Cli {
    /// Config file (default: weld.toml under the application root, then /etc/weld/weld.toml).
    #[arg(short, long, env = "WELD_CONFIG")]
    config: Option<PathBuf>,
    /// Listen port, overriding the config file.
    #[arg(short, long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load(cli.config.as_deref()).context("configuration")?;
    if let Some(port) = cli.port {
        cfg.listen_port = port;
    }
    let archive_root = cfg.validate()?.to_path_buf();

    let _log_guard = logging::init(&cfg.log_path())
        .with_context(|| format!("log directory {}", cfg.log_path().display()))?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "weld-server starting");

    let stands_path = cfg.stands_path();
    let registry = Arc::new(StandRegistry::load(&stands_path));
    tracing::info!(path = %stands_path.display(), stands = registry.len(), "stand registry loaded");

    let (queue_tx, queue_rx) = handoff_queue();
    let worker = Worker::new(registry, JsonSink::new(&cfg.app_root), archive_root);
    let worker_thread = spawn_worker(worker, queue_rx).context("spawn persistence worker")?;

    let settings = ConnectionSettings {
        sample_step: cfg.sample_step,
        ..ConnectionSettings::default()
    };
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let bind = ("0.0.0.0", cfg.listen_port);
        let tcp = tokio::net::TcpListener::bind(bind)
            .await
            .with_context(|| format!("bind port {}", cfg.listen_port))?;
        tokio::select! {
            res = listener::run_listener(tcp, settings, queue_tx) => res?,
            res = shutdown_signal() => res?,
        }
        anyhow::Ok(())
    })?;
    // Dropping the runtime drops every queue sender, which lets the worker finish.
    drop(rt);
    if worker_thread.join().is_err() {
        tracing::error!("persistence worker panicked");
    }
    tracing::info!("weld-server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM (Unix).
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    tracing::info!("shutdown requested");
    Ok(())
}
