// ghost-server: ghostd entry point

use clap::Parser;
use ghost_host::handlers;
use ghost_registry::write_snapshot;
use ghost_server::{build_host, load_config, router, ServerState};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

/// GHOST tape host daemon.
#[derive(Debug, Parser)]
#[command(name = "ghostd", version, about = "GHOST tape host and orchestration runtime")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "GHOST_CONFIG")]
    config: Option<PathBuf>,

    /// Override the tape root directory.
    #[arg(long, env = "GHOST_TAPE_ROOT")]
    tape_root: Option<PathBuf>,

    /// Skip the boot-time tape scan.
    #[arg(long, default_value_t = false)]
    no_scan: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(tape_root) = args.tape_root {
        config.tapes.root = tape_root;
    }

    // Losing the tape root is unrecoverable; refuse to boot without it.
    if !config.tapes.root.is_dir() {
        error!(
            "tape root {} is not a directory",
            config.tapes.root.display()
        );
        return ExitCode::FAILURE;
    }
    if let Err(e) = std::fs::create_dir_all(&config.sandbox.root) {
        error!(
            "cannot create sandbox root {}: {}",
            config.sandbox.root.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let bind_address = config.bind_address();
    let drain_deadline = Duration::from_millis(config.server.drain_deadline_ms);
    let host = build_host(&config);

    if !args.no_scan {
        match host.registry.scan(&handlers::is_handler) {
            Ok(report) => {
                info!(
                    discovered = report.discovered.len(),
                    failed = report.failures.len(),
                    "boot scan complete"
                );
            }
            Err(e) => {
                error!("tape scan failed: {}", e);
                return ExitCode::FAILURE;
            }
        }
        // Advisory snapshot lives beside the tape root.
        let snapshot_path = config
            .tapes
            .root
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."))
            .join("ghost.json");
        if let Err(e) = write_snapshot(&host.registry, &snapshot_path, &bind_address, &config.external)
        {
            // Advisory only; boot continues.
            error!("snapshot write failed: {}", e);
        }
    }

    let state = ServerState::new(host);
    let app = router(state);

    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("cannot bind {}: {}", bind_address, e);
            return ExitCode::FAILURE;
        }
    };
    info!("ghostd listening on http://{}", bind_address);
    info!("  POST /run            - request envelope");
    info!("  GET  /health         - liveness");
    info!("  GET  /tapes          - registry listing");
    info!("  POST /proxy/:id      - inter-tape proxy");
    info!("  GET  /metrics        - counters");

    // Graceful shutdown: on signal stop accepting new requests, then wait
    // for inflight ones up to the drain deadline before exiting anyway.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut drain_watch = shutdown_rx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let mut rx = shutdown_rx;
        let _ = rx.changed().await;
    });

    tokio::select! {
        result = serve => match result {
            Ok(()) => {
                info!("ghostd drained and stopped");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("server error: {}", e);
                ExitCode::FAILURE
            }
        },
        _ = async {
            let _ = drain_watch.changed().await;
            tokio::time::sleep(drain_deadline).await;
        } => {
            info!("drain deadline elapsed, exiting");
            ExitCode::SUCCESS
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c, draining"),
        _ = terminate => info!("received terminate signal, draining"),
    }
}
