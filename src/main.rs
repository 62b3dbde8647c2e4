//! Host agent daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                      HOST AGENT                      │
//!                 │                                                      │
//!   TLS clients   │  ┌──────────────────┐    ┌────────────────┐          │
//!   ──────────────┼─▶│ HotSwapTls       │───▶│ AgentServer    │          │
//!                 │  │ Listener         │    │ (GET /1.0)     │          │
//!                 │  └────────▲─────────┘    └────────────────┘          │
//!                 │           │ set_config                               │
//!                 │  ┌────────┴─────────┐   cert dir watch, SIGHUP,      │
//!                 │  │ TlsReloader      │◀── POST /internal/reload       │
//!                 │  └──────────────────┘                                │
//!                 │                                                      │
//!                 │  ┌──────────────────┐   NIC dir watch, SIGHUP,       │
//!                 │  │ reconcile worker │◀── POST /internal/reload       │
//!                 │  │ (NicReconciler)  │──▶ rtnetlink / modprobe        │
//!                 │  └──────────────────┘                                │
//!                 │                                                      │
//!   agent-cli     │  ┌──────────────────┐                                │
//!   ──────────────┼─▶│ admin API        │──▶ Shutdown                    │
//!   (loopback)    │  └──────────────────┘                                │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use notify::RecommendedWatcher;
use tokio::net::TcpListener;

use host_agent::admin::{setup_admin_router, AdminState};
use host_agent::config::loader::load_config_or_default;
use host_agent::config::watcher::DirWatcher;
use host_agent::config::AgentConfig;
use host_agent::http::AgentServer;
use host_agent::lifecycle::{signals, Shutdown, ShutdownSignal};
use host_agent::net::tls::server_tls_config;
use host_agent::net::{HotSwapTlsListener, TlsReloader};
use host_agent::nic::{worker, IpLink, NicReconciler, ReconcileHandle};
use host_agent::observability::logging;

/// How long the admin API may take to answer its last requests after the
/// agent server stopped.
const ADMIN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// How often a missing NIC config directory is looked for again.
const NIC_DIR_RETRY: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "host-agent")]
#[command(about = "Guest-side host agent", long_about = None)]
struct Cli {
    /// Path to the agent configuration file.
    #[arg(short, long, default_value = "/etc/host-agent/agent.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // The real subscriber depends on the file, so loader warnings go
    // through a temporary one.
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(logging::env_filter(&Default::default()))
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || load_config_or_default(&cli.config))?;
    logging::init(&config.logging)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = %cli.config.display(), "host-agent starting");

    let shutdown = Arc::new(Shutdown::new());

    // TLS listener
    let tcp = TcpListener::bind(&config.listener.bind_address).await?;
    let tls = server_tls_config(&config.tls.cert_dir, &config.tls.name)?;
    let listener = Arc::new(HotSwapTlsListener::new(tcp, tls));
    let reloader = TlsReloader::new(listener.clone(), &config.tls.cert_dir, config.tls.name.as_str());

    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // NIC reconciliation
    let reconciler = NicReconciler::new(&config.nic.config_dir, IpLink::connect()?)
        .with_kernel_modules(config.nic.kernel_modules.clone());
    let (reconcile, reconcile_task) = worker::spawn(reconciler, shutdown.subscribe());
    reconcile.request();

    let _watchers = start_watchers(&config, &reconcile, &reloader, shutdown.subscribe());

    signals::spawn(shutdown.clone(), reloader.clone(), reconcile.clone())?;

    // Admin API
    let admin_listener = TcpListener::bind(&config.admin.bind_address).await?;
    tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
    let admin_router = setup_admin_router(AdminState {
        reloader,
        reconcile,
        shutdown: shutdown.clone(),
    });
    let admin_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(admin_listener, admin_router)
                .with_graceful_shutdown(async move { shutdown.wait_stopped().await })
                .await
        })
    };

    AgentServer::new(listener, config.listener.max_connections)
        .with_handshake_timeout(Duration::from_secs(config.listener.handshake_timeout_secs))
        .run(shutdown.subscribe())
        .await;
    shutdown.mark_stopped();

    if let Err(e) = reconcile_task.await {
        tracing::error!(error = %e, "Reconcile worker failed");
    }
    match tokio::time::timeout(ADMIN_DRAIN_TIMEOUT, admin_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Admin API failed"),
        Ok(Err(e)) => tracing::error!(error = %e, "Admin API task failed"),
        Err(_) => tracing::warn!("Admin API did not stop in time"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Start the directory watchers enabled in the configuration.
///
/// The NIC directory is watched whenever it exists. A certificate directory
/// that cannot be watched is logged and skipped; the agent still reacts to
/// SIGHUP and the admin API.
fn start_watchers(
    config: &AgentConfig,
    reconcile: &ReconcileHandle,
    reloader: &TlsReloader,
    shutdown: ShutdownSignal,
) -> Vec<RecommendedWatcher> {
    let mut watchers = Vec::new();

    if config.nic.watch {
        // The NIC directory may be provisioned after boot.
        DirWatcher::with_sender(&config.nic.config_dir, reconcile.sender())
            .spawn_when_present(NIC_DIR_RETRY, shutdown.clone());
    }

    if config.tls.watch {
        let (watcher, rx) = DirWatcher::new(&config.tls.cert_dir);
        match watcher.run() {
            Ok(watcher) => {
                watchers.push(watcher);
                tokio::spawn(reload_on_change(reloader.clone(), rx, shutdown));
            }
            Err(e) => tracing::warn!(
                path = %config.tls.cert_dir.display(),
                error = %e,
                "Cannot watch certificate directory"
            ),
        }
    }

    watchers
}

async fn reload_on_change(
    reloader: TlsReloader,
    mut changes: tokio::sync::mpsc::UnboundedReceiver<()>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        tokio::select! {
            change = changes.recv() => {
                if change.is_none() {
                    break;
                }
            }
            _ = shutdown.recv() => break,
        }
        while changes.try_recv().is_ok() {}

        let reloader = reloader.clone();
        // Errors are logged by the reloader; the old configuration stays.
        let _ = tokio::task::spawn_blocking(move || reloader.reload()).await;
    }
}
