//! PromptRelay - Daemon Entry Point
//! Wires the selected session backend into the prompt service, serves the
//! JSON-RPC boundary and, in bridge mode, the relay client.

mod config;
mod logging;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use promptrelay_api_rpc::{RpcServer, RpcServerConfig};
use promptrelay_bridge::{BridgeClient, BridgeConfig, Dispatcher};
use promptrelay_core::application::{AdapterRegistry, PromptService, TabSessionProvider};
use promptrelay_core::port::id_provider::UuidProvider;
use promptrelay_core::port::time_provider::SystemTimeProvider;
use promptrelay_core::port::{SessionProvider, TimeProvider};
use promptrelay_infra_browser::{ChromeLauncher, PersistentBrowserProvider, ProfileStore};
use promptrelay_infra_cdp::{CdpTabHost, DevToolsHttp};

use crate::config::{Backend, Settings};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound for bridge close, RPC stop and browser teardown together
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

fn session_provider(settings: &Settings, time_provider: Arc<dyn TimeProvider>) -> Arc<dyn SessionProvider> {
    match settings.backend {
        Backend::Persistent => {
            info!(
                profile_root = %settings.profile_root.display(),
                chrome = %settings.chrome_path.display(),
                headless = settings.headless,
                "Using persistent browser backend"
            );
            Arc::new(PersistentBrowserProvider::new(
                ProfileStore::new(&settings.profile_root),
                Arc::new(ChromeLauncher::new(settings.chrome_options())),
                &settings.diagnostics_dir,
                time_provider,
            ))
        }
        Backend::Bridge => {
            info!(devtools = %settings.devtools_url, "Using bridge backend");
            let host = CdpTabHost::new(DevToolsHttp::new(settings.devtools_url.as_str()));
            Arc::new(TabSessionProvider::new(Arc::new(host), time_provider))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration (.env first, real environment wins)
    dotenvy::dotenv().ok();
    let settings = Settings::from_env().context("Invalid configuration")?;

    // 2. Logging
    let _log_guard = logging::init(&settings).context("Logging setup failed")?;
    info!(version = VERSION, backend = %settings.backend, "PromptRelay daemon starting");

    // 3. DI wiring
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let sessions = session_provider(&settings, Arc::clone(&time_provider));
    let service = Arc::new(PromptService::new(
        sessions,
        AdapterRegistry::with_defaults(),
        Arc::new(UuidProvider),
        time_provider,
    ));

    // 4. JSON-RPC server
    let rpc_config = RpcServerConfig {
        host: settings.rpc_host.clone(),
        port: settings.rpc_port,
    };
    let (rpc_handle, rpc_addr) = RpcServer::new(rpc_config, Arc::clone(&service))
        .start()
        .await
        .context("RPC server start failed")?;

    // 5. Relay client (bridge mode)
    let cancel = CancellationToken::new();
    let bridge_task = match (&settings.backend, &settings.bridge_token) {
        (Backend::Bridge, Some(token)) => {
            let client = BridgeClient::new(
                BridgeConfig::new(settings.bridge_url.clone(), token.clone()),
                Dispatcher::new(Arc::clone(&service)),
                cancel.clone(),
            );
            Some(tokio::spawn(async move {
                match client.run().await {
                    Ok(()) => info!("Bridge client finished"),
                    Err(e) => error!(error = %e, "Bridge client stopped"),
                }
            }))
        }
        _ => None,
    };

    info!(rpc = %rpc_addr, "System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    cancel.cancel();
    if let Err(e) = rpc_handle.stop() {
        warn!(error = %e, "RPC server already stopped");
    }
    let teardown = async {
        if let Some(task) = bridge_task {
            let _ = task.await;
        }
        rpc_handle.stopped().await;
        service.shutdown().await;
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, teardown).await.is_err() {
        warn!(timeout_secs = SHUTDOWN_TIMEOUT.as_secs(), "Shutdown timed out");
    }

    info!("Shutdown complete.");
    Ok(())
}
