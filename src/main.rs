// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use metafarm_auth_server::{
    api::router,
    auth::{audit_channel, AuthProtocol},
    config::{AppConfig, LogFormat, StorageBackend, DEFAULT_LOG_FILTER},
    state::AppState,
    storage::{InMemoryStore, LoginAuditLog, RedbStore, SessionStore, WalletIdentityStore},
};

/// Grace period for in-flight TLS connections on shutdown.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

type Stores = (
    Arc<dyn WalletIdentityStore>,
    Arc<dyn SessionStore>,
    Arc<dyn LoginAuditLog>,
);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let (identities, sessions, audit_log) = open_stores(&config.storage)?;

    let shutdown = CancellationToken::new();
    let (audit_sink, audit_writer) = audit_channel(config.auth.audit_queue_capacity, audit_log);
    let audit_task = tokio::spawn(audit_writer.run(shutdown.clone()));

    let protocol = AuthProtocol::new(&config.auth, identities, sessions, audit_sink)?;
    let addr = config.bind_addr;
    let tls = config.tls.clone();
    let state = AppState::new(Arc::new(protocol), Arc::new(config));
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    match tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| "failed to install rustls crypto provider")?;
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;

            let handle: axum_server::Handle<SocketAddr> = axum_server::Handle::new();
            tokio::spawn({
                let handle = handle.clone();
                let shutdown = shutdown.clone();
                async move {
                    shutdown.cancelled().await;
                    handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
                }
            });

            info!(%addr, "MetaFarm auth server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app)
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "MetaFarm auth server listening on http (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown({
                    let shutdown = shutdown.clone();
                    async move { shutdown.cancelled().await }
                })
                .await?;
        }
    }

    shutdown.cancel();
    if let Err(e) = audit_task.await {
        warn!(error = %e, "Login audit writer ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

fn open_stores(backend: &StorageBackend) -> Result<Stores, Box<dyn std::error::Error>> {
    match backend {
        StorageBackend::Redb { data_dir } => {
            let store = Arc::new(RedbStore::open_in_dir(data_dir)?);
            let stores: Stores = (store.clone(), store.clone(), store);
            Ok(stores)
        }
        StorageBackend::InMemory => {
            warn!("Using in-memory storage; identities and sessions are lost on restart");
            let store = Arc::new(InMemoryStore::new());
            let stores: Stores = (store.clone(), store.clone(), store);
            Ok(stores)
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
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
}
