// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lesson_ledger_server::{
    api::router,
    config::{LogFormat, ServerConfig, DEFAULT_LOG_FILTER},
    engine::EngineStores,
    ledger::{
        AccessLedger, BlobStorage, HttpBlobStorageClient, HttpLedgerClient, InMemoryBlobStorage,
        InMemoryLedger,
    },
    state::{AppState, Backends},
    storage::{Database, InMemoryStore},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::from_env()?;
    init_tracing(config.log_format);

    let (stores, storage_backend) = match &config.data_dir {
        Some(dir) => {
            let db = Database::open_in_dir(dir)?;
            info!(data_dir = %dir.display(), "Using redb storage");
            (EngineStores::shared(Arc::new(db)), "redb")
        }
        None => {
            warn!("DATA_DIR not set; content and progress are kept in memory only");
            (EngineStores::shared(Arc::new(InMemoryStore::new())), "memory")
        }
    };

    let (ledger, ledger_backend): (Arc<dyn AccessLedger>, &'static str) = match &config.ledger_url {
        Some(url) => {
            info!(ledger_url = %url, "Using ledger service");
            (
                Arc::new(HttpLedgerClient::new(url.clone(), config.collaborator_timeout)?)
                    as Arc<dyn AccessLedger>,
                "http",
            )
        }
        None => {
            warn!("LEDGER_URL not set; using the in-process ledger");
            (Arc::new(InMemoryLedger::new()), "memory")
        }
    };

    let (blobs, blob_backend): (Arc<dyn BlobStorage>, &'static str) =
        match &config.blob_storage_url {
            Some(url) => {
                info!(blob_storage_url = %url, "Using blob storage service");
                (
                    Arc::new(HttpBlobStorageClient::new(
                        url.clone(),
                        config.collaborator_timeout,
                    )?) as Arc<dyn BlobStorage>,
                    "http",
                )
            }
            None => {
                warn!("BLOB_STORAGE_URL not set; using in-process blob storage");
                (
                    Arc::new(InMemoryBlobStorage::new(config.blob_gateway.clone())),
                    "memory",
                )
            }
        };

    let state = AppState::new(
        stores,
        ledger,
        blobs,
        Backends {
            storage: storage_backend,
            ledger: ledger_backend,
            blob_storage: blob_backend,
        },
    );
    let app = router(state);

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Lesson ledger listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
    shutdown.cancel();
}
