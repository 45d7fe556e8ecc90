//! murmur binary: the chat-triggered voice assistant.
//!
//! Starts structured logging, the profile and dictionary stores, the
//! presence watcher, the HTTP status server, and the stdin chat gateway,
//! and leaves every voice channel on SIGTERM/SIGINT or end of input.

use murmur_server::config::{self, Config, StorageBackend};
use murmur_server::{api, background::PresenceWatcher, console, AppState, Services};
use murmur_store::{
    FileDictionaryBackend, FileProfileBackend, GuildDictionaryStore, SqliteDictionaryBackend,
    SqliteProfileBackend, UserVoiceProfileStore,
};
use murmur_voice::{LoopbackAdapter, OpenJTalkEngine, VoiceAdapter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("MURMUR_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn build_stores(config: &Config) -> (UserVoiceProfileStore, GuildDictionaryStore) {
    match config.storage.backend {
        StorageBackend::File => (
            UserVoiceProfileStore::new(FileProfileBackend::new(&config.storage.profile_path)),
            GuildDictionaryStore::new(FileDictionaryBackend::new(&config.storage.dictionary_dir)),
        ),
        StorageBackend::Sqlite => {
            let pool = murmur_db::open_store(
                &murmur_db::DbLocation::File(config.storage.database_path.clone().into()),
                murmur_db::PoolSettings {
                    busy_timeout_ms: config.storage.busy_timeout_ms,
                    max_connections: config.storage.pool_max_size,
                },
            )
            .expect("failed to open store database; check storage.database_path in config");

            (
                UserVoiceProfileStore::new(SqliteProfileBackend::new(pool.clone())),
                GuildDictionaryStore::new(SqliteDictionaryBackend::new(pool)),
            )
        }
    }
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration; murmur cannot start without valid config");

    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Logs go to stderr; stdout carries console feedback.
    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    let (profiles, dictionary) = build_stores(&config);
    let voice = Arc::new(LoopbackAdapter::new(config.bot.assistant_id.as_str()));
    let adapter: Arc<dyn VoiceAdapter> = voice.clone();

    let state = AppState::new(
        Services {
            adapter,
            engine: Arc::new(OpenJTalkEngine::new(&config.engine)),
            profiles,
            dictionary,
        },
        &config,
    );

    let watcher = PresenceWatcher::spawn(
        state.clone(),
        Duration::from_millis(config.presence.interval_ms),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server = if config.server.enabled {
        let addr = SocketAddr::new(config.server.host, config.server.port);
        let listener = TcpListener::bind(addr)
            .await
            .expect("failed to bind to address; is another process using this port?");
        tracing::info!(%addr, "serving status endpoints");

        let app = api::app(state.clone());
        let mut shutdown_rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            let graceful = async move {
                let _ = shutdown_rx.wait_for(|stop| *stop).await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(graceful)
                .await
            {
                tracing::error!("status server error: {}", e);
            }
        }))
    } else {
        None
    };

    tracing::info!(prefix = %config.bot.prefix, "murmur is listening on stdin");

    let input = BufReader::new(tokio::io::stdin());
    tokio::select! {
        res = console::run(state.clone(), voice, input) => match res {
            Ok(()) => tracing::info!("console input closed, shutting down"),
            Err(e) => tracing::error!("console input failed: {}", e),
        },
        () = shutdown_signal() => {}
    }

    let _ = shutdown_tx.send(true);
    watcher.shutdown().await;
    state.leave_all().await;

    if let Some(server) = server {
        if let Err(e) = server.await {
            tracing::error!("status server join error: {}", e);
        }
    }

    tracing::info!("murmur shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
