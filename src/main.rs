use std::sync::Arc;

use citadel::config::{Config, StoreKind};
use citadel::email::Mailer;
use citadel::store::{DynStore, MemoryStore, SqliteStore};
use citadel::{AppState, app, auth::TokenKeys};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("citadel=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();
    info!(
        port = config.port,
        store = ?config.store,
        production = config.production,
        mailer = config.resend_api_key.is_some(),
        "configuration loaded"
    );

    let store: DynStore = match config.store {
        StoreKind::Memory => {
            info!("using the in-memory store; data is gone on restart");
            Arc::new(MemoryStore::new())
        }
        StoreKind::Sqlite => Arc::new(
            SqliteStore::connect(&config.database_url)
                .await
                .unwrap(),
        ),
    };

    let state = AppState {
        keys: TokenKeys::new(config.jwt_secret.as_bytes()),
        mailer: Mailer::new(&config),
        config: Arc::new(config),
        store,
    };
    let port = state.config.port;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await.unwrap();
    info!(port, "listening");
    axum::serve(listener, app(state)).await.unwrap();
}
