pub mod auth;
pub mod config;
pub mod domain;
pub mod email;
pub mod error;
pub mod matches;
pub mod message_requests;
pub mod messages;
pub mod models;
pub mod notifications;
pub mod store;
pub mod users;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRef, Query};
use axum::routing::get;
use axum::{Json, Router, debug_handler};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::TokenKeys;
use crate::config::Config;
use crate::email::Mailer;
use crate::error::{AppError, AppResult};
use crate::models::UserSummary;
use crate::store::{DynStore, Store};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: DynStore,
    pub keys: TokenKeys,
    pub mailer: Mailer,
    pub config: Arc<Config>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/users", users::router())
        .nest("/api/notifications", notifications::router())
        .nest("/api/matches", matches::router())
        .nest("/api/message-requests", message_requests::router())
        .nest("/api/messages", messages::router())
        .route("/api/adjectives", get(deal_adjectives))
        .route("/api/health", get(health))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[debug_handler]
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DealQuery {
    must_include: Option<String>,
}

/// The 4-card hand the client shows when sending a vibe. Open route: the
/// vocabulary is not a secret and the signup screens use it too.
#[debug_handler]
async fn deal_adjectives(Query(query): Query<DealQuery>) -> Json<Value> {
    let deck = domain::adjectives::deal(query.must_include.as_deref(), &mut rand::rng());
    Json(json!({ "adjectives": deck }))
}

/// Summaries fetched in one batch for expanding ids into `{id, name,
/// imageUrl}` objects on the wire.
pub(crate) struct Summaries(HashMap<Uuid, UserSummary>);

impl Summaries {
    /// Every id handed to [`user_summaries`] must resolve; rows referencing a
    /// user that is gone are a storage-level inconsistency, not a 404.
    pub(crate) fn get(&self, id: Uuid) -> AppResult<UserSummary> {
        self.0.get(&id).cloned().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("user {id} missing while populating a view"))
        })
    }
}

pub(crate) async fn user_summaries(store: &dyn Store, mut ids: Vec<Uuid>) -> AppResult<Summaries> {
    ids.sort_unstable();
    ids.dedup();
    let users = store.users_by_ids(&ids).await?;
    Ok(Summaries(
        users.into_iter().map(|u| (u.id, u.summary())).collect(),
    ))
}
