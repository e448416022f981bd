use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router, debug_handler};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::UserSummary;
use crate::{AppState, user_summaries};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_matches))
        .route("/count/{user_id}", get(count_for_user))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchView {
    id: Uuid,
    user1_id: Uuid,
    user2_id: Uuid,
    other_user: UserSummary,
    adjective: String,
    created_at: DateTime<Utc>,
}

#[debug_handler]
async fn list_matches(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<Value>> {
    let matches = app.store.matches_involving(me).await?;
    let others = user_summaries(
        app.store.as_ref(),
        matches.iter().map(|m| m.other(me)).collect(),
    )
    .await?;

    let matches: Vec<MatchView> = matches
        .into_iter()
        .map(|m| {
            Ok(MatchView {
                id: m.id,
                user1_id: m.user_lo,
                user2_id: m.user_hi,
                other_user: others.get(m.other(me))?,
                adjective: m.adjective,
                created_at: m.created_at,
            })
        })
        .collect::<AppResult<_>>()?;
    Ok(Json(json!({ "matches": matches })))
}

#[debug_handler]
async fn count_for_user(
    State(app): State<AppState>,
    AuthUser(_me): AuthUser,
    Path(user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let Ok(user_id) = Uuid::parse_str(&user_id) else {
        return Err(AppError::not_found("User not found"));
    };
    let count = app.store.count_matches_involving(user_id).await?;
    Ok(Json(json!({ "count": count })))
}
