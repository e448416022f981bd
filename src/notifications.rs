use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router, debug_handler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::rules;
use crate::error::{AppError, AppResult};
use crate::models::UserSummary;
use crate::{AppState, user_summaries};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(received).post(send))
        .route("/sent", get(sent))
        .route("/count/today", get(count_today))
}

/// Inbox form: the sender is expanded, the recipient is just the caller's id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceivedView {
    id: Uuid,
    from_user_id: UserSummary,
    to_user_id: Uuid,
    adjective: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SentView {
    id: Uuid,
    from_user_id: Uuid,
    to_user_id: UserSummary,
    adjective: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FullView {
    id: Uuid,
    from_user_id: UserSummary,
    to_user_id: UserSummary,
    adjective: String,
    created_at: DateTime<Utc>,
}

#[debug_handler]
async fn received(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<Value>> {
    let signals = rules::signals_received_by(app.store.as_ref(), me).await?;
    let senders = user_summaries(
        app.store.as_ref(),
        signals.iter().map(|s| s.from_user_id).collect(),
    )
    .await?;

    let notifications: Vec<ReceivedView> = signals
        .into_iter()
        .map(|s| {
            Ok(ReceivedView {
                id: s.id,
                from_user_id: senders.get(s.from_user_id)?,
                to_user_id: s.to_user_id,
                adjective: s.adjective,
                created_at: s.created_at,
            })
        })
        .collect::<AppResult<_>>()?;
    Ok(Json(json!({ "notifications": notifications })))
}

#[debug_handler]
async fn sent(State(app): State<AppState>, AuthUser(me): AuthUser) -> AppResult<Json<Value>> {
    let signals = rules::signals_sent_by(app.store.as_ref(), me).await?;
    let recipients = user_summaries(
        app.store.as_ref(),
        signals.iter().map(|s| s.to_user_id).collect(),
    )
    .await?;

    let notifications: Vec<SentView> = signals
        .into_iter()
        .map(|s| {
            Ok(SentView {
                id: s.id,
                from_user_id: s.from_user_id,
                to_user_id: recipients.get(s.to_user_id)?,
                adjective: s.adjective,
                created_at: s.created_at,
            })
        })
        .collect::<AppResult<_>>()?;
    Ok(Json(json!({ "notifications": notifications })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBody {
    to_user_id: Option<String>,
    adjective: Option<String>,
}

#[debug_handler]
async fn send(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
    Json(body): Json<SendBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let to = body.to_user_id.as_deref().map(str::trim).unwrap_or_default();
    let adjective = body.adjective.as_deref().map(str::trim).unwrap_or_default();
    if to.is_empty() || adjective.is_empty() {
        return Err(AppError::validation("toUserId and adjective are required"));
    }
    let Ok(to) = Uuid::parse_str(to) else {
        return Err(AppError::not_found("User not found"));
    };

    let now = Utc::now();
    let Some(sender) = app.store.user_by_id(me).await? else {
        return Err(AppError::not_found("User not found"));
    };

    rules::ensure_can_send(app.store.as_ref(), &sender, now).await?;
    let (signal, matched) =
        rules::record_signal(app.store.as_ref(), me, to, adjective, now).await?;

    let parties = user_summaries(app.store.as_ref(), vec![me, to]).await?;
    let notification = FullView {
        id: signal.id,
        from_user_id: parties.get(signal.from_user_id)?,
        to_user_id: parties.get(signal.to_user_id)?,
        adjective: signal.adjective,
        created_at: signal.created_at,
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "notification": notification,
            "match": matched.map(|m| json!({ "id": m.id, "adjective": m.adjective })),
        })),
    ))
}

#[debug_handler]
async fn count_today(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<Value>> {
    let count = rules::count_sent_today(app.store.as_ref(), me, Utc::now()).await?;
    Ok(Json(json!({ "count": count })))
}
