use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router, debug_handler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::rules;
use crate::error::{AppError, AppResult};
use crate::models::{Message, UserSummary};
use crate::store::Store;
use crate::{AppState, user_summaries};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(send_message))
        .route("/conversation/{other_user_id}", get(conversation))
        .route("/read/{other_user_id}", patch(mark_read))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageView {
    id: Uuid,
    from_user_id: UserSummary,
    to_user_id: UserSummary,
    text: String,
    read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

async fn populate(store: &dyn Store, messages: Vec<Message>) -> AppResult<Vec<MessageView>> {
    let mut ids = Vec::with_capacity(messages.len() * 2);
    for m in &messages {
        ids.push(m.from_user_id);
        ids.push(m.to_user_id);
    }
    let parties = user_summaries(store, ids).await?;

    messages
        .into_iter()
        .map(|m| {
            Ok(MessageView {
                id: m.id,
                from_user_id: parties.get(m.from_user_id)?,
                to_user_id: parties.get(m.to_user_id)?,
                text: m.text,
                read: m.read,
                read_at: m.read_at,
                created_at: m.created_at,
            })
        })
        .collect()
}

#[debug_handler]
async fn conversation(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
    Path(other_user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let Ok(other) = Uuid::parse_str(&other_user_id) else {
        return Err(AppError::not_found("User not found"));
    };
    let messages = rules::conversation(app.store.as_ref(), me, other).await?;
    let messages = populate(app.store.as_ref(), messages).await?;
    Ok(Json(json!({ "messages": messages })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendBody {
    to_user_id: Option<String>,
    text: Option<String>,
}

#[debug_handler]
async fn send_message(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
    Json(body): Json<SendBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let to = body.to_user_id.as_deref().map(str::trim).unwrap_or_default();
    let text = body.text.as_deref().unwrap_or_default();
    if to.is_empty() || text.trim().is_empty() {
        return Err(AppError::validation("toUserId and text are required"));
    }
    let Ok(to) = Uuid::parse_str(to) else {
        return Err(AppError::not_found("User not found"));
    };

    let message = rules::send_message(app.store.as_ref(), me, to, text, Utc::now()).await?;
    let parties = user_summaries(app.store.as_ref(), vec![me, to]).await?;
    let message = MessageView {
        id: message.id,
        from_user_id: parties.get(message.from_user_id)?,
        to_user_id: parties.get(message.to_user_id)?,
        text: message.text,
        read: message.read,
        read_at: message.read_at,
        created_at: message.created_at,
    };
    Ok((StatusCode::CREATED, Json(json!({ "message": message }))))
}

#[debug_handler]
async fn mark_read(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
    Path(other_user_id): Path<String>,
) -> AppResult<Json<Value>> {
    let Ok(other) = Uuid::parse_str(&other_user_id) else {
        return Err(AppError::not_found("User not found"));
    };
    rules::mark_read(app.store.as_ref(), me, other, Utc::now()).await?;
    Ok(Json(json!({ "success": true })))
}
