use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router, debug_handler};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::domain::rules;
use crate::error::{AppError, AppResult};
use crate::models::{MessageRequest, RequestStatus, UserSummary};
use crate::store::Store;
use crate::{AppState, user_summaries};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_received).post(create_request))
        .route("/sent", get(list_sent))
        .route("/conversations", get(list_conversations))
        .route("/{id}", patch(respond_to_request))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestView {
    id: Uuid,
    from_user_id: UserSummary,
    to_user_id: UserSummary,
    adjective: String,
    status: RequestStatus,
    created_at: DateTime<Utc>,
}

async fn populate(store: &dyn Store, requests: Vec<MessageRequest>) -> AppResult<Vec<RequestView>> {
    let mut ids = Vec::with_capacity(requests.len() * 2);
    for r in &requests {
        ids.push(r.from_user_id);
        ids.push(r.to_user_id);
    }
    let parties = user_summaries(store, ids).await?;

    requests
        .into_iter()
        .map(|r| {
            Ok(RequestView {
                id: r.id,
                from_user_id: parties.get(r.from_user_id)?,
                to_user_id: parties.get(r.to_user_id)?,
                adjective: r.adjective,
                status: r.status,
                created_at: r.created_at,
            })
        })
        .collect()
}

async fn populate_one(store: &dyn Store, request: MessageRequest) -> AppResult<RequestView> {
    let parties = user_summaries(store, vec![request.from_user_id, request.to_user_id]).await?;
    Ok(RequestView {
        id: request.id,
        from_user_id: parties.get(request.from_user_id)?,
        to_user_id: parties.get(request.to_user_id)?,
        adjective: request.adjective,
        status: request.status,
        created_at: request.created_at,
    })
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

#[debug_handler]
async fn list_received(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let status = match query.status.as_deref() {
        None => None,
        Some(s) => match RequestStatus::from_str(s) {
            Some(s) => Some(s),
            // an unknown status matches no rows rather than erroring
            None => return Ok(Json(json!({ "requests": [] }))),
        },
    };
    let requests = app.store.requests_to(me, status).await?;
    let requests = populate(app.store.as_ref(), requests).await?;
    Ok(Json(json!({ "requests": requests })))
}

#[debug_handler]
async fn list_sent(State(app): State<AppState>, AuthUser(me): AuthUser) -> AppResult<Json<Value>> {
    let requests = app.store.requests_from(me).await?;
    let requests = populate(app.store.as_ref(), requests).await?;
    Ok(Json(json!({ "requests": requests })))
}

#[debug_handler]
async fn list_conversations(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<Value>> {
    let requests = app.store.accepted_requests_involving(me).await?;
    let requests = populate(app.store.as_ref(), requests).await?;
    Ok(Json(json!({ "requests": requests })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    to_user_id: Option<String>,
    adjective: Option<String>,
}

#[debug_handler]
async fn create_request(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
    Json(body): Json<CreateBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let to = body.to_user_id.as_deref().map(str::trim).unwrap_or_default();
    let adjective = body.adjective.as_deref().map(str::trim).unwrap_or_default();
    if to.is_empty() || adjective.is_empty() {
        return Err(AppError::validation("toUserId and adjective are required"));
    }
    let Ok(to) = Uuid::parse_str(to) else {
        return Err(AppError::not_found("User not found"));
    };

    let (request, created) =
        rules::create_request(app.store.as_ref(), me, to, adjective, Utc::now()).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    let request = populate_one(app.store.as_ref(), request).await?;
    Ok((status, Json(json!({ "request": request }))))
}

#[derive(Debug, Deserialize)]
struct RespondBody {
    status: Option<String>,
}

#[debug_handler]
async fn respond_to_request(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<RespondBody>,
) -> AppResult<Json<Value>> {
    let Some(decision) = body.status.as_deref().and_then(RequestStatus::from_str) else {
        return Err(AppError::validation("Status must be accepted or declined"));
    };
    let Ok(id) = Uuid::parse_str(&id) else {
        return Err(AppError::not_found("Request not found"));
    };

    let request = rules::respond(app.store.as_ref(), id, me, decision).await?;
    let request = populate_one(app.store.as_ref(), request).await?;
    Ok(Json(json!({ "request": request })))
}
