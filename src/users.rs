use axum::extract::{Path, State};
use axum::routing::{get, patch};
use axum::{Json, Router, debug_handler};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{PublicUser, User, YEARS};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user).put(update_profile))
        .route("/{id}/premium", patch(update_premium))
}

#[debug_handler]
async fn list_users(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
) -> AppResult<Json<Value>> {
    let users: Vec<PublicUser> = app
        .store
        .users_except(me)
        .await?
        .iter()
        .map(User::public)
        .collect();
    Ok(Json(json!({ "users": users })))
}

#[debug_handler]
async fn get_user(
    State(app): State<AppState>,
    AuthUser(_): AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    // an id that does not parse cannot exist, so it reads as absent
    let id = Uuid::parse_str(&id).map_err(|_| AppError::not_found("User not found"))?;
    let Some(user) = app.store.user_by_id(id).await? else {
        return Err(AppError::not_found("User not found"));
    };
    Ok(Json(json!({ "user": user.public() })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileBody {
    name: Option<String>,
    college: Option<String>,
    year: Option<String>,
    age: Option<i64>,
    skills: Option<Vec<String>>,
    image_url: Option<String>,
}

#[debug_handler]
async fn update_profile(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateProfileBody>,
) -> AppResult<Json<Value>> {
    // only your own profile; a garbage id is by definition not yours
    if Uuid::parse_str(&id).ok() != Some(me) {
        return Err(AppError::forbidden("Forbidden"));
    }
    let Some(mut user) = app.store.user_by_id(me).await? else {
        return Err(AppError::not_found("User not found"));
    };

    if let Some(name) = body.name {
        let name = name.trim().to_owned();
        if name.is_empty() {
            return Err(AppError::validation("Name is required"));
        }
        user.name = name;
    }
    if let Some(college) = body.college {
        let college = college.trim().to_owned();
        if college.is_empty() {
            return Err(AppError::validation("College is required"));
        }
        user.college = college;
    }
    if let Some(year) = body.year {
        if !YEARS.contains(&year.as_str()) {
            return Err(AppError::validation("Invalid year"));
        }
        user.year = year;
    }
    if let Some(age) = body.age {
        if !(18..=100).contains(&age) {
            return Err(AppError::validation("Age must be between 18 and 100"));
        }
        user.age = age;
    }
    if let Some(skills) = body.skills {
        user.skills = skills;
    }
    if let Some(image_url) = body.image_url {
        user.image_url = image_url;
    }

    user.updated_at = Utc::now();
    app.store.update_user(&user).await?;
    Ok(Json(json!({ "user": user.public() })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PremiumBody {
    is_premium: bool,
    // absent leaves the expiry alone, an explicit null clears it
    #[serde(default)]
    premium_expires_at: Option<Option<DateTime<Utc>>>,
}

#[debug_handler]
async fn update_premium(
    State(app): State<AppState>,
    AuthUser(me): AuthUser,
    Path(id): Path<String>,
    Json(body): Json<PremiumBody>,
) -> AppResult<Json<Value>> {
    if Uuid::parse_str(&id).ok() != Some(me) {
        return Err(AppError::forbidden("Forbidden"));
    }
    let Some(mut user) = app.store.user_by_id(me).await? else {
        return Err(AppError::not_found("User not found"));
    };

    user.is_premium = body.is_premium;
    if let Some(expiry) = body.premium_expires_at {
        user.premium_expires_at = expiry;
    }
    user.updated_at = Utc::now();
    app.store.update_user(&user).await?;

    Ok(Json(json!({
        "user": {
            "id": user.id,
            "isPremium": user.is_premium,
            "premiumExpiresAt": user.premium_expires_at,
        }
    })))
}
