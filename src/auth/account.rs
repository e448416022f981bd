use axum::{Json, debug_handler, extract::State};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::AppState;
use crate::auth::{AuthUser, normalize_email, normalize_phone};
use crate::error::{AppError, AppResult};
use crate::models::{Gender, User, UserStatus};

#[debug_handler]
pub(crate) async fn me(
    State(app): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Value>> {
    let Some(user) = app.store.user_by_id(user_id).await? else {
        return Err(AppError::not_found("User not found"));
    };
    Ok(Json(json!({ "user": user.me_view() })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginBody {
    email: Option<String>,
    phone: Option<String>,
}

/// Passwordless login by bare contact. Kept for older clients; the OTP flow
/// is the real front door.
#[debug_handler]
pub(crate) async fn login(
    State(app): State<AppState>,
    Json(body): Json<LoginBody>,
) -> AppResult<Json<Value>> {
    let email = normalize_email(body.email);
    let phone = normalize_phone(body.phone);
    if email.is_none() && phone.is_none() {
        return Err(AppError::validation("Phone or email is required"));
    }

    let user = app
        .store
        .user_by_contact(email.as_deref(), phone.as_deref())
        .await?
        // a half-created signup row is not a login target
        .filter(|u| u.status == UserStatus::Active);
    let Some(user) = user else {
        return Err(AppError::not_found("User not found"));
    };

    let token = app.keys.issue(user.id)?;
    Ok(Json(json!({ "token": token, "user": user.auth_view() })))
}

const BYPASS_EMAIL: &str = "test@bypass.com";

fn bypass_user() -> User {
    let now = Utc::now();
    User {
        id: Uuid::now_v7(),
        name: "Test User".to_owned(),
        gender: Gender::Other,
        college: "Test University".to_owned(),
        year: "3rd Year".to_owned(),
        age: 20,
        skills: vec!["Design".to_owned(), "React".to_owned()],
        image_url: "https://images.pexels.com/photos/614810/pexels-photo-614810.jpeg?auto=compress&cs=tinysrgb&w=800&q=80".to_owned(),
        phone: None,
        email: Some(BYPASS_EMAIL.to_owned()),
        status: UserStatus::Active,
        is_premium: false,
        premium_expires_at: None,
        email_verified: true,
        email_verification_token: None,
        email_verification_expires: None,
        otp: None,
        otp_expires: None,
        created_at: now,
        updated_at: now,
    }
}

/// Onboarding shortcut for manual testing: logs into a shared test account,
/// creating it on first use. Answers 404 in production so the route is
/// indistinguishable from not existing.
#[debug_handler]
pub(crate) async fn bypass(State(app): State<AppState>) -> AppResult<Json<Value>> {
    if app.config.production {
        return Err(AppError::not_found("Not found"));
    }

    let user = match app.store.user_by_contact(Some(BYPASS_EMAIL), None).await? {
        Some(user) => user,
        None => {
            let user = bypass_user();
            app.store.insert_user(&user).await?;
            user
        }
    };

    let token = app.keys.issue(user.id)?;
    Ok(Json(json!({ "token": token, "user": user.me_view() })))
}
