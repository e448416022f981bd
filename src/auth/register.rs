use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Json, debug_handler};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::auth::{AuthUser, VERIFICATION_TTL_HOURS, normalize_email, normalize_phone};
use crate::error::{AppError, AppResult};
use crate::models::{Gender, User, UserStatus, YEARS};

fn generate_verification_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterBody {
    name: String,
    gender: Gender,
    college: String,
    year: String,
    age: i64,
    skills: Option<Vec<String>>,
    image_url: Option<String>,
    phone: Option<String>,
    email: Option<String>,
}

#[debug_handler]
pub(crate) async fn register(
    State(app): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Some(email) = normalize_email(body.email) else {
        return Err(AppError::validation("Email is required for registration"));
    };
    let phone = normalize_phone(body.phone);

    let name = body.name.trim().to_owned();
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    let college = body.college.trim().to_owned();
    if college.is_empty() {
        return Err(AppError::validation("College is required"));
    }
    if !YEARS.contains(&body.year.as_str()) {
        return Err(AppError::validation("Invalid year"));
    }
    if !(18..=100).contains(&body.age) {
        return Err(AppError::validation("Age must be between 18 and 100"));
    }

    let existing = app
        .store
        .user_by_contact(Some(&email), phone.as_deref())
        .await?;
    if existing
        .as_ref()
        .is_some_and(|u| u.status == UserStatus::Active)
    {
        return Err(AppError::Conflict(
            "User already exists with this email or phone".to_owned(),
        ));
    }

    let verification_token = generate_verification_token();
    let now = Utc::now();
    let verification_expires = now + Duration::hours(VERIFICATION_TTL_HOURS);

    let user = match existing {
        // the row the OTP step created; fill it in and activate it
        Some(mut user) => {
            user.name = name;
            user.gender = body.gender;
            user.college = college;
            user.year = body.year;
            user.age = body.age;
            user.skills = body.skills.unwrap_or_default();
            user.image_url = body.image_url.unwrap_or_default();
            user.email = Some(email.clone());
            if phone.is_some() {
                user.phone = phone;
            }
            user.status = UserStatus::Active;
            user.email_verified = false;
            user.email_verification_token = Some(verification_token.clone());
            user.email_verification_expires = Some(verification_expires);
            user.updated_at = now;
            app.store.update_user(&user).await?;
            user
        }
        None => {
            let user = User {
                id: Uuid::now_v7(),
                name,
                gender: body.gender,
                college,
                year: body.year,
                age: body.age,
                skills: body.skills.unwrap_or_default(),
                image_url: body.image_url.unwrap_or_default(),
                phone,
                email: Some(email.clone()),
                status: UserStatus::Active,
                is_premium: false,
                premium_expires_at: None,
                email_verified: false,
                email_verification_token: Some(verification_token.clone()),
                email_verification_expires: Some(verification_expires),
                otp: None,
                otp_expires: None,
                created_at: now,
                updated_at: now,
            };
            app.store.insert_user(&user).await?;
            user
        }
    };

    // the account exists either way; the user can ask for another mail
    if let Err(err) = app.mailer.send_verification(&email, &verification_token).await {
        warn!(error = %err, "verification email failed at signup");
    }

    info!(user_id = %user.id, "user registered");
    let token = app.keys.issue(user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": token,
            "user": user.auth_view(),
            "message": "Account created. Please check your email to verify your account.",
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyEmailQuery {
    token: Option<String>,
}

#[debug_handler]
pub(crate) async fn verify_email(
    State(app): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> AppResult<Json<Value>> {
    let token = query.token.unwrap_or_default();
    if token.is_empty() {
        return Err(AppError::validation("Verification token is required"));
    }

    let now = Utc::now();
    let user = app.store.user_by_verification_token(&token).await?;
    let Some(mut user) = user.filter(|u| {
        u.email_verification_expires
            .is_some_and(|expires| expires > now)
    }) else {
        return Err(AppError::validation(
            "Invalid or expired verification token",
        ));
    };

    user.email_verified = true;
    user.email_verification_token = None;
    user.email_verification_expires = None;
    user.updated_at = now;
    app.store.update_user(&user).await?;

    Ok(Json(json!({ "message": "Email verified successfully" })))
}

#[debug_handler]
pub(crate) async fn resend_verification(
    State(app): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Value>> {
    let Some(mut user) = app.store.user_by_id(user_id).await? else {
        return Err(AppError::not_found("User not found"));
    };
    if user.email_verified {
        return Err(AppError::validation("Email already verified"));
    }
    let Some(email) = user.email.clone() else {
        return Err(AppError::validation("No email address on this account"));
    };

    let token = generate_verification_token();
    let now = Utc::now();
    user.email_verification_token = Some(token.clone());
    user.email_verification_expires = Some(now + Duration::hours(VERIFICATION_TTL_HOURS));
    user.updated_at = now;
    app.store.update_user(&user).await?;

    app.mailer.send_verification(&email, &token).await?;
    Ok(Json(json!({ "message": "Verification email sent successfully" })))
}
