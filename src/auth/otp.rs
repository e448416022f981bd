use axum::{Json, debug_handler, extract::State};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::auth::{OTP_TTL_MINUTES, normalize_email, normalize_phone};
use crate::error::{AppError, AppResult};
use crate::models::{Gender, User, UserStatus};

fn generate_otp() -> String {
    rand::rng().random_range(100_000u32..1_000_000).to_string()
}

/// A row that exists only to hold the OTP until registration fills it in.
fn placeholder_user(email: Option<String>, phone: Option<String>) -> User {
    let now = Utc::now();
    User {
        id: Uuid::now_v7(),
        name: String::new(),
        gender: Gender::Other,
        college: String::new(),
        year: "1st Year".to_owned(),
        age: 18,
        skills: Vec::new(),
        image_url: String::new(),
        phone,
        email,
        status: UserStatus::Unregistered,
        is_premium: false,
        premium_expires_at: None,
        email_verified: false,
        email_verification_token: None,
        email_verification_expires: None,
        otp: None,
        otp_expires: None,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RequestOtpBody {
    email: Option<String>,
    phone: Option<String>,
}

#[debug_handler]
pub(crate) async fn request_otp(
    State(app): State<AppState>,
    Json(body): Json<RequestOtpBody>,
) -> AppResult<Json<Value>> {
    let email = normalize_email(body.email);
    let phone = normalize_phone(body.phone);
    if email.is_none() && phone.is_none() {
        return Err(AppError::validation("Email or phone is required"));
    }

    let otp = generate_otp();
    let now = Utc::now();
    let expires = now + Duration::minutes(OTP_TTL_MINUTES);

    match app
        .store
        .user_by_contact(email.as_deref(), phone.as_deref())
        .await?
    {
        Some(mut user) => {
            user.otp = Some(otp.clone());
            user.otp_expires = Some(expires);
            user.updated_at = now;
            app.store.update_user(&user).await?;
        }
        None => {
            let mut user = placeholder_user(email.clone(), phone.clone());
            user.otp = Some(otp.clone());
            user.otp_expires = Some(expires);
            app.store.insert_user(&user).await?;
            info!(user_id = %user.id, "created unregistered user for signup");
        }
    }

    if let Some(email) = &email {
        if let Err(err) = app.mailer.send_otp(email, &otp).await {
            if app.config.production {
                return Err(err);
            }
            warn!(error = %err, "OTP email failed; the code is echoed in the response");
        }
    }

    let mut payload = json!({ "message": "OTP sent successfully" });
    // outside production the code comes back in the response for testing
    if !app.config.production {
        payload["otp"] = json!(otp);
    }
    Ok(Json(payload))
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyOtpBody {
    email: Option<String>,
    phone: Option<String>,
    otp: Option<String>,
}

#[debug_handler]
pub(crate) async fn verify_otp(
    State(app): State<AppState>,
    Json(body): Json<VerifyOtpBody>,
) -> AppResult<Json<Value>> {
    let otp = body.otp.unwrap_or_default();
    if otp.trim().is_empty() {
        return Err(AppError::validation("OTP is required"));
    }

    let email = normalize_email(body.email);
    let phone = normalize_phone(body.phone);
    if email.is_none() && phone.is_none() {
        return Err(AppError::validation("Email or phone is required"));
    }

    let Some(mut user) = app
        .store
        .user_by_contact(email.as_deref(), phone.as_deref())
        .await?
    else {
        return Err(AppError::not_found(
            "User not found. Please request OTP first.",
        ));
    };

    if user.otp.as_deref() != Some(otp.trim()) {
        return Err(AppError::validation("Invalid OTP"));
    }
    let now = Utc::now();
    if user.otp_expires.is_none_or(|expires| expires < now) {
        return Err(AppError::validation("OTP has expired"));
    }

    user.otp = None;
    user.otp_expires = None;
    user.updated_at = now;
    app.store.update_user(&user).await?;

    if user.status == UserStatus::Unregistered {
        // signup flow: no token until registration completes the profile
        return Ok(Json(json!({
            "verified": true,
            "message": "OTP verified. Please complete your registration.",
            "isNewUser": true,
        })));
    }

    let token = app.keys.issue(user.id)?;
    Ok(Json(json!({
        "token": token,
        "user": user.auth_view(),
        "isNewUser": false,
    })))
}
