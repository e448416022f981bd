mod account;
mod otp;
mod register;
mod token;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;

pub use token::{AuthUser, TOKEN_TTL_DAYS, TokenKeys};

pub const OTP_TTL_MINUTES: i64 = 10;
pub const VERIFICATION_TTL_HOURS: i64 = 24;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/request-otp", post(otp::request_otp))
        .route("/verify-otp", post(otp::verify_otp))
        .route("/register", post(register::register))
        .route("/verify-email", get(register::verify_email))
        .route("/resend-verification", post(register::resend_verification))
        .route("/me", get(account::me))
        .route("/login", post(account::login))
        .route("/bypass", post(account::bypass))
}

/// Emails are compared lowercase; blank strings count as absent.
pub(crate) fn normalize_email(email: Option<String>) -> Option<String> {
    email
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
}

pub(crate) fn normalize_phone(phone: Option<String>) -> Option<String> {
    phone
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contacts_normalize_to_lowercase_or_none() {
        assert_eq!(
            normalize_email(Some("  Aarav@IITB.ac.in ".into())),
            Some("aarav@iitb.ac.in".to_owned())
        );
        assert_eq!(normalize_email(Some("   ".into())), None);
        assert_eq!(normalize_email(None), None);
        assert_eq!(
            normalize_phone(Some(" 98765 ".into())),
            Some("98765".to_owned())
        );
        assert_eq!(normalize_phone(Some(String::new())), None);
    }
}
