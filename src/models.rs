use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const YEARS: [&str; 5] = ["1st Year", "2nd Year", "3rd Year", "4th Year", "5th Year"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            _ => None,
        }
    }
}

/// An `Unregistered` row exists only to carry an OTP between request and
/// registration; it never authenticates and is completed in place by register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Unregistered,
    Active,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStatus::Unregistered => "unregistered",
            UserStatus::Active => "active",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unregistered" => Some(UserStatus::Unregistered),
            "active" => Some(UserStatus::Active),
            _ => None,
        }
    }
}

/// Full user record. Deliberately not `Serialize`: everything that goes over
/// the wire is one of the projections below, so OTPs and verification tokens
/// cannot leak by accident.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub gender: Gender,
    pub college: String,
    pub year: String,
    pub age: i64,
    pub skills: Vec<String>,
    pub image_url: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub status: UserStatus,
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub email_verification_token: Option<String>,
    pub email_verification_expires: Option<DateTime<Utc>>,
    pub otp: Option<String>,
    pub otp_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The embedded form other users see inside notifications, requests,
/// messages and matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub image_url: String,
}

/// Discover-feed projection: no contact info, no secrets.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub gender: Gender,
    pub college: String,
    pub year: String,
    pub age: i64,
    pub skills: Vec<String>,
    pub image_url: String,
    pub is_premium: bool,
}

/// Compact form returned next to a freshly issued token.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUserView {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_premium: bool,
    pub email_verified: bool,
}

/// Everything the account owner may see about themselves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeView {
    pub id: Uuid,
    pub name: String,
    pub gender: Gender,
    pub college: String,
    pub year: String,
    pub age: i64,
    pub skills: Vec<String>,
    pub image_url: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            image_url: self.image_url.clone(),
        }
    }

    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            gender: self.gender,
            college: self.college.clone(),
            year: self.year.clone(),
            age: self.age,
            skills: self.skills.clone(),
            image_url: self.image_url.clone(),
            is_premium: self.is_premium,
        }
    }

    pub fn auth_view(&self) -> AuthUserView {
        AuthUserView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            is_premium: self.is_premium,
            email_verified: self.email_verified,
        }
    }

    pub fn me_view(&self) -> MeView {
        MeView {
            id: self.id,
            name: self.name.clone(),
            gender: self.gender,
            college: self.college.clone(),
            year: self.year.clone(),
            age: self.age,
            skills: self.skills.clone(),
            image_url: self.image_url.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            is_premium: self.is_premium,
            premium_expires_at: self.premium_expires_at,
            email_verified: self.email_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// One "vibe": an adjective sent from one user to another. Append-only.
#[derive(Debug, Clone)]
pub struct Signal {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub adjective: String,
    pub created_at: DateTime<Utc>,
}

/// A mutual-adjective match. `user_lo < user_hi` always; the pair is stored
/// canonically so one unordered pair maps to one row.
#[derive(Debug, Clone)]
pub struct Match {
    pub id: Uuid,
    pub user_lo: Uuid,
    pub user_hi: Uuid,
    pub adjective: String,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn involves(&self, user: Uuid) -> bool {
        self.user_lo == user || self.user_hi == user
    }

    pub fn other(&self, user: Uuid) -> Uuid {
        if self.user_lo == user { self.user_hi } else { self.user_lo }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "declined" => Some(RequestStatus::Declined),
            _ => None,
        }
    }
}

/// Message request: at most one per ordered (from, to) pair. `pending` is the
/// only state that can change, and only the recipient changes it.
#[derive(Debug, Clone)]
pub struct MessageRequest {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub adjective: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub text: String,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [UserStatus::Unregistered, UserStatus::Active] {
            assert_eq!(UserStatus::from_str(status.as_str()), Some(status));
        }
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Declined,
        ] {
            assert_eq!(RequestStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(UserStatus::from_str("TEMP_USER"), None);
    }

    #[test]
    fn match_other_returns_the_opposite_side() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let m = Match {
            id: Uuid::now_v7(),
            user_lo: a.min(b),
            user_hi: a.max(b),
            adjective: "Charming".into(),
            created_at: Utc::now(),
        };
        assert!(m.involves(a));
        assert!(m.involves(b));
        assert_eq!(m.other(a), b);
        assert_eq!(m.other(b), a);
    }
}
