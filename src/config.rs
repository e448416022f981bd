use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

/// Which store backend to run against. `Memory` is the dependency-free demo
/// mode (the data lives and dies with the process), `Sqlite` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub store: StoreKind,
    pub jwt_secret: String,
    pub production: bool,
    pub resend_api_key: Option<String>,
    pub resend_from: String,
    pub frontend_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        // missing .env is fine, plain process env still applies
        let _ = dotenv::dotenv();

        let store = match env::var("CITADEL_STORE").as_deref() {
            Ok("memory") => StoreKind::Memory,
            _ => StoreKind::Sqlite,
        };

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using the development default");
            "your-secret-key-change-in-production".to_owned()
        });

        let production = env::var("APP_ENV").as_deref() == Ok("production");

        Self {
            port: try_load("PORT", "3001"),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:citadel.db?mode=rwc".to_owned()),
            store,
            jwt_secret,
            production,
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|k| !k.is_empty()),
            resend_from: env::var("RESEND_FROM_EMAIL")
                .unwrap_or_else(|_| "onboarding@resend.dev".to_owned()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_owned()),
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_owned()
    });
    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("invalid {key} value {raw:?} ({e}), using default: {default}");
            default.parse().unwrap_or_else(|e| panic!("bad default for {key}: {e}"))
        }
    }
}
