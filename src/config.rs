// src/config.rs

use dotenvy::dotenv;
use std::env;

/// Maximum number of entries returned by the global leaderboard.
pub const LEADERBOARD_LIMIT: usize = 50;

/// Points ceiling for any attempt after the first.
pub const REATTEMPT_POINT_CAP: i64 = 85;

/// How many times an attempt insert is retried when the
/// (user_id, quiz_id, attempt_number) unique index reports a conflict.
pub const ATTEMPT_INSERT_RETRIES: u32 = 3;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }
}
