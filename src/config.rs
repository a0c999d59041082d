use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;

/// Largest BCC list a single absence message may carry.
pub const MAX_MAIL_BATCH: usize = 80;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub login_rps: u32,
    pub mail_relay_url: Option<String>,
    pub mail_relay_token: Option<String>,
    pub mail_from: String,
    pub mail_batch_size: usize,
    pub log_json: bool,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let mail_batch_size: usize = get_env_parse_or("MAIL_BATCH_SIZE", MAX_MAIL_BATCH)?;

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            token_ttl_days: get_env_parse_or("TOKEN_TTL_DAYS", 7)?,
            login_rps: get_env_parse_or("LOGIN_RPS", 20)?,
            mail_relay_url: env::var("MAIL_RELAY_URL").ok().filter(|s| !s.is_empty()),
            mail_relay_token: env::var("MAIL_RELAY_TOKEN").ok().filter(|s| !s.is_empty()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@training.local".to_string()),
            mail_batch_size: mail_batch_size.clamp(1, MAX_MAIL_BATCH),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}
