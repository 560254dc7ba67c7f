use std::{env, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub paystack: PaystackConfig,
}

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            paystack: PaystackConfig::from_env()?,
        })
    }
}

impl PaystackConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.paystack.co";

    pub fn from_env() -> anyhow::Result<Self> {
        let secret_key =
            env::var("PAYSTACK_SECRET_KEY").context("PAYSTACK_SECRET_KEY is not set")?;
        let base_url = env::var("PAYSTACK_BASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_BASE_URL.to_string());
        let timeout_secs = env::var("PAYMENT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(15)
            .clamp(1, 60);
        Ok(Self {
            secret_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
