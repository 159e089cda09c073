use std::env;
use std::sync::OnceLock;

use crate::error::{Error, Result};

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub cors_uri: String,
    pub email_relay_url: String,
    pub email_user: String,
    pub email_pass: String,
    pub uploads_dir: String,
}

impl Config {
    fn from_env() -> Result<Self> {
        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            stripe_secret_key: get_env("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: get_env("STRIPE_WEBHOOK_SECRET")?,
            cors_uri: get_env("CORS_URI")?,
            email_relay_url: get_env("EMAIL_RELAY_URL")?,
            email_user: get_env("EMAIL_USER")?,
            email_pass: get_env("EMAIL_PASS")?,
            uploads_dir: env::var("UPLOADS_DIR").unwrap_or_else(|_| "./uploads".to_string()),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

/// Loads configuration from the environment exactly once.
pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration already initialized".to_string()))
}

pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Configuration is not initialized")
}
