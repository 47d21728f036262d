use std::env;

use chrono::Duration;
use cpg_common::Secret;
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

use crate::errors::ServerError;

const DEFAULT_CPG_HOST: &str = "127.0.0.1";
const DEFAULT_CPG_PORT: u16 = 8380;
const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";
const DEFAULT_TOKEN_EXPIRY_HOURS: i64 = 24;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Where payout request notifications are sent.
    pub admin_email: String,
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CPG_HOST.to_string(),
            port: DEFAULT_CPG_PORT,
            database_url: String::default(),
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("CPG_HOST").ok().unwrap_or_else(|| DEFAULT_CPG_HOST.into());
        let port = env::var("CPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for CPG_PORT. {e} Using the default, {DEFAULT_CPG_PORT}, instead."
                    );
                    DEFAULT_CPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_CPG_PORT);
        let database_url = env::var("CPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ CPG_DATABASE_URL is not set. Please set it to the URL for the gateway database.");
            String::default()
        });
        let admin_email = env::var("CPG_ADMIN_EMAIL").ok().unwrap_or_else(|| {
            error!(
                "🪛️ CPG_ADMIN_EMAIL is not set. Payout request notifications will go to {DEFAULT_ADMIN_EMAIL} until \
                 it is configured."
            );
            DEFAULT_ADMIN_EMAIL.to_string()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!(
                "🪛️ Could not load the authentication configuration from environment variables. {e}. Reverting to the \
                 default configuration."
            );
            AuthConfig::default()
        });
        Self { host, port, database_url, admin_email, auth }
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The secret used to sign access tokens (HMAC-SHA256).
    pub jwt_secret: Secret<String>,
    /// How long an issued access token stays valid.
    pub token_expiry: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT signing secret has not been set. I'm using a random value for this session. All issued \
             tokens become invalid when the server restarts. DO NOT operate on production like this. Set the \
             CPG_JWT_SECRET environment variable instead. 🚨️🚨️🚨️"
        );
        let secret: String = thread_rng().sample_iter(&Alphanumeric).take(64).map(char::from).collect();
        Self { jwt_secret: Secret::new(secret), token_expiry: Duration::hours(DEFAULT_TOKEN_EXPIRY_HOURS) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, ServerError> {
        let secret =
            env::var("CPG_JWT_SECRET").map_err(|e| ServerError::ConfigurationError(format!("{e} [CPG_JWT_SECRET]")))?;
        if secret.len() < 32 {
            return Err(ServerError::ConfigurationError(
                "CPG_JWT_SECRET must be at least 32 characters long.".to_string(),
            ));
        }
        let token_expiry = env::var("CPG_TOKEN_EXPIRY_HOURS")
            .ok()
            .and_then(|s| {
                s.parse::<i64>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for CPG_TOKEN_EXPIRY_HOURS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_TOKEN_EXPIRY_HOURS);
        let token_expiry = Duration::hours(token_expiry);
        Ok(Self { jwt_secret: Secret::new(secret), token_expiry })
    }
}
