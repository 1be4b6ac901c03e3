use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_CLASSIFIER_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ANON_RATE_LIMIT: usize = 10;
pub const ANON_RATE_WINDOW_SECS: u64 = 60;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} missing")]
    Missing(&'static str),
    #[error("{0} is invalid: {1}")]
    Invalid(&'static str, String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_key: Vec<u8>,
    /// `None` keeps the classifier on the local heuristic.
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub classifier_timeout: Duration,
    pub db_max_connections: u32,
    pub bind_addr: String,
    pub anon_rate_limit: usize,
    /// Key guests on the first `X-Forwarded-For` hop instead of the peer
    /// address. Only safe behind a proxy that overwrites the header.
    pub trust_proxy: bool,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"<redacted>")
            .field("session_key", &"<redacted>")
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("openai_model", &self.openai_model)
            .field("classifier_timeout", &self.classifier_timeout)
            .field("db_max_connections", &self.db_max_connections)
            .field("bind_addr", &self.bind_addr)
            .field("anon_rate_limit", &self.anon_rate_limit)
            .field("trust_proxy", &self.trust_proxy)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let session_key_b64 = var("SESSION_KEY").ok_or(ConfigError::Missing("SESSION_KEY"))?;
        let session_key = general_purpose::STANDARD
            .decode(session_key_b64.trim())
            .map_err(|e| ConfigError::Invalid("SESSION_KEY", e.to_string()))?;

        let classifier_timeout_secs = parse_or(
            var("CLASSIFIER_TIMEOUT_SECS"),
            "CLASSIFIER_TIMEOUT_SECS",
            DEFAULT_CLASSIFIER_TIMEOUT_SECS,
        )?;

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| {
            let port = var("PORT").unwrap_or_else(|| "3000".to_string());
            format!("0.0.0.0:{}", port)
        });

        Ok(Self {
            database_url,
            session_key,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            classifier_timeout: Duration::from_secs(classifier_timeout_secs),
            db_max_connections: parse_or(
                var("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            bind_addr,
            anon_rate_limit: parse_or(
                var("ANON_RATE_LIMIT"),
                "ANON_RATE_LIMIT",
                DEFAULT_ANON_RATE_LIMIT,
            )?,
            trust_proxy: parse_or(var("TRUST_PROXY"), "TRUST_PROXY", false)?,
        })
    }
}

fn parse_or<T>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(key, e.to_string())),
        None => Ok(default),
    }
}
