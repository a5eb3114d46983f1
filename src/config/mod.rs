use std::env;
use std::str::FromStr;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppEnv {
    #[default]
    Local,
    Development,
    Production,
}

impl FromStr for AppEnv {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(AppEnv::Local),
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender_email: String,
    pub sender_name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub access_token_secret: String,
    pub access_token_ttl_minutes: i64,
    pub cors_allowed_origins: Vec<String>,
    pub log_format: LogFormat,
    pub file_link_ttl_seconds: u64,
    /// `None` keeps uploads in process memory.
    pub s3: Option<S3Config>,
    /// `None` logs outgoing mail instead of sending it.
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let s3 = var("AWS_S3_BUCKET_NAME").map(|bucket| S3Config {
            region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            bucket,
            access_key_id: var("AWS_ACCESS_KEY_ID"),
            secret_access_key: var("AWS_SECRET_ACCESS_KEY"),
            endpoint: var("AWS_S3_ENDPOINT"),
        });

        let smtp = match (var("SMTP_HOST"), var("SMTP_USERNAME"), var("SMTP_PASSWORD")) {
            (Some(host), Some(username), Some(password)) => Some(SmtpConfig {
                port: parse_or("SMTP_PORT", var("SMTP_PORT"), 465)?,
                sender_email: var("SMTP_SENDER_EMAIL").unwrap_or_else(|| username.clone()),
                sender_name: var("SMTP_SENDER_NAME").unwrap_or_else(|| "Event Booker".to_string()),
                host,
                username,
                password,
            }),
            _ => None,
        };

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            app_env: parse_or("APP_ENV", var("APP_ENV"), AppEnv::Local)?,
            app_name: var("APP_NAME").unwrap_or_else(|| "event-booker".to_string()),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", var("PORT"), 3001)?,
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                var("DATABASE_MAX_CONNECTIONS"),
                5,
            )?,
            access_token_secret: required("ACCESS_TOKEN_SECRET")?,
            access_token_ttl_minutes: parse_or(
                "ACCESS_TOKEN_TTL_MINUTES",
                var("ACCESS_TOKEN_TTL_MINUTES"),
                24 * 60,
            )?,
            cors_allowed_origins,
            log_format: parse_or("LOG_FORMAT", var("LOG_FORMAT"), LogFormat::Text)?,
            file_link_ttl_seconds: parse_or(
                "FILE_LINK_TTL_SECONDS",
                var("FILE_LINK_TTL_SECONDS"),
                7 * 24 * 60 * 60,
            )?,
            s3,
            smtp,
        })
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/events"),
        ("ACCESS_TOKEN_SECRET", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.app_env, AppEnv::Local);
        assert_eq!(config.bind_address(), "0.0.0.0:3001");
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.access_token_ttl_minutes, 1440);
        assert_eq!(config.file_link_ttl_seconds, 604800);
        assert_eq!(config.cors_allowed_origins.len(), 2);
        assert!(config.s3.is_none());
        assert!(config.smtp.is_none());
        assert!(!config.is_production());
    }

    #[test]
    fn test_missing_required_variable() {
        let err = load(&[("DATABASE_URL", "postgres://x")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ACCESS_TOKEN_SECRET")));
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("PORT", "eighty"));
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_optional_backends() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("APP_ENV", "production"),
            ("AWS_S3_BUCKET_NAME", "uploads"),
            ("AWS_REGION", "eu-west-1"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_USERNAME", "mailer@example.com"),
            ("SMTP_PASSWORD", "pw"),
        ]);
        let config = load(&vars).unwrap();
        assert!(config.is_production());
        assert_eq!(config.s3.as_ref().map(|s| s.region.as_str()), Some("eu-west-1"));
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 465);
        assert_eq!(smtp.sender_email, "mailer@example.com");
        assert_eq!(smtp.sender_name, "Event Booker");
    }
}
