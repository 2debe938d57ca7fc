use std::time::Duration;

use thiserror::Error;

/// Lifetime of preview links handed out by the object store.
pub const SIGNED_URL_EXPIRY_SECS: u64 = 3600;

/// Cookie carrying the session token.
pub const AUTH_COOKIE: &str = "auth_token";

pub const PDF_MIME: &str = "application/pdf";

pub const SIGN_IN_PATH: &str = "/auth/google";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Bounded retry for the record-delete step of a file deletion.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Linear backoff: the n-th retry waits `n * backoff`.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub google: GoogleConfig,
    pub max_upload_bytes: usize,
    pub record_delete: RetryPolicy,
    pub reconcile_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_hours: parse_or(&lookup, "JWT_TTL_HOURS", 24)?,
            s3_bucket: lookup("S3_BUCKET").unwrap_or_else(|| "pdfs".to_string()),
            s3_endpoint: lookup("S3_ENDPOINT").filter(|v| !v.is_empty()),
            google: GoogleConfig {
                client_id: required("CLIENT_ID")?,
                client_secret: required("CLIENT_SECRET")?,
                redirect_uri: required("REDIRECT_URI")?,
            },
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?,
            record_delete: RetryPolicy {
                attempts: parse_or(&lookup, "RECORD_DELETE_ATTEMPTS", 3u32)?.max(1),
                backoff: Duration::from_millis(parse_or(&lookup, "RECORD_DELETE_BACKOFF_MS", 200)?),
            },
            reconcile_interval: Duration::from_secs(parse_or(
                &lookup,
                "RECONCILE_INTERVAL_SECS",
                300,
            )?),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/vault"),
            ("JWT_SECRET", "secret"),
            ("CLIENT_ID", "id"),
            ("CLIENT_SECRET", "shh"),
            ("REDIRECT_URI", "http://localhost:8080/auth/google/callback"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_absent() {
        let config = load(&base()).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.s3_bucket, "pdfs");
        assert_eq!(config.s3_endpoint, None);
        assert_eq!(config.jwt_ttl_hours, 24);
        assert_eq!(config.max_upload_bytes, 52_428_800);
        assert_eq!(config.record_delete.attempts, 3);
        assert_eq!(config.reconcile_interval, Duration::from_secs(300));
    }

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let mut vars = base();
        vars.remove("JWT_SECRET");
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn unparsable_number_is_rejected() {
        let mut vars = base();
        vars.insert("MAX_UPLOAD_BYTES", "lots");
        assert!(matches!(
            load(&vars),
            Err(ConfigError::Invalid { name: "MAX_UPLOAD_BYTES", .. })
        ));
    }

    #[test]
    fn retry_backoff_grows_linearly() {
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_before(1), Duration::from_millis(100));
        assert_eq!(policy.delay_before(2), Duration::from_millis(200));
    }
}
