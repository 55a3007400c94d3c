use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

/// Default per-file upload ceiling: 20 MB.
const DEFAULT_UPLOAD_LIMIT_BYTES: usize = 20 * 1024 * 1024;

/// Runtime configuration, built once in `main` and threaded through
/// `AppState`. Business logic never reads the environment directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// HS256 signing secret for bearer tokens. Required.
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: i64,
    /// Origins allowed by the CORS layer.
    pub allowed_origins: Vec<String>,
    /// Per-file ceiling for uploads, in bytes.
    pub upload_limit_bytes: usize,
    /// Watermark composited onto covers when the file exists.
    pub watermark_path: Option<PathBuf>,
    /// Admin account created at startup when both values are present.
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Read configuration from the environment. A missing `JWT_SECRET`
    /// terminates startup; everything else has a default.
    pub fn load() -> Self {
        Self {
            jwt_secret: require("JWT_SECRET"),
            token_ttl_secs: try_load("TOKEN_TTL_SECS", "604800"),
            allowed_origins: var("ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            upload_limit_bytes: var("UPLOAD_LIMIT_MB")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .map(|mb| mb * 1024 * 1024)
                .unwrap_or(DEFAULT_UPLOAD_LIMIT_BYTES),
            watermark_path: var("WATERMARK_PATH").ok().map(PathBuf::from),
            admin_username: var("ADMIN_USERNAME").ok(),
            admin_password: var("ADMIN_PASSWORD").ok(),
        }
    }

    /// Bootstrap admin credentials, when both are configured.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.admin_username, &self.admin_password) {
            (Some(u), Some(p)) => Some((u, p)),
            _ => None,
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| ())
}

fn require(key: &str) -> String {
    var(key)
        .map_err(|_| {
            warn!("Required environment variable {key} is missing");
        })
        .expect("Environment misconfigured!")
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

#[cfg(test)]
impl Config {
    /// Fixed configuration for tests; nothing read from the environment.
    pub fn for_tests() -> Self {
        Self {
            jwt_secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT_BYTES,
            watermark_path: None,
            admin_username: None,
            admin_password: None,
        }
    }
}
