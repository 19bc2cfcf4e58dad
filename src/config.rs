use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// Seconds before `exp` at which the gate starts a background refresh.
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 300;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the scanning backend, without a trailing slash.
    pub api_base_url: String,
    /// Shared secret for the credential cipher. Checked on first use, not at startup.
    pub encryption_key: Option<Zeroizing<String>>,
    /// The address the edge server listens on.
    pub bind_addr: SocketAddr,
    /// Timeout applied to every backend call.
    pub http_timeout: Duration,
    /// Near-expiry threshold for proactive refresh.
    pub refresh_threshold_secs: i64,
    /// Lifetime of the access-token cookie.
    pub access_cookie_minutes: i64,
    /// Lifetime of the refresh-token and profile cookies.
    pub refresh_cookie_days: i64,
    /// Whether identity cookies carry the `Secure` attribute.
    pub secure_cookies: bool,
    /// Origins allowed by the CORS layer.
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let api_base_url = env::var("CLOUDLENS_API_URL")
            .context("CLOUDLENS_API_URL must be set (e.g. http://localhost:8000)")?;

        let encryption_key = env::var("CLOUDLENS_ENCRYPTION_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .map(Zeroizing::new);

        if encryption_key.is_none() {
            tracing::warn!("⚠️  CLOUDLENS_ENCRYPTION_KEY not set, scan submission will fail");
        }

        let secure_cookies = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string()) == "production";

        Ok(Self {
            api_base_url: normalize_base_url(&api_base_url)?,
            encryption_key,
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
            http_timeout: Duration::from_secs(
                env::var("HTTP_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("Invalid HTTP_TIMEOUT_SECS")?,
            ),
            refresh_threshold_secs: env::var("REFRESH_THRESHOLD_SECS")
                .unwrap_or_else(|_| DEFAULT_REFRESH_THRESHOLD_SECS.to_string())
                .parse()
                .context("Invalid REFRESH_THRESHOLD_SECS")?,
            access_cookie_minutes: env::var("ACCESS_COOKIE_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid ACCESS_COOKIE_MINUTES")?,
            refresh_cookie_days: env::var("REFRESH_COOKIE_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid REFRESH_COOKIE_DAYS")?,
            secure_cookies,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    /// Builds a configuration pointing at `api_base_url` with defaults for
    /// everything else. Used by embedding clients and tests.
    pub fn for_backend(api_base_url: &str, encryption_key: Option<&str>) -> Result<Self> {
        Ok(Self {
            api_base_url: normalize_base_url(api_base_url)?,
            encryption_key: encryption_key.map(|k| Zeroizing::new(k.to_string())),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            http_timeout: Duration::from_secs(10),
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            access_cookie_minutes: 30,
            refresh_cookie_days: 30,
            secure_cookies: false,
            cors_origins: vec!["http://localhost:3000".to_string()],
        })
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        anyhow::bail!("Backend URL must start with http:// or https://, got {:?}", raw);
    }
    Ok(trimmed.to_string())
}
