use std::sync::Arc;

use crate::config::Config;
use crate::crypto::credentials::CipherService;
use crate::error::{AppError, Result};
use crate::services::refresh::{parked_ttl_for, SessionRefresher};

/// Builds the HTTP client shared by every backend call.
///
/// A timeout counts as a failed call, so a stalled refresh resolves to "refresh failed".
pub fn build_http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| AppError::Configuration(format!("Could not build HTTP client: {}", e)))
}

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// Client for the scanning backend.
    pub http: reqwest::Client,
    /// The refresh protocol, shared so concurrent requests share one exchange.
    pub refresher: SessionRefresher,
    /// `None` when no encryption key is configured.
    cipher: Option<Arc<CipherService>>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = build_http_client(config)?;
        tracing::info!("✅ HTTP client initialized (timeout {:?})", config.http_timeout);

        let refresher = SessionRefresher::new(http.clone(), &config.api_base_url)
            .with_parked_ttl(parked_ttl_for(config.refresh_threshold_secs));

        let cipher = match CipherService::from_secret(config.encryption_key.as_deref().map(|k| k.as_str())) {
            Ok(cipher) => {
                tracing::info!("✅ Credential cipher initialized");
                Some(Arc::new(cipher))
            }
            Err(e) => {
                tracing::warn!("⚠️  Credential cipher unavailable: {}", e);
                None
            }
        };

        Ok(Self {
            config: config.clone(),
            http,
            refresher,
            cipher,
        })
    }

    /// The credential cipher.
    ///
    /// # Returns
    ///
    /// A `Configuration` error when no encryption key was configured.
    pub fn cipher(&self) -> Result<Arc<CipherService>> {
        self.cipher.clone().ok_or_else(|| {
            AppError::Configuration("CLOUDLENS_ENCRYPTION_KEY is not configured".to_string())
        })
    }
}
