use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::crypto::credentials::CredentialEnvelope;

/// Default scan timeout the backend applies, in seconds.
pub const DEFAULT_SCAN_OPTIONS: u32 = 840;

fn default_scan_options() -> u32 {
    DEFAULT_SCAN_OPTIONS
}

/// Plaintext scan submission as entered on the scan form.
#[derive(Deserialize, Validate)]
pub struct ScanRequest {
    #[garde(length(min = 16, max = 128))]
    pub aws_access_key: String,
    #[garde(length(min = 1, max = 256))]
    pub aws_secret_key: String,
    #[serde(default)]
    #[garde(length(max = 4096))]
    pub aws_session_token: Option<String>,
    #[serde(default)]
    #[garde(inner(length(min = 1, max = 32)))]
    pub excluded_regions: Vec<String>,
    #[serde(default = "default_scan_options")]
    #[garde(range(min = 60, max = 3600))]
    pub scan_options: u32,
}

impl std::fmt::Debug for ScanRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanRequest")
            .field("aws_access_key", &"<redacted>")
            .field("aws_secret_key", &"<redacted>")
            .field("has_session_token", &self.aws_session_token.is_some())
            .field("excluded_regions", &self.excluded_regions)
            .field("scan_options", &self.scan_options)
            .finish()
    }
}

/// Body of `POST /api/scan/aws-cloud-scan`. No tenant field: the backend
/// takes the tenant from the verified token.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSubmission {
    #[serde(flatten)]
    pub credentials: CredentialEnvelope,
    pub excluded_regions: Vec<String>,
    pub scan_options: u32,
}

/// Filters for `POST /api/scan/scans`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

impl Default for ScanListQuery {
    fn default() -> Self {
        Self {
            status: None,
            cloud_provider: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

/// Body of `POST /api/dashboard/metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_id: Option<String>,
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    30
}

impl Default for DashboardQuery {
    fn default() -> Self {
        Self {
            scan_id: None,
            days: default_days(),
        }
    }
}

/// Query of the edge's `GET /api/regions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionQuery {
    /// Provider code such as `AWS`; all providers when absent.
    #[serde(default)]
    pub cloud_provider: Option<String>,
}
