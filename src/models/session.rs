use serde::{Deserialize, Serialize};

use crate::models::user::UserProfile;

/// Access/refresh token pair returned by a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Profile sent along with the tokens, if the backend included one.
    pub user: Option<UserProfile>,
}

/// Token bundle as the backend serializes it (`/auth/refresh`, and the `data`
/// member of `/auth/signin` and `/auth/signup`).
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user: Option<sonic_rs::Value>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl BackendSession {
    /// Converts into a token pair, normalizing the attached user object.
    pub fn into_pair(self) -> TokenPair {
        TokenPair {
            user: self.user.as_ref().and_then(UserProfile::from_backend),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

/// Sign-in/sign-up envelope: `{success, message?, data: {...}}`.
#[derive(Debug, Deserialize)]
pub struct AuthEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<BackendSession>,
}

/// Snapshot of a client's identity: both tokens and the cached profile.
///
/// Always written and cleared as one unit so no reader sees a new access
/// token next to a stale refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl StoredSession {
    /// Applies a refreshed pair, keeping the cached profile when the backend
    /// did not send a new one.
    pub fn rotated(&self, pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: pair.user.or_else(|| self.user.clone()),
        }
    }
}
