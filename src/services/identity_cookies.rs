//! The cookie channel: the same three identity values the client store holds,
//! readable by the edge on every request.

use base64::{engine::general_purpose, Engine as _};
use tower_cookies::cookie::time::Duration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};

use crate::config::Config;
use crate::models::session::StoredSession;
use crate::models::user::UserProfile;

pub const ACCESS_TOKEN_COOKIE: &str = "cloudlens_access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "cloudlens_refresh_token";
pub const USER_COOKIE: &str = "cloudlens_user";

/// Identity values as read from one request's cookies.
#[derive(Debug, Clone, Default)]
pub struct CookieIdentity {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
}

impl CookieIdentity {
    /// True when no identity cookie was sent at all.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user.is_none()
    }

    /// The snapshot form, if a refresh token is present.
    ///
    /// The access cookie expires long before the refresh cookie, so a missing
    /// access token is stored as empty and gets refreshed before the first call.
    pub fn to_stored(&self) -> Option<StoredSession> {
        Some(StoredSession {
            access_token: self.access_token.clone().unwrap_or_default(),
            refresh_token: self.refresh_token.clone()?,
            user: self.user.clone(),
        })
    }
}

/// Reads the identity cookies.
pub fn read_identity(cookies: &Cookies) -> CookieIdentity {
    let value = |name: &str| {
        cookies
            .get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    };

    CookieIdentity {
        access_token: value(ACCESS_TOKEN_COOKIE),
        refresh_token: value(REFRESH_TOKEN_COOKIE),
        user: value(USER_COOKIE).and_then(|v| decode_profile(&v)),
    }
}

/// Writes all three identity cookies.
///
/// When `session.user` is `None` the profile cookie is left as it was.
pub fn write_session(cookies: &Cookies, config: &Config, session: &StoredSession) {
    cookies.add(identity_cookie(
        ACCESS_TOKEN_COOKIE,
        session.access_token.clone(),
        Duration::minutes(config.access_cookie_minutes),
        config.secure_cookies,
    ));
    cookies.add(identity_cookie(
        REFRESH_TOKEN_COOKIE,
        session.refresh_token.clone(),
        Duration::days(config.refresh_cookie_days),
        config.secure_cookies,
    ));
    if let Some(user) = &session.user {
        write_profile(cookies, config, user);
    }
}

/// Rewrites only the profile cookie.
pub fn write_profile(cookies: &Cookies, config: &Config, user: &UserProfile) {
    match encode_profile(user) {
        Some(encoded) => cookies.add(identity_cookie(
            USER_COOKIE,
            encoded,
            Duration::days(config.refresh_cookie_days),
            config.secure_cookies,
        )),
        None => tracing::warn!("⚠️  Could not encode profile cookie for user {}", user.id),
    }
}

/// Removes all three identity cookies.
pub fn clear_session(cookies: &Cookies) {
    for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, USER_COOKIE] {
        let mut cookie = Cookie::new(name, "");
        cookie.set_max_age(Duration::seconds(0));
        cookie.set_path("/");
        cookies.remove(cookie);
    }
}

fn identity_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_max_age(max_age);
    cookie.set_path("/");
    cookie
}

/// base64url(JSON) keeps quotes and commas out of the cookie value.
pub fn encode_profile(user: &UserProfile) -> Option<String> {
    let json = sonic_rs::to_string(user).ok()?;
    Some(general_purpose::URL_SAFE_NO_PAD.encode(json))
}

pub fn decode_profile(value: &str) -> Option<UserProfile> {
    let bytes = general_purpose::URL_SAFE_NO_PAD.decode(value).ok()?;
    let json = String::from_utf8(bytes).ok()?;
    UserProfile::from_json(&json)
}
