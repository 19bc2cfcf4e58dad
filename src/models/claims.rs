//! Unverified JWT claim decoding for edge routing.
//!
//! Nothing here checks a signature. Claims read by this module may only steer
//! redirects and UX; the backend re-verifies every token before it trusts
//! `tenant_id` for data scoping.

use std::collections::BTreeMap;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use sonic_rs::JsonValueTrait;

use crate::error::{AppError, Result};

/// Prefix of an `Authorization` header carrying a bearer token.
pub const BEARER_PREFIX: &str = "Bearer ";

/// base64url that accepts segments with or without `=` padding.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Identity claims read from an access or refresh token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user id).
    pub sub: Option<String>,
    /// Tenant the token was minted for.
    pub tenant_id: Option<String>,
    /// Expiry in epoch seconds. `None` when missing or unparsable.
    pub exp: Option<i64>,
}

impl Claims {
    /// Parses the payload segment of a raw (prefix-less) JWT.
    ///
    /// # Returns
    ///
    /// `AppError::MalformedToken` if the token does not have three segments or
    /// the payload is not a base64url JSON object.
    pub fn parse(token: &str) -> Result<Self> {
        let mut segments = token.trim().split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (segments.next(), segments.next(), segments.next(), segments.next())
        else {
            return Err(AppError::MalformedToken);
        };

        let bytes = SEGMENT_ENGINE
            .decode(payload)
            .map_err(|_| AppError::MalformedToken)?;

        let fields: BTreeMap<String, sonic_rs::Value> =
            sonic_rs::from_slice(&bytes).map_err(|_| AppError::MalformedToken)?;

        Ok(Self {
            sub: fields.get("sub").and_then(value_as_string),
            tenant_id: fields
                .get("tenant_id")
                .or_else(|| fields.get("tenantId"))
                .and_then(value_as_string),
            exp: fields.get("exp").and_then(value_as_epoch),
        })
    }

    /// True if the token expired before `now`. A missing `exp` counts as expired.
    pub fn is_expired(&self, now: i64) -> bool {
        match self.exp {
            Some(exp) => exp < now,
            None => true,
        }
    }

    /// True if fewer than `threshold_secs` remain before expiry.
    pub fn is_near_expiry(&self, now: i64, threshold_secs: i64) -> bool {
        match self.exp {
            Some(exp) => exp.saturating_sub(now) < threshold_secs,
            None => true,
        }
    }
}

/// Decodes the claims of a `Bearer <jwt>` header value.
///
/// Never fails: a missing header, a missing prefix or any decode error
/// yields `None` ("no identity").
pub fn decode_claims(header: Option<&str>) -> Option<Claims> {
    header?.strip_prefix(BEARER_PREFIX).and_then(decode_token)
}

/// Decodes the claims of a raw token, as stored in the identity cookies.
pub fn decode_token(token: &str) -> Option<Claims> {
    match Claims::parse(token) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!("🔍 Ignoring undecodable token: {}", e);
            None
        }
    }
}

/// True if `token` decodes and has not expired at `now`.
pub fn is_token_live(token: Option<&str>, now: i64) -> bool {
    token
        .and_then(decode_token)
        .is_some_and(|claims| !claims.is_expired(now))
}

fn value_as_string(value: &sonic_rs::Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }
    value.as_i64().map(|n| n.to_string())
}

fn value_as_epoch(value: &sonic_rs::Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    if let Some(f) = value.as_f64() {
        return f.is_finite().then(|| f.floor() as i64);
    }
    value.as_str().and_then(|s| s.trim().parse().ok())
}
