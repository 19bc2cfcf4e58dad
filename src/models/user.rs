use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sonic_rs::JsonValueTrait;

/// The backend user object, normalized to snake_case.
///
/// Built only through [`UserProfile::from_backend`]; the backend has been seen
/// answering with either casing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user's id.
    pub id: String,
    /// The user's email address.
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Display name, composed from first and last name when the backend omits it.
    pub name: Option<String>,
    /// Whether the onboarding wizard has been completed.
    pub onboarding_completed: bool,
    /// Tenant the user belongs to.
    pub tenant_id: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
}

impl UserProfile {
    /// Maps a raw backend user object to a profile.
    ///
    /// # Arguments
    ///
    /// * `raw` - The user JSON as returned by the backend.
    ///
    /// # Returns
    ///
    /// `None` if the payload is not an object or has no id.
    pub fn from_backend(raw: &sonic_rs::Value) -> Option<Self> {
        let json = sonic_rs::to_string(raw).ok()?;
        Self::from_json(&json)
    }

    /// Same as [`UserProfile::from_backend`] for a JSON string.
    pub fn from_json(json: &str) -> Option<Self> {
        let map: BTreeMap<String, sonic_rs::Value> = sonic_rs::from_str(json).ok()?;
        Self::from_fields(map)
    }

    fn from_fields(map: BTreeMap<String, sonic_rs::Value>) -> Option<Self> {
        let mut fields: BTreeMap<String, sonic_rs::Value> = BTreeMap::new();
        for (key, value) in map {
            fields.entry(to_snake_case(&key)).or_insert(value);
        }

        let text = |key: &str| -> Option<String> {
            let value = fields.get(key)?;
            if let Some(s) = value.as_str() {
                return Some(s.to_string()).filter(|s| !s.is_empty());
            }
            value.as_i64().map(|n| n.to_string())
        };
        let flag = |key: &str| -> Option<bool> {
            let value = fields.get(key)?;
            value.as_bool().or_else(|| match value.as_str()? {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            })
        };

        let id = text("id").or_else(|| text("user_id"))?;
        let first_name = text("first_name");
        let last_name = text("last_name");
        let name = text("name").or_else(|| {
            let joined = [first_name.as_deref(), last_name.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            Some(joined).filter(|n| !n.is_empty())
        });

        Some(Self {
            id,
            email: text("email"),
            first_name,
            last_name,
            name,
            onboarding_completed: flag("onboarding_completed").unwrap_or(false),
            tenant_id: text("tenant_id").or_else(|| text("organization_id")),
            is_active: flag("is_active").unwrap_or(true),
            is_verified: flag("is_verified").unwrap_or(false),
        })
    }
}

/// `onboardingCompleted` → `onboarding_completed`; snake_case keys pass through.
fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}
