//! Authorization strategies.
//!
//! Auth is applied after the user's headers and query params are merged, so
//! any entry it produces replaces a user entry with the same key.

use super::types::{ApiKeyLocation, AuthConfig};
use crate::error::ProxyError;
use base64::Engine;

/// Ordered key/value pairs with last-write-wins semantics.
pub type Pairs = Vec<(String, String)>;

/// Inserts `key`, replacing the value of an existing entry in place.
///
/// Header names compare ignoring ASCII case; query keys compare exactly.
pub fn upsert(pairs: &mut Pairs, key: &str, value: &str, ignore_case: bool) {
    let existing = pairs.iter_mut().find(|(k, _)| {
        if ignore_case {
            k.eq_ignore_ascii_case(key)
        } else {
            k == key
        }
    });

    match existing {
        Some(entry) => *entry = (key.to_string(), value.to_string()),
        None => pairs.push((key.to_string(), value.to_string())),
    }
}

/// Applies `auth` to the merged headers and query params.
///
/// An empty bearer token, basic username or API key name is rejected before
/// anything is written, so a half-filled form never replaces a user header.
pub fn apply_auth(
    auth: &AuthConfig,
    headers: &mut Pairs,
    query: &mut Pairs,
) -> Result<(), ProxyError> {
    match auth {
        AuthConfig::None => {}
        AuthConfig::Bearer { token } => {
            let token = token.trim();
            if token.is_empty() {
                return Err(ProxyError::InvalidAuth("Bearer token cannot be empty".to_string()));
            }
            upsert(headers, "Authorization", &format!("Bearer {}", token), true);
        }
        AuthConfig::Basic { username, password } => {
            if username.trim().is_empty() {
                return Err(ProxyError::InvalidAuth(
                    "Basic auth username cannot be empty".to_string(),
                ));
            }
            let credentials = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", username, password));
            upsert(headers, "Authorization", &format!("Basic {}", credentials), true);
        }
        AuthConfig::Apikey { key, value, add_to } => {
            let key = key.trim();
            if key.is_empty() {
                return Err(ProxyError::InvalidAuth("API key name cannot be empty".to_string()));
            }
            match add_to {
                ApiKeyLocation::Header => upsert(headers, key, value, true),
                ApiKeyLocation::Query => upsert(query, key, value, false),
            }
        }
    }
    Ok(())
}
