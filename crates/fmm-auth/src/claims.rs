//! Unverified JWT claim extraction
//!
//! Decodes the payload of a Nexus access token for user-info display. No
//! signature verification is performed: the token is trusted because it was
//! received directly from the token endpoint over HTTPS within the same
//! exchange. Checking the provider's published RSA key would harden this,
//! at the cost of changing the trust model. Callers must not delegate
//! authorization decisions to these claims.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use serde_json::Value;

use crate::types::UserIdentity;

/// Membership roles that count as premium
pub(crate) const PREMIUM_ROLES: [&str; 2] = ["premium", "lifetimepremium"];

/// Membership role that counts as supporter
pub(crate) const SUPPORTER_ROLE: &str = "supporter";

/// Decode base64url that may arrive without padding
fn b64url_decode_padded(segment: &str) -> Option<Vec<u8>> {
    let padding = (4 - segment.len() % 4) % 4;
    let padded = format!("{}{}", segment, "=".repeat(padding));
    URL_SAFE.decode(padded).ok()
}

/// Decode a JWT payload without verification
///
/// Returns an empty object for anything that is not a three-segment token
/// with a base64url JSON object in the middle. Decode failures are never
/// errors; the identity simply degrades to empty.
pub fn decode_claims(token: &str) -> Value {
    fn payload(token: &str) -> Option<Value> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return None;
        }
        let bytes = b64url_decode_padded(parts[1])?;
        let value: Value = serde_json::from_slice(&bytes).ok()?;
        value.is_object().then_some(value)
    }

    payload(token).unwrap_or_else(|| Value::Object(serde_json::Map::new()))
}

/// Extract display identity from a Nexus OAuth access token
pub fn extract_user_identity(access_token: &str) -> UserIdentity {
    identity_from_claims(&decode_claims(access_token))
}

/// Map Nexus claim structure (`user.username`, `user.membership_roles`) to
/// the normalized identity
pub(crate) fn identity_from_claims(claims: &Value) -> UserIdentity {
    let user = claims.get("user");

    let name = user
        .and_then(|u| u.get("username"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let roles: Vec<&str> = user
        .and_then(|u| u.get("membership_roles"))
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    UserIdentity {
        name,
        is_premium: roles.iter().any(|r| PREMIUM_ROLES.contains(r)),
        is_supporter: roles.contains(&SUPPORTER_ROLE),
        // Not carried in the JWT; the identity endpoint fills it
        profile_url: None,
    }
}
