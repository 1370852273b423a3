//! Access-token claim decoding.
//!
//! The signature is never checked here: the `exp` claim only drives UX
//! decisions, the API verifies every token it receives.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token must have three dot-separated segments")]
    Malformed,

    #[error("token payload is not valid base64url")]
    Encoding,

    #[error("token payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token has no exp claim")]
    MissingExpiry,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        match self.extra.get("user_id")? {
            Value::String(id) => Some(id.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Decodes the payload segment of a JWT-shaped token.
///
/// # Errors
/// Returns an error if the token is not three segments or the payload is not
/// base64url-encoded JSON.
pub fn decode_claims(token: &str) -> Result<TokenClaims, TokenError> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed);
    };

    let bytes = Base64UrlUnpadded::decode_vec(payload.trim_end_matches('='))
        .map_err(|_| TokenError::Encoding)?;

    Ok(serde_json::from_slice(&bytes)?)
}

/// Expiry as seconds since the Unix epoch.
///
/// # Errors
/// Returns an error if the token cannot be decoded or carries no `exp`.
pub fn expires_at(token: &str) -> Result<i64, TokenError> {
    decode_claims(token)?
        .exp
        .map(|exp| exp as i64)
        .ok_or(TokenError::MissingExpiry)
}

/// Seconds left before expiry; zero or negative once expired.
///
/// # Errors
/// Returns an error if the token cannot be decoded or carries no `exp`.
pub fn seconds_until_expiry(token: &str, now: i64) -> Result<i64, TokenError> {
    Ok(expires_at(token)? - now)
}

/// A token that cannot be decoded counts as expired.
#[must_use]
pub fn is_expired(token: &str, now: i64) -> bool {
    seconds_until_expiry(token, now).map_or(true, |remaining| remaining <= 0)
}

#[must_use]
pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::Result;

    /// Builds an unsigned token with the given claims.
    pub(crate) fn unsigned_token(claims: &Value) -> String {
        let header = Base64UrlUnpadded::encode_string(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = Base64UrlUnpadded::encode_string(claims.to_string().as_bytes());
        format!("{header}.{payload}.signature")
    }

    #[test]
    fn decodes_exp_and_extra_claims() -> Result<()> {
        let token = unsigned_token(&serde_json::json!({
            "exp": 1_700_000_000,
            "user_id": 42,
            "token_type": "access"
        }));

        let claims = decode_claims(&token)?;
        assert_eq!(claims.exp, Some(1_700_000_000.0));
        assert_eq!(claims.user_id(), Some("42".to_string()));
        assert_eq!(
            claims.extra.get("token_type"),
            Some(&Value::String("access".to_string()))
        );
        Ok(())
    }

    #[test]
    fn padded_payload_is_accepted() -> Result<()> {
        let token = unsigned_token(&serde_json::json!({ "exp": 10 }));
        let mut parts: Vec<&str> = token.split('.').collect();
        let padded = format!("{}==", parts[1]);
        parts[1] = &padded;

        assert_eq!(expires_at(&parts.join("."))?, 10);
        Ok(())
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(decode_claims("abc"), Err(TokenError::Malformed)));
        assert!(matches!(decode_claims("a.b.c.d"), Err(TokenError::Malformed)));
        assert!(matches!(
            decode_claims("a.!!!.c"),
            Err(TokenError::Encoding)
        ));
    }

    #[test]
    fn missing_exp_is_an_error() {
        let token = unsigned_token(&serde_json::json!({ "sub": "x" }));
        assert!(matches!(expires_at(&token), Err(TokenError::MissingExpiry)));
        assert!(is_expired(&token, 0));
    }

    #[test]
    fn expiry_is_relative_to_now() -> Result<()> {
        let token = unsigned_token(&serde_json::json!({ "exp": 1_000 }));
        assert_eq!(seconds_until_expiry(&token, 900)?, 100);
        assert!(!is_expired(&token, 999));
        assert!(is_expired(&token, 1_000));
        assert!(is_expired("garbage", 0));
        Ok(())
    }
}
