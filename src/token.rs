//! Bearer token inspection.
//!
//! Tokens are issued and verified by the identity backend. This module only
//! reads the embedded `exp` claim to decide whether a token is worth sending
//! at all; the signature is never checked here.

use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;

/// Default safety buffer: treat tokens as dead five minutes before `exp`.
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 5 * 60;

#[derive(Debug, Deserialize)]
struct ExpiryClaim {
    #[serde(default)]
    exp: Option<f64>,
}

/// Errors that can occur while reading a token's claims.
#[derive(Debug)]
pub enum TokenDecodeError {
    /// The token is not a well-formed JWT or its payload is not JSON
    Malformed(jsonwebtoken::errors::Error),
    /// The payload has no usable `exp` claim
    MissingExpiry,
}

impl std::fmt::Display for TokenDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenDecodeError::Malformed(e) => write!(f, "Failed to decode token: {}", e),
            TokenDecodeError::MissingExpiry => write!(f, "Token has no expiry claim"),
        }
    }
}

impl std::error::Error for TokenDecodeError {}

/// Read the `exp` claim (Unix seconds, possibly fractional) without verifying the signature.
pub fn expiry_claim(token: &str) -> Result<f64, TokenDecodeError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let key = DecodingKey::from_secret(b"unverified");
    let data = jsonwebtoken::decode::<ExpiryClaim>(token, &key, &validation)
        .map_err(TokenDecodeError::Malformed)?;

    match data.claims.exp {
        Some(exp) if exp.is_finite() => Ok(exp),
        _ => Err(TokenDecodeError::MissingExpiry),
    }
}

/// Whether `token` should be treated as dead at `now` (fractional Unix seconds).
///
/// Absent, undecodable and expiry-less tokens are always dead.
pub fn is_expired_at(token: Option<&str>, buffer_secs: i64, now: f64) -> bool {
    let Some(token) = token else {
        return true;
    };
    match expiry_claim(token) {
        Ok(exp) => now >= exp - buffer_secs as f64,
        Err(e) => {
            tracing::debug!(error = %e, "Treating undecodable token as expired");
            true
        }
    }
}

/// Whether `token` should be treated as dead right now.
pub fn is_expired(token: Option<&str>, buffer_secs: i64) -> bool {
    is_expired_at(token, buffer_secs, now_secs())
}

pub(crate) fn now_secs() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        sub: &'static str,
        exp: i64,
    }

    fn token_with_exp(exp: i64) -> String {
        let claims = Claims { sub: "user-1", exp };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"backend-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_absent_token_is_expired() {
        assert!(is_expired(None, DEFAULT_EXPIRY_BUFFER_SECS));
    }

    #[test]
    fn test_garbage_token_is_expired() {
        assert!(is_expired(Some("not-a-jwt"), 0));
        assert!(is_expired(Some("a.b.c"), 0));
        assert!(is_expired(Some(""), 0));
    }

    #[test]
    fn test_token_without_exp_is_expired() {
        #[derive(Serialize)]
        struct NoExp {
            sub: &'static str,
        }
        let token = jsonwebtoken::encode(
            &Header::default(),
            &NoExp { sub: "user-1" },
            &EncodingKey::from_secret(b"backend-secret"),
        )
        .unwrap();

        assert!(matches!(
            expiry_claim(&token),
            Err(TokenDecodeError::MissingExpiry)
        ));
        assert!(is_expired(Some(&token), 0));
    }

    #[test]
    fn test_expiry_read_without_knowing_secret() {
        let token = token_with_exp(1_900_000_000);
        assert_eq!(expiry_claim(&token).unwrap(), 1_900_000_000.0);
    }

    #[test]
    fn test_buffer_boundary() {
        let exp = 2_000_000_000.0;
        let token = token_with_exp(2_000_000_000);

        // Dead exactly at exp - buffer, alive one second before.
        assert!(is_expired_at(Some(&token), 300, exp - 300.0));
        assert!(!is_expired_at(Some(&token), 300, exp - 301.0));
        assert!(is_expired_at(Some(&token), 0, exp));
        assert!(!is_expired_at(Some(&token), 0, exp - 1.0));
    }

    #[test]
    fn test_fractional_expiry_is_not_rounded_down() {
        let token = jsonwebtoken::encode(
            &Header::default(),
            &serde_json::json!({ "sub": "user-1", "exp": 2_000_000_000.75 }),
            &EncodingKey::from_secret(b"backend-secret"),
        )
        .unwrap();

        assert_eq!(expiry_claim(&token).unwrap(), 2_000_000_000.75);
        assert!(!is_expired_at(Some(&token), 0, 2_000_000_000.5));
        assert!(is_expired_at(Some(&token), 0, 2_000_000_000.75));
    }

    #[test]
    fn test_long_lived_token_is_live() {
        let token = token_with_exp(chrono::Utc::now().timestamp() + 3600);
        assert!(!is_expired(Some(&token), DEFAULT_EXPIRY_BUFFER_SECS));
    }

    #[test]
    fn test_token_inside_buffer_is_expired() {
        let token = token_with_exp(chrono::Utc::now().timestamp() + 60);
        assert!(is_expired(Some(&token), DEFAULT_EXPIRY_BUFFER_SECS));
        assert!(!is_expired(Some(&token), 0));
    }
}
