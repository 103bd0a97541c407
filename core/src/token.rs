//! Signed credentials: session tokens and admission tokens.
//!
//! Both credential kinds are HMAC-SHA256 JWTs over a shared secret. The
//! session token is minted by the auth collaborator and only *consumed*
//! here; the admission token is minted by the waiting room when a client
//! reaches the head of the queue and gates the reservation path.
//!
//! Validation is a pure function over `(token, secret)` so every service
//! shares one implementation instead of growing its own.

use crate::types::{EventId, UserId};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// How long an admission token stays valid after being minted.
const ADMISSION_TTL_HOURS: i64 = 24;

/// Claims carried by a session credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Display name of the authenticated user.
    pub username: String,
    /// Numeric user identifier.
    pub user_id: i64,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Claims carried by an admission credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionClaims {
    /// The event the holder was admitted for.
    pub event_id: String,
    /// Numeric user identifier.
    pub user_id: i64,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

/// Why a credential was rejected.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signature, structure or expiry check failed.
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    /// The token is genuine but bound to a different event.
    #[error("token is for event {found}, not {expected}")]
    EventMismatch {
        /// Event the caller asked about.
        expected: String,
        /// Event the token was minted for.
        found: String,
    },
}

/// Mint a session credential for `user_id`.
///
/// Provided for the operator tooling and tests; production session tokens
/// come from the auth collaborator, which signs the same claim set.
///
/// # Errors
///
/// Returns an error if signing fails (malformed secret).
pub fn mint_session(
    user_id: UserId,
    username: &str,
    ttl: Duration,
    secret: &[u8],
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = SessionClaims {
        username: username.to_owned(),
        user_id: user_id.as_i64(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}

/// Mint an admission credential binding `user_id` to `event_id`.
///
/// Expires [`ADMISSION_TTL_HOURS`] after issue.
///
/// # Errors
///
/// Returns an error if signing fails (malformed secret).
pub fn mint_admission(
    user_id: UserId,
    event_id: &EventId,
    secret: &[u8],
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = AdmissionClaims {
        event_id: event_id.as_str().to_owned(),
        user_id: user_id.as_i64(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ADMISSION_TTL_HOURS)).timestamp(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )?)
}

/// Decode and verify a session credential.
///
/// # Errors
///
/// Returns [`TokenError::Invalid`] on bad signature, structure or expiry.
pub fn decode_session(token: &str, secret: &[u8]) -> Result<SessionClaims, TokenError> {
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Decode and verify an admission credential without checking its binding.
///
/// # Errors
///
/// Returns [`TokenError::Invalid`] on bad signature, structure or expiry.
pub fn decode_admission(token: &str, secret: &[u8]) -> Result<AdmissionClaims, TokenError> {
    let data = decode::<AdmissionClaims>(
        token,
        &DecodingKey::from_secret(secret),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Verify an admission credential against the event it claims to admit to.
///
/// Checks signature and expiry, then the `event_id` binding.
///
/// # Errors
///
/// [`TokenError::Invalid`] for a forged or expired token,
/// [`TokenError::EventMismatch`] when the token was minted for another event.
pub fn validate_admission(
    token: &str,
    secret: &[u8],
    event_id: &EventId,
) -> Result<AdmissionClaims, TokenError> {
    let claims = decode_admission(token, secret)?;
    if claims.event_id != event_id.as_str() {
        return Err(TokenError::EventMismatch {
            expected: event_id.as_str().to_owned(),
            found: claims.event_id,
        });
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn session_roundtrip() {
        let token = mint_session(UserId::new(7), "ana", Duration::hours(1), SECRET).unwrap();
        let claims = decode_session(&token, SECRET).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.username, "ana");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn session_rejects_wrong_secret() {
        let token = mint_session(UserId::new(7), "ana", Duration::hours(1), SECRET).unwrap();
        assert!(matches!(
            decode_session(&token, b"other-secret"),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn admission_binds_to_event() {
        let event = EventId::new("E1");
        let token = mint_admission(UserId::new(7), &event, SECRET).unwrap();

        let claims = validate_admission(&token, SECRET, &event).unwrap();
        assert_eq!(claims.event_id, "E1");
        assert_eq!(claims.user_id, 7);

        let other = EventId::new("E2");
        assert!(matches!(
            validate_admission(&token, SECRET, &other),
            Err(TokenError::EventMismatch { .. })
        ));
    }

    #[test]
    fn admission_rejects_garbage() {
        let event = EventId::new("E1");
        assert!(matches!(
            validate_admission("not-a-jwt", SECRET, &event),
            Err(TokenError::Invalid(_))
        ));
    }
}
