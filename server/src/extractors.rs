//! Axum extractors for the session credential.

use crate::error::AppError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use turnstile_core::token::{decode_session, SessionClaims};
use turnstile_core::UserId;

/// Cookie the session token rides in on page loads.
const AUTH_COOKIE: &str = "auth_token";

/// State that can hand out the shared credential-signing secret.
pub trait JwtSecretProvider {
    /// The HMAC secret both credential kinds are signed with.
    fn jwt_secret(&self) -> &[u8];
}

/// Authenticated session, extracted from `Authorization: Bearer` or the
/// `auth_token` cookie (header wins).
///
/// Use as a handler parameter to require a valid session credential;
/// rejection is 401 with no distinction between absent and invalid.
#[derive(Debug, Clone)]
pub struct SessionUser {
    /// The authenticated user.
    pub user_id: UserId,
    /// Full decoded claim set.
    pub claims: SessionClaims,
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: JwtSecretProvider + Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or_else(|| AppError::unauthorized("Missing session credential"))?;

        let claims = decode_session(&token, state.jwt_secret()).map_err(|err| {
            tracing::info!(error = %err, "session credential rejected");
            AppError::unauthorized("Invalid session credential")
        })?;

        Ok(Self {
            user_id: UserId::new(claims.user_id),
            claims,
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
}

fn cookie_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(COOKIE)?.to_str().ok()?;
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == AUTH_COOKIE && !value.is_empty()).then(|| value.to_owned())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: &str, value: &str) -> Parts {
        let (parts, ()) = Request::builder()
            .uri("/ws")
            .header(header, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn bearer_header_is_preferred() {
        let parts = parts_with("authorization", "Bearer abc.def.ghi");
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn malformed_authorization_is_ignored() {
        let parts = parts_with("authorization", "Basic dXNlcjpwYXNz");
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn cookie_is_found_among_others() {
        let parts = parts_with("cookie", "theme=dark; auth_token=tok123; lang=en");
        assert_eq!(cookie_token(&parts).as_deref(), Some("tok123"));
    }

    #[test]
    fn empty_cookie_value_is_ignored() {
        let parts = parts_with("cookie", "auth_token=");
        assert_eq!(cookie_token(&parts), None);
    }
}
