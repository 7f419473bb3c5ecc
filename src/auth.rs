//! Bearer-token authentication (HS256 JWT).
//!
//! Tokens are standard compact JWTs: `base64url(header).base64url(claims).base64url(sig)`
//! with `alg = HS256` and claims `{ userId, iat, exp }`. Only verification
//! and operator-side issuance (`synapse token`) live here; there is no
//! login or registration flow.
//!
//! Handlers take an [`AuthUser`] argument; a missing, malformed, tampered
//! or expired token rejects the request with `401 unauthorized`.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::server::{unauthorized, AppError, AppState};

type HmacSha256 = Hmac<Sha256>;

const HEADER_JSON: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing bearer token")]
    Missing,
    #[error("malformed token")]
    Malformed,
    #[error("unsupported token algorithm")]
    UnsupportedAlgorithm,
    #[error("invalid token signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token lifetime out of range")]
    LifetimeOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

fn mac_for(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Sign a token for `user_id` valid for `ttl` from `now`.
pub fn issue_token(
    secret: &str,
    user_id: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, AuthError> {
    let expires = now
        .checked_add_signed(ttl)
        .ok_or(AuthError::LifetimeOutOfRange)?;
    let claims = Claims {
        user_id: user_id.to_string(),
        iat: now.timestamp(),
        exp: expires.timestamp(),
    };
    // Claims is plain strings and integers; serialization cannot fail
    let claims_json = serde_json::to_string(&claims).unwrap_or_default();

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER_JSON),
        URL_SAFE_NO_PAD.encode(claims_json)
    );
    let mut mac = mac_for(secret);
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

/// Check signature and expiry, returning the claims.
pub fn verify_token(secret: &str, token: &str, now: DateTime<Utc>) -> Result<Claims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::Malformed);
    };

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| AuthError::Malformed)?;
    let header: Header = serde_json::from_slice(&header_bytes).map_err(|_| AuthError::Malformed)?;
    if header.alg != "HS256" {
        return Err(AuthError::UnsupportedAlgorithm);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| AuthError::Malformed)?;
    let mut mac = mac_for(secret);
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::BadSignature)?;

    let claims_bytes = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| AuthError::Malformed)?;
    let claims: Claims = serde_json::from_slice(&claims_bytes).map_err(|_| AuthError::Malformed)?;

    if claims.exp <= now.timestamp() {
        return Err(AuthError::Expired);
    }
    if claims.user_id.is_empty() {
        return Err(AuthError::Malformed);
    }
    Ok(claims)
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(value: Option<&str>) -> Result<&str, AuthError> {
    let value = value.ok_or(AuthError::Missing)?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or(AuthError::Missing)?;
    if token.is_empty() {
        return Err(AuthError::Missing);
    }
    Ok(token)
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let claims = bearer_token(header_value)
            .and_then(|token| verify_token(&state.config.auth.jwt_secret, token, Utc::now()))
            .map_err(|e| unauthorized(e.to_string()))?;

        Ok(AuthUser {
            user_id: claims.user_id,
        })
    }
}
