//! Bearer token decoding.
//!
//! The signature is verified by the backend; the client only reads the payload
//! to learn who is signed in and when the token stops being valid.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::Role;

/// Claims the client relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub username: String,
    pub role: Role,
    /// Expiry as seconds since the Unix epoch
    pub exp: i64,
}

impl Claims {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    role: Role,
    exp: Option<i64>,
}

/// Why a token could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    Payload(String),
    MissingClaim(&'static str),
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "token is not a three-part JWT"),
            TokenError::Payload(msg) => write!(f, "token payload unreadable: {}", msg),
            TokenError::MissingClaim(claim) => write!(f, "token has no `{}` claim", claim),
        }
    }
}

impl std::error::Error for TokenError {}

/// Decode the claims of a JWT without verifying its signature.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let mut parts = token.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
        _ => return Err(TokenError::Malformed),
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| TokenError::Payload(e.to_string()))?;
    let raw: RawClaims =
        serde_json::from_slice(&bytes).map_err(|e| TokenError::Payload(e.to_string()))?;

    let username = raw
        .username
        .or(raw.sub)
        .filter(|u| !u.is_empty())
        .ok_or(TokenError::MissingClaim("username"))?;
    let exp = raw.exp.ok_or(TokenError::MissingClaim("exp"))?;

    Ok(Claims {
        username,
        role: raw.role,
        exp,
    })
}

/// Build an unsigned token carrying `claims`; used by the test backends.
#[cfg(test)]
pub(crate) fn encode_test_token(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}
