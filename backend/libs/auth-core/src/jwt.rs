//! JWT issuing and validation for the blog backend.
//!
//! Tokens are signed with HS256 using a process-wide secret supplied via
//! configuration at startup. The secret is installed once into a `OnceCell`
//! and never rotated at runtime; every authenticated route is unverifiable
//! without it, so services must call [`init`] before accepting connections.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TOKEN_EXPIRY_HOURS: i64 = 1;
const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT claims carried by every issued token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id, stringified)
    pub sub: String,
    /// Email address
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Parse the numeric user id out of the subject claim.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Failures installing the signing secret.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("JWT secret already initialized")]
    AlreadyInitialized,
    #[error("JWT secret must not be empty")]
    EmptySecret,
}

/// Failures issuing or validating a token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
    #[error("malformed token")]
    Malformed,
    #[error("token signing failed: {0}")]
    Signing(String),
    #[error("JWT secret not initialized")]
    Uninitialized,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

// Installed once at startup, immutable thereafter.
static JWT_KEYS: OnceCell<Keys> = OnceCell::new();

/// Install the process-wide signing secret.
///
/// Must be called during startup before any token operation; calling it a
/// second time is an error so that a misconfigured double-init is caught
/// loudly instead of silently swapping keys.
pub fn init(secret: &str) -> Result<(), KeyError> {
    if secret.is_empty() {
        return Err(KeyError::EmptySecret);
    }

    let keys = Keys {
        encoding: EncodingKey::from_secret(secret.as_bytes()),
        decoding: DecodingKey::from_secret(secret.as_bytes()),
    };

    JWT_KEYS.set(keys).map_err(|_| KeyError::AlreadyInitialized)
}

fn keys() -> Result<&'static Keys, TokenError> {
    JWT_KEYS.get().ok_or(TokenError::Uninitialized)
}

/// Issue a signed token for a user with the standard 1-hour expiry.
pub fn issue_token(user_id: i64, email: &str) -> Result<String, TokenError> {
    issue_token_with_expiry(user_id, email, Duration::hours(TOKEN_EXPIRY_HOURS))
}

/// Issue a signed token with a caller-chosen lifetime.
///
/// A negative duration produces an already-expired token, which the tests
/// use to exercise expiry handling.
pub fn issue_token_with_expiry(
    user_id: i64,
    email: &str,
    expires_in: Duration,
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + expires_in).timestamp(),
    };

    encode(&Header::new(JWT_ALGORITHM), &claims, &keys()?.encoding)
        .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Validate and decode a token.
///
/// Verifies the HS256 signature and the expiry claim; the error kind
/// distinguishes expired tokens from bad signatures and from strings that
/// are not decodable as JWTs at all.
pub fn validate_token(token: &str) -> Result<TokenData<Claims>, TokenError> {
    let mut validation = Validation::new(JWT_ALGORITHM);
    validation.validate_exp = true;
    validation.leeway = 0;

    decode::<Claims>(token, &keys()?.decoding, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_) => TokenError::Malformed,
        _ => TokenError::Invalid,
    })
}
