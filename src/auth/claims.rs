//! JWT claim sets for the two token kinds.
//!
//! Access tokens carry the identity fields handlers commonly need; refresh
//! tokens carry only the user id and a unique token id, since everything
//! else is reloaded from the database during refresh.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Claims embedded in a short-lived access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Username, for log context without a database round trip
    pub username: String,
    /// User email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl AccessClaims {
    pub fn new(
        user_id: Uuid,
        username: String,
        email: String,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            username,
            email,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Extract user ID from claims
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Internal("Invalid user ID in token".to_string()))
    }
}

/// Claims embedded in a long-lived refresh token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Unique token ID; two tokens issued in the same second must still
    /// differ, otherwise rotation would be a no-op
    pub jti: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| AppError::Internal("Invalid user ID in token".to_string()))
    }
}
