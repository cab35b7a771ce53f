//! Signing and verification for access and refresh tokens.
//!
//! The two token kinds use separate secrets, so each verifier only accepts
//! tokens of its own kind.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError};

/// Generate a new access token for a user.
///
/// # Errors
/// Returns an internal error if token signing fails.
pub fn generate_access_token(
    user_id: Uuid,
    username: &str,
    email: &str,
    config: &AuthSettings,
) -> Result<String, AppError> {
    let claims = AccessClaims::new(
        user_id,
        username.to_string(),
        email.to_string(),
        config.access_token_expiry,
        config.issuer.clone(),
    );

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.access_token_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Generate a new refresh token for a user, signed with the refresh secret.
pub fn generate_refresh_token(user_id: Uuid, config: &AuthSettings) -> Result<String, AppError> {
    let claims = RefreshClaims::new(user_id, config.refresh_token_expiry, config.issuer.clone());

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.refresh_token_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate an access token and extract its claims.
///
/// # Errors
/// Returns `AuthError::InvalidToken` if the token is expired, tampered with,
/// or signed with the wrong secret.
pub fn validate_access_token(token: &str, config: &AuthSettings) -> Result<AccessClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(config.access_token_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("Access token validation error: {}", e);
        AppError::Auth(AuthError::InvalidToken)
    })
}

/// Validate a refresh token and extract its claims.
pub fn validate_refresh_token(
    token: &str,
    config: &AuthSettings,
) -> Result<RefreshClaims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(config.refresh_token_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::warn!("Refresh token validation error: {}", e);
        AppError::Auth(AuthError::InvalidToken)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> AuthSettings {
        AuthSettings {
            access_token_secret: "test-access-secret-at-least-32-chars-long".to_string(),
            refresh_token_secret: "test-refresh-secret-at-least-32-chars-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 864000,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(user_id, "demo_user1", "demo1@example.com", &config)
            .expect("Failed to generate token");
        let claims = validate_access_token(&token, &config).expect("Failed to validate token");

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.username, "demo_user1");
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_generate_and_validate_refresh_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_refresh_token(user_id, &config).expect("Failed to generate token");
        let claims = validate_refresh_token(&token, &config).expect("Failed to validate token");

        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let refresh = generate_refresh_token(user_id, &config).unwrap();
        assert!(validate_access_token(&refresh, &config).is_err());

        let access =
            generate_access_token(user_id, "demo_user1", "demo1@example.com", &config).unwrap();
        assert!(validate_refresh_token(&access, &config).is_err());
    }

    #[test]
    fn test_invalid_token() {
        let config = get_test_config();
        let result = validate_access_token("invalid.token.here", &config);

        assert!(result.is_err());
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(user_id, "demo_user1", "demo1@example.com", &config)
            .expect("Failed to generate token");

        // Tamper with token
        let tampered = format!("{}X", token);
        let result = validate_access_token(&tampered, &config);

        assert!(result.is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();
        let user_id = Uuid::new_v4();

        let token = generate_access_token(user_id, "demo_user1", "demo1@example.com", &config)
            .expect("Failed to generate token");

        config.issuer = "wrong-issuer".to_string();
        let result = validate_access_token(&token, &config);

        assert!(result.is_err());
    }

    #[test]
    fn test_expired_access_token_rejected() {
        let mut config = get_test_config();
        // Well past the default validation leeway
        config.access_token_expiry = -3600;
        let user_id = Uuid::new_v4();

        let token = generate_access_token(user_id, "demo_user1", "demo1@example.com", &config)
            .expect("Failed to generate token");

        assert!(validate_access_token(&token, &config).is_err());
    }
}
