//! Token pair issuance and the stored refresh token.
//!
//! The server keeps at most one valid refresh token per user: the value last
//! written to the user's `refresh_token` column. Issuing a pair overwrites it
//! (rotation), logout clears it, and the refresh endpoint compares the
//! supplied token against it byte for byte. A structurally valid token that
//! no longer matches has been superseded, which is how reuse is detected.

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::jwt::{generate_access_token, generate_refresh_token};
use crate::configuration::AuthSettings;
use crate::error::AppError;

/// An access/refresh token pair, as returned by login and refresh.
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issue a new token pair for a user and persist the refresh token onto the
/// user's record, overwriting any prior value.
///
/// # Errors
/// Signing or persistence failures are internal errors; the caller treats
/// them as fatal for the enclosing login or refresh attempt.
pub async fn issue_token_pair(
    pool: &PgPool,
    user_id: Uuid,
    username: &str,
    email: &str,
    config: &AuthSettings,
) -> Result<TokenPair, AppError> {
    let access_token = generate_access_token(user_id, username, email, config)?;
    let refresh_token = generate_refresh_token(user_id, config)?;

    let result = sqlx::query(
        r#"
        UPDATE users
        SET refresh_token = $1, updated_at = $2
        WHERE id = $3
        "#,
    )
    .bind(&refresh_token)
    .bind(chrono::Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Internal(
            "Failed to persist refresh token: user record missing".to_string(),
        ));
    }

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Load the refresh token currently stored on a user's record, if any.
pub async fn stored_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<String>, AppError> {
    let stored = sqlx::query_scalar::<_, Option<String>>(
        "SELECT refresh_token FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(stored)
}

/// Clear the stored refresh token, ending the user's session.
///
/// Any refresh token issued earlier becomes unusable once this runs.
pub async fn clear_refresh_token(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE users
        SET refresh_token = NULL, updated_at = $1
        WHERE id = $2
        "#,
    )
    .bind(chrono::Utc::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::info!(user_id = %user_id, "Stored refresh token cleared");
    Ok(())
}
