//! User and session routes.
//!
//! Registration, login, logout, token refresh, current-user, password change,
//! and the public channel profile.

use actix_web::{cookie::Cookie, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    clear_refresh_token, hash_password, issue_token_pair, stored_refresh_token,
    validate_refresh_token, verify_password, TokenPair,
};
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError, DatabaseError, ErrorContext, ValidationError};
use crate::middleware::{CurrentUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::validators::{is_valid_email, is_valid_fullname, is_valid_username};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub fullname: String,
    pub email: String,
    pub username: String,
    pub password: String,
}

/// User login request; at least one of username or email is required.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

/// Token refresh request body; the token may also arrive as a cookie.
#[derive(Deserialize, Default)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Login response: the user record (secret fields excluded) plus both tokens.
#[derive(Serialize)]
pub struct LoginResponse {
    pub user: CurrentUser,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct ChannelProfileResponse {
    pub id: String,
    pub username: String,
    pub fullname: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub is_owner: bool,
}

fn access_cookie(value: &str) -> Cookie<'static> {
    Cookie::build(ACCESS_TOKEN_COOKIE, value.to_string())
        .path("/")
        .http_only(true)
        .secure(true)
        .finish()
}

fn refresh_cookie(value: &str) -> Cookie<'static> {
    Cookie::build(REFRESH_TOKEN_COOKIE, value.to_string())
        .path("/")
        .http_only(true)
        .secure(true)
        .finish()
}

fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build(name, "")
        .path("/")
        .http_only(true)
        .secure(true)
        .finish();
    cookie.make_removal();
    cookie
}

async fn load_user(pool: &PgPool, user_id: Uuid) -> Result<CurrentUser, AppError> {
    sqlx::query_as::<_, CurrentUser>(
        r#"
        SELECT id, username, email, fullname, avatar, cover_image, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Auth(AuthError::UserNotFound))
}

/// POST /api/v1/users/register
///
/// Register a new account. Returns the created user excluding secret fields;
/// no tokens are issued until login.
///
/// # Errors
/// - 400: invalid fullname/email/username/password
/// - 409: username or email already registered
/// - 500: internal server error
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let fullname = is_valid_fullname(&form.fullname)?;
    let email = is_valid_email(&form.email)?;
    let username = is_valid_username(&form.username)?;
    let password_hash = hash_password(&form.password)?;

    let user_id = Uuid::new_v4();
    let now = chrono::Utc::now();
    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, fullname, password_hash, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(user_id)
    .bind(&username)
    .bind(&email)
    .bind(&fullname)
    .bind(&password_hash)
    .bind(now)
    .bind(now)
    .execute(pool.get_ref())
    .await?;

    let user = load_user(pool.get_ref(), user_id).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(user))
}

/// POST /api/v1/users/login
///
/// Authenticate with username or email plus password. On success, issues a
/// token pair, persists the refresh token onto the user record, and sets both
/// tokens as secure http-only cookies in addition to the response body.
///
/// # Errors
/// - 400: neither username nor email supplied
/// - 404: user not found
/// - 401: wrong password
/// - 500: token signing or persistence failure
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    auth: web::Data<AuthSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    if form.username.is_none() && form.email.is_none() {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "username or email is required".to_string(),
        )));
    }

    let username = form.username.as_ref().map(|u| u.trim().to_lowercase());
    let email = form.email.as_ref().map(|e| e.trim().to_string());

    let row = sqlx::query_as::<_, (Uuid, String, String, String)>(
        r#"
        SELECT id, username, email, password_hash
        FROM users
        WHERE username = $1 OR email = $2
        "#,
    )
    .bind(&username)
    .bind(&email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound("User not found".to_string())))?;

    let (user_id, user_username, user_email, password_hash) = row;

    let password_valid = verify_password(&form.password, &password_hash)?;
    if !password_valid {
        let err = AppError::Auth(AuthError::InvalidCredentials);
        context.with_user_id(user_id.to_string()).log_error(&err);
        return Err(err);
    }

    let pair = issue_token_pair(
        pool.get_ref(),
        user_id,
        &user_username,
        &user_email,
        auth.get_ref(),
    )
    .await?;

    let user = load_user(pool.get_ref(), user_id).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok()
        .cookie(access_cookie(&pair.access_token))
        .cookie(refresh_cookie(&pair.refresh_token))
        .json(LoginResponse {
            user,
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }))
}

/// POST /api/v1/users/logout
///
/// Requires authentication. Clears the stored refresh token, which ends the
/// session: no previously issued refresh token remains usable. Both cookies
/// are removed.
pub async fn logout(
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner();

    clear_refresh_token(pool.get_ref(), user.id).await?;

    tracing::info!(user_id = %user.id, "User logged out successfully");

    Ok(HttpResponse::Ok()
        .cookie(removal_cookie(ACCESS_TOKEN_COOKIE))
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE))
        .json(serde_json::json!({ "message": "User logged out successfully" })))
}

/// POST /api/v1/users/refresh-token
///
/// Exchange a valid, still-current refresh token for a new token pair.
///
/// The supplied token (cookie or body) must pass signature and expiry
/// verification with the refresh secret AND match the value stored on the
/// user record byte for byte. A mismatch means the token was rotated away or
/// cleared at logout; the request is rejected as expired or used. Every
/// rejection path is 401.
///
/// Issuing the new pair overwrites the stored refresh token, so concurrent
/// refresh calls race: the loser observes a stale value and fails reuse
/// detection. That is the intended behavior, not something to coordinate
/// away.
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    pool: web::Data<PgPool>,
    auth: web::Data<AuthSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");

    let supplied = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token))
        .ok_or(AppError::Auth(AuthError::AuthenticationRequired))?;

    let claims = validate_refresh_token(&supplied, auth.get_ref())?;
    let user_id = claims.user_id()?;

    let row = sqlx::query_as::<_, (Uuid, String, String)>(
        "SELECT id, username, email FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Auth(AuthError::UserNotFound))?;

    let (user_id, username, email) = row;

    match stored_refresh_token(pool.get_ref(), user_id).await? {
        Some(stored) if stored == supplied => {}
        _ => {
            let err = AppError::Auth(AuthError::TokenReuseDetected);
            context.with_user_id(user_id.to_string()).log_error(&err);
            return Err(err);
        }
    }

    let pair: TokenPair =
        issue_token_pair(pool.get_ref(), user_id, &username, &email, auth.get_ref()).await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %user_id,
        "Token refreshed successfully"
    );

    Ok(HttpResponse::Ok()
        .cookie(access_cookie(&pair.access_token))
        .cookie(refresh_cookie(&pair.refresh_token))
        .json(RefreshResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }))
}

/// GET /api/v1/users/current-user
///
/// Returns the authenticated caller's record, as resolved by the session
/// middleware.
pub async fn current_user(user: web::ReqData<CurrentUser>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(user.into_inner()))
}

/// POST /api/v1/users/change-password
///
/// Requires authentication. Verifies the old password before rehashing and
/// storing the new one.
///
/// # Errors
/// - 400: old password incorrect, or new password fails validation
pub async fn change_password(
    form: web::Json<ChangePasswordRequest>,
    user: web::ReqData<CurrentUser>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let user = user.into_inner();

    let password_hash =
        sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(pool.get_ref())
            .await?;

    let old_password_valid = verify_password(&form.old_password, &password_hash)?;
    if !old_password_valid {
        return Err(AppError::Validation(ValidationError::InvalidFormat(
            "Old password is incorrect".to_string(),
        )));
    }

    let new_hash = hash_password(&form.new_password)?;

    sqlx::query("UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3")
        .bind(&new_hash)
        .bind(chrono::Utc::now())
        .bind(user.id)
        .execute(pool.get_ref())
        .await?;

    tracing::info!(user_id = %user.id, "Password changed successfully");

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Password changed successfully" })))
}

/// GET /api/v1/users/c/{username}
///
/// Public channel profile. Runs behind the optional session middleware: an
/// anonymous caller gets the profile with `is_owner` false, an authenticated
/// caller viewing their own channel gets `is_owner` true, and an invalid
/// token never causes an error here.
pub async fn channel_profile(
    path: web::Path<String>,
    viewer: Option<web::ReqData<CurrentUser>>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let username = path.into_inner().trim().to_lowercase();

    if username.is_empty() {
        return Err(AppError::Validation(ValidationError::EmptyField(
            "username".to_string(),
        )));
    }

    let row = sqlx::query_as::<_, (Uuid, String, String, Option<String>, Option<String>)>(
        r#"
        SELECT id, username, fullname, avatar, cover_image
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(&username)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Database(DatabaseError::NotFound("Channel not found".to_string())))?;

    let (id, username, fullname, avatar, cover_image) = row;
    let is_owner = viewer
        .map(|v| v.into_inner().id == id)
        .unwrap_or(false);

    Ok(HttpResponse::Ok().json(ChannelProfileResponse {
        id: id.to_string(),
        username,
        fullname,
        avatar,
        cover_image,
        is_owner,
    }))
}
