//! Session middleware.
//!
//! Extracts the access token from the `accessToken` cookie or the
//! Authorization header, verifies it, resolves the user record (secret
//! fields excluded), and injects it into request extensions for handlers.
//!
//! Two variants share the extraction and verification path:
//! - required: any failure rejects the request with 401
//! - optional: any failure continues the request with no identity attached

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use chrono::{DateTime, Utc};
use futures::future::LocalBoxFuture;
use sqlx::PgPool;
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::validate_access_token;
use crate::configuration::AuthSettings;
use crate::error::{AppError, AuthError};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// The authenticated caller, as resolved from the access token.
///
/// Deliberately excludes `password_hash` and `refresh_token`.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Session middleware for routes that read the caller's identity.
pub struct SessionMiddleware {
    auth: AuthSettings,
    required: bool,
}

impl SessionMiddleware {
    /// Rejects unauthenticated requests with 401.
    pub fn required(auth: AuthSettings) -> Self {
        Self {
            auth,
            required: true,
        }
    }

    /// Continues anonymously on any authentication failure. Used by endpoints
    /// that behave differently for authenticated callers without requiring
    /// login.
    pub fn optional(auth: AuthSettings) -> Self {
        Self {
            auth,
            required: false,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
            auth: self.auth.clone(),
            required: self.required,
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    auth: AuthSettings,
    required: bool,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let auth = self.auth.clone();
        let required = self.required;

        Box::pin(async move {
            match resolve_identity(&req, &auth).await {
                Ok(user) => {
                    tracing::debug!(
                        user_id = %user.id,
                        username = %user.username,
                        "Session authenticated"
                    );
                    req.extensions_mut().insert(user);
                }
                Err(e) => {
                    if required {
                        return Err(e.into());
                    }
                    tracing::debug!("Continuing anonymously: {}", e);
                }
            }

            service.call(req).await
        })
    }
}

/// Extract, verify, and resolve the caller's identity.
async fn resolve_identity(
    req: &ServiceRequest,
    auth: &AuthSettings,
) -> Result<CurrentUser, AppError> {
    let token = extract_token(req).ok_or(AppError::Auth(AuthError::AuthenticationRequired))?;

    let claims = validate_access_token(&token, auth)?;
    let user_id = claims.user_id()?;

    let pool = req
        .app_data::<web::Data<PgPool>>()
        .ok_or_else(|| AppError::Internal("Database pool not configured".to_string()))?;

    let user = sqlx::query_as::<_, CurrentUser>(
        r#"
        SELECT id, username, email, fullname, avatar, cover_image, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or(AppError::Auth(AuthError::UserNotFound))?;

    Ok(user)
}

/// Token from the `accessToken` cookie, falling back to the Authorization
/// header with a Bearer scheme.
fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(ACCESS_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }

    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}
