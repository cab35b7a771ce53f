//! API client with transparent session refresh.
//!
//! Caches the token pair from login, attaches the access token as a bearer
//! header on every outgoing request, and on a 401 response performs exactly
//! one refresh-and-retry cycle for the original request. If the refresh call
//! itself fails, the cached tokens are cleared and the caller gets a
//! session-expired error, the cue to send the user back through login.

use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub enum ClientError {
    /// The session could not be refreshed; the user must log in again.
    SessionExpired,
    /// Transport-level failure.
    Http(reqwest::Error),
    /// The server answered with something the client cannot use.
    Unexpected(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::SessionExpired => write!(f, "Session expired, login required"),
            ClientError::Http(e) => write!(f, "Request failed: {}", e),
            ClientError::Unexpected(msg) => write!(f, "Unexpected response: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err)
    }
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    access_token: Mutex<Option<String>>,
    refresh_token: Mutex<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            access_token: Mutex::new(None),
            refresh_token: Mutex::new(None),
        }
    }

    /// The cached access token, if a session is active.
    pub fn access_token(&self) -> Option<String> {
        self.access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the cached access token.
    pub fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Replace the cached refresh token.
    pub fn set_refresh_token(&self, token: Option<String>) {
        *self
            .refresh_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn refresh_token_value(&self) -> Option<String> {
        self.refresh_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear_session(&self) {
        self.set_access_token(None);
        self.set_refresh_token(None);
    }

    /// POST /api/v1/users/login and cache the returned token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<Value, ClientError> {
        let response = self
            .http
            .post(format!("{}/api/v1/users/login", self.base_url))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Unexpected(format!(
                "login failed with status {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Unexpected(format!("login response not JSON: {}", e)))?;

        self.cache_tokens(&body)?;
        Ok(body)
    }

    /// Issue a request, retrying once through a token refresh on 401.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ClientError> {
        let response = self.send(method.clone(), path, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // At most one refresh attempt per original request: this path is
        // straight-line, the retried request is returned as-is even if it
        // comes back 401 again.
        self.refresh_session().await?;
        let retried = self.send(method, path, body).await?;
        Ok(retried)
    }

    pub async fn get(&self, path: &str) -> Result<Response, ClientError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Response, ClientError> {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ClientError> {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));

        if let Some(token) = self.access_token() {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = body {
            builder = builder.json(body);
        }

        Ok(builder.send().await?)
    }

    /// Exchange the cached refresh token for a new pair. On any failure the
    /// cached tokens are cleared so the caller falls back to login.
    async fn refresh_session(&self) -> Result<(), ClientError> {
        let refresh_token = match self.refresh_token_value() {
            Some(token) => token,
            None => {
                self.clear_session();
                return Err(ClientError::SessionExpired);
            }
        };

        let response = self
            .http
            .post(format!("{}/api/v1/users/refresh-token", self.base_url))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Session refresh rejected");
            self.clear_session();
            return Err(ClientError::SessionExpired);
        }

        let body: Value = response.json().await.map_err(|e| {
            self.clear_session();
            ClientError::Unexpected(format!("refresh response not JSON: {}", e))
        })?;

        self.cache_tokens(&body)
    }

    fn cache_tokens(&self, body: &Value) -> Result<(), ClientError> {
        let access = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .map(String::from);
        let refresh = body
            .get("refresh_token")
            .and_then(|v| v.as_str())
            .map(String::from);

        match (access, refresh) {
            (Some(access), Some(refresh)) => {
                self.set_access_token(Some(access));
                self.set_refresh_token(Some(refresh));
                Ok(())
            }
            _ => {
                self.clear_session();
                Err(ClientError::Unexpected(
                    "response did not contain a token pair".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_client_has_no_session() {
        let client = ApiClient::new("http://127.0.0.1:5000".to_string());
        assert!(client.access_token().is_none());
    }

    #[test]
    fn test_token_cache_roundtrip() {
        let client = ApiClient::new("http://127.0.0.1:5000".to_string());

        client.set_access_token(Some("token-a".to_string()));
        assert_eq!(client.access_token(), Some("token-a".to_string()));

        client.set_access_token(None);
        assert!(client.access_token().is_none());
    }

    #[test]
    fn test_cache_tokens_requires_full_pair() {
        let client = ApiClient::new("http://127.0.0.1:5000".to_string());
        client.set_access_token(Some("stale".to_string()));

        let body = serde_json::json!({ "access_token": "only-half-a-pair" });
        let result = client.cache_tokens(&body);

        assert!(result.is_err());
        // A bad response clears the cached session entirely
        assert!(client.access_token().is_none());
    }

    #[test]
    fn test_client_error_display() {
        assert_eq!(
            ClientError::SessionExpired.to_string(),
            "Session expired, login required"
        );
    }
}
