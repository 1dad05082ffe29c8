//! REST client for the Scholarix backend.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures surface as [`ApiError::Http`]. Any non-2xx response
//! becomes [`ApiError::Server`] carrying the backend's own `error` or
//! `message` field so callers can show it verbatim.

pub mod types;

pub use types::{
    Activity, ActivityInput, Call, CallInput, DashboardStats, Lead, LeadInput, LoginResponse, PerformanceMetrics,
    User, UserInput,
};

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::auth::TokenStore;
use crate::config::Config;
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("token storage failed: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// HTTP status for server-side errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Store(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &Config, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self::with_client(http, &config.api_url, tokens))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str, tokens: Arc<dyn TokenStore>) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_owned(), tokens }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // =========================================================================
    // AUTH
    // =========================================================================

    /// Log in and persist the returned token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Server`] for rejected credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response: LoginResponse =
            self.post("/auth/login", &json!({ "email": email, "password": password })).await?;
        self.tokens.save_token(&response.token)?;
        tracing::info!(user_id = %response.user.id, "logged in");
        Ok(response)
    }

    /// Tell the backend and forget the local token. The token is cleared
    /// even when the server call fails.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Store`] if the token cannot be cleared.
    pub async fn logout(&self) -> Result<(), ApiError> {
        if let Err(e) = self.send_empty(Method::POST, "/auth/logout").await {
            tracing::warn!(error = %e, "logout request failed; clearing token anyway");
        }
        self.tokens.clear_token()?;
        Ok(())
    }

    /// Whether the stored token is still accepted.
    pub async fn verify(&self) -> bool {
        match self.send_empty(Method::GET, "/auth/verify").await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "token verification failed");
                false
            }
        }
    }

    /// # Errors
    ///
    /// Returns [`ApiError::Server`] with status 401 when not logged in.
    pub async fn me(&self) -> Result<User, ApiError> {
        self.get("/auth/me").await
    }

    // =========================================================================
    // USERS
    // =========================================================================

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn list_users(&self) -> Result<Vec<User>, ApiError> {
        self.get("/users").await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn get_user(&self, id: &str) -> Result<User, ApiError> {
        self.get(&format!("/users/{id}")).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn create_user(&self, input: &UserInput) -> Result<User, ApiError> {
        self.post("/users", input).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn update_user(&self, id: &str, input: &UserInput) -> Result<User, ApiError> {
        self.put(&format!("/users/{id}"), input).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("/users/{id}")).await
    }

    // =========================================================================
    // LEADS
    // =========================================================================

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn list_leads(&self) -> Result<Vec<Lead>, ApiError> {
        self.get("/leads").await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn get_lead(&self, id: &str) -> Result<Lead, ApiError> {
        self.get(&format!("/leads/{id}")).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn create_lead(&self, input: &LeadInput) -> Result<Lead, ApiError> {
        self.post("/leads", input).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn update_lead(&self, id: &str, input: &LeadInput) -> Result<Lead, ApiError> {
        self.put(&format!("/leads/{id}"), input).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn delete_lead(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("/leads/{id}")).await
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn list_calls(&self) -> Result<Vec<Call>, ApiError> {
        self.get("/calls").await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn list_calls_for_lead(&self, lead_id: &str) -> Result<Vec<Call>, ApiError> {
        self.get(&format!("/calls/lead/{lead_id}")).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn get_call(&self, id: &str) -> Result<Call, ApiError> {
        self.get(&format!("/calls/{id}")).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn create_call(&self, input: &CallInput) -> Result<Call, ApiError> {
        self.post("/calls", input).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn update_call(&self, id: &str, input: &CallInput) -> Result<Call, ApiError> {
        self.put(&format!("/calls/{id}"), input).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn delete_call(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("/calls/{id}")).await
    }

    // =========================================================================
    // ACTIVITY / STATS
    // =========================================================================

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn list_activity(&self) -> Result<Vec<Activity>, ApiError> {
        self.get("/activity").await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn log_activity(&self, input: &ActivityInput) -> Result<Activity, ApiError> {
        self.post("/activity", input).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn performance_metrics(&self, user_id: &str) -> Result<PerformanceMetrics, ApiError> {
        self.get(&format!("/performance/{user_id}")).await
    }

    /// # Errors
    ///
    /// Returns an [`ApiError`] on transport or server failure.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        self.get("/dashboard/stats").await
    }

    // =========================================================================
    // REQUEST PLUMBING
    // =========================================================================

    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let builder = self.http.request(method, url);
        match self.tokens.load_token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.request(Method::GET, path).await.send().await?;
        decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self.request(Method::POST, path).await.json(body).send().await?;
        decode(response).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let response = self.request(Method::PUT, path).await.json(body).send().await?;
        decode(response).await
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<(), ApiError> {
        let response = self.request(method, path).await.send().await?;
        check(response).await.map(|_| ())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    Ok(check(response).await?.json::<T>().await?)
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    tracing::debug!(status = status.as_u16(), %message, "api request rejected");
    Err(ApiError::Server { status: status.as_u16(), message })
}

/// Prefer the backend's `error` field, then `message`, then the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let field = parsed
        .as_ref()
        .and_then(|v| v.get("error").or_else(|| v.get("message")))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    if let Some(message) = field {
        return message.to_owned();
    }
    let body = body.trim();
    if !body.is_empty() && parsed.is_none() {
        return body.to_owned();
    }
    status.canonical_reason().unwrap_or("request failed").to_owned()
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
