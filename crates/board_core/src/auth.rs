use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::FetchError;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current bearer token, if the session has one.
    async fn access_token(&self) -> Result<Option<String>, FetchError>;
    /// Obtains a fresh token after the backend rejected the current one.
    async fn refresh(&self) -> Result<String, FetchError>;
}

pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<Option<String>, FetchError> {
        Ok(self.token.clone())
    }

    async fn refresh(&self) -> Result<String, FetchError> {
        Err(FetchError::TokenRefresh(
            "static token cannot be refreshed".to_string(),
        ))
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// Holds an access token and trades the refresh token for a new one on demand.
pub struct RefreshingTokenProvider {
    http: Client,
    refresh_url: String,
    refresh_token: String,
    access_token: RwLock<Option<String>>,
}

impl RefreshingTokenProvider {
    pub fn new(
        server_url: &str,
        access_token: Option<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            refresh_url: format!("{}/auth/refresh", server_url.trim_end_matches('/')),
            refresh_token: refresh_token.into(),
            access_token: RwLock::new(access_token),
        }
    }
}

#[async_trait]
impl TokenProvider for RefreshingTokenProvider {
    async fn access_token(&self) -> Result<Option<String>, FetchError> {
        Ok(self.access_token.read().await.clone())
    }

    async fn refresh(&self) -> Result<String, FetchError> {
        let response = self
            .http
            .post(&self.refresh_url)
            .json(&RefreshRequest {
                refresh_token: &self.refresh_token,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::TokenRefresh(format!(
                "refresh endpoint returned {}",
                response.status()
            )));
        }

        let body: RefreshResponse = response.json().await?;
        *self.access_token.write().await = Some(body.access_token.clone());
        info!("access token refreshed");
        Ok(body.access_token)
    }
}

/// HTTP client that attaches the bearer token and retries exactly once
/// after a refresh when the backend answers 401.
#[derive(Clone)]
pub struct AuthenticatedFetch {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl AuthenticatedFetch {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn fetch(&self, method: Method, path: &str) -> Result<Response, FetchError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let token = self.tokens.access_token().await?;
        let response = self.send(method.clone(), &url, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(%url, "access token rejected; refreshing before retry");
        let refreshed = self.tokens.refresh().await?;
        let retried = self.send(method, &url, Some(&refreshed)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!(%url, "request rejected again after token refresh");
            return Err(FetchError::Unauthorized);
        }
        Ok(retried)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        token: Option<&str>,
    ) -> Result<Response, FetchError> {
        let mut request = self.http.request(method, url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
