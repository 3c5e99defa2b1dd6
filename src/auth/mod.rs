//! Authentication module
//!
//! The OData client asks a [`CredentialProvider`] for a bearer token before
//! every request. Two providers are built in: a fixed token, and the OAuth2
//! client credentials flow against an SAP BTP (XSUAA) token endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    TokenRequestFailed(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Token parse error: {0}")]
    ParseError(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

/// Source of bearer tokens for outgoing requests
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, AuthError>;
}

/// A fixed bearer token, e.g. from a destination service or a test
#[derive(Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToken").field("token", &"***").finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        if self.token.is_empty() {
            return Err(AuthError::MissingCredentials("empty bearer token".to_string()));
        }
        Ok(self.token.clone())
    }
}

/// Token response from the authorization server
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Cached token with expiry tracking
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        // Consider token expired 60 seconds before actual expiry
        self.expires_at > Instant::now() + Duration::from_secs(60)
    }
}

/// OAuth2 client credentials flow with an in-memory token cache
pub struct ClientCredentialsAuth {
    token_url: String,
    client_id: String,
    client_secret: String,
    http_client: Client,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

impl fmt::Debug for ClientCredentialsAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentialsAuth")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ClientCredentialsAuth {
    /// `token_url` is the full token endpoint, e.g.
    /// `https://<subdomain>.authentication.<region>.hana.ondemand.com/oauth/token`
    pub fn new(token_url: String, client_id: String, client_secret: String) -> Self {
        Self::with_client(token_url, client_id, client_secret, Client::new())
    }

    pub fn with_client(
        token_url: String,
        client_id: String,
        client_secret: String,
        http_client: Client,
    ) -> Self {
        Self {
            token_url,
            client_id,
            client_secret,
            http_client,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Acquire a new token from the authorization server
    async fn acquire_token(&self) -> Result<String, AuthError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            return Err(AuthError::MissingCredentials(
                "client_id and client_secret are required".to_string(),
            ));
        }

        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Token request failed: {} - {}", status, body);
            return Err(AuthError::TokenRequestFailed(format!(
                "Status: {}, Body: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            AuthError::ParseError(format!("Failed to parse token response: {}", e))
        })?;

        self.store(&token_response).await;

        tracing::info!(
            "Token acquired successfully, expires in {} seconds",
            token_response.expires_in
        );

        Ok(token_response.access_token)
    }

    async fn store(&self, token_response: &TokenResponse) {
        let cached = CachedToken {
            access_token: token_response.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token_response.expires_in),
        };
        *self.token_cache.write().await = Some(cached);
    }

    /// Clear the token cache
    pub async fn clear_cache(&self) {
        *self.token_cache.write().await = None;
    }
}

#[async_trait]
impl CredentialProvider for ClientCredentialsAuth {
    async fn bearer_token(&self) -> Result<String, AuthError> {
        {
            let cache = self.token_cache.read().await;
            if let Some(ref cached) = *cache {
                if cached.is_valid() {
                    tracing::debug!("Using cached token");
                    return Ok(cached.access_token.clone());
                }
            }
        }

        tracing::info!("Acquiring new access token from {}", self.token_url);
        self.acquire_token().await
    }
}
