use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;

use crate::discovery::DiscoveryCache;
use crate::error::Error;

/// Token endpoint response for the `refresh_token` grant.
///
/// `expires_in` is relative (seconds); the caller converts it to an absolute
/// expiry, see [`SessionRecord::renewed`](crate::session::SessionRecord::renewed).
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

/// Exchanges a refresh token for a new access/refresh token pair.
///
/// Implementations must fail with [`Error::MissingRefreshToken`] when called
/// with an empty token, without touching the network. The session strategy
/// relies on this to treat "no refresh token" and "refresh rejected" the same.
pub trait TokenRefresher: Send + Sync + 'static {
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<TokenResponse, Error>> + Send;
}

/// [`TokenRefresher`] backed by the provider's token endpoint.
///
/// One attempt per call — no retry, no backoff. The caller decides how to
/// handle failure.
pub struct RefreshClient {
    discovery: Arc<DiscoveryCache>,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl RefreshClient {
    #[must_use]
    pub fn new(
        discovery: Arc<DiscoveryCache>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            discovery,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }
}

impl TokenRefresher for RefreshClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, Error> {
        if refresh_token.trim().is_empty() {
            return Err(Error::MissingRefreshToken);
        }

        let endpoints = self.discovery.endpoints().await?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(endpoints.token_endpoint.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Refresh {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
                body,
            });
        }

        response.json::<TokenResponse>().await.map_err(Into::into)
    }
}
