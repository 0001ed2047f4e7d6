use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use crate::discovery::DiscoveryCache;
use crate::error::Error;
use crate::pkce;

/// Default scopes: identity claims plus `offline_access` for a refresh token.
pub const DEFAULT_SCOPES: [&str; 4] = ["openid", "profile", "email", "offline_access"];

/// Authorization redirect plus the per-attempt secrets to stash in cookies.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Tokens handed back once the authorization code has been exchanged.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct ExchangedTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    /// Raw compact-serialized ID token.
    pub id_token: String,
}

/// The OAuth2 protocol collaborator: authorization-URL construction, PKCE and
/// code-for-token exchange live behind this trait so the handshake stays a
/// swappable collaborator of the session core rather than part of it.
///
/// Contract: the `id_token` inside [`ExchangedTokens`] must come straight
/// from the provider's token endpoint over TLS (or be cryptographically
/// verified by the implementation). The callback handler decodes it without
/// re-verification.
pub trait OAuthGateway: Send + Sync + 'static {
    /// Build the authorization redirect. `login_hint`, when given, is
    /// forwarded verbatim; sanitization is the caller's job.
    fn begin(
        &self,
        login_hint: Option<&str>,
    ) -> impl Future<Output = Result<AuthorizationRequest, Error>> + Send;

    /// Exchange an authorization code for tokens using the PKCE verifier.
    /// CSRF-state validation happens before this is invoked.
    fn complete(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> impl Future<Output = Result<ExchangedTokens, Error>> + Send;
}

/// [`OAuthGateway`] implementation speaking to endpoints resolved from the
/// discovery cache.
pub struct AuthCodeClient {
    discovery: Arc<DiscoveryCache>,
    client_id: String,
    client_secret: String,
    service_id: String,
    redirect_uri: Url,
    scopes: Vec<String>,
    http: reqwest::Client,
}

impl AuthCodeClient {
    #[must_use]
    pub fn new(
        discovery: Arc<DiscoveryCache>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        service_id: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            discovery,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            service_id: service_id.into(),
            redirect_uri,
            scopes: DEFAULT_SCOPES.iter().map(|s| (*s).to_string()).collect(),
            http: reqwest::Client::new(),
        }
    }

    /// Override the requested scopes.
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Checks HTTP response status; returns the response on success or an
    /// error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(Error::OAuth {
            operation,
            status: Some(status),
            detail: body,
        })
    }
}

impl OAuthGateway for AuthCodeClient {
    async fn begin(&self, login_hint: Option<&str>) -> Result<AuthorizationRequest, Error> {
        let endpoints = self.discovery.endpoints().await?;

        let state = pkce::generate_state();
        let code_verifier = pkce::generate_code_verifier();
        let code_challenge = pkce::generate_code_challenge(&code_verifier);
        let scope = self.scopes.join(" ");

        let mut url = endpoints.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", self.redirect_uri.as_str())
                .append_pair("scope", &scope)
                .append_pair("state", &state)
                .append_pair("code_challenge", &code_challenge)
                .append_pair("code_challenge_method", "S256")
                // mandatory for this provider; requests without it are rejected
                .append_pair("serviceId", &self.service_id);
            if let Some(hint) = login_hint {
                query.append_pair("login_hint", hint);
            }
        }

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
            code_verifier,
        })
    }

    async fn complete(&self, code: &str, code_verifier: &str) -> Result<ExchangedTokens, Error> {
        let endpoints = self.discovery.endpoints().await?;

        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(endpoints.token_endpoint.clone())
            .form(&params)
            .send()
            .await?;

        let response = Self::ensure_success(response, "code exchange").await?;
        response.json::<ExchangedTokens>().await.map_err(Into::into)
    }
}
