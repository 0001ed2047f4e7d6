use serde::Deserialize;
use tokio::sync::OnceCell;
use url::Url;

use crate::error::Error;

/// Provider endpoint metadata from the OIDC discovery document.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct EndpointSet {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub end_session_endpoint: Url,
    pub jwks_uri: Url,
}

/// Lazily-populated, process-wide cache of the provider's endpoint metadata.
///
/// The first call to [`endpoints`](Self::endpoints) fetches the discovery
/// document; every later call returns the same cached set without a network
/// round-trip. There is no TTL and no invalidation — a rotated provider
/// endpoint set requires a process restart to take effect. Failed fetches are
/// not cached, so a later request retries.
pub struct DiscoveryCache {
    discovery_url: Url,
    http: reqwest::Client,
    endpoints: OnceCell<EndpointSet>,
}

impl DiscoveryCache {
    #[must_use]
    pub fn new(discovery_url: Url) -> Self {
        Self {
            discovery_url,
            http: reqwest::Client::new(),
            endpoints: OnceCell::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Pre-populated cache that never touches the network.
    #[cfg(test)]
    pub(crate) fn preloaded(endpoints: EndpointSet) -> Self {
        Self {
            discovery_url: "http://localhost/.well-known/openid-configuration"
                .parse()
                .expect("valid placeholder URL"),
            http: reqwest::Client::new(),
            endpoints: OnceCell::new_with(Some(endpoints)),
        }
    }

    /// The cached endpoint set, fetching it on first use.
    ///
    /// Idempotent and safe for concurrent invocation; concurrent first calls
    /// are serialized so the document is fetched at most once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] on a non-2xx response, or
    /// [`Error::DiscoveryTransport`] when the fetch or parse fails.
    pub async fn endpoints(&self) -> Result<&EndpointSet, Error> {
        self.endpoints.get_or_try_init(|| self.fetch()).await
    }

    async fn fetch(&self) -> Result<EndpointSet, Error> {
        tracing::debug!(url = %self.discovery_url, "fetching OIDC discovery document");

        let response = self
            .http
            .get(self.discovery_url.clone())
            .send()
            .await
            .map_err(Error::DiscoveryTransport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Discovery {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        response
            .json::<EndpointSet>()
            .await
            .map_err(Error::DiscoveryTransport)
    }
}
