use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use super::config::{AuthConfig, AuthSettings};
use super::traits::SessionStore;
use crate::discovery::DiscoveryCache;
use crate::oauth::{AuthCodeClient, OAuthGateway};
use crate::refresh::{RefreshClient, TokenRefresher};

/// Shared state for the auth routes and gating middleware.
///
/// Generic over the OAuth gateway, session store and token refresher so each
/// collaborator can be swapped (or mocked) independently. Use
/// [`from_config`](Self::from_config) for the stock provider-backed setup.
pub struct AuthState<G, S, R> {
    pub(super) gateway: Arc<G>,
    pub(super) session_store: Arc<S>,
    pub(super) refresher: Arc<R>,
    pub(super) discovery: Arc<DiscoveryCache>,
    pub(super) settings: AuthSettings,
}

impl<S: SessionStore> AuthState<AuthCodeClient, S, RefreshClient> {
    /// Wire up the stock collaborators: discovery-backed authorization-code
    /// gateway and refresh client sharing one discovery cache.
    #[must_use]
    pub fn from_config(config: AuthConfig, session_store: S) -> Self {
        let discovery = Arc::new(DiscoveryCache::new(config.oidc.discovery_url.clone()));

        let mut gateway = AuthCodeClient::new(
            discovery.clone(),
            config.oidc.client_id.clone(),
            config.oidc.client_secret.clone(),
            config.oidc.service_id.clone(),
            config.oidc.redirect_uri.clone(),
        );
        if let Some(scopes) = config.oidc.scopes.clone() {
            gateway = gateway.with_scopes(scopes);
        }

        let refresher = RefreshClient::new(
            discovery.clone(),
            config.oidc.client_id.clone(),
            config.oidc.client_secret.clone(),
        );

        Self {
            gateway: Arc::new(gateway),
            session_store: Arc::new(session_store),
            refresher: Arc::new(refresher),
            discovery,
            settings: config.settings,
        }
    }
}

impl<G, S, R> AuthState<G, S, R>
where
    G: OAuthGateway,
    S: SessionStore,
    R: TokenRefresher,
{
    /// Assemble state from custom collaborators.
    #[must_use]
    pub fn new(
        config: AuthConfig,
        gateway: G,
        session_store: S,
        refresher: R,
        discovery: Arc<DiscoveryCache>,
    ) -> Self {
        Self {
            gateway: Arc::new(gateway),
            session_store: Arc::new(session_store),
            refresher: Arc::new(refresher),
            discovery,
            settings: config.settings,
        }
    }
}

// Manual Clone: avoid derive adding `G: Clone, S: Clone, R: Clone` bounds.
impl<G, S, R> Clone for AuthState<G, S, R> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            session_store: self.session_store.clone(),
            refresher: self.refresher.clone(),
            discovery: self.discovery.clone(),
            settings: self.settings.clone(),
        }
    }
}

// PrivateCookieJar requires Key to be extractable from state
impl<G, S, R> FromRef<AuthState<G, S, R>> for Key {
    fn from_ref(state: &AuthState<G, S, R>) -> Self {
        state.settings.cookie_key.clone()
    }
}
