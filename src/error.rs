#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The provider discovery document came back non-2xx.
    #[error("discovery failed: {status} {reason}")]
    Discovery { status: u16, reason: String },

    /// The discovery document could not be fetched or parsed.
    #[error("discovery request failed: {0}")]
    DiscoveryTransport(#[source] reqwest::Error),

    /// Refresh was attempted without a refresh token. No network call is made.
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The token endpoint rejected the refresh grant.
    #[error("token refresh rejected: {status} {reason}: {body}")]
    Refresh {
        status: u16,
        reason: String,
        body: String,
    },

    /// OAuth2 protocol error (authorization, code exchange).
    #[error("{operation} failed (status {status:?}): {detail}")]
    OAuth {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// The ID token payload could not be decoded, or a required claim is missing.
    #[error("claim extraction failed: {0}")]
    Claims(String),

    /// Transport-level failure, propagated unchanged.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
