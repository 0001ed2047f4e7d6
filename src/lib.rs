#![doc = include_str!("../README.md")]

pub mod claims;
pub mod discovery;
pub mod error;
pub mod middleware;
pub mod oauth;
pub mod pkce;
pub mod refresh;
pub mod session;

// Re-exports for convenient access
pub use claims::{IdentityClaims, decode_id_token};
pub use discovery::{DiscoveryCache, EndpointSet};
pub use error::Error;
pub use oauth::{AuthCodeClient, AuthorizationRequest, ExchangedTokens, OAuthGateway};
pub use pkce::{generate_code_challenge, generate_code_verifier, generate_state};
pub use refresh::{RefreshClient, TokenRefresher, TokenResponse};
pub use session::{EXPIRY_BUFFER, SessionRecord};
