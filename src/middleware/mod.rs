//! Session-backed OIDC authentication middleware for Axum.
//!
//! Mounts the login/callback/logout routes and gates protected routes with a
//! per-request session strategy: valid sessions pass, sessions within one
//! minute of expiry are silently refreshed, everything else either redirects
//! to login (`required`) or proceeds anonymously (`try`).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use oidc_session::middleware::{
//!     AuthConfig, AuthState, auth_routes, require_session, CurrentUser,
//! };
//!
//! // 1. Implement the SessionStore trait for your storage
//! // 2. Configure from environment
//! let config = AuthConfig::from_env()?;
//! let state = AuthState::from_config(config, session_store);
//!
//! // 3. Mount the auth routes and gate your own
//! let app = axum::Router::new()
//!     .route("/dashboard", axum::routing::get(dashboard))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), require_session))
//!     .merge(auth_routes(state));
//!
//! async fn dashboard(user: CurrentUser) -> String {
//!     format!("Hello, {}", user.0.display_name)
//! }
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod state;
mod strategy;
mod traits;

pub use config::AuthConfig;
pub use error::AuthError;
pub use extractor::CurrentUser;
pub use routes::auth_routes;
pub use state::AuthState;
pub use strategy::{AuthMode, require_session, try_session};
pub use traits::SessionStore;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;
