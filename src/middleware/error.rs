use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Authentication errors for the middleware layer.
///
/// End users never see raw protocol errors: client-fault classes map to a
/// plain status page, everything else is logged and rendered generically.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No valid session found.
    #[error("Not authenticated")]
    Unauthenticated,

    /// OAuth2 or discovery failure while talking to the provider.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Malformed or incomplete ID token at callback time.
    #[error("Claim extraction error: {0}")]
    Claims(String),

    /// Session store operation failed.
    #[error("Session store error: {0}")]
    Store(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            // client fault, no stack logging
            Self::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
            }
            Self::OAuth(_) => {
                tracing::error!(error = %self, "Identity provider error");
                (
                    StatusCode::BAD_GATEWAY,
                    "Authentication service unavailable",
                )
                    .into_response()
            }
            Self::Claims(_) | Self::Store(_) | Self::Config(_) => {
                tracing::error!(error = %self, "Auth internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
            }
        }
    }
}

impl From<crate::error::Error> for AuthError {
    fn from(e: crate::error::Error) -> Self {
        match e {
            crate::error::Error::Claims(msg) => Self::Claims(msg),
            other => Self::OAuth(other.to_string()),
        }
    }
}
