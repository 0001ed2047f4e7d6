use std::convert::Infallible;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;

use super::error::AuthError;
use crate::session::SessionRecord;

/// The authenticated session record, as seen by downstream handlers.
///
/// Inserted into request extensions by the gating middleware
/// ([`require_session`](super::require_session) /
/// [`try_session`](super::try_session)). Rejects with `401 Unauthorized` when
/// the request was not gated or carries no session.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(user: CurrentUser) -> String {
///     format!("{} <{}>", user.0.display_name, user.0.email)
/// }
///
/// // Behind try_session: anonymous access allowed
/// async fn home(user: Option<CurrentUser>) -> String {
///     match user {
///         Some(u) => format!("Hello, {}", u.0.display_name),
///         None => "Hello, guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionRecord);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::Unauthenticated)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned())
    }
}
