use axum::Router;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use time::OffsetDateTime;

use super::cookies;
use super::error::AuthError;
use super::state::AuthState;
use super::traits::SessionStore;
use crate::claims;
use crate::oauth::OAuthGateway;
use crate::refresh::TokenRefresher;
use crate::session::SessionRecord;

/// `login_hint` values longer than this (after trimming) are dropped rather
/// than truncated.
const MAX_LOGIN_HINT_LEN: usize = 255;

/// Create the authentication router: `GET <auth_path>/login`,
/// `GET <auth_path>/callback`, `GET <auth_path>/logout`.
pub fn auth_routes<G, S, R>(state: AuthState<G, S, R>) -> Router
where
    G: OAuthGateway,
    S: SessionStore,
    R: TokenRefresher,
{
    let auth_path = state.settings.auth_path.clone();

    Router::new()
        .route(&format!("{auth_path}/login"), get(login::<G, S, R>))
        .route(&format!("{auth_path}/callback"), get(callback::<G, S, R>))
        .route(
            &format!("{auth_path}/logout"),
            get(logout::<G, S, R>).post(logout::<G, S, R>),
        )
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct LoginParams {
    login_hint: Option<String>,
}

async fn login<G, S, R>(
    State(state): State<AuthState<G, S, R>>,
    jar: PrivateCookieJar,
    Query(params): Query<LoginParams>,
) -> Result<(PrivateCookieJar, Redirect), Response>
where
    G: OAuthGateway,
    S: SessionStore,
    R: TokenRefresher,
{
    let hint = params.login_hint.as_deref().and_then(sanitize_login_hint);

    let auth_req = state
        .gateway
        .begin(hint)
        .await
        .map_err(|e| AuthError::from(e).into_response())?;

    let (pkce_cookie, state_cookie) = cookies::pkce_cookies(
        &auth_req.code_verifier,
        &auth_req.state,
        state.settings.secure_cookies,
        &state.settings.auth_path,
    );

    let jar = jar.add(pkce_cookie).add(state_cookie);

    Ok((jar, Redirect::to(&auth_req.url)))
}

/// Trim the hint and drop it when empty or oversized — never forwarded as an
/// empty parameter.
fn sanitize_login_hint(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    // Character count, not bytes: a multi-byte hint under the limit is kept.
    if trimmed.is_empty() || trimmed.chars().count() > MAX_LOGIN_HINT_LEN {
        None
    } else {
        Some(trimmed)
    }
}

// ── Callback ───────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

async fn callback<G, S, R>(
    State(state): State<AuthState<G, S, R>>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Redirect), Response>
where
    G: OAuthGateway,
    S: SessionStore,
    R: TokenRefresher,
{
    if let Some(error) = &params.error {
        let desc = params.error_description.as_deref().unwrap_or("Unknown error");
        tracing::warn!(error = %error, description = %desc, "OAuth2 error from provider");
        return Err(login_error(&state.settings.error_redirect, desc));
    }

    let code = params
        .code
        .ok_or_else(|| login_error(&state.settings.error_redirect, "missing_code"))?;

    let received_state = params
        .state
        .ok_or_else(|| login_error(&state.settings.error_redirect, "state_mismatch"))?;

    let stored_state = cookies::get_state(&jar)
        .ok_or_else(|| login_error(&state.settings.error_redirect, "state_mismatch"))?;

    if received_state != stored_state {
        tracing::warn!("OAuth state mismatch");
        return Err(login_error(&state.settings.error_redirect, "state_mismatch"));
    }

    let code_verifier = cookies::get_pkce_verifier(&jar)
        .ok_or_else(|| login_error(&state.settings.error_redirect, "missing_verifier"))?;

    let tokens = state
        .gateway
        .complete(&code, &code_verifier)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Token exchange failed");
            login_error(&state.settings.error_redirect, "token_exchange_failed")
        })?;

    // The gateway received this token straight from the token endpoint; the
    // payload is decoded without re-verification. A decode failure persists
    // no session.
    let identity = claims::decode_id_token(&tokens.id_token)
        .map_err(|e| AuthError::from(e).into_response())?;

    let record = SessionRecord::from_claims(
        identity,
        tokens.access_token,
        tokens.refresh_token,
        tokens.expires_in,
        OffsetDateTime::now_utc(),
    );

    // Consume the one-shot pending-redirect marker from the pre-login
    // session, then rotate to a fresh id.
    let destination = take_pending_redirect(&state, &jar).await;

    let session_id = cookies::generate_session_id();
    state
        .session_store
        .set(&session_id, record)
        .await
        .map_err(|e| AuthError::Store(e.to_string()).into_response())?;

    let session_cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        &session_id,
        state.settings.session_ttl_days,
        state.settings.secure_cookies,
    );

    let (clear_pkce, clear_state) = cookies::clear_pkce_cookies(&state.settings.auth_path);

    let jar = jar.add(session_cookie).add(clear_pkce).add(clear_state);

    tracing::info!("OIDC login successful");

    let destination = destination.unwrap_or_else(|| "/".to_string());
    Ok((jar, Redirect::to(&destination)))
}

/// Read-and-clear the pending-redirect path recorded before login, and drop
/// the pre-login session record so only the rotated id stays live.
async fn take_pending_redirect<G, S, R>(
    state: &AuthState<G, S, R>,
    jar: &PrivateCookieJar,
) -> Option<String>
where
    G: OAuthGateway,
    S: SessionStore,
    R: TokenRefresher,
{
    let cookie = jar.get(&state.settings.session_cookie_name)?;
    let old_id = cookie.value();

    let destination = match state.session_store.flash_take(old_id).await {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(error = %e, "pending-redirect read failed");
            None
        }
    };

    if let Err(e) = state.session_store.clear(old_id).await {
        tracing::warn!(error = %e, "pre-login session clear failed");
    }

    destination
}

// ── Logout ─────────────────────────────────────────────────────────

/// Unconditional single sign-out: clearing the local session is not enough,
/// the provider keeps its own SSO session that would silently re-authenticate
/// the user. Idempotent — works with no active session.
async fn logout<G, S, R>(
    State(state): State<AuthState<G, S, R>>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AuthError>
where
    G: OAuthGateway,
    S: SessionStore,
    R: TokenRefresher,
{
    if let Some(cookie) = jar.get(&state.settings.session_cookie_name) {
        if let Err(e) = state.session_store.clear(cookie.value()).await {
            tracing::warn!(error = %e, "Session deletion failed during logout");
        }
    }
    let jar = jar.remove(cookies::clear_session_cookie(
        &state.settings.session_cookie_name,
    ));

    let endpoints = state.discovery.endpoints().await?;

    let mut url = endpoints.end_session_endpoint.clone();
    url.query_pairs_mut().append_pair(
        "post_logout_redirect_uri",
        &state.settings.public_origin.root_uri(),
    );

    Ok((jar, Redirect::to(url.as_str())))
}

// ── Helpers ────────────────────────────────────────────────────────

fn login_error(error_redirect: &str, code: &str) -> Response {
    let encoded = urlencoding::encode(code);
    Redirect::to(&format!("{error_redirect}?error={encoded}")).into_response()
}
