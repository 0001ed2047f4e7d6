//! The per-request session gate.
//!
//! Every protected route is evaluated through [`authenticate`]: read the
//! session, refresh the access token if it is about to expire, and decide
//! between proceeding (authenticated or anonymous) and redirecting to login.
//! States are recomputed per request, never persisted.
//!
//! Two concurrent requests on the same expired session may both attempt the
//! refresh — this is not deduplicated; the provider's token endpoint must
//! tolerate or reject replayed refresh-token use.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::PrivateCookieJar;
use time::OffsetDateTime;

use super::cookies;
use super::extractor::CurrentUser;
use super::state::AuthState;
use super::traits::SessionStore;
use crate::oauth::OAuthGateway;
use crate::refresh::TokenRefresher;
use crate::session::SessionRecord;

/// How a route treats an unauthenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No session means a redirect to login.
    Required,
    /// No session means the handler runs anonymously.
    Try,
}

/// Outcome of one strategy evaluation.
pub(super) enum Decision {
    Authenticated(SessionRecord),
    Anonymous,
    /// Redirect to the login route. `new_session_id` is set when an
    /// anonymous session had to be minted to hold the pending-redirect
    /// marker.
    RedirectToLogin { new_session_id: Option<String> },
}

/// Gate middleware for routes that demand a signed-in user.
///
/// Inserts [`CurrentUser`] into request extensions on success; otherwise
/// records the requested path and redirects to login.
pub async fn require_session<G, S, R>(
    State(state): State<AuthState<G, S, R>>,
    jar: PrivateCookieJar,
    req: Request,
    next: Next,
) -> Response
where
    G: OAuthGateway,
    S: SessionStore,
    R: TokenRefresher,
{
    gate(AuthMode::Required, state, jar, req, next).await
}

/// Gate middleware for routes that work with or without a user.
///
/// [`CurrentUser`] is present in request extensions only when a valid (or
/// successfully refreshed) session exists.
pub async fn try_session<G, S, R>(
    State(state): State<AuthState<G, S, R>>,
    jar: PrivateCookieJar,
    req: Request,
    next: Next,
) -> Response
where
    G: OAuthGateway,
    S: SessionStore,
    R: TokenRefresher,
{
    gate(AuthMode::Try, state, jar, req, next).await
}

async fn gate<G, S, R>(
    mode: AuthMode,
    state: AuthState<G, S, R>,
    jar: PrivateCookieJar,
    mut req: Request,
    next: Next,
) -> Response
where
    G: OAuthGateway,
    S: SessionStore,
    R: TokenRefresher,
{
    let original_path = req
        .uri()
        .path_and_query()
        .map_or("/", |pq| pq.as_str())
        .to_string();
    let session_id = jar
        .get(&state.settings.session_cookie_name)
        .map(|c| c.value().to_string());

    let decision = authenticate(
        state.session_store.as_ref(),
        state.refresher.as_ref(),
        session_id.as_deref(),
        mode,
        &original_path,
        OffsetDateTime::now_utc(),
    )
    .await;

    match decision {
        Decision::Authenticated(record) => {
            req.extensions_mut().insert(CurrentUser(record));
            next.run(req).await
        }
        Decision::Anonymous => next.run(req).await,
        Decision::RedirectToLogin { new_session_id } => {
            let jar = match new_session_id {
                Some(sid) => jar.add(cookies::session_cookie(
                    &state.settings.session_cookie_name,
                    &sid,
                    state.settings.session_ttl_days,
                    state.settings.secure_cookies,
                )),
                None => jar,
            };
            let login = format!("{}/login", state.settings.auth_path);
            (jar, Redirect::to(&login)).into_response()
        }
    }
}

/// The state machine itself, kept free of HTTP types so it can be exercised
/// with in-memory collaborators.
pub(super) async fn authenticate<S, R>(
    store: &S,
    refresher: &R,
    session_id: Option<&str>,
    mode: AuthMode,
    original_path: &str,
    now: OffsetDateTime,
) -> Decision
where
    S: SessionStore,
    R: TokenRefresher,
{
    let existing = match session_id {
        Some(sid) => match store.get(sid).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "session lookup failed");
                None
            }
        },
        None => None,
    };

    let authenticated = match (session_id, existing) {
        (_, Some(record)) if record.is_fresh(now) => Some(record),
        (Some(sid), Some(record)) => renew(store, refresher, sid, &record, now).await,
        _ => None,
    };

    if let Some(record) = authenticated {
        return Decision::Authenticated(record);
    }

    // Single decision point shared by "no session" and "refresh failed".
    match mode {
        AuthMode::Try => Decision::Anonymous,
        AuthMode::Required => {
            let (sid, minted) = match session_id {
                Some(sid) => (sid.to_string(), None),
                None => {
                    let sid = cookies::generate_session_id();
                    (sid.clone(), Some(sid))
                }
            };
            if let Err(e) = store.flash_set(&sid, original_path.to_string()).await {
                tracing::warn!(error = %e, "failed to record pending redirect");
            }
            Decision::RedirectToLogin {
                new_session_id: minted,
            }
        }
    }
}

/// One refresh attempt. On success the stored record is fully replaced; on
/// any failure (missing token, rejected grant, transport) the session is
/// cleared so the caller falls through to the no-session behavior.
async fn renew<S, R>(
    store: &S,
    refresher: &R,
    session_id: &str,
    record: &SessionRecord,
    now: OffsetDateTime,
) -> Option<SessionRecord>
where
    S: SessionStore,
    R: TokenRefresher,
{
    // An absent token becomes the empty string, which the refresher rejects
    // without a network call — same fallback path as a rejected grant.
    let result = refresher
        .refresh(record.refresh_token.as_deref().unwrap_or_default())
        .await;

    match result {
        Ok(tokens) => {
            let renewed = record.renewed(&tokens, now);
            match store.set(session_id, renewed.clone()).await {
                Ok(()) => {
                    tracing::debug!(contact_id = %renewed.contact_id, "access token silently refreshed");
                    Some(renewed)
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to persist refreshed session");
                    clear(store, session_id).await;
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "token refresh failed, clearing session");
            clear(store, session_id).await;
            None
        }
    }
}

async fn clear<S: SessionStore>(store: &S, session_id: &str) {
    if let Err(e) = store.clear(session_id).await {
        tracing::warn!(error = %e, "session clear failed");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use time::Duration;

    use super::*;
    use crate::claims::IdentityClaims;
    use crate::error::Error;
    use crate::refresh::TokenResponse;

    type BoxError = Box<dyn std::error::Error + Send + Sync>;

    #[derive(Default)]
    struct MemoryStore {
        sessions: Mutex<HashMap<String, SessionRecord>>,
        flashes: Mutex<HashMap<String, String>>,
    }

    impl SessionStore for MemoryStore {
        async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, BoxError> {
            Ok(self.sessions.lock().unwrap().get(session_id).cloned())
        }

        async fn set(&self, session_id: &str, record: SessionRecord) -> Result<(), BoxError> {
            self.sessions
                .lock()
                .unwrap()
                .insert(session_id.to_string(), record);
            Ok(())
        }

        async fn clear(&self, session_id: &str) -> Result<(), BoxError> {
            self.sessions.lock().unwrap().remove(session_id);
            Ok(())
        }

        async fn flash_set(&self, session_id: &str, path: String) -> Result<(), BoxError> {
            self.flashes
                .lock()
                .unwrap()
                .insert(session_id.to_string(), path);
            Ok(())
        }

        async fn flash_take(&self, session_id: &str) -> Result<Option<String>, BoxError> {
            Ok(self.flashes.lock().unwrap().remove(session_id))
        }
    }

    enum Behavior {
        Succeed,
        Reject,
    }

    struct StubRefresher {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl StubRefresher {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TokenRefresher for StubRefresher {
        async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, Error> {
            if refresh_token.trim().is_empty() {
                return Err(Error::MissingRefreshToken);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(TokenResponse {
                    access_token: "new-token".into(),
                    refresh_token: Some("new-refresh".into()),
                    expires_in: 3600,
                }),
                Behavior::Reject => Err(Error::Refresh {
                    status: 400,
                    reason: "Bad Request".into(),
                    body: "invalid_grant".into(),
                }),
            }
        }
    }

    fn record(expires_at: OffsetDateTime, refresh_token: Option<&str>) -> SessionRecord {
        let claims = IdentityClaims {
            contact_id: "c-123".into(),
            email: "user@example.com".into(),
            given_name: Some("Kari".into()),
            relationships: vec![serde_json::json!({"organizationId": "org-1"})],
            roles: vec!["reader".into()],
            aal: Some("aal2".into()),
            loa: Some("substantial".into()),
        };
        let mut rec = SessionRecord::from_claims(
            claims,
            "old-token".into(),
            refresh_token.map(String::from),
            0,
            expires_at,
        );
        rec.expires_at = expires_at;
        rec
    }

    async fn seeded(expires_at: OffsetDateTime, refresh_token: Option<&str>) -> MemoryStore {
        let store = MemoryStore::default();
        store
            .set("sid-1", record(expires_at, refresh_token))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn fresh_session_authenticates_without_refresh() {
        let now = OffsetDateTime::now_utc();
        let store = seeded(now + Duration::hours(1), Some("refresh-1")).await;
        let refresher = StubRefresher::new(Behavior::Succeed);

        let decision = authenticate(
            &store,
            &refresher,
            Some("sid-1"),
            AuthMode::Required,
            "/page",
            now,
        )
        .await;

        let Decision::Authenticated(rec) = decision else {
            panic!("expected authenticated");
        };
        assert_eq!(rec.access_token, "old-token");
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn expired_session_refreshes_once_and_preserves_identity() {
        let now = OffsetDateTime::now_utc();
        // expired one second ago
        let store = seeded(now - Duration::seconds(1), Some("refresh-1")).await;
        let refresher = StubRefresher::new(Behavior::Succeed);

        let decision = authenticate(
            &store,
            &refresher,
            Some("sid-1"),
            AuthMode::Required,
            "/page",
            now,
        )
        .await;

        let Decision::Authenticated(rec) = decision else {
            panic!("expected authenticated after refresh");
        };
        assert_eq!(refresher.calls(), 1);
        assert_eq!(rec.access_token, "new-token");
        assert_eq!(rec.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(rec.expires_at, now + Duration::seconds(3600));

        // identity fields untouched, and the store holds the new record
        assert_eq!(rec.contact_id, "c-123");
        assert_eq!(rec.display_name, "Kari");
        assert_eq!(rec.roles, vec!["reader"]);
        let stored = store.get("sid-1").await.unwrap().unwrap();
        assert_eq!(stored, rec);
    }

    #[tokio::test]
    async fn session_inside_expiry_buffer_is_refreshed() {
        let now = OffsetDateTime::now_utc();
        // still valid, but within the one-minute buffer
        let store = seeded(now + Duration::seconds(30), Some("refresh-1")).await;
        let refresher = StubRefresher::new(Behavior::Succeed);

        let decision = authenticate(
            &store,
            &refresher,
            Some("sid-1"),
            AuthMode::Required,
            "/page",
            now,
        )
        .await;

        assert!(matches!(decision, Decision::Authenticated(_)));
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn refresh_failure_with_required_clears_session_and_redirects() {
        let now = OffsetDateTime::now_utc();
        let store = seeded(now - Duration::seconds(1), Some("refresh-1")).await;
        let refresher = StubRefresher::new(Behavior::Reject);

        let decision = authenticate(
            &store,
            &refresher,
            Some("sid-1"),
            AuthMode::Required,
            "/invoices?page=2",
            now,
        )
        .await;

        assert!(matches!(
            decision,
            Decision::RedirectToLogin {
                new_session_id: None
            }
        ));
        assert!(store.get("sid-1").await.unwrap().is_none());
        assert_eq!(
            store.flash_take("sid-1").await.unwrap().as_deref(),
            Some("/invoices?page=2")
        );
    }

    #[tokio::test]
    async fn refresh_failure_with_try_proceeds_anonymously() {
        let now = OffsetDateTime::now_utc();
        let store = seeded(now - Duration::seconds(1), Some("refresh-1")).await;
        let refresher = StubRefresher::new(Behavior::Reject);

        let decision = authenticate(
            &store,
            &refresher,
            Some("sid-1"),
            AuthMode::Try,
            "/page",
            now,
        )
        .await;

        assert!(matches!(decision, Decision::Anonymous));
        assert!(store.get("sid-1").await.unwrap().is_none());
        assert!(store.flash_take("sid-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_without_refresh_token_is_treated_as_refresh_failure() {
        let now = OffsetDateTime::now_utc();
        let store = seeded(now - Duration::seconds(1), None).await;
        let refresher = StubRefresher::new(Behavior::Succeed);

        let decision = authenticate(
            &store,
            &refresher,
            Some("sid-1"),
            AuthMode::Required,
            "/page",
            now,
        )
        .await;

        assert!(matches!(decision, Decision::RedirectToLogin { .. }));
        // the guard rejects the empty token before any endpoint call
        assert_eq!(refresher.calls(), 0);
        assert!(store.get("sid-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn no_session_with_required_mints_id_and_flashes_path() {
        let now = OffsetDateTime::now_utc();
        let store = MemoryStore::default();
        let refresher = StubRefresher::new(Behavior::Succeed);

        let decision = authenticate(
            &store,
            &refresher,
            None,
            AuthMode::Required,
            "/orders/42",
            now,
        )
        .await;

        let Decision::RedirectToLogin {
            new_session_id: Some(sid),
        } = decision
        else {
            panic!("expected redirect with minted session id");
        };
        assert_eq!(
            store.flash_take(&sid).await.unwrap().as_deref(),
            Some("/orders/42")
        );
        // one-shot: the second read is empty
        assert!(store.flash_take(&sid).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn no_session_with_try_is_anonymous() {
        let now = OffsetDateTime::now_utc();
        let store = MemoryStore::default();
        let refresher = StubRefresher::new(Behavior::Succeed);

        let decision =
            authenticate(&store, &refresher, None, AuthMode::Try, "/page", now).await;

        assert!(matches!(decision, Decision::Anonymous));
        assert_eq!(refresher.calls(), 0);
    }
}
