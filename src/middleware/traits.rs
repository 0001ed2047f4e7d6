use std::future::Future;

use crate::session::SessionRecord;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Consumer-provided server-side session persistence.
///
/// Records are keyed by the opaque session id held in the httpOnly cookie;
/// the value is never exposed to the browser. Typically backed by a remote
/// key-value store.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for RedisSessions {
///     async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, ...> {
///         self.redis.get(format!("session:{session_id}")).await
///     }
///
///     async fn set(&self, session_id: &str, record: SessionRecord) -> Result<(), ...> {
///         self.redis.set(format!("session:{session_id}"), record).await
///     }
///
///     // clear / flash_set / flash_take along the same lines
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Look up the session record for an id.
    fn get(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<SessionRecord>, BoxError>> + Send;

    /// Persist (or fully replace) the session record for an id.
    fn set(
        &self,
        session_id: &str,
        record: SessionRecord,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Remove the session record. Must be idempotent: clearing an id with no
    /// record succeeds.
    fn clear(&self, session_id: &str) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Record the one-shot pending-redirect marker: the path the user asked
    /// for before being sent to login.
    fn flash_set(
        &self,
        session_id: &str,
        path: String,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Read **and clear** the pending-redirect marker. A second call for the
    /// same id returns `None`.
    fn flash_take(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<String>, BoxError>> + Send;
}
