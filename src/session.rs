use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use time::{Duration, OffsetDateTime};

use crate::claims::IdentityClaims;
use crate::refresh::TokenResponse;

/// Sessions whose expiry falls within this buffer are refreshed early. The
/// buffer absorbs clock skew and the latency of in-flight downstream calls,
/// so a token that passes the gate cannot expire before the backend sees it.
pub const EXPIRY_BUFFER: Duration = Duration::minutes(1);

/// The server-side session record, one per authenticated browser.
///
/// Exists if and only if a successful callback has completed and has not been
/// explicitly cleared or invalidated by an unrecoverable refresh failure.
/// `expires_at` is always derived (issue time + `expires_in`), never
/// user-supplied. On refresh the record is fully replaced, not merged — see
/// [`renewed`](Self::renewed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct SessionRecord {
    /// Provider-assigned stable user identifier (not the OIDC `sub` claim).
    pub contact_id: String,
    pub email: String,
    /// Given name from the ID token, falling back to `email`.
    pub display_name: String,
    /// Bearer credential for backend API calls.
    pub access_token: String,
    /// Absent means the session cannot be silently renewed.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// Organization-linkage records, opaque to this crate.
    #[serde(default)]
    pub relationships: Vec<JsonValue>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Authentication-assurance level, passed through uninterpreted.
    #[serde(default)]
    pub aal: Option<String>,
    /// Identity-verification level, passed through uninterpreted.
    #[serde(default)]
    pub loa: Option<String>,
}

impl SessionRecord {
    /// Build the record persisted after a successful callback.
    #[must_use]
    pub fn from_claims(
        claims: IdentityClaims,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: u64,
        now: OffsetDateTime,
    ) -> Self {
        let display_name = claims.given_name.unwrap_or_else(|| claims.email.clone());
        Self {
            contact_id: claims.contact_id,
            email: claims.email,
            display_name,
            access_token,
            refresh_token,
            expires_at: now + expiry(expires_in),
            relationships: claims.relationships,
            roles: claims.roles,
            aal: claims.aal,
            loa: claims.loa,
        }
    }

    /// Whether the access token is still usable: `expires_at` must be more
    /// than [`EXPIRY_BUFFER`] in the future.
    #[must_use]
    pub fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now + EXPIRY_BUFFER
    }

    /// The replacement record after a successful refresh: tokens and expiry
    /// come from the response, every other field from the prior record. A
    /// provider that does not rotate refresh tokens omits `refresh_token`
    /// from the response; the prior token is kept so the session stays
    /// renewable.
    #[must_use]
    pub fn renewed(&self, tokens: &TokenResponse, now: OffsetDateTime) -> Self {
        Self {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens
                .refresh_token
                .clone()
                .or_else(|| self.refresh_token.clone()),
            expires_at: now + expiry(tokens.expires_in),
            ..self.clone()
        }
    }
}

fn expiry(expires_in: u64) -> Duration {
    Duration::seconds(i64::try_from(expires_in).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> IdentityClaims {
        IdentityClaims {
            contact_id: "c-123".into(),
            email: "user@example.com".into(),
            given_name: Some("Kari".into()),
            relationships: vec![serde_json::json!({"organizationId": "org-1"})],
            roles: vec!["reader".into()],
            aal: Some("aal2".into()),
            loa: None,
        }
    }

    fn record(now: OffsetDateTime) -> SessionRecord {
        SessionRecord::from_claims(
            claims(),
            "access-1".into(),
            Some("refresh-1".into()),
            3600,
            now,
        )
    }

    #[test]
    fn expiry_is_issue_time_plus_expires_in() {
        let now = OffsetDateTime::now_utc();
        let rec = record(now);
        assert_eq!(rec.expires_at, now + Duration::seconds(3600));
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut c = claims();
        c.given_name = None;
        let rec = SessionRecord::from_claims(c, "a".into(), None, 60, OffsetDateTime::now_utc());
        assert_eq!(rec.display_name, "user@example.com");
    }

    #[test]
    fn freshness_buffer_is_one_minute() {
        let now = OffsetDateTime::now_utc();
        let mut rec = record(now);

        rec.expires_at = now + Duration::seconds(61);
        assert!(rec.is_fresh(now));

        rec.expires_at = now + Duration::seconds(60);
        assert!(!rec.is_fresh(now));

        rec.expires_at = now + Duration::seconds(59);
        assert!(!rec.is_fresh(now));

        rec.expires_at = now - Duration::seconds(1);
        assert!(!rec.is_fresh(now));
    }

    #[test]
    fn renewed_replaces_tokens_and_keeps_identity() {
        let now = OffsetDateTime::now_utc();
        let old = record(now - Duration::hours(1));
        let tokens = TokenResponse {
            access_token: "new-token".into(),
            refresh_token: Some("new-refresh".into()),
            expires_in: 3600,
        };

        let new = old.renewed(&tokens, now);
        assert_eq!(new.access_token, "new-token");
        assert_eq!(new.refresh_token.as_deref(), Some("new-refresh"));
        assert_eq!(new.expires_at, now + Duration::seconds(3600));

        // all non-token fields preserved
        assert_eq!(new.contact_id, old.contact_id);
        assert_eq!(new.email, old.email);
        assert_eq!(new.display_name, old.display_name);
        assert_eq!(new.relationships, old.relationships);
        assert_eq!(new.roles, old.roles);
        assert_eq!(new.aal, old.aal);
        assert_eq!(new.loa, old.loa);
    }

    #[test]
    fn renewed_keeps_old_refresh_token_when_not_rotated() {
        let now = OffsetDateTime::now_utc();
        let old = record(now);
        let tokens = TokenResponse {
            access_token: "new-token".into(),
            refresh_token: None,
            expires_in: 60,
        };
        assert_eq!(
            old.renewed(&tokens, now).refresh_token.as_deref(),
            Some("refresh-1")
        );
    }

    #[test]
    fn serde_roundtrip_uses_camel_case_and_rfc3339() {
        let rec = record(OffsetDateTime::now_utc());
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("contactId").is_some());
        assert!(json.get("accessToken").is_some());
        assert!(json["expiresAt"].as_str().is_some());

        let back: SessionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }
}
