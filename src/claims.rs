use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::Error;

/// Identity claims extracted from a provider ID token.
///
/// `contact_id` is the provider-assigned stable user identifier, preferred
/// over the generic OIDC `sub` claim for cross-service consistency. `aal` and
/// `loa` are assurance-level indicators passed through, not interpreted.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct IdentityClaims {
    #[serde(rename = "contactId")]
    pub contact_id: String,
    pub email: String,
    #[serde(default)]
    pub given_name: Option<String>,
    /// Organization-linkage records, opaque to this crate.
    #[serde(default)]
    pub relationships: Vec<JsonValue>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub aal: Option<String>,
    #[serde(default)]
    pub loa: Option<String>,
}

/// Decodes the payload segment of a compact-serialized ID token.
///
/// This does **not** verify the signature, issuer, audience or expiry. It is
/// only safe to call on a token that the OAuth gateway received directly from
/// the provider's token endpoint over TLS (or otherwise verified) — that
/// precondition is part of the [`OAuthGateway`](crate::oauth::OAuthGateway)
/// contract.
///
/// # Errors
///
/// Returns [`Error::Claims`] if the token is not three-segment compact JWT
/// form, the payload is not valid base64url/JSON, or a required claim
/// (`contactId`, `email`) is missing.
pub fn decode_id_token(raw: &str) -> Result<IdentityClaims, Error> {
    let mut segments = raw.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(Error::Claims("invalid ID token format".into()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| Error::Claims("invalid payload encoding".into()))?;

    serde_json::from_slice(&bytes).map_err(|e| Error::Claims(format!("invalid claims: {e}")))
}
