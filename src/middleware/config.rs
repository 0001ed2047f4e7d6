use axum_extra::extract::cookie::Key;
use url::Url;

use super::error::AuthError;

/// Minimum length for the session-cookie signing secret.
const MIN_COOKIE_SECRET_LEN: usize = 32;

/// Public origin of the deployment, used for the post-logout redirect URI.
#[derive(Clone, Debug)]
pub(crate) struct PublicOrigin {
    pub(crate) scheme: String,
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl PublicOrigin {
    /// `scheme://host[:port]`, omitting the port when it is the scheme
    /// default (80/443).
    pub(crate) fn root_uri(&self) -> String {
        let is_default = matches!(
            (self.scheme.as_str(), self.port),
            ("http", 80) | ("https", 443)
        );
        if is_default {
            format!("{}://{}", self.scheme, self.host)
        } else {
            format!("{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) error_redirect: String,
    pub(crate) public_origin: PublicOrigin,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__oidc_session".into(),
            session_ttl_days: 30,
            secure_cookies: true,
            auth_path: "/auth".into(),
            error_redirect: "/".into(),
            public_origin: PublicOrigin {
                scheme: "http".into(),
                host: "localhost".into(),
                port: 3000,
            },
        }
    }
}

/// Provider-facing settings consumed by the default gateway and refresher.
#[derive(Clone, Debug)]
pub(crate) struct OidcSettings {
    pub(crate) discovery_url: Url,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) service_id: String,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Option<Vec<String>>,
}

/// Relying-party configuration.
///
/// Required fields are constructor parameters — no runtime "missing field"
/// errors. Use [`from_env()`](AuthConfig::from_env) for convention-based
/// setup, or [`new()`](AuthConfig::new) with `with_*` methods for full
/// control.
pub struct AuthConfig {
    pub(crate) oidc: OidcSettings,
    pub(crate) settings: AuthSettings,
}

impl AuthConfig {
    /// Create config with the required provider parameters.
    ///
    /// All optional fields use sensible defaults. Override with `with_*`
    /// methods.
    #[must_use]
    pub fn new(
        discovery_url: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        service_id: impl Into<String>,
        redirect_uri: Url,
    ) -> Self {
        Self {
            oidc: OidcSettings {
                discovery_url,
                client_id: client_id.into(),
                client_secret: client_secret.into(),
                service_id: service_id.into(),
                redirect_uri,
                scopes: None,
            },
            settings: AuthSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `OIDC_DISCOVERY_URL`: provider discovery document URL
    /// - `OIDC_CLIENT_ID` / `OIDC_CLIENT_SECRET`: OAuth2 client credentials
    /// - `OIDC_SERVICE_ID`: provider-specific service id
    /// - `OIDC_REDIRECT_URI`: callback URI (must be a valid URL)
    /// - `SESSION_COOKIE_SECRET`: cookie signing secret, at least 32 characters
    ///
    /// # Optional env vars
    /// - `OIDC_SCOPES`: comma-separated scope override
    /// - `APP_PROTOCOL` / `APP_HOST` / `APP_PORT`: public origin for the
    ///   post-logout redirect (default `http://localhost:3000`)
    /// - `DEV_AUTH`: set to `"1"` or `"true"` to disable the `Secure` cookie
    ///   attribute for local development
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required vars are missing or values
    /// are malformed.
    pub fn from_env() -> Result<Self, AuthError> {
        let discovery_url = required_url("OIDC_DISCOVERY_URL")?;
        let client_id = required("OIDC_CLIENT_ID")?;
        let client_secret = required("OIDC_CLIENT_SECRET")?;
        let service_id = required("OIDC_SERVICE_ID")?;
        let redirect_uri = required_url("OIDC_REDIRECT_URI")?;

        let mut config = Self::new(
            discovery_url,
            client_id,
            client_secret,
            service_id,
            redirect_uri,
        );

        if let Ok(scopes) = std::env::var("OIDC_SCOPES") {
            config = config.with_scopes(
                scopes.split(',').map(|s| s.trim().to_string()).collect(),
            );
        }

        let secret = required("SESSION_COOKIE_SECRET")?;
        if secret.len() < MIN_COOKIE_SECRET_LEN {
            return Err(AuthError::Config(format!(
                "SESSION_COOKIE_SECRET must be at least {MIN_COOKIE_SECRET_LEN} characters"
            )));
        }
        config = config.with_cookie_key(Key::derive_from(secret.as_bytes()));

        let mut origin = config.settings.public_origin.clone();
        if let Ok(scheme) = std::env::var("APP_PROTOCOL") {
            origin.scheme = scheme;
        }
        if let Ok(host) = std::env::var("APP_HOST") {
            origin.host = host;
        }
        if let Ok(port) = std::env::var("APP_PORT") {
            origin.port = port
                .parse()
                .map_err(|e| AuthError::Config(format!("APP_PORT: {e}")))?;
        }
        config.settings.public_origin = origin;

        let dev_auth = matches!(std::env::var("DEV_AUTH").as_deref(), Ok("1") | Ok("true"));

        Ok(config.with_secure_cookies(!dev_auth))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Mount point for the login/callback/logout routes (default `/auth`).
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    /// Where OAuth protocol failures land the browser (default `/`).
    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.oidc.scopes = Some(scopes);
        self
    }

    #[must_use]
    pub fn with_public_origin(
        mut self,
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        self.settings.public_origin = PublicOrigin {
            scheme: scheme.into(),
            host: host.into(),
            port,
        };
        self
    }
}

fn required(name: &'static str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::Config(format!("{name} is required")))
}

fn required_url(name: &'static str) -> Result<Url, AuthError> {
    required(name)?
        .parse()
        .map_err(|e| AuthError::Config(format!("{name}: {e}")))
}
