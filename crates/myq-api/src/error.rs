use thiserror::Error;

/// Top-level error type for the `myq-api` crate.
///
/// Covers every failure mode across the client: credential rejection,
/// OAuth flow breakage, transport failures, and malformed responses.
/// `myq-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The service rejected the supplied username/password.
    #[error("Authentication rejected: {message}")]
    BadCredentials { message: String },

    /// Login could not complete for a reason other than bad credentials
    /// (5xx from the identity service, unexpected status, etc.)
    #[error("Authentication service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// The OAuth authorization-code flow broke partway through: missing
    /// verification token in the login form, missing redirect, or a
    /// redirect without an authorization code.
    #[error("OAuth flow error at {stage}: {message}")]
    OAuthFlow {
        stage: &'static str,
        message: String,
    },

    /// No account was associated with the authenticated user.
    #[error("No MyQ account found for the authenticated user")]
    MissingAccount,

    /// An operation that needs a session was called before login.
    #[error("Not logged in -- call login() first")]
    NotLoggedIn,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-success status from a device endpoint.
    #[error("HTTP {status} from {endpoint}")]
    Http { status: u16, endpoint: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with a body preview for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient failure the next poll cycle
    /// may recover from (timeouts, connection errors, 5xx statuses).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::ServiceUnavailable { .. } => true,
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if re-authenticating might resolve this error.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::BadCredentials { .. } | Self::NotLoggedIn | Self::Http { status: 401, .. }
        )
    }

    /// Build a `Deserialization` error with a truncated body preview.
    pub(crate) fn deserialization(err: &serde_json::Error, body: &str) -> Self {
        let preview = &body[..body.len().min(200)];
        Self::Deserialization {
            message: format!("{err} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    }
}
