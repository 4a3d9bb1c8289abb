// ── Core error types ──
//
// User-facing errors from myq-core. Consumers never see raw HTTP status
// codes or OAuth flow internals -- the `From<myq_api::Error>` impl
// translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

use crate::model::{NodeAddress, NodeKind};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("The MyQ cloud service is unreachable: {message}")]
    ServiceUnreachable { message: String },

    #[error("No cloud session -- the service connection has not been established")]
    NotConnected,

    // ── Node errors ──────────────────────────────────────────────────
    #[error("No node at address '{address}'")]
    NodeNotFound { address: NodeAddress },

    #[error("Node '{address}' references parent '{parent}' which is not a known gateway")]
    InvalidParent {
        address: NodeAddress,
        parent: NodeAddress,
    },

    #[error("Command {command} does not apply to {kind} node '{address}'")]
    WrongNodeKind {
        command: &'static str,
        kind: NodeKind,
        address: NodeAddress,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("Cloud API error: {message}")]
    Api { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<myq_api::Error> for CoreError {
    fn from(err: myq_api::Error) -> Self {
        match err {
            myq_api::Error::BadCredentials { message } => {
                CoreError::AuthenticationFailed { message }
            }
            myq_api::Error::NotLoggedIn => CoreError::NotConnected,
            myq_api::Error::ServiceUnavailable { message } => {
                CoreError::ServiceUnreachable { message }
            }
            myq_api::Error::Transport(ref e) if e.is_timeout() || e.is_connect() => {
                CoreError::ServiceUnreachable {
                    message: e.to_string(),
                }
            }
            myq_api::Error::MissingAccount => CoreError::AuthenticationFailed {
                message: "no account associated with these credentials".into(),
            },
            other => CoreError::Api {
                message: other.to_string(),
            },
        }
    }
}
