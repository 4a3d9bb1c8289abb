//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` / `ConfigError` variants into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use myq_config::ConfigError;
use myq_core::CoreError;

/// Exit codes for scripting against the CLI.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("MyQ account credentials are missing")]
    #[diagnostic(
        code(myqd::missing_credentials),
        help(
            "Set 'username' and 'password' in the settings file, or export \
             MYQ_USERNAME / MYQ_PASSWORD.\n\
             Store the password securely with: myqd set-password <username> <password>"
        )
    )]
    MissingCredentials,

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(myqd::auth_failed),
        help("Verify the MyQ account email and password, then retry.")
    )]
    AuthFailed { message: String },

    #[error("Could not reach the MyQ cloud service")]
    #[diagnostic(
        code(myqd::connection_failed),
        help("The service may be down or rate-limiting. Retry in a few minutes.")
    )]
    ConnectionFailed { message: String },

    #[error("No device matching '{device}'")]
    #[diagnostic(
        code(myqd::device_not_found),
        help("Run: myqd devices to list known node addresses and serials")
    )]
    DeviceNotFound { device: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(myqd::config))]
    Config { message: String },

    #[error("{message}")]
    #[diagnostic(code(myqd::operation_failed))]
    Operation { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MissingCredentials | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::DeviceNotFound { .. } => exit_code::NOT_FOUND,
            Self::Config { .. } => exit_code::USAGE,
            Self::Operation { .. } => exit_code::GENERAL,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::ServiceUnreachable { message } | CoreError::Api { message } => {
                Self::ConnectionFailed { message }
            }
            CoreError::NotConnected => Self::ConnectionFailed {
                message: "no cloud session".into(),
            },
            CoreError::NodeNotFound { address } => Self::DeviceNotFound {
                device: address.to_string(),
            },
            CoreError::Config { message } => Self::Config { message },
            other => Self::Operation {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingCredentials => Self::MissingCredentials,
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
