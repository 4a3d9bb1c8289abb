// ── Runtime controller configuration ──
//
// Describes *how* to talk to the cloud service and how fast to poll.
// Carries credential data and tuning, never touches disk -- the daemon's
// config crate constructs one of these and hands it in.

use std::time::Duration;

use myq_api::ApiEndpoints;
use secrecy::SecretString;

/// Configuration for one controller instance.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// MyQ account email.
    pub username: String,
    /// MyQ account password.
    pub password: SecretString,
    /// Assumed token lifetime before a lazy refresh is attempted.
    pub token_ttl: Duration,
    /// Poll interval while in active mode.
    pub active_interval: Duration,
    /// Poll interval while in inactive mode.
    pub inactive_interval: Duration,
    /// Per-request HTTP timeout.
    pub http_timeout: Duration,
    /// Cloud endpoint table (overridable for tests).
    pub endpoints: ApiEndpoints,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: SecretString::from(String::new()),
            token_ttl: Duration::from_secs(1200),
            active_interval: Duration::from_secs(15),
            inactive_interval: Duration::from_secs(60),
            http_timeout: Duration::from_secs(10),
            endpoints: ApiEndpoints::default(),
        }
    }
}
