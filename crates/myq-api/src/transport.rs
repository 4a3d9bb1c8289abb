// Shared transport configuration for building reqwest::Client instances.
//
// The OAuth login flow needs two client flavors from the same cookie jar:
// one that follows redirects (fetching the hosted login form) and one that
// does not (walking the authorization redirect chain by hand).

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;

use crate::error::Error;

const USER_AGENT: &str = concat!("myqd/", env!("CARGO_PKG_VERSION"));

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            cookie_jar: None,
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        self.builder().build().map_err(Error::Transport)
    }

    /// Build a client that does NOT follow redirects.
    ///
    /// The authorization leg of the login flow must observe each
    /// `Location` header to capture the final app-scheme redirect that
    /// carries the authorization code.
    pub fn build_no_redirect_client(&self) -> Result<reqwest::Client, Error> {
        self.builder()
            .redirect(Policy::none())
            .build()
            .map_err(Error::Transport)
    }

    /// Create a config with a fresh cookie jar (the identity service
    /// requires session cookies across the login flow).
    pub fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = Some(Arc::new(Jar::default()));
        self
    }

    fn builder(&self) -> reqwest::ClientBuilder {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        if let Some(ref jar) = self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder
    }
}
