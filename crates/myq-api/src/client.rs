// MyQ cloud client
//
// Wraps two `reqwest::Client`s (redirect-following and raw) around the
// OAuth flow, lazy token refresh, account resolution, and the device
// list/action endpoints. Session state lives behind a `std::sync::RwLock`
// that is only held between awaits, never across one.

use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::devices::{DeviceListResponse, RemoteDevice};
use crate::endpoints::ApiEndpoints;
use crate::error::Error;
use crate::oauth::{self, TokenResponse};
use crate::transport::TransportConfig;

/// An action the cloud service can perform on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DeviceAction {
    Open,
    Close,
    TurnOn,
    TurnOff,
}

impl DeviceAction {
    /// The path segment the action endpoint expects.
    fn path_segment(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::TurnOn => "on",
            Self::TurnOff => "off",
        }
    }

    fn is_lamp_action(self) -> bool {
        matches!(self, Self::TurnOn | Self::TurnOff)
    }
}

/// Authentication/session state. Created empty, populated by login,
/// replaced wholesale on refresh. Never persisted -- a process restart
/// always re-runs the login flow.
#[derive(Default)]
struct Session {
    access_token: Option<SecretString>,
    token_type: String,
    refresh_token: Option<SecretString>,
    obtained_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Client for the MyQ cloud service.
///
/// One instance per account. All methods take `&self`; internal session
/// state is interior-mutable so the controller can share the client
/// between its poll and command paths.
pub struct MyQClient {
    /// Follows redirects; used for fetching the hosted login form.
    page_client: reqwest::Client,
    /// Redirect-free; used for the auth redirect chain and all API calls.
    raw_client: reqwest::Client,
    endpoints: ApiEndpoints,
    username: String,
    password: SecretString,
    token_ttl: Duration,
    session: RwLock<Session>,
}

impl MyQClient {
    /// Create a client. Does not log in -- the first `list_devices` (or an
    /// explicit `login`) establishes the session.
    pub fn new(
        username: String,
        password: SecretString,
        token_ttl: Duration,
        transport: &TransportConfig,
        endpoints: ApiEndpoints,
    ) -> Result<Self, Error> {
        // Both clients share one cookie jar: the login form sets session
        // cookies that the redirect chain must carry.
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };

        Ok(Self {
            page_client: config.build_client()?,
            raw_client: config.build_no_redirect_client()?,
            endpoints,
            username,
            password,
            token_ttl,
            session: RwLock::new(Session::default()),
        })
    }

    /// The resolved account identifier, if logged in.
    pub fn account_id(&self) -> Option<String> {
        self.session.read().expect("session lock poisoned").account_id.clone()
    }

    /// Whether a session token is currently held (it may be stale).
    pub fn is_logged_in(&self) -> bool {
        self.session
            .read()
            .expect("session lock poisoned")
            .access_token
            .is_some()
    }

    // ── Session lifecycle ────────────────────────────────────────────

    /// Run the full login flow: OAuth authorization-code + PKCE, then
    /// account resolution. Replaces any existing session.
    pub async fn login(&self) -> Result<(), Error> {
        let tokens = oauth::authorization_code_flow(
            &self.page_client,
            &self.raw_client,
            &self.endpoints,
            &self.username,
            &self.password,
        )
        .await?;

        self.store_tokens(tokens);

        let account_id = self.resolve_account().await?;
        self.session
            .write()
            .expect("session lock poisoned")
            .account_id = Some(account_id);

        info!("MyQ session established");
        Ok(())
    }

    /// Refresh the session lazily.
    ///
    /// No-op while the cached token's age is below the configured TTL.
    /// Past the TTL, a held refresh token is exchanged as long as the
    /// access token has not hard-expired, falling back to a full re-login
    /// on any refresh failure or once past expiry.
    ///
    /// Called before every device-list request. Deliberately NOT called
    /// before action requests -- command latency wins there, and a stale
    /// token surfaces as a failed action the next poll reconciles.
    pub async fn ensure_valid_token(&self) -> Result<(), Error> {
        let now = Utc::now();
        let (fresh, refreshable, refresh_token) = {
            let session = self.session.read().expect("session lock poisoned");
            let Some(obtained_at) = session.obtained_at else {
                drop(session);
                return self.login().await;
            };

            let age = now.signed_duration_since(obtained_at);
            let ttl = chrono::Duration::from_std(self.token_ttl).unwrap_or_default();
            let not_expired = session.expires_at.is_some_and(|exp| now < exp);
            (
                age < ttl,
                not_expired && session.refresh_token.is_some(),
                session.refresh_token.clone(),
            )
        };

        if fresh {
            return Ok(());
        }

        if refreshable {
            if let Some(token) = refresh_token {
                debug!("token past TTL, attempting refresh exchange");
                match oauth::refresh_token_flow(&self.raw_client, &self.endpoints, &token).await {
                    Ok(tokens) => {
                        self.store_tokens(tokens);
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(error = %e, "refresh exchange failed, falling back to login");
                    }
                }
            }
        }

        debug!("re-running full login flow");
        self.login().await
    }

    /// Drop the session. Idempotent; safe when never logged in.
    pub fn disconnect(&self) {
        *self.session.write().expect("session lock poisoned") = Session::default();
        debug!("MyQ session dropped");
    }

    // ── Device operations ────────────────────────────────────────────

    /// Fetch the account's device list.
    ///
    /// Refreshes the token first. A response without the expected device
    /// collection is an empty-but-valid result; transport failures and
    /// non-success statuses are errors the caller treats as "unknown,
    /// try again next cycle".
    pub async fn list_devices(&self) -> Result<Vec<RemoteDevice>, Error> {
        self.ensure_valid_token().await?;

        let account_id = self.account_id().ok_or(Error::NotLoggedIn)?;
        let url = self.endpoints.device_list_url(&account_id);
        debug!(%url, "GET device list");

        let resp = self
            .raw_client
            .get(url.clone())
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                endpoint: url.path().to_owned(),
            });
        }

        let body = resp.text().await?;
        let parsed: DeviceListResponse =
            serde_json::from_str(&body).map_err(|e| Error::deserialization(&e, &body))?;

        let devices = parsed.into_devices();
        debug!(count = devices.len(), "device list fetched");
        Ok(devices)
    }

    /// Ask the service to actuate a device.
    ///
    /// Returns `true` only on the endpoint's success status (204). Every
    /// other outcome -- including network failure -- is `false`, logged,
    /// and never retried here.
    pub async fn perform_action(&self, serial: &str, action: DeviceAction) -> bool {
        let Some(account_id) = self.account_id() else {
            warn!(%serial, %action, "action attempted without a session");
            return false;
        };

        let url = self.action_url(&account_id, serial, action);
        debug!(%url, "PUT device action");

        let bearer = match self.bearer() {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "action attempted without a token");
                return false;
            }
        };

        let result = self
            .raw_client
            .put(url)
            .header(reqwest::header::AUTHORIZATION, bearer)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status() == StatusCode::NO_CONTENT => true,
            Ok(resp) => {
                warn!(%serial, %action, status = %resp.status(), "device action rejected");
                false
            }
            Err(e) => {
                warn!(%serial, %action, error = %e, "device action failed");
                false
            }
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn action_url(&self, account_id: &str, serial: &str, action: DeviceAction) -> Url {
        let segment = action.path_segment();
        if action.is_lamp_action() {
            self.endpoints.lamp_action_url(account_id, serial, segment)
        } else {
            self.endpoints.door_action_url(account_id, serial, segment)
        }
    }

    fn store_tokens(&self, tokens: TokenResponse) {
        let now = Utc::now();
        let mut session = self.session.write().expect("session lock poisoned");
        session.access_token = Some(SecretString::from(tokens.access_token));
        session.token_type = if tokens.token_type.is_empty() {
            "Bearer".to_owned()
        } else {
            tokens.token_type
        };
        session.refresh_token = tokens.refresh_token.map(SecretString::from);
        session.obtained_at = Some(now);
        session.expires_at = Some(now + chrono::Duration::seconds(tokens.expires_in));
    }

    fn bearer(&self) -> Result<String, Error> {
        let session = self.session.read().expect("session lock poisoned");
        let token = session.access_token.as_ref().ok_or(Error::NotLoggedIn)?;
        Ok(format!(
            "{} {}",
            session.token_type,
            token.expose_secret()
        ))
    }

    async fn resolve_account(&self) -> Result<String, Error> {
        let url = self.endpoints.accounts_url();
        debug!(%url, "resolving account");

        let resp = self
            .raw_client
            .get(url.clone())
            .header(reqwest::header::AUTHORIZATION, self.bearer()?)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                endpoint: url.path().to_owned(),
            });
        }

        let body = resp.text().await?;
        let parsed: AccountsResponse =
            serde_json::from_str(&body).map_err(|e| Error::deserialization(&e, &body))?;

        let account = parsed.accounts.into_iter().next().ok_or(Error::MissingAccount)?;
        debug!(id = %account.id, name = ?account.name, "account resolved");
        Ok(account.id)
    }
}
