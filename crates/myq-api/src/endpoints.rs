// MyQ cloud endpoint table.
//
// The service spreads its API across several hosts (identity, accounts,
// device inventory, and per-device-class action hosts). Collecting them in
// one struct keeps URL construction in one place and lets tests point
// every host at a local mock server.

use url::Url;

pub const OAUTH_CLIENT_ID: &str = "IOS_CGI_MYQ";
pub const OAUTH_REDIRECT_URI: &str = "com.myqops://ios";
pub const OAUTH_SCOPE: &str = "MyQ_Residential offline_access";

/// Base URLs for every MyQ cloud surface.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    /// Identity service (authorize + token endpoints).
    pub auth: Url,
    /// Account resolution.
    pub accounts: Url,
    /// Device inventory.
    pub devices: Url,
    /// Garage-door-opener actions.
    pub door_actions: Url,
    /// Lamp actions.
    pub lamp_actions: Url,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            auth: parse("https://partner-identity.myq-cloud.com"),
            accounts: parse("https://accounts.myq-cloud.com"),
            devices: parse("https://devices.myq-cloud.com"),
            door_actions: parse("https://account-devices-gdo.myq-cloud.com"),
            lamp_actions: parse("https://account-devices-lamp.myq-cloud.com"),
        }
    }
}

impl ApiEndpoints {
    /// Point every host at a single base URL. Intended for tests against
    /// a mock server.
    pub fn single_host(base: &Url) -> Self {
        Self {
            auth: base.clone(),
            accounts: base.clone(),
            devices: base.clone(),
            door_actions: base.clone(),
            lamp_actions: base.clone(),
        }
    }

    pub(crate) fn authorize_url(&self) -> Url {
        join(&self.auth, "connect/authorize")
    }

    pub(crate) fn token_url(&self) -> Url {
        join(&self.auth, "connect/token")
    }

    pub(crate) fn accounts_url(&self) -> Url {
        join(&self.accounts, "api/v6.0/accounts")
    }

    pub(crate) fn device_list_url(&self, account_id: &str) -> Url {
        join(
            &self.devices,
            &format!("api/v5.2/Accounts/{account_id}/Devices"),
        )
    }

    pub(crate) fn door_action_url(&self, account_id: &str, serial: &str, action: &str) -> Url {
        join(
            &self.door_actions,
            &format!("api/v5.2/Accounts/{account_id}/door_openers/{serial}/{action}"),
        )
    }

    pub(crate) fn lamp_action_url(&self, account_id: &str, serial: &str, action: &str) -> Url {
        join(
            &self.lamp_actions,
            &format!("api/v5.2/Accounts/{account_id}/lamps/{serial}/{action}"),
        )
    }
}

fn parse(s: &str) -> Url {
    Url::parse(s).expect("static endpoint URL")
}

fn join(base: &Url, path: &str) -> Url {
    let base_str = base.as_str().trim_end_matches('/');
    Url::parse(&format!("{base_str}/{path}")).expect("valid endpoint URL")
}
