// ── Node addressing ──
//
// The plugin host's node addresses are a restricted namespace: a small
// forbidden character set, a 14-character limit, lowercase only. Device
// serial numbers are case-sensitive and unrestricted, so the sanitized
// address is derived deterministically and the raw serial is kept on the
// node for action calls.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters the host's addressing scheme cannot carry.
const FORBIDDEN: &str = ".<>`~!@#$%^&*(){}[]?/\\;:\"'";

/// Maximum address length accepted by the host.
const MAX_ADDRESS_LEN: usize = 14;

/// A sanitized node address.
///
/// Construct via [`NodeAddress::from_device_id`] to get the canonical
/// form; the `From<&str>` impl re-applies the same normalization so an
/// already-sanitized string round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAddress(String);

impl NodeAddress {
    /// Derive the address for a remote device identifier: strip the
    /// forbidden set, truncate, lowercase.
    pub fn from_device_id(id: &str) -> Self {
        let cleaned: String = id.chars().filter(|c| !FORBIDDEN.contains(*c)).collect();
        let truncated = cleaned.chars().take(MAX_ADDRESS_LEN).collect::<String>();
        Self(truncated.to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeAddress {
    fn from(s: &str) -> Self {
        Self::from_device_id(s)
    }
}

/// Strip the forbidden set from a display name. Names keep their case
/// and length -- only addresses are truncated and lowercased.
pub fn sanitize_name(name: &str) -> String {
    name.chars().filter(|c| !FORBIDDEN.contains(*c)).collect()
}
