// ── Local node types ──

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::NodeAddress;

/// What a local node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NodeKind {
    /// The account's bridge device; its own primary in the two-level
    /// hierarchy the host supports.
    Gateway,
    Opener,
    Lamp,
}

impl NodeKind {
    pub fn is_gateway(self) -> bool {
        matches!(self, Self::Gateway)
    }
}

/// Host driver slots, named by their wire mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum DriverKey {
    /// Primary state: online flag (gateway), door index (opener),
    /// on/off percentage (lamp).
    #[strum(serialize = "ST")]
    St,
    /// Secondary value: seconds since the last door-state change on
    /// openers; cloud-service reachability on the controller node.
    #[strum(serialize = "GV0")]
    Gv0,
}

/// A persisted local node: the bridge between one remote device and the
/// host's node registry.
///
/// Created once on first discovery, updated on every reconciliation,
/// never deleted here. The driver cache backs change-only reporting and
/// is not persisted -- a restart force-reports everything anyway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalNode {
    pub address: NodeAddress,
    pub kind: NodeKind,
    pub name: String,
    /// Owning gateway's address; a gateway is its own parent.
    pub parent: NodeAddress,
    /// Raw remote device id, case-sensitive, used for action calls.
    pub device_id: String,

    /// Last reported value per driver.
    #[serde(skip)]
    pub(crate) drivers: HashMap<DriverKey, i64>,
    /// Timestamp backing the elapsed-seconds driver; re-emitted only
    /// when the remote timestamp moves.
    #[serde(skip)]
    pub(crate) last_changed: Option<DateTime<Utc>>,
}

impl LocalNode {
    pub fn new(
        address: NodeAddress,
        kind: NodeKind,
        name: String,
        parent: NodeAddress,
        device_id: String,
    ) -> Self {
        Self {
            address,
            kind,
            name,
            parent,
            device_id,
            drivers: HashMap::new(),
            last_changed: None,
        }
    }

    /// The cached value for a driver, if one has been reported.
    pub fn driver(&self, key: DriverKey) -> Option<i64> {
        self.drivers.get(&key).copied()
    }
}
