// ── Local node registry ──
//
// Concurrent map of local nodes keyed by sanitized address. Enforces the
// host's two-level hierarchy at insert time (gateways are their own
// parent; everything else must hang off an existing gateway) and owns
// change-deduped driver emission toward the host sink.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use crate::error::CoreError;
use crate::host::PluginHost;
use crate::model::{DriverKey, LocalNode, NodeAddress, NodeKind};

#[derive(Default)]
pub struct NodeRegistry {
    nodes: DashMap<NodeAddress, LocalNode>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node if its address is free.
    ///
    /// Returns `Ok(true)` when inserted, `Ok(false)` when a node already
    /// holds the address (the existing node is left untouched), and an
    /// error when the two-level hierarchy would be violated.
    pub fn add(&self, node: LocalNode) -> Result<bool, CoreError> {
        if node.kind.is_gateway() {
            if node.parent != node.address {
                return Err(CoreError::InvalidParent {
                    address: node.address,
                    parent: node.parent,
                });
            }
        } else {
            let parent_is_gateway = self
                .nodes
                .get(&node.parent)
                .is_some_and(|p| p.kind.is_gateway());
            if !parent_is_gateway {
                return Err(CoreError::InvalidParent {
                    address: node.address,
                    parent: node.parent,
                });
            }
        }

        if self.nodes.contains_key(&node.address) {
            return Ok(false);
        }

        debug!(address = %node.address, kind = %node.kind, "node registered");
        self.nodes.insert(node.address.clone(), node);
        Ok(true)
    }

    /// Snapshot of one node.
    pub fn get(&self, address: &NodeAddress) -> Option<LocalNode> {
        self.nodes.get(address).map(|n| n.value().clone())
    }

    /// Find the node mapped to a raw device id.
    pub fn find_by_device_id(&self, device_id: &str) -> Option<LocalNode> {
        self.nodes
            .iter()
            .find(|n| n.device_id == device_id)
            .map(|n| n.value().clone())
    }

    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.nodes.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Snapshot of every node.
    pub fn snapshot(&self) -> Vec<LocalNode> {
        self.nodes.iter().map(|n| n.value().clone()).collect()
    }

    /// Update a driver's cached value, emitting to the host sink when it
    /// changed or `force` is set. Returns whether an emission happened.
    pub fn set_driver(
        &self,
        address: &NodeAddress,
        key: DriverKey,
        value: i64,
        force: bool,
        host: &dyn PluginHost,
    ) -> bool {
        let changed = {
            let Some(mut node) = self.nodes.get_mut(address) else {
                return false;
            };
            let changed = node.drivers.get(&key) != Some(&value);
            if changed {
                node.drivers.insert(key, value);
            }
            changed
        };

        // Guard dropped before calling out -- the sink must never run
        // under a shard lock.
        if changed || force {
            host.set_driver(address, key, value, force);
        }
        changed || force
    }

    /// Record the remote last-changed timestamp backing the
    /// elapsed-seconds driver. Returns `true` when the timestamp moved.
    pub fn update_last_changed(
        &self,
        address: &NodeAddress,
        timestamp: Option<DateTime<Utc>>,
    ) -> bool {
        let Some(mut node) = self.nodes.get_mut(address) else {
            return false;
        };
        if node.last_changed == timestamp {
            return false;
        }
        node.last_changed = timestamp;
        true
    }
}
