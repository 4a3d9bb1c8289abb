// ── Plugin host boundary ──
//
// Everything the core needs from the plugin host runtime, expressed as
// one trait: a state sink, user-visible notices, and a persisted
// key-value store. The daemon ships a standalone implementation; the
// host runtime (or a test mock) can stand in without core changes.

use std::collections::HashMap;

use crate::model::{DriverKey, LocalNode, NodeAddress};

/// The consumed plugin-host interface.
///
/// Implementations must tolerate being called from async context; every
/// method is synchronous and expected to be cheap (the real host queues
/// outbound messages).
pub trait PluginHost: Send + Sync {
    /// A node was created in the local registry.
    fn node_added(&self, node: &LocalNode);

    /// Report a driver value. Core only calls this when the value
    /// changed or `force` is set -- the host may still dedupe further.
    fn set_driver(&self, address: &NodeAddress, driver: DriverKey, value: i64, force: bool);

    /// Surface a keyed, user-visible notice.
    fn add_notice(&self, key: &str, text: &str);

    /// Clear a previously surfaced notice. Unknown keys are a no-op.
    fn remove_notice(&self, key: &str);

    /// Load the persisted custom data (empty map on first start).
    fn load_custom_data(&self) -> HashMap<String, String>;

    /// Persist the custom data map.
    fn save_custom_data(&self, data: &HashMap<String, String>);
}
