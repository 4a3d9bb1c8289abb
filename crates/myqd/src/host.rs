// ── Standalone plugin host ──
//
// A self-contained PluginHost for running outside a plugin runtime:
// driver updates and notices go to the log, custom data persists as a
// JSON file in the platform data directory.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use myq_core::{DriverKey, LocalNode, NodeAddress, PluginHost};

pub struct StandaloneHost {
    data_file: PathBuf,
}

impl StandaloneHost {
    pub fn new(data_file: PathBuf) -> Self {
        Self { data_file }
    }
}

impl PluginHost for StandaloneHost {
    fn node_added(&self, node: &LocalNode) {
        info!(
            address = %node.address,
            kind = %node.kind,
            name = %node.name,
            "node added"
        );
    }

    fn set_driver(&self, address: &NodeAddress, driver: DriverKey, value: i64, force: bool) {
        info!(%address, %driver, value, force, "driver update");
    }

    fn add_notice(&self, key: &str, text: &str) {
        warn!(notice = key, "{text}");
    }

    fn remove_notice(&self, key: &str) {
        debug!(notice = key, "notice cleared");
    }

    fn load_custom_data(&self) -> HashMap<String, String> {
        let Ok(raw) = std::fs::read_to_string(&self.data_file) else {
            return HashMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, path = %self.data_file.display(), "unreadable custom data, starting fresh");
            HashMap::new()
        })
    }

    fn save_custom_data(&self, data: &HashMap<String, String>) {
        if let Some(parent) = self.data_file.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, "could not create data directory");
                return;
            }
        }

        match serde_json::to_string_pretty(data) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.data_file, json) {
                    warn!(error = %e, path = %self.data_file.display(), "could not persist custom data");
                }
            }
            Err(e) => warn!(error = %e, "could not serialize custom data"),
        }
    }
}
