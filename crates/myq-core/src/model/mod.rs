// ── Domain model ──

mod address;
mod node;
mod state;

pub use address::{NodeAddress, sanitize_name};
pub use node::{DriverKey, LocalNode, NodeKind};
pub use state::{DoorState, LampState};
