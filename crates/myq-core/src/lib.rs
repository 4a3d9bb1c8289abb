//! Business logic for the MyQ bridge: device reconciliation, adaptive
//! polling, and command dispatch behind a single [`Controller`] facade.
//!
//! - **[`Controller`]** — owns the cloud client, the local node registry,
//!   and the poll state machine. The plugin host drives it through
//!   [`short_poll()`](Controller::short_poll) /
//!   [`long_poll()`](Controller::long_poll) ticks and
//!   [`execute()`](Controller::execute) commands.
//!
//! - **[`NodeRegistry`]** — local nodes keyed by sanitized address, with
//!   the two-level hierarchy invariant (every opener/lamp hangs off an
//!   existing gateway) enforced at insert and change-deduped driver
//!   emission toward the host sink.
//!
//! - **[`PollState`]** — the two-rate (active/inactive) scheduler state
//!   machine. Active mode is entered on any command or on observing a
//!   door in motion, and decays after five minutes without either.
//!
//! - **[`PluginHost`]** — the consumed collaborator boundary: state sink,
//!   notices, and persisted custom data. The daemon ships a standalone
//!   implementation; tests ship a recording mock.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod model;
pub mod poll;
pub mod registry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::Command;
pub use config::ControllerConfig;
pub use controller::{CONTROLLER_ADDRESS, Controller};
pub use error::CoreError;
pub use host::PluginHost;
pub use poll::PollState;
pub use registry::NodeRegistry;

// Re-export model types at the crate root for ergonomics.
pub use model::{DoorState, DriverKey, LampState, LocalNode, NodeAddress, NodeKind};
