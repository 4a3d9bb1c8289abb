// ── Inbound commands ──
//
// Typed equivalents of the host's command callbacks (DON/DOF on device
// nodes, QUERY/DISCOVER on the controller).

use crate::model::NodeAddress;

/// A command routed through [`Controller::execute`](crate::Controller::execute).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a garage door.
    Open { address: NodeAddress },
    /// Close a garage door.
    Close { address: NodeAddress },
    /// Turn a lamp on.
    TurnOn { address: NodeAddress },
    /// Turn a lamp off.
    TurnOff { address: NodeAddress },
    /// Force-refresh every node's state.
    Query,
    /// Discover devices and create missing nodes.
    Discover,
}

impl Command {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Open { .. } => "open",
            Self::Close { .. } => "close",
            Self::TurnOn { .. } => "turn-on",
            Self::TurnOff { .. } => "turn-off",
            Self::Query => "query",
            Self::Discover => "discover",
        }
    }
}
