use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// MyQ cloud bridge: polls the MyQ service and mirrors garage doors,
/// lamps, and gateways as plugin-host nodes.
#[derive(Debug, Parser)]
#[command(name = "myqd", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bridge daemon until interrupted
    Run,

    /// Connect once and list the account's devices
    Devices,

    /// Open a garage door (node address or serial number)
    Open { device: String },

    /// Close a garage door (node address or serial number)
    Close { device: String },

    /// Turn a lamp on (node address or serial number)
    LampOn { device: String },

    /// Turn a lamp off (node address or serial number)
    LampOff { device: String },

    /// Store the account password in the system keyring
    SetPassword { username: String, password: String },
}
