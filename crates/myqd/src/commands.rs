// ── Command dispatch ──
//
// `run` drives the two tick intervals until interrupted; everything else
// is a one-shot connect/execute/stop cycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use myq_core::{Command as CoreCommand, Controller, NodeAddress, PluginHost};

use crate::cli::{Cli, Command, GlobalOpts};
use crate::error::CliError;
use crate::host::StandaloneHost;

/// Coarse tick: connection management.
const LONG_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Fine tick: the adaptive scheduler decides whether to actually poll.
const SHORT_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Run => run_daemon(&cli.global).await,

        Command::Devices => {
            let controller = connect_once(&cli.global).await?;
            list_devices(&controller);
            controller.stop();
            Ok(())
        }

        Command::Open { device } => {
            device_command(&cli.global, &device, |address| CoreCommand::Open { address }).await
        }
        Command::Close { device } => {
            device_command(&cli.global, &device, |address| CoreCommand::Close { address }).await
        }
        Command::LampOn { device } => {
            device_command(&cli.global, &device, |address| CoreCommand::TurnOn { address }).await
        }
        Command::LampOff { device } => {
            device_command(&cli.global, &device, |address| CoreCommand::TurnOff { address }).await
        }

        Command::SetPassword { username, password } => {
            myq_config::store_password(&username, &password)?;
            println!("Password stored in the system keyring for {username}.");
            Ok(())
        }
    }
}

// ── Construction ────────────────────────────────────────────────────

fn build_controller(global: &GlobalOpts) -> Result<Controller, CliError> {
    let settings = match global.config {
        Some(ref path) => myq_config::load_settings_from(path)?,
        None => myq_config::load_settings()?,
    };

    let host = Arc::new(StandaloneHost::new(myq_config::data_path()));

    let config = match myq_config::to_controller_config(&settings) {
        Ok(config) => config,
        Err(e @ myq_config::ConfigError::MissingCredentials) => {
            // Surface through the host too -- a plugin runtime renders
            // this to the user even when logs go unread.
            host.add_notice(
                "missing_creds",
                "The MyQ account credentials are missing. Set the 'username' and \
                 'password' configuration parameters and restart.",
            );
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    Controller::new(config, host).map_err(Into::into)
}

async fn connect_once(global: &GlobalOpts) -> Result<Controller, CliError> {
    let controller = build_controller(global)?;
    controller.start();
    controller.long_poll().await;

    if !controller.connected() {
        return Err(CliError::ConnectionFailed {
            message: "could not establish a MyQ session (see log for details)".into(),
        });
    }
    Ok(controller)
}

// ── Daemon loop ─────────────────────────────────────────────────────

async fn run_daemon(global: &GlobalOpts) -> Result<(), CliError> {
    let controller = build_controller(global)?;
    controller.start();
    info!("myqd running; ctrl-c to stop");

    let mut long_tick = tokio::time::interval(LONG_POLL_INTERVAL);
    let mut short_tick = tokio::time::interval(SHORT_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, shutting down");
                break;
            }
            _ = long_tick.tick() => controller.long_poll().await,
            _ = short_tick.tick() => controller.short_poll().await,
        }
    }

    controller.stop();
    Ok(())
}

// ── One-shot helpers ────────────────────────────────────────────────

async fn device_command(
    global: &GlobalOpts,
    device: &str,
    make: fn(NodeAddress) -> CoreCommand,
) -> Result<(), CliError> {
    let controller = connect_once(global).await?;
    let address = resolve_device(&controller, device)?;

    let result = controller.execute(make(address)).await;
    controller.stop();
    result.map_err(Into::into)
}

/// Accept either a node address or a raw device serial.
fn resolve_device(controller: &Controller, raw: &str) -> Result<NodeAddress, CliError> {
    let address = NodeAddress::from_device_id(raw);
    if controller.registry().contains(&address) {
        return Ok(address);
    }

    controller
        .registry()
        .find_by_device_id(raw)
        .map(|node| node.address)
        .ok_or_else(|| CliError::DeviceNotFound {
            device: raw.to_owned(),
        })
}

fn list_devices(controller: &Controller) {
    let mut nodes = controller.registry().snapshot();
    nodes.sort_by(|a, b| a.address.as_str().cmp(b.address.as_str()));

    println!(
        "{:<14}  {:<8}  {:<16}  {}",
        "ADDRESS", "KIND", "SERIAL", "NAME"
    );
    for node in nodes {
        println!(
            "{:<14}  {:<8}  {:<16}  {}",
            node.address.as_str(),
            node.kind.to_string(),
            node.device_id,
            node.name
        );
    }
}
