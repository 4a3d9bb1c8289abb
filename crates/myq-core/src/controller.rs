// ── Controller abstraction ──
//
// Full lifecycle management for one MyQ account bridge: cloud session
// establishment, device discovery, state reconciliation, adaptive poll
// pacing, and command dispatch. The plugin host drives it with periodic
// short_poll/long_poll ticks and execute() calls; a failed cycle
// degrades to "service down" and is retried on the next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use myq_api::transport::TransportConfig;
use myq_api::{DeviceAction, DeviceFamily, MyQClient, RemoteDevice};

use crate::command::Command;
use crate::config::ControllerConfig;
use crate::error::CoreError;
use crate::host::PluginHost;
use crate::model::{DoorState, DriverKey, LampState, LocalNode, NodeAddress, NodeKind, sanitize_name};
use crate::poll::PollState;
use crate::registry::NodeRegistry;

/// Address of the controller's own status node.
pub const CONTROLLER_ADDRESS: &str = "controller";

// Notice keys surfaced through the host.
const NOTICE_BAD_AUTH: &str = "bad_auth";
const NOTICE_LOGIN_ERROR: &str = "login_error";
const NOTICE_NO_DEVICES: &str = "no_devices";

/// The main entry point for the plugin host and the daemon.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. All shared state is
/// serialized behind short-lived sync locks -- none is held across an
/// await.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    client: MyQClient,
    registry: NodeRegistry,
    poll: Mutex<PollState>,
    host: Arc<dyn PluginHost>,
    /// Cloud reachability as of the last reconciliation; doubles as the
    /// dedup cache for the controller node's service driver.
    service_up: watch::Sender<bool>,
    /// Whether a session has been established since startup.
    connected: AtomicBool,
}

impl Controller {
    /// Create a controller. Does NOT contact the cloud -- the first
    /// `long_poll()` establishes the session.
    pub fn new(config: ControllerConfig, host: Arc<dyn PluginHost>) -> Result<Self, CoreError> {
        if config.username.is_empty() {
            return Err(CoreError::Config {
                message: "username and password are required".into(),
            });
        }

        let transport = TransportConfig {
            timeout: config.http_timeout,
            cookie_jar: None,
        };

        let client = MyQClient::new(
            config.username.clone(),
            config.password.clone(),
            config.token_ttl,
            &transport,
            config.endpoints.clone(),
        )?;

        let poll = PollState::new(config.active_interval, config.inactive_interval);
        let (service_up, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                config,
                client,
                registry: NodeRegistry::new(),
                poll: Mutex::new(poll),
                host,
                service_up,
                connected: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.inner.registry
    }

    /// Whether a cloud session has been established.
    pub fn connected(&self) -> bool {
        self.inner.connected.load(Ordering::Relaxed)
    }

    /// Whether the scheduler is currently in active (fast) mode.
    pub fn poll_active(&self) -> bool {
        self.inner.poll.lock().expect("poll lock poisoned").is_active()
    }

    /// Subscribe to cloud-reachability changes.
    pub fn service_status(&self) -> watch::Receiver<bool> {
        self.inner.service_up.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Mark the bridge running and restore previously persisted nodes
    /// so commands can route before the first cloud contact.
    pub fn start(&self) {
        info!("MyQ bridge starting");
        self.inner
            .host
            .set_driver(&controller_address(), DriverKey::St, 1, true);
        self.restore_nodes();
    }

    /// Shut down: drop the cloud session and report everything down.
    pub fn stop(&self) {
        info!("MyQ bridge stopping");
        self.inner.client.disconnect();
        self.inner.connected.store(false, Ordering::Relaxed);
        self.report_service(false, true);
        self.inner
            .host
            .set_driver(&controller_address(), DriverKey::St, 0, true);
    }

    // ── Tick handlers ────────────────────────────────────────────────

    /// Coarse tick: establish the cloud session if one is missing.
    ///
    /// Login failures surface as user-visible notices and are retried on
    /// the next long poll; they never escape this handler.
    pub async fn long_poll(&self) {
        if self.connected() {
            return;
        }

        info!("establishing MyQ connection");
        match self.inner.client.login().await {
            Ok(()) => {
                self.inner.host.remove_notice(NOTICE_BAD_AUTH);
                self.inner.host.remove_notice(NOTICE_LOGIN_ERROR);
                self.inner.connected.store(true, Ordering::Relaxed);

                if let Err(e) = self.discover().await {
                    warn!(error = %e, "initial discovery failed");
                }
                self.update_states(true).await;
            }
            Err(myq_api::Error::BadCredentials { message }) => {
                warn!(%message, "MyQ login rejected");
                self.inner.host.add_notice(
                    NOTICE_BAD_AUTH,
                    "Could not log in to the MyQ service with the configured credentials. \
                     Check the username and password settings and restart.",
                );
            }
            Err(e) => {
                warn!(error = %e, "MyQ login failed");
                self.inner.host.add_notice(
                    NOTICE_LOGIN_ERROR,
                    "There was an error connecting to the MyQ service. \
                     Check the logs and correct the issue before restarting.",
                );
            }
        }
    }

    /// Fine tick: run the adaptive scheduler and reconcile when a poll
    /// is due under the current rate.
    pub async fn short_poll(&self) {
        if !self.connected() {
            return;
        }

        let due = self
            .inner
            .poll
            .lock()
            .expect("poll lock poisoned")
            .tick(Instant::now());

        if due {
            debug!(active = self.poll_active(), "poll due, reconciling");
            self.update_states(false).await;
        }
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Discover devices and create nodes for any not yet known.
    ///
    /// Two strict passes: gateways first (each its own primary), then
    /// openers and lamps resolved against their gateway's address --
    /// a dependent can never reference a not-yet-created parent.
    pub async fn discover(&self) -> Result<(), CoreError> {
        let devices = match self.inner.client.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "device discovery failed");
                self.inner.host.add_notice(
                    NOTICE_NO_DEVICES,
                    "Could not discover devices from the MyQ account. \
                     The MyQ service may be offline.",
                );
                return Ok(());
            }
        };
        self.inner.host.remove_notice(NOTICE_NO_DEVICES);

        for device in devices.iter().filter(|d| d.family == DeviceFamily::Gateway) {
            self.create_gateway_node(device);
        }
        for device in devices.iter().filter(|d| d.family != DeviceFamily::Gateway) {
            self.create_device_node(device);
        }

        self.persist_nodes();
        self.stamp_poll();
        Ok(())
    }

    /// One reconciliation pass: fetch remote state and update every
    /// matching node's drivers.
    ///
    /// `force` bypasses change-deduping so a query re-reports everything.
    /// A failed fetch degrades the service driver and changes nothing
    /// else -- nodes are never marked stale or removed here.
    pub async fn update_states(&self, force: bool) {
        let devices = match self.inner.client.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "device list unavailable, marking service down");
                self.report_service(false, force);
                self.stamp_poll();
                return;
            }
        };

        self.report_service(true, force);

        let registry = &self.inner.registry;
        let host = self.inner.host.as_ref();

        for device in devices {
            let address = NodeAddress::from_device_id(&device.serial);
            if !registry.contains(&address) {
                continue;
            }

            match device.family {
                DeviceFamily::Gateway => {
                    let online = i64::from(device.online.unwrap_or(false));
                    registry.set_driver(&address, DriverKey::St, online, force, host);
                }
                DeviceFamily::Opener => {
                    let state = DoorState::classify(device.state.as_deref().unwrap_or(""));
                    registry.set_driver(&address, DriverKey::St, state.driver_value(), force, host);
                    self.update_elapsed(&address, &device, force);

                    if state.is_in_motion() {
                        debug!(%address, %state, "door in motion");
                        self.mark_active();
                    }
                }
                DeviceFamily::Lamp => {
                    let state = LampState::classify(device.state.as_deref().unwrap_or(""));
                    registry.set_driver(&address, DriverKey::St, state.driver_value(), force, host);
                }
            }
        }

        self.stamp_poll();
    }

    // ── Command dispatch ─────────────────────────────────────────────

    /// Execute a host command.
    ///
    /// Device commands enter active mode unconditionally, then attempt
    /// the cloud action; success sets the expected transitional state
    /// optimistically (the next poll is authoritative), failure warns
    /// and leaves local state untouched. No retries.
    pub async fn execute(&self, command: Command) -> Result<(), CoreError> {
        debug!(command = command.name(), "executing command");
        match command {
            Command::Open { address } => {
                self.device_command(address, NodeKind::Opener, DeviceAction::Open, "open")
                    .await
            }
            Command::Close { address } => {
                self.device_command(address, NodeKind::Opener, DeviceAction::Close, "close")
                    .await
            }
            Command::TurnOn { address } => {
                self.device_command(address, NodeKind::Lamp, DeviceAction::TurnOn, "turn-on")
                    .await
            }
            Command::TurnOff { address } => {
                self.device_command(address, NodeKind::Lamp, DeviceAction::TurnOff, "turn-off")
                    .await
            }
            Command::Query => {
                self.mark_active();
                self.update_states(true).await;
                Ok(())
            }
            Command::Discover => self.discover().await,
        }
    }

    async fn device_command(
        &self,
        address: NodeAddress,
        expected_kind: NodeKind,
        action: DeviceAction,
        name: &'static str,
    ) -> Result<(), CoreError> {
        // A command implies imminent state change worth watching closely,
        // whatever its outcome.
        self.mark_active();

        let node = self
            .inner
            .registry
            .get(&address)
            .ok_or_else(|| CoreError::NodeNotFound {
                address: address.clone(),
            })?;

        if node.kind != expected_kind {
            return Err(CoreError::WrongNodeKind {
                command: name,
                kind: node.kind,
                address,
            });
        }

        info!(%address, command = name, "dispatching device command");

        if self.inner.client.perform_action(&node.device_id, action).await {
            let value = optimistic_driver_value(action);
            self.inner
                .registry
                .set_driver(&address, DriverKey::St, value, false, self.inner.host.as_ref());
        } else {
            warn!(%address, command = name, "device command failed; state unchanged");
        }

        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    fn create_gateway_node(&self, device: &RemoteDevice) {
        let address = NodeAddress::from_device_id(&device.serial);
        if self.inner.registry.contains(&address) {
            return;
        }

        info!(serial = %device.serial, name = %device.name, "discovered gateway");
        let node = LocalNode::new(
            address.clone(),
            NodeKind::Gateway,
            sanitize_name(&device.name),
            address.clone(),
            device.serial.clone(),
        );

        match self.inner.registry.add(node.clone()) {
            Ok(true) => {
                self.inner.host.node_added(&node);
                let online = i64::from(device.online.unwrap_or(false));
                self.inner.registry.set_driver(
                    &address,
                    DriverKey::St,
                    online,
                    true,
                    self.inner.host.as_ref(),
                );
            }
            Ok(false) => {}
            Err(e) => warn!(%address, error = %e, "gateway node rejected"),
        }
    }

    fn create_device_node(&self, device: &RemoteDevice) {
        let address = NodeAddress::from_device_id(&device.serial);
        if self.inner.registry.contains(&address) {
            return;
        }

        let Some(ref parent_serial) = device.parent_serial else {
            warn!(serial = %device.serial, "device has no parent gateway, skipping");
            return;
        };

        let kind = match device.family {
            DeviceFamily::Opener => NodeKind::Opener,
            DeviceFamily::Lamp => NodeKind::Lamp,
            DeviceFamily::Gateway => return,
        };

        info!(serial = %device.serial, name = %device.name, %kind, "discovered device");
        let node = LocalNode::new(
            address.clone(),
            kind,
            sanitize_name(&device.name),
            NodeAddress::from_device_id(parent_serial),
            device.serial.clone(),
        );

        match self.inner.registry.add(node.clone()) {
            Ok(true) => {
                self.inner.host.node_added(&node);
                let host = self.inner.host.as_ref();
                match kind {
                    NodeKind::Opener => {
                        let state = DoorState::classify(device.state.as_deref().unwrap_or(""));
                        self.inner.registry.set_driver(
                            &address,
                            DriverKey::St,
                            state.driver_value(),
                            true,
                            host,
                        );
                        self.update_elapsed(&address, device, true);
                    }
                    NodeKind::Lamp => {
                        let state = LampState::classify(device.state.as_deref().unwrap_or(""));
                        self.inner.registry.set_driver(
                            &address,
                            DriverKey::St,
                            state.driver_value(),
                            true,
                            host,
                        );
                    }
                    NodeKind::Gateway => {}
                }
            }
            Ok(false) => {}
            Err(e) => warn!(%address, error = %e, "device node rejected"),
        }
    }

    /// Re-emit the elapsed-seconds driver when the remote change
    /// timestamp moved (or on force).
    fn update_elapsed(&self, address: &NodeAddress, device: &RemoteDevice, force: bool) {
        let moved = self
            .inner
            .registry
            .update_last_changed(address, device.last_changed);

        if let Some(ts) = device.last_changed {
            if moved || force {
                let elapsed = (Utc::now() - ts).num_seconds().max(0);
                self.inner.registry.set_driver(
                    address,
                    DriverKey::Gv0,
                    elapsed,
                    force,
                    self.inner.host.as_ref(),
                );
            }
        }
    }

    /// Report cloud reachability on the controller node, deduped
    /// through the watch channel.
    fn report_service(&self, up: bool, force: bool) {
        let changed = *self.inner.service_up.borrow() != up;
        if changed {
            let _ = self.inner.service_up.send(up);
        }
        if changed || force {
            self.inner
                .host
                .set_driver(&controller_address(), DriverKey::Gv0, i64::from(up), force);
        }
    }

    fn mark_active(&self) {
        self.inner
            .poll
            .lock()
            .expect("poll lock poisoned")
            .mark_active(Instant::now());
    }

    fn stamp_poll(&self) {
        self.inner
            .poll
            .lock()
            .expect("poll lock poisoned")
            .note_poll(Instant::now());
    }

    /// Rebuild the registry from persisted custom data, gateways first,
    /// so the two-level invariant holds during restore too.
    fn restore_nodes(&self) {
        let data = self.inner.host.load_custom_data();
        if data.is_empty() {
            return;
        }

        let mut nodes: Vec<LocalNode> = data
            .values()
            .filter_map(|raw| match serde_json::from_str::<LocalNode>(raw) {
                Ok(node) => Some(node),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable persisted node");
                    None
                }
            })
            .collect();
        nodes.sort_by_key(|n| !n.kind.is_gateway());

        for node in nodes {
            info!(address = %node.address, kind = %node.kind, "restoring persisted node");
            match self.inner.registry.add(node.clone()) {
                Ok(true) => self.inner.host.node_added(&node),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "persisted node rejected"),
            }
        }
    }

    /// Persist the address -> node mapping through the host.
    fn persist_nodes(&self) {
        let data: HashMap<String, String> = self
            .inner
            .registry
            .snapshot()
            .into_iter()
            .filter_map(|node| {
                let address = node.address.as_str().to_owned();
                serde_json::to_string(&node).ok().map(|json| (address, json))
            })
            .collect();
        self.inner.host.save_custom_data(&data);
    }
}

fn controller_address() -> NodeAddress {
    NodeAddress::from_device_id(CONTROLLER_ADDRESS)
}

/// The transitional/target state reported immediately after a
/// successful action, before the next poll confirms it.
fn optimistic_driver_value(action: DeviceAction) -> i64 {
    match action {
        DeviceAction::Open => DoorState::Opening.driver_value(),
        DeviceAction::Close => DoorState::Closing.driver_value(),
        DeviceAction::TurnOn => LampState::On.driver_value(),
        DeviceAction::TurnOff => LampState::Off.driver_value(),
    }
}
