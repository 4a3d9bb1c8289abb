#![allow(clippy::unwrap_used)]
// Controller integration tests: a mocked MyQ cloud (wiremock) on one
// side, a recording plugin host on the other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use myq_api::ApiEndpoints;
use myq_core::{
    Command, Controller, ControllerConfig, DriverKey, LocalNode, NodeAddress, NodeKind,
    PluginHost,
};

const LOGIN_FORM: &str = r#"<form method="post">
<input name="__RequestVerificationToken" type="hidden" value="form-token"/>
</form>"#;

// ── Recording host ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct Emission {
    address: String,
    driver: DriverKey,
    value: i64,
    force: bool,
}

#[derive(Default)]
struct RecordingHost {
    added: Mutex<Vec<(String, NodeKind)>>,
    emissions: Mutex<Vec<Emission>>,
    notices: Mutex<HashMap<String, String>>,
    custom: Mutex<HashMap<String, String>>,
}

impl RecordingHost {
    fn added_order(&self) -> Vec<(String, NodeKind)> {
        self.added.lock().unwrap().clone()
    }

    fn emissions(&self) -> Vec<Emission> {
        self.emissions.lock().unwrap().clone()
    }

    fn emissions_for(&self, address: &str) -> Vec<Emission> {
        self.emissions()
            .into_iter()
            .filter(|e| e.address == address)
            .collect()
    }

    fn clear_emissions(&self) {
        self.emissions.lock().unwrap().clear();
    }

    fn has_notice(&self, key: &str) -> bool {
        self.notices.lock().unwrap().contains_key(key)
    }

    fn seed_custom(&self, data: HashMap<String, String>) {
        *self.custom.lock().unwrap() = data;
    }
}

impl PluginHost for RecordingHost {
    fn node_added(&self, node: &LocalNode) {
        self.added
            .lock()
            .unwrap()
            .push((node.address.as_str().to_owned(), node.kind));
    }

    fn set_driver(&self, address: &NodeAddress, driver: DriverKey, value: i64, force: bool) {
        self.emissions.lock().unwrap().push(Emission {
            address: address.as_str().to_owned(),
            driver,
            value,
            force,
        });
    }

    fn add_notice(&self, key: &str, text: &str) {
        self.notices
            .lock()
            .unwrap()
            .insert(key.to_owned(), text.to_owned());
    }

    fn remove_notice(&self, key: &str) {
        self.notices.lock().unwrap().remove(key);
    }

    fn load_custom_data(&self) -> HashMap<String, String> {
        self.custom.lock().unwrap().clone()
    }

    fn save_custom_data(&self, data: &HashMap<String, String>) {
        *self.custom.lock().unwrap() = data.clone();
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

fn gateway_item(serial: &str, online: bool) -> serde_json::Value {
    json!({
        "serial_number": serial,
        "device_family": "gateway",
        "name": "Home Gateway",
        "state": { "online": online }
    })
}

fn opener_item(serial: &str, parent: &str, state: &str) -> serde_json::Value {
    json!({
        "serial_number": serial,
        "device_family": "garagedoor",
        "name": "West Door",
        "parent_device_id": parent,
        "state": { "door_state": state, "last_update": "2024-06-01T09:55:00Z" }
    })
}

fn lamp_item(serial: &str, parent: &str, state: &str) -> serde_json::Value {
    json!({
        "serial_number": serial,
        "device_family": "lamp",
        "name": "Garage Light",
        "parent_device_id": parent,
        "state": { "lamp_state": state }
    })
}

fn payload(items: &[serde_json::Value]) -> serde_json::Value {
    json!({ "count": items.len(), "items": items })
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/connect/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_FORM))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/connect/authorize"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "com.myqops://ios?code=code-1"),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "token_type": "Bearer",
            "refresh_token": "refresh-1",
            "expires_in": 3600
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v6.0/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accounts": [{ "id": "acct-1" }]
        })))
        .mount(server)
        .await;
}

async fn mount_devices(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/v5.2/Accounts/acct-1/Devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve `body` for the next `n` device-list calls only, letting a mock
/// mounted afterwards take over.
async fn mount_devices_n(server: &MockServer, body: serde_json::Value, n: u64) {
    Mock::given(method("GET"))
        .and(path("/api/v5.2/Accounts/acct-1/Devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(n)
        .mount(server)
        .await;
}

fn test_config(server: &MockServer) -> ControllerConfig {
    let base = Url::parse(&server.uri()).unwrap();
    ControllerConfig {
        username: "user@example.com".into(),
        password: SecretString::from("hunter2".to_string()),
        token_ttl: Duration::from_secs(1200),
        active_interval: Duration::from_secs(15),
        inactive_interval: Duration::from_secs(60),
        http_timeout: Duration::from_secs(5),
        endpoints: ApiEndpoints::single_host(&base),
    }
}

/// Build a controller against the mock server, start it, and run the
/// connecting long poll.
async fn connect(server: &MockServer) -> (Controller, Arc<RecordingHost>) {
    let host = Arc::new(RecordingHost::default());
    let controller = Controller::new(test_config(server), host.clone()).unwrap();
    controller.start();
    controller.long_poll().await;
    assert!(controller.connected(), "controller failed to connect");
    (controller, host)
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn discovery_creates_gateways_before_dependents() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    // Openers listed before their gateway: creation order must not
    // follow input order.
    mount_devices(
        &server,
        payload(&[
            opener_item("CG0001", "GW0001", "closed"),
            opener_item("CG0002", "GW0001", "open"),
            gateway_item("GW0001", true),
        ]),
    )
    .await;

    let (controller, host) = connect(&server).await;

    assert_eq!(controller.registry().len(), 3);

    let order = host.added_order();
    assert_eq!(order[0], ("gw0001".to_owned(), NodeKind::Gateway));
    assert!(order[1..].iter().all(|(_, kind)| *kind == NodeKind::Opener));
}

#[tokio::test]
async fn rediscovery_leaves_existing_nodes_alone() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "closed"),
        ]),
    )
    .await;

    let (controller, host) = connect(&server).await;
    assert_eq!(controller.registry().len(), 2);

    controller.execute(Command::Discover).await.unwrap();
    assert_eq!(controller.registry().len(), 2);
    assert_eq!(host.added_order().len(), 2);
}

#[tokio::test]
async fn orphaned_device_is_skipped() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices(
        &server,
        payload(&[json!({
            "serial_number": "CG9999",
            "device_family": "garagedoor",
            "name": "Orphan",
            "state": { "door_state": "closed" }
        })]),
    )
    .await;

    let (controller, _host) = connect(&server).await;
    assert!(controller.registry().is_empty());
}

// ── Reconciliation ──────────────────────────────────────────────────

#[tokio::test]
async fn unchanged_snapshot_emits_nothing_without_force() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "closed"),
            lamp_item("LM0001", "GW0001", "off"),
        ]),
    )
    .await;

    let (controller, host) = connect(&server).await;

    host.clear_emissions();
    controller.update_states(false).await;
    assert!(
        host.emissions().is_empty(),
        "unchanged snapshot should emit nothing: {:?}",
        host.emissions()
    );

    controller.update_states(false).await;
    assert!(host.emissions().is_empty());

    // force re-reports everything, changed or not
    controller.update_states(true).await;
    let forced = host.emissions();
    assert!(!forced.is_empty());
    assert!(forced.iter().all(|e| e.force));
}

#[tokio::test]
async fn opening_door_flips_active_mode_then_settles() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    // Two calls during connect (discover + forced update) see "closed".
    mount_devices_n(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "closed"),
        ]),
        2,
    )
    .await;
    mount_devices_n(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "opening"),
        ]),
        1,
    )
    .await;
    mount_devices(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "open"),
        ]),
    )
    .await;

    let (controller, host) = connect(&server).await;
    assert!(!controller.poll_active());

    host.clear_emissions();
    controller.update_states(false).await;

    let st: Vec<i64> = host
        .emissions_for("cg0001")
        .iter()
        .filter(|e| e.driver == DriverKey::St)
        .map(|e| e.value)
        .collect();
    assert_eq!(st, vec![4], "expected Opening (4)");
    assert!(controller.poll_active(), "in-motion door must enter active mode");

    // Next poll sees the door settled; active mode is left to decay.
    host.clear_emissions();
    controller.update_states(false).await;

    let st: Vec<i64> = host
        .emissions_for("cg0001")
        .iter()
        .filter(|e| e.driver == DriverKey::St)
        .map(|e| e.value)
        .collect();
    assert_eq!(st, vec![1], "expected Open (1)");
    assert!(controller.poll_active(), "active mode decays on its own clock");
}

#[tokio::test]
async fn list_failure_degrades_service_status_only() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices_n(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "closed"),
        ]),
        2,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/v5.2/Accounts/acct-1/Devices"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let (controller, host) = connect(&server).await;
    let mut status = controller.service_status();
    assert!(*status.borrow_and_update());

    host.clear_emissions();
    controller.update_states(false).await;

    // Exactly one emission: the controller's service driver going down.
    let emissions = host.emissions();
    assert_eq!(emissions.len(), 1);
    assert_eq!(emissions[0].address, "controller");
    assert_eq!(emissions[0].driver, DriverKey::Gv0);
    assert_eq!(emissions[0].value, 0);
    assert!(!*status.borrow_and_update());

    // Node state is untouched.
    let node = controller
        .registry()
        .get(&NodeAddress::from_device_id("CG0001"))
        .unwrap();
    assert_eq!(node.driver(DriverKey::St), Some(0));
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn close_command_sets_optimistic_state_before_any_poll() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "open"),
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/api/v5.2/Accounts/acct-1/door_openers/CG0001/close"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (controller, host) = connect(&server).await;
    assert!(!controller.poll_active());
    host.clear_emissions();

    controller
        .execute(Command::Close {
            address: NodeAddress::from_device_id("CG0001"),
        })
        .await
        .unwrap();

    let st: Vec<i64> = host
        .emissions_for("cg0001")
        .iter()
        .filter(|e| e.driver == DriverKey::St)
        .map(|e| e.value)
        .collect();
    assert_eq!(st, vec![3], "expected optimistic Closing (3)");
    assert!(controller.poll_active(), "a command always enters active mode");
}

#[tokio::test]
async fn failed_command_leaves_state_unchanged() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "closed"),
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/api/v5.2/Accounts/acct-1/door_openers/CG0001/open"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (controller, host) = connect(&server).await;
    host.clear_emissions();

    controller
        .execute(Command::Open {
            address: NodeAddress::from_device_id("CG0001"),
        })
        .await
        .unwrap();

    assert!(host.emissions_for("cg0001").is_empty());
    let node = controller
        .registry()
        .get(&NodeAddress::from_device_id("CG0001"))
        .unwrap();
    assert_eq!(node.driver(DriverKey::St), Some(0), "still Closed");
    assert!(controller.poll_active(), "active mode is entered regardless of outcome");
}

#[tokio::test]
async fn lamp_commands_route_to_the_lamp_endpoints() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            lamp_item("LM0001", "GW0001", "off"),
        ]),
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/api/v5.2/Accounts/acct-1/lamps/LM0001/on"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let (controller, host) = connect(&server).await;
    host.clear_emissions();

    controller
        .execute(Command::TurnOn {
            address: NodeAddress::from_device_id("LM0001"),
        })
        .await
        .unwrap();

    let st: Vec<i64> = host
        .emissions_for("lm0001")
        .iter()
        .filter(|e| e.driver == DriverKey::St)
        .map(|e| e.value)
        .collect();
    assert_eq!(st, vec![100], "expected optimistic On (100)");
}

#[tokio::test]
async fn command_against_wrong_node_kind_is_rejected() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "closed"),
        ]),
    )
    .await;

    let (controller, _host) = connect(&server).await;

    let result = controller
        .execute(Command::TurnOn {
            address: NodeAddress::from_device_id("CG0001"),
        })
        .await;

    assert!(matches!(
        result,
        Err(myq_core::CoreError::WrongNodeKind { .. })
    ));
}

#[tokio::test]
async fn query_force_reports_every_driver() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices(
        &server,
        payload(&[
            gateway_item("GW0001", true),
            opener_item("CG0001", "GW0001", "closed"),
        ]),
    )
    .await;

    let (controller, host) = connect(&server).await;
    host.clear_emissions();

    controller.execute(Command::Query).await.unwrap();

    let addresses: Vec<String> = host.emissions().into_iter().map(|e| e.address).collect();
    assert!(addresses.contains(&"gw0001".to_owned()));
    assert!(addresses.contains(&"cg0001".to_owned()));
    assert!(addresses.contains(&"controller".to_owned()));
    assert!(controller.poll_active());
}

// ── Startup / auth ──────────────────────────────────────────────────

#[tokio::test]
async fn persisted_nodes_restore_gateways_first() {
    let host = Arc::new(RecordingHost::default());

    let gw_addr = NodeAddress::from_device_id("GW0001");
    let gateway = LocalNode::new(
        gw_addr.clone(),
        NodeKind::Gateway,
        "Home Gateway".into(),
        gw_addr.clone(),
        "GW0001".into(),
    );
    let opener = LocalNode::new(
        NodeAddress::from_device_id("CG0001"),
        NodeKind::Opener,
        "West Door".into(),
        gw_addr,
        "CG0001".into(),
    );

    // Seeded in an order that would violate the hierarchy if restore
    // were naive (HashMap order is arbitrary anyway).
    let mut data = HashMap::new();
    data.insert(
        "cg0001".to_owned(),
        serde_json::to_string(&opener).unwrap(),
    );
    data.insert(
        "gw0001".to_owned(),
        serde_json::to_string(&gateway).unwrap(),
    );
    host.seed_custom(data);

    let config = ControllerConfig {
        username: "user@example.com".into(),
        password: SecretString::from("hunter2".to_string()),
        ..ControllerConfig::default()
    };
    let controller = Controller::new(config, host.clone()).unwrap();
    controller.start();

    assert_eq!(controller.registry().len(), 2);
    let order = host.added_order();
    assert_eq!(order[0].1, NodeKind::Gateway);

    // Commands can route before any cloud contact.
    assert!(
        controller
            .registry()
            .find_by_device_id("CG0001")
            .is_some()
    );
}

#[tokio::test]
async fn missing_credentials_fail_construction() {
    let host = Arc::new(RecordingHost::default());
    let result = Controller::new(ControllerConfig::default(), host);
    assert!(matches!(result, Err(myq_core::CoreError::Config { .. })));
}

#[tokio::test]
async fn rejected_credentials_surface_a_notice() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/connect/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_FORM))
        .mount(&server)
        .await;
    // Form re-render = rejection.
    Mock::given(method("POST"))
        .and(path("/connect/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_FORM))
        .mount(&server)
        .await;

    let host = Arc::new(RecordingHost::default());
    let controller = Controller::new(test_config(&server), host.clone()).unwrap();
    controller.start();
    controller.long_poll().await;

    assert!(!controller.connected());
    assert!(host.has_notice("bad_auth"));

    // The scheduler survives the bad cycle; a later tick is a no-op
    // rather than a crash.
    controller.short_poll().await;
}

#[tokio::test]
async fn stop_reports_everything_down() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_devices(&server, payload(&[gateway_item("GW0001", true)])).await;

    let (controller, host) = connect(&server).await;
    host.clear_emissions();

    controller.stop();

    let controller_emissions = host.emissions_for("controller");
    assert!(
        controller_emissions
            .iter()
            .any(|e| e.driver == DriverKey::Gv0 && e.value == 0)
    );
    assert!(
        controller_emissions
            .iter()
            .any(|e| e.driver == DriverKey::St && e.value == 0)
    );
    assert!(!controller.connected());
}
