// Device-list wire format and the RemoteDevice snapshot type.
//
// Wire fields are deliberately lenient: the device payload has changed
// shape across service revisions, so everything beyond the serial number
// is optional and unknown families are skipped rather than rejected.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

/// Device taxonomy exposed by the cloud service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceFamily {
    /// The account's local bridge; carries the online flag.
    Gateway,
    /// A garage-door opener.
    Opener,
    /// A controllable light module.
    Lamp,
}

impl DeviceFamily {
    /// Map the service's family/type vocabulary onto the taxonomy.
    ///
    /// Both the current `device_family` strings and the older
    /// `device_type` strings are accepted; anything unrecognized is
    /// `None` and the device is skipped upstream.
    fn from_wire(family: Option<&str>, device_type: Option<&str>) -> Option<Self> {
        let tag = family.or(device_type)?;
        match tag {
            "gateway" | "ethernetgateway" | "hub" => Some(Self::Gateway),
            "garagedoor" | "garagedooropener" | "gate" => Some(Self::Opener),
            "lamp" => Some(Self::Lamp),
            _ => None,
        }
    }
}

/// One device as observed in a single device-list call.
///
/// A fresh snapshot every poll; never retained beyond one reconciliation
/// pass. `state` stays a raw vendor string -- classification into typed
/// door/lamp states happens in the core crate.
#[derive(Debug, Clone)]
pub struct RemoteDevice {
    /// Case-sensitive serial number, unique within the account.
    pub serial: String,
    pub family: DeviceFamily,
    pub name: String,
    /// Serial of the owning gateway; gateways have none.
    pub parent_serial: Option<String>,
    /// Raw door/lamp state string as reported by the service.
    pub state: Option<String>,
    /// Gateways only.
    pub online: Option<bool>,
    pub last_changed: Option<DateTime<Utc>>,
    pub last_status: Option<DateTime<Utc>>,
}

// ── Wire structs ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct DeviceListResponse {
    #[serde(default)]
    pub items: Vec<WireDevice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDevice {
    pub serial_number: String,
    #[serde(default)]
    pub device_family: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_device_id: Option<String>,
    #[serde(default)]
    pub state: WireState,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireState {
    #[serde(default)]
    pub door_state: Option<String>,
    #[serde(default)]
    pub lamp_state: Option<String>,
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status: Option<DateTime<Utc>>,
}

impl DeviceListResponse {
    /// Convert the wire payload into snapshots, dropping devices whose
    /// family the client does not know how to represent.
    pub(crate) fn into_devices(self) -> Vec<RemoteDevice> {
        self.items
            .into_iter()
            .filter_map(|wire| {
                let family = DeviceFamily::from_wire(
                    wire.device_family.as_deref(),
                    wire.device_type.as_deref(),
                );
                let Some(family) = family else {
                    debug!(
                        serial = %wire.serial_number,
                        family = ?wire.device_family,
                        "skipping device with unrecognized family"
                    );
                    return None;
                };

                let state = match family {
                    DeviceFamily::Gateway => None,
                    DeviceFamily::Opener => wire.state.door_state,
                    DeviceFamily::Lamp => wire.state.lamp_state,
                };

                Some(RemoteDevice {
                    serial: wire.serial_number,
                    family,
                    name: wire.name,
                    parent_serial: wire.parent_device_id,
                    state,
                    online: wire.state.online,
                    last_changed: wire.state.last_update,
                    last_status: wire.state.last_status,
                })
            })
            .collect()
    }
}
