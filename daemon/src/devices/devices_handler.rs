// Copyright 2024 The Android Open Source Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// devices_handler.rs
//
// Provides the API for the transport gateway and the frontend to
// interact with devices.
//
// The DeviceManager struct is a singleton for the devices collection.
//
// Additional functions are
// -- inactivity instant
// -- vending device identifiers

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use log::warn;

use crate::config::get_config;
use crate::devices::chip::{self, ChipIdentifier};
use crate::devices::device::{AddChipResult, Device, DeviceIdentifier};
use crate::devices::DeviceError;
use crate::events::{Event, Events};
use crate::ranging;
use crate::wireless::{self, WirelessError};
use netsim_model::{ChipKind, PatchDeviceRequest, Scene};

const INITIAL_DEVICE_ID: u32 = 1;

static DEVICE_MANAGER: OnceLock<Arc<DeviceManager>> = OnceLock::new();

fn get_manager() -> Arc<DeviceManager> {
    DEVICE_MANAGER.get().expect("DeviceManager not initialized").clone()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObserverId(pub u32);

pub type ObserverCallback = Box<dyn Fn(&Event) + Send + Sync>;

/// The devices collection and everything hanging off it.
pub struct DeviceManager {
    // BTreeMap keeps scene listings in identifier order.
    devices: RwLock<BTreeMap<DeviceIdentifier, Device>>,
    events: Arc<Events>,
    ids: AtomicU32,
    observers: Mutex<Vec<(ObserverId, ObserverCallback)>>,
    observer_ids: AtomicU32,
    /// When the last non-builtin device went away; drives idle
    /// shutdown. Set at startup so a daemon nobody attaches to exits.
    inactive_since: RwLock<Option<Instant>>,
    last_modified: RwLock<Duration>,
}

impl DeviceManager {
    /// Installs the process-wide manager. A second call returns the
    /// existing instance.
    pub fn init(events: Arc<Events>) -> Arc<DeviceManager> {
        DEVICE_MANAGER.get_or_init(|| Arc::new(Self::new(events))).clone()
    }

    fn new(events: Arc<Events>) -> Self {
        DeviceManager {
            devices: RwLock::new(BTreeMap::new()),
            events,
            ids: AtomicU32::new(INITIAL_DEVICE_ID),
            observers: Mutex::new(Vec::new()),
            observer_ids: AtomicU32::new(0),
            inactive_since: RwLock::new(Some(Instant::now())),
            last_modified: RwLock::new(now_since_epoch()),
        }
    }

    fn next_id(&self) -> DeviceIdentifier {
        DeviceIdentifier(self.ids.fetch_add(1, Ordering::SeqCst))
    }

    fn update_timestamp(&self) {
        *self.last_modified.write().unwrap() = now_since_epoch();
    }

    /// Gets or creates the device for a guid, returning its id and
    /// name.
    fn get_or_create_device(
        &self,
        guid: &str,
        name: &str,
        builtin: bool,
    ) -> (DeviceIdentifier, String) {
        let mut guard = self.devices.write().unwrap();
        if let Some(existing) = guard.values().find(|d| d.guid == guid) {
            if existing.builtin != builtin {
                warn!("builtin mismatch for device {} during add_chip", existing.name);
            }
            return (existing.id, existing.name.clone());
        }
        let id = self.next_id();
        let name = if name.is_empty() { format!("device-{id}") } else { name.to_string() };
        guard.insert(id, Device::new(id, guid, &name, builtin));
        drop(guard);
        self.update_timestamp();
        self.events.publish(Event::DeviceAdded { id, name: name.clone(), builtin });
        (id, name)
    }

    fn notify_observers(&self, event: &Event) {
        for (_, callback) in self.observers.lock().unwrap().iter() {
            callback(event);
        }
    }
}

fn now_since_epoch() -> Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

// A device created for an attach that then failed must not linger
// with zero chips.
fn remove_device_if_empty(manager: &DeviceManager, device_id: DeviceIdentifier) {
    let mut removed = None;
    {
        let mut devices = manager.devices.write().unwrap();
        let empty = devices
            .get(&device_id)
            .is_some_and(|device| device.chips.read().unwrap().is_empty());
        if empty {
            removed = devices.remove(&device_id);
        }
    }
    if let Some(device) = removed {
        manager.events.publish(Event::DeviceRemoved {
            id: device.id,
            name: device.name,
            builtin: device.builtin,
        });
    }
}

/// Adds a chip to the device with the given guid, creating the device
/// on first attach. Called by the gateway when a stream identifies
/// itself.
pub fn add_chip(
    peer: &str,
    device_guid: &str,
    device_name: &str,
    chip_create_params: &chip::CreateParams,
    wireless_create_param: &wireless::CreateParam,
) -> Result<AddChipResult, DeviceError> {
    let manager = get_manager();
    let builtin = chip_create_params.kind == ChipKind::BluetoothBeacon;
    let (device_id, device_name) =
        manager.get_or_create_device(device_guid, device_name, builtin);

    // Reject duplicates before creating a radio for the chip.
    {
        let devices = manager.devices.read().unwrap();
        let device = devices
            .get(&device_id)
            .ok_or(DeviceError::NotFound(format!("device {device_id}")))?;
        if device.has_chip_conflict(chip_create_params) {
            return Err(DeviceError::DuplicateChip {
                device: device.name.clone(),
                chip: chip_create_params.name.clone().unwrap_or_default(),
            });
        }
    }

    let chip_id = chip::next_id();
    let wireless_chip = match wireless::add_chip(wireless_create_param, chip_id) {
        Ok(wireless_chip) => wireless_chip,
        Err(e) => {
            remove_device_if_empty(&manager, device_id);
            return Err(match e {
                WirelessError::BadAddress(message) => DeviceError::BadRequest(message),
                WirelessError::Engine(e) => DeviceError::Closed(e.to_string()),
            });
        }
    };
    let chip_record =
        chip::new_chip(chip_id, device_id, &device_name, peer, chip_create_params, wireless_chip);

    {
        let devices = manager.devices.read().unwrap();
        let device = devices
            .get(&device_id)
            .ok_or(DeviceError::NotFound(format!("device {device_id}")))?;
        if let Err(e) = device.add_chip(chip_record) {
            // A concurrent attach won the race; tear the radio down.
            chip::remove_chip(&chip_id);
            return Err(e);
        }
    }

    if !builtin {
        *manager.inactive_since.write().unwrap() = None;
    }
    manager.update_timestamp();
    manager.events.publish(Event::ChipAdded {
        chip_id,
        chip_kind: chip_create_params.kind,
        device_name,
        builtin,
    });
    Ok(AddChipResult { device_id, chip_id })
}

/// Removes a chip, and the device when its last chip goes.
///
/// Called when the packet stream for the chip shuts down.
pub fn remove_chip(
    device_id: DeviceIdentifier,
    chip_id: ChipIdentifier,
) -> Result<(), DeviceError> {
    let manager = get_manager();
    let mut pending_events = Vec::new();
    let radio_stats;
    let remaining_nonbuiltin_devices;
    {
        let mut devices = manager.devices.write().unwrap();
        let device = devices
            .get(&device_id)
            .ok_or(DeviceError::NotFound(format!("device {device_id}")))?;
        radio_stats = device.remove_chip(&chip_id)?;
        let device_empty = device.chips.read().unwrap().is_empty();
        if device_empty {
            if let Some(device) = devices.remove(&device_id) {
                pending_events.push(Event::DeviceRemoved {
                    id: device.id,
                    name: device.name,
                    builtin: device.builtin,
                });
            }
        }
        remaining_nonbuiltin_devices = devices.values().filter(|d| !d.builtin).count();
        if remaining_nonbuiltin_devices == 0 {
            *manager.inactive_since.write().unwrap() = Some(Instant::now());
        }
    }
    chip::remove_chip(&chip_id);
    pending_events.push(Event::ChipRemoved {
        chip_id,
        device_id,
        remaining_nonbuiltin_devices,
        radio_stats,
    });
    for event in pending_events {
        manager.events.publish(event);
    }
    manager.update_timestamp();
    Ok(())
}

fn select_device_by_name<'a>(
    devices: &'a BTreeMap<DeviceIdentifier, Device>,
    name: &str,
) -> Result<&'a Device, DeviceError> {
    if let Some(device) = devices.values().find(|d| d.name == name) {
        return Ok(device);
    }
    let mut matches = devices.values().filter(|d| d.name.contains(name));
    match (matches.next(), matches.next()) {
        (Some(device), None) => Ok(device),
        (Some(_), Some(_)) => Err(DeviceError::Ambiguous(name.to_string())),
        (None, _) => Err(DeviceError::NotFound(format!("no device with name {name}"))),
    }
}

/// Patches one device, selected by id or by name.
///
/// The patch is all-or-nothing: validation failures leave the scene
/// untouched. Observers run after the registry lock is released.
pub fn patch_device(request: PatchDeviceRequest) -> Result<(), DeviceError> {
    let manager = get_manager();
    let fields = request.device;
    let (id, name) = {
        let devices = manager.devices.read().unwrap();
        let device = match (request.id, fields.name.as_deref()) {
            (Some(id), _) => {
                let id = DeviceIdentifier(id);
                devices.get(&id).ok_or(DeviceError::NotFound(format!("no device with id {id}")))?
            }
            (None, Some(name)) => select_device_by_name(&devices, name)?,
            (None, None) => {
                return Err(DeviceError::BadRequest(
                    "patch names neither a device id nor a name".to_string(),
                ))
            }
        };
        device.validate_patch(&fields)?;
        device.apply_patch(&fields, get_config().world_radius_m);
        (device.id, device.name.clone())
    };
    manager.update_timestamp();
    let event = Event::DevicePatched { id, name };
    manager.events.publish(event.clone());
    manager.notify_observers(&event);
    Ok(())
}

/// Patches a device from a JSON request body.
pub fn patch_device_json(
    id: Option<DeviceIdentifier>,
    patch_json: &str,
) -> Result<(), DeviceError> {
    let mut request: PatchDeviceRequest = serde_json::from_str(patch_json)
        .map_err(|e| DeviceError::BadRequest(format!("incorrect format of patch json: {e}")))?;
    if request.id.is_none() {
        request.id = id.map(|id| id.0);
    }
    patch_device(request)
}

/// Distance in meters between the devices owning two chips. Unknown
/// endpoints yield 0 with a logged warning.
pub fn get_distance(a: &ChipIdentifier, b: &ChipIdentifier) -> f32 {
    try_get_distance(a, b).unwrap_or_else(|e| {
        warn!("get_distance: {e}");
        0.0
    })
}

fn try_get_distance(a: &ChipIdentifier, b: &ChipIdentifier) -> Result<f32, DeviceError> {
    let device_a =
        chip::get_chip(a).ok_or(DeviceError::NotFound(format!("chip {a}")))?.device_id;
    let device_b =
        chip::get_chip(b).ok_or(DeviceError::NotFound(format!("chip {b}")))?.device_id;
    let manager = get_manager();
    let devices = manager.devices.read().unwrap();
    let position_a = *devices
        .get(&device_a)
        .ok_or(DeviceError::NotFound(format!("device {device_a}")))?
        .position
        .read()
        .unwrap();
    let position_b = *devices
        .get(&device_b)
        .ok_or(DeviceError::NotFound(format!("device {device_b}")))?
        .position
        .read()
        .unwrap();
    Ok(ranging::distance(&position_a, &position_b))
}

/// Scene snapshot for external consumers.
pub fn list_devices() -> Scene {
    let manager = get_manager();
    let devices = manager.devices.read().unwrap().values().map(|device| device.get()).collect();
    let last_modified = *manager.last_modified.read().unwrap();
    Scene { devices, last_modified }
}

/// Returns every device to defaults and notifies observers once.
pub fn reset_all() -> Result<(), DeviceError> {
    let manager = get_manager();
    {
        let devices = manager.devices.read().unwrap();
        for device in devices.values() {
            device.reset();
        }
    }
    manager.update_timestamp();
    manager.events.publish(Event::DeviceReset);
    manager.notify_observers(&Event::DeviceReset);
    Ok(())
}

/// Registers a change observer, invoked after every successful patch
/// and after reset.
pub fn subscribe(callback: ObserverCallback) -> ObserverId {
    let manager = get_manager();
    let id = ObserverId(manager.observer_ids.fetch_add(1, Ordering::SeqCst));
    manager.observers.lock().unwrap().push((id, callback));
    id
}

/// Removes an observer. Returns false for an unknown id.
pub fn unsubscribe(id: ObserverId) -> bool {
    let manager = get_manager();
    let mut observers = manager.observers.lock().unwrap();
    let before = observers.len();
    observers.retain(|(observer_id, _)| *observer_id != id);
    observers.len() != before
}

fn idle_deadline_reached(inactive_since: Option<Instant>, threshold: Duration) -> bool {
    match inactive_since {
        Some(instant) => instant.elapsed() >= threshold,
        None => false,
    }
}

/// True once the scene has been empty for the configured grace
/// period; polled by the service loop.
pub fn is_shutdown_time() -> bool {
    let manager = get_manager();
    let inactive_since = *manager.inactive_since.read().unwrap();
    idle_deadline_reached(
        inactive_since,
        Duration::from_secs(get_config().inactivity_shutdown_seconds),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::engine;
    use crate::transport::dispatcher;
    use crate::wireless::mocked;
    use netsim_common::util::netsim_logger::init_for_test;
    use netsim_model::{ChipPatch, Orientation, PatchDeviceFields, Position, RadioPatch};
    use std::sync::Once;
    use std::thread;

    static INIT: Once = Once::new();

    fn module_setup() {
        INIT.call_once(|| {
            init_for_test();
        });
        DeviceManager::init(Events::new());
        engine::init(dispatcher::send_response, get_distance);
    }

    struct TestChipParameters {
        device_guid: String,
        device_name: String,
        chip_kind: ChipKind,
        chip_name: String,
    }

    impl TestChipParameters {
        fn new(suffix: &str, chip_kind: ChipKind, chip_name: &str) -> Self {
            // Thread-id scoping keeps devices distinct across parallel
            // tests sharing the process-wide manager.
            TestChipParameters {
                device_guid: format!("guid-{suffix}-{:?}", thread::current().id()),
                device_name: format!("device-{suffix}-{:?}", thread::current().id()),
                chip_kind,
                chip_name: chip_name.to_string(),
            }
        }

        fn add_chip(&self) -> Result<AddChipResult, DeviceError> {
            let chip_create_params = chip::CreateParams {
                kind: self.chip_kind,
                address: String::new(),
                name: Some(self.chip_name.clone()),
                manufacturer: "netsim".to_string(),
                product_name: "netsim_radio".to_string(),
                controller_properties: None,
            };
            let wireless_create_param =
                wireless::CreateParam::Mock(mocked::CreateParams { kind: self.chip_kind });
            super::add_chip(
                "test-peer",
                &self.device_guid,
                &self.device_name,
                &chip_create_params,
                &wireless_create_param,
            )
        }
    }

    fn test_chip_1_bt() -> TestChipParameters {
        TestChipParameters::new("1", ChipKind::Bluetooth, "bt_chip_name")
    }

    fn test_chip_1_wifi() -> TestChipParameters {
        TestChipParameters::new("1", ChipKind::Wifi, "wifi_chip_name")
    }

    fn test_chip_2_bt() -> TestChipParameters {
        TestChipParameters::new("2", ChipKind::Bluetooth, "bt_chip_name")
    }

    #[test]
    fn test_add_chip() {
        module_setup();
        let chip_params = test_chip_1_bt();
        let result = chip_params.add_chip().unwrap();

        let manager = get_manager();
        let devices = manager.devices.read().unwrap();
        let device = devices.get(&result.device_id).unwrap();
        assert_eq!(device.name, chip_params.device_name);
        let chips = device.chips.read().unwrap();
        let chip_record = chips.get(&result.chip_id).unwrap();
        assert_eq!(chip_record.kind, chip_params.chip_kind);
        assert_eq!(chip_record.name, chip_params.chip_name);
        assert_eq!(chip_record.peer, "test-peer");
        assert!(chip::get_chip(&result.chip_id).is_some());
    }

    #[test]
    fn test_adding_two_chips_same_device() {
        module_setup();
        let bt_result = test_chip_1_bt().add_chip().unwrap();
        let wifi_result = test_chip_1_wifi().add_chip().unwrap();
        assert_eq!(bt_result.device_id, wifi_result.device_id);
        assert_ne!(bt_result.chip_id, wifi_result.chip_id);

        let manager = get_manager();
        let devices = manager.devices.read().unwrap();
        let device = devices.get(&bt_result.device_id).unwrap();
        assert_eq!(device.chips.read().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_chip_rejected() {
        module_setup();
        let chip_params = TestChipParameters::new("dup", ChipKind::Bluetooth, "bt_dup");
        chip_params.add_chip().unwrap();
        assert!(matches!(
            chip_params.add_chip(),
            Err(DeviceError::DuplicateChip { .. })
        ));
    }

    #[test]
    fn test_failed_attach_leaves_no_empty_device() {
        module_setup();
        let name = format!("badaddr-{:?}", thread::current().id());
        let chip_create_params = chip::CreateParams {
            kind: ChipKind::Bluetooth,
            address: "not-an-address".to_string(),
            name: Some("bt".to_string()),
            manufacturer: "netsim".to_string(),
            product_name: "netsim_radio".to_string(),
            controller_properties: None,
        };
        let wireless_create_param =
            wireless::CreateParam::Bluetooth(crate::wireless::bluetooth::CreateParams {
                address: "not-an-address".to_string(),
                controller_properties: None,
                beacon: false,
            });
        let result =
            super::add_chip("test-peer", &name, &name, &chip_create_params, &wireless_create_param);
        assert!(matches!(result, Err(DeviceError::BadRequest(_))));
        assert!(list_devices().devices.iter().all(|d| d.name != name));
    }

    #[test]
    fn test_devices_track_distinct_guids() {
        module_setup();
        let result_1 = test_chip_1_bt().add_chip().unwrap();
        let result_2 = test_chip_2_bt().add_chip().unwrap();
        assert_ne!(result_1.device_id, result_2.device_id);
    }

    #[test]
    fn test_patch_device_by_id() {
        module_setup();
        let chip_params = TestChipParameters::new("patch-id", ChipKind::Bluetooth, "bt");
        let result = chip_params.add_chip().unwrap();

        let request = PatchDeviceRequest {
            id: Some(result.device_id.0),
            device: PatchDeviceFields {
                visible: Some(false),
                position: Some(Position::new(1.1, 2.2, 3.3)),
                orientation: Some(Orientation::new(4.4, 5.5, 6.6)),
                ..Default::default()
            },
        };
        patch_device(request).unwrap();

        let manager = get_manager();
        let devices = manager.devices.read().unwrap();
        let device = devices.get(&result.device_id).unwrap();
        assert!(!device.visible.load(Ordering::SeqCst));
        assert_eq!(*device.position.read().unwrap(), Position::new(1.1, 2.2, 3.3));
        assert_eq!(*device.orientation.read().unwrap(), Orientation::new(4.4, 5.5, 6.6));
    }

    #[test]
    fn test_patch_device_is_idempotent() {
        module_setup();
        let chip_params = TestChipParameters::new("patch-idem", ChipKind::Bluetooth, "bt");
        let result = chip_params.add_chip().unwrap();
        let request = PatchDeviceRequest {
            id: Some(result.device_id.0),
            device: PatchDeviceFields {
                visible: Some(false),
                position: Some(Position::new(9.0, 8.0, 7.0)),
                ..Default::default()
            },
        };
        patch_device(request.clone()).unwrap();
        let first = list_devices()
            .devices
            .into_iter()
            .find(|d| d.id == result.device_id.0)
            .unwrap();
        patch_device(request).unwrap();
        let second = list_devices()
            .devices
            .into_iter()
            .find(|d| d.id == result.device_id.0)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_patch_device_by_name_matching() {
        module_setup();
        let chip_params = TestChipParameters::new("patch-name", ChipKind::Bluetooth, "bt");
        chip_params.add_chip().unwrap();

        // Exact match.
        let request = PatchDeviceRequest {
            id: None,
            device: PatchDeviceFields {
                name: Some(chip_params.device_name.clone()),
                visible: Some(false),
                ..Default::default()
            },
        };
        patch_device(request).unwrap();

        // Unique substring match (strip the "device-" prefix).
        let substring = chip_params.device_name.strip_prefix("device-").unwrap();
        let request = PatchDeviceRequest {
            id: None,
            device: PatchDeviceFields {
                name: Some(substring.to_string()),
                visible: Some(true),
                ..Default::default()
            },
        };
        patch_device(request).unwrap();
    }

    #[test]
    fn test_exact_match_beats_substring() {
        module_setup();
        // "<tid>-phone-A" is a substring of "<tid>-phone-A2", so the
        // exact match must win.
        let tid = format!("{:?}", thread::current().id());
        let short_name = format!("{tid}-phone-A");
        let long_name = format!("{tid}-phone-A2");
        for name in [&short_name, &long_name] {
            let params = chip::CreateParams {
                kind: ChipKind::Bluetooth,
                address: String::new(),
                name: Some("bt".to_string()),
                manufacturer: "netsim".to_string(),
                product_name: "netsim_radio".to_string(),
                controller_properties: None,
            };
            super::add_chip(
                "test-peer",
                name,
                name,
                &params,
                &wireless::CreateParam::Mock(mocked::CreateParams {
                    kind: ChipKind::Bluetooth,
                }),
            )
            .unwrap();
        }

        patch_device(PatchDeviceRequest {
            id: None,
            device: PatchDeviceFields {
                name: Some(short_name.clone()),
                visible: Some(false),
                ..Default::default()
            },
        })
        .unwrap();
        let scene = list_devices();
        assert!(!scene.devices.iter().find(|d| d.name == short_name).unwrap().visible);
        assert!(scene.devices.iter().find(|d| d.name == long_name).unwrap().visible);

        // A substring of both is ambiguous.
        let result = patch_device(PatchDeviceRequest {
            id: None,
            device: PatchDeviceFields {
                name: Some(format!("{tid}-phone")),
                visible: Some(false),
                ..Default::default()
            },
        });
        assert!(matches!(result, Err(DeviceError::Ambiguous(_))));
    }

    #[test]
    fn test_patch_errors() {
        module_setup();
        let bt_chip_params = test_chip_1_bt();
        let result = bt_chip_params.add_chip().unwrap();
        test_chip_2_bt().add_chip().unwrap();

        // Unknown name.
        let patch_result = patch_device_json(
            None,
            r#"{"device": {"name": "wrong-name", "visible": false}}"#,
        );
        assert!(matches!(patch_result, Err(DeviceError::NotFound(_))));

        // Ambiguous substring: both test devices share the prefix.
        let ambiguous = "device-".to_string();
        let request = PatchDeviceRequest {
            id: None,
            device: PatchDeviceFields {
                name: Some(ambiguous),
                visible: Some(false),
                ..Default::default()
            },
        };
        assert!(matches!(patch_device(request), Err(DeviceError::Ambiguous(_))));

        // Non-finite position is rejected with no state change.
        let before = list_devices();
        let request = PatchDeviceRequest {
            id: Some(result.device_id.0),
            device: PatchDeviceFields {
                position: Some(Position::new(f32::NAN, 0.0, 0.0)),
                ..Default::default()
            },
        };
        assert!(matches!(patch_device(request), Err(DeviceError::BadRequest(_))));
        let after = list_devices();
        assert_eq!(before.devices, after.devices);

        // Bad JSON.
        let patch_result = patch_device_json(Some(result.device_id), "{\"device\": 5}");
        assert!(matches!(patch_result, Err(DeviceError::BadRequest(_))));

        // Unknown id.
        let patch_result = patch_device_json(
            Some(DeviceIdentifier(u32::MAX)),
            r#"{"device": {"visible": false}}"#,
        );
        assert!(matches!(patch_result, Err(DeviceError::NotFound(_))));
    }

    #[test]
    fn test_patch_chip_radio_state() {
        module_setup();
        let chip_params = TestChipParameters::new("patch-radio", ChipKind::Bluetooth, "bt");
        let result = chip_params.add_chip().unwrap();
        let request = PatchDeviceRequest {
            id: Some(result.device_id.0),
            device: PatchDeviceFields {
                chips: vec![ChipPatch {
                    kind: Some(ChipKind::Bluetooth),
                    name: "bt".to_string(),
                    bt: Some(netsim_model::BluetoothPatch {
                        low_energy: Some(RadioPatch {
                            state: Some(netsim_model::RadioState::Off),
                        }),
                        classic: None,
                    }),
                    ..Default::default()
                }],
                ..Default::default()
            },
        };
        patch_device(request).unwrap();
        let scene = list_devices();
        let device = scene.devices.into_iter().find(|d| d.id == result.device_id.0).unwrap();
        match &device.chips[0].radios {
            netsim_model::ChipRadios::Bluetooth { low_energy, classic, .. } => {
                assert!(!low_energy.state.is_on());
                assert!(classic.state.is_on());
            }
            radios => panic!("unexpected radios {radios:?}"),
        }
    }

    #[test]
    fn test_remove_chip_removes_empty_device() {
        module_setup();
        let chip_params = TestChipParameters::new("remove", ChipKind::Bluetooth, "bt");
        let result = chip_params.add_chip().unwrap();
        remove_chip(result.device_id, result.chip_id).unwrap();

        let manager = get_manager();
        assert!(manager.devices.read().unwrap().get(&result.device_id).is_none());
        assert!(chip::get_chip(&result.chip_id).is_none());
        assert!(matches!(
            remove_chip(result.device_id, result.chip_id),
            Err(DeviceError::NotFound(_))
        ));
    }

    #[test]
    fn test_reset_restores_defaults_and_notifies() {
        module_setup();
        let chip_params = TestChipParameters::new("reset", ChipKind::Bluetooth, "bt");
        let result = chip_params.add_chip().unwrap();
        patch_device(PatchDeviceRequest {
            id: Some(result.device_id.0),
            device: PatchDeviceFields {
                visible: Some(false),
                position: Some(Position::new(10.0, 20.0, 30.0)),
                ..Default::default()
            },
        })
        .unwrap();

        let reset_seen = Arc::new(AtomicU32::new(0));
        let reset_seen_cb = Arc::clone(&reset_seen);
        let observer_id = subscribe(Box::new(move |event| {
            if matches!(event, Event::DeviceReset) {
                reset_seen_cb.fetch_add(1, Ordering::SeqCst);
            }
        }));

        reset_all().unwrap();
        assert_eq!(reset_seen.load(Ordering::SeqCst), 1);

        let scene = list_devices();
        let device = scene.devices.into_iter().find(|d| d.id == result.device_id.0).unwrap();
        assert!(device.visible);
        assert_eq!(device.position, Position::default());

        assert!(unsubscribe(observer_id));
        assert!(!unsubscribe(observer_id));
    }

    #[test]
    fn test_observer_sees_patch_events() {
        module_setup();
        let chip_params = TestChipParameters::new("observe", ChipKind::Bluetooth, "bt");
        let result = chip_params.add_chip().unwrap();
        let patched = Arc::new(AtomicU32::new(0));
        let patched_cb = Arc::clone(&patched);
        let device_id = result.device_id;
        let observer_id = subscribe(Box::new(move |event| {
            if let Event::DevicePatched { id, .. } = event {
                if *id == device_id {
                    patched_cb.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
        patch_device(PatchDeviceRequest {
            id: Some(result.device_id.0),
            device: PatchDeviceFields { visible: Some(true), ..Default::default() },
        })
        .unwrap();
        assert_eq!(patched.load(Ordering::SeqCst), 1);
        unsubscribe(observer_id);
    }

    #[test]
    fn test_get_distance() {
        module_setup();
        let params_a = TestChipParameters::new("dist-a", ChipKind::Bluetooth, "bt");
        let params_b = TestChipParameters::new("dist-b", ChipKind::Bluetooth, "bt");
        let result_a = params_a.add_chip().unwrap();
        let result_b = params_b.add_chip().unwrap();
        patch_device(PatchDeviceRequest {
            id: Some(result_b.device_id.0),
            device: PatchDeviceFields {
                position: Some(Position::new(3.0, 4.0, 0.0)),
                ..Default::default()
            },
        })
        .unwrap();
        assert_eq!(get_distance(&result_a.chip_id, &result_b.chip_id), 5.0);
        assert_eq!(get_distance(&result_b.chip_id, &result_a.chip_id), 5.0);
        // Unknown chip ids degrade to 0.
        assert_eq!(get_distance(&result_a.chip_id, &ChipIdentifier(u32::MAX)), 0.0);
    }

    #[test]
    fn test_idle_deadline() {
        assert!(!idle_deadline_reached(None, Duration::from_secs(0)));
        assert!(idle_deadline_reached(Some(Instant::now()), Duration::from_secs(0)));
        assert!(!idle_deadline_reached(
            Some(Instant::now()),
            Duration::from_secs(300)
        ));
    }

    #[test]
    fn test_inactivity_follows_last_device() {
        module_setup();
        let chip_params = TestChipParameters::new("idle", ChipKind::Bluetooth, "bt");
        let result = chip_params.add_chip().unwrap();
        let manager = get_manager();
        assert!(manager.inactive_since.read().unwrap().is_none());
        remove_chip(result.device_id, result.chip_id).unwrap();
        // Another test thread may have attached its own device
        // concurrently; only assert when the scene is really empty.
        let devices = manager.devices.read().unwrap();
        if devices.values().filter(|d| !d.builtin).count() == 0 {
            assert!(manager.inactive_since.read().unwrap().is_some());
        }
    }
}
