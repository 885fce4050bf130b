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

//! A chip is one emulated radio on a device.
//!
//! The generic chip record lives here; radio-specific state is behind
//! the chip's `WirelessChip`. Chips are also indexed process-wide so
//! the transport can route by chip id alone.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Instant;

use netsim_model::{ChipKind, ChipPatch, ControllerProperties, RadioStats};

use crate::devices::device::DeviceIdentifier;
use crate::devices::id_factory::IdFactory;
use crate::wireless::{WirelessChip, WirelessChipImpl};

/// Chip ids start above device ids to make logs unambiguous.
const INITIAL_CHIP_ID: u32 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChipIdentifier(pub u32);

impl fmt::Display for ChipIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static IDS: OnceLock<RwLock<IdFactory<u32>>> = OnceLock::new();

/// Vends the next process-unique chip identifier.
pub fn next_id() -> ChipIdentifier {
    let ids = IDS.get_or_init(|| RwLock::new(IdFactory::new(INITIAL_CHIP_ID, 1)));
    ChipIdentifier(ids.write().unwrap().next_id())
}

pub struct CreateParams {
    pub kind: ChipKind,
    pub address: String,
    pub name: Option<String>,
    pub manufacturer: String,
    pub product_name: String,
    pub controller_properties: Option<ControllerProperties>,
}

/// Common state for one chip. Radio state and counters live behind
/// `wireless_chip`.
pub struct Chip {
    pub id: ChipIdentifier,
    pub device_id: DeviceIdentifier,
    pub kind: ChipKind,
    pub address: String,
    pub name: String,
    pub device_name: String,
    /// Transport peer that attached this chip, for diagnostics.
    pub peer: String,
    pub manufacturer: RwLock<String>,
    pub product_name: RwLock<String>,
    pub wireless_chip: WirelessChipImpl,
    pub start: Instant,
}

impl Chip {
    fn new(
        id: ChipIdentifier,
        device_id: DeviceIdentifier,
        device_name: &str,
        peer: &str,
        create_params: &CreateParams,
        wireless_chip: WirelessChipImpl,
    ) -> Self {
        Self {
            id,
            device_id,
            kind: create_params.kind,
            address: create_params.address.clone(),
            name: create_params.name.clone().unwrap_or(format!("chip-{id}")),
            device_name: device_name.to_string(),
            peer: peer.to_string(),
            manufacturer: RwLock::new(create_params.manufacturer.clone()),
            product_name: RwLock::new(create_params.product_name.clone()),
            wireless_chip,
            start: Instant::now(),
        }
    }

    /// Snapshot for the frontend list API.
    pub fn get(&self) -> netsim_model::Chip {
        netsim_model::Chip {
            id: self.id.0,
            kind: self.kind,
            name: self.name.clone(),
            manufacturer: self.manufacturer.read().unwrap().clone(),
            product_name: self.product_name.read().unwrap().clone(),
            radios: self.wireless_chip.get(),
        }
    }

    /// Applies a validated chip patch.
    pub fn patch(&self, patch: &ChipPatch) {
        if let Some(manufacturer) = &patch.manufacturer {
            *self.manufacturer.write().unwrap() = manufacturer.clone();
        }
        if let Some(product_name) = &patch.product_name {
            *self.product_name.write().unwrap() = product_name.clone();
        }
        self.wireless_chip.patch(patch);
    }

    pub fn reset(&self) {
        self.wireless_chip.reset();
    }

    pub fn get_stats(&self) -> Vec<RadioStats> {
        self.wireless_chip.get_stats(self.start.elapsed().as_secs())
    }
}

struct ChipManager {
    chips: RwLock<BTreeMap<ChipIdentifier, Arc<Chip>>>,
}

static CHIP_MANAGER: OnceLock<ChipManager> = OnceLock::new();

fn get_chip_manager() -> &'static ChipManager {
    CHIP_MANAGER.get_or_init(|| ChipManager { chips: RwLock::new(BTreeMap::new()) })
}

/// Creates a chip record and registers it in the process-wide index.
pub fn new_chip(
    id: ChipIdentifier,
    device_id: DeviceIdentifier,
    device_name: &str,
    peer: &str,
    create_params: &CreateParams,
    wireless_chip: WirelessChipImpl,
) -> Arc<Chip> {
    let chip = Arc::new(Chip::new(id, device_id, device_name, peer, create_params, wireless_chip));
    get_chip_manager().chips.write().unwrap().insert(id, Arc::clone(&chip));
    chip
}

pub fn get_chip(id: &ChipIdentifier) -> Option<Arc<Chip>> {
    get_chip_manager().chips.read().unwrap().get(id).cloned()
}

pub fn remove_chip(id: &ChipIdentifier) -> Option<Arc<Chip>> {
    get_chip_manager().chips.write().unwrap().remove(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wireless::{self, mocked};

    fn bt_params(name: &str) -> CreateParams {
        CreateParams {
            kind: ChipKind::Bluetooth,
            address: String::new(),
            name: Some(name.to_string()),
            manufacturer: "netsim".to_string(),
            product_name: "netsim_bt".to_string(),
            controller_properties: None,
        }
    }

    fn mock_wireless() -> WirelessChipImpl {
        wireless::add_chip(
            &wireless::CreateParam::Mock(mocked::CreateParams { kind: ChipKind::Bluetooth }),
            next_id(),
        )
        .unwrap()
    }

    #[test]
    fn test_next_id_is_monotonic() {
        let first = next_id();
        let second = next_id();
        assert!(second.0 > first.0);
        assert!(first.0 >= INITIAL_CHIP_ID);
    }

    #[test]
    fn test_chip_index_roundtrip() {
        let id = next_id();
        let chip =
            new_chip(id, DeviceIdentifier(1), "device-1", "test-peer", &bt_params("bt"), mock_wireless());
        assert_eq!(chip.name, "bt");
        assert_eq!(chip.peer, "test-peer");
        assert!(get_chip(&id).is_some());
        assert!(remove_chip(&id).is_some());
        assert!(get_chip(&id).is_none());
        assert!(remove_chip(&id).is_none());
    }

    #[test]
    fn test_chip_default_name() {
        let id = next_id();
        let mut params = bt_params("unused");
        params.name = None;
        let chip = new_chip(id, DeviceIdentifier(1), "device-1", "peer", &params, mock_wireless());
        assert_eq!(chip.name, format!("chip-{id}"));
        remove_chip(&id);
    }

    #[test]
    fn test_chip_patch_updates_strings() {
        let id = next_id();
        let chip =
            new_chip(id, DeviceIdentifier(1), "device-1", "peer", &bt_params("bt"), mock_wireless());
        let patch = ChipPatch {
            kind: Some(ChipKind::Bluetooth),
            name: "bt".to_string(),
            manufacturer: Some("acme".to_string()),
            product_name: Some("radio2".to_string()),
            ..Default::default()
        };
        chip.patch(&patch);
        assert_eq!(*chip.manufacturer.read().unwrap(), "acme");
        assert_eq!(*chip.product_name.read().unwrap(), "radio2");
        remove_chip(&id);
    }
}
