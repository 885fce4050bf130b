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

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of radio a chip emulates.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChipKind {
    Bluetooth,
    Wifi,
    Uwb,
    BluetoothBeacon,
}

impl fmt::Display for ChipKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ChipKind::Bluetooth => "BLUETOOTH",
            ChipKind::Wifi => "WIFI",
            ChipKind::Uwb => "UWB",
            ChipKind::BluetoothBeacon => "BLUETOOTH_BEACON",
        };
        write!(f, "{}", name)
    }
}

/// Administrative state of a single radio.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RadioState {
    #[default]
    Unknown,
    On,
    Off,
}

impl RadioState {
    pub fn is_on(&self) -> bool {
        matches!(self, RadioState::On)
    }
}

/// Snapshot of one radio: state plus phy-level counters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Radio {
    pub state: RadioState,
    #[serde(default)]
    pub tx_count: u32,
    #[serde(default)]
    pub rx_count: u32,
}

/// Radio-specific portion of a chip snapshot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ChipRadios {
    Bluetooth { low_energy: Radio, classic: Radio, address: String },
    Wifi(Radio),
    Uwb(Radio),
}

/// Descriptor for the emulated Bluetooth controller installed on
/// attach. Stands in for the full Rootcanal controller configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ControllerProperties {
    #[serde(default = "default_u8_version")]
    pub hci_version: u8,
    #[serde(default = "default_u8_version")]
    pub lmp_version: u8,
    #[serde(default)]
    pub manufacturer_name: u16,
    /// Whether the controller supports the BR/EDR phy.
    #[serde(default = "default_true")]
    pub br_supported: bool,
    /// Whether the controller supports the LE phy.
    #[serde(default = "default_true")]
    pub le_supported: bool,
}

fn default_u8_version() -> u8 {
    // HCI/LMP version 11 is Bluetooth 5.2.
    11
}

fn default_true() -> bool {
    true
}

impl Default for ControllerProperties {
    fn default() -> Self {
        ControllerProperties {
            hci_version: default_u8_version(),
            lmp_version: default_u8_version(),
            manufacturer_name: 0,
            br_supported: true,
            le_supported: true,
        }
    }
}

/// A chip snapshot as returned by the frontend list API.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Chip {
    pub id: u32,
    pub kind: ChipKind,
    pub name: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub product_name: String,
    pub radios: ChipRadios,
}

/// Patchable state of a single radio. `None` or `Unknown` leaves the
/// state unchanged.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct RadioPatch {
    #[serde(default)]
    pub state: Option<RadioState>,
}

/// Patchable Bluetooth radio pair.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct BluetoothPatch {
    #[serde(default)]
    pub low_energy: Option<RadioPatch>,
    #[serde(default)]
    pub classic: Option<RadioPatch>,
}

/// A patch addressed to one chip of a device.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ChipPatch {
    #[serde(default)]
    pub kind: Option<ChipKind>,
    /// Chip selector within the device; exact match wins over a unique
    /// substring match.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub bt: Option<BluetoothPatch>,
    #[serde(default)]
    pub wifi: Option<RadioPatch>,
    #[serde(default)]
    pub uwb: Option<RadioPatch>,
}

impl ChipPatch {
    /// The kind this patch addresses, either explicit or inferred from
    /// the radio payload present.
    pub fn target_kind(&self) -> Option<ChipKind> {
        if let Some(kind) = self.kind {
            return Some(kind);
        }
        if self.bt.is_some() {
            Some(ChipKind::Bluetooth)
        } else if self.wifi.is_some() {
            Some(ChipKind::Wifi)
        } else if self.uwb.is_some() {
            Some(ChipKind::Uwb)
        } else {
            None
        }
    }
}
