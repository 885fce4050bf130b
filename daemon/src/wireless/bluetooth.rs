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

//! Bluetooth adaptor over the radio engine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

use bytes::Bytes;
use log::{info, warn};

use crate::bluetooth::address::BluetoothAddress;
use crate::bluetooth::engine::{
    self, EngineError, NullController, PhyKind, PhyStats, RadioEngine, RootcanalIdentifier,
};
use crate::devices::chip::ChipIdentifier;
use crate::wireless::{WirelessChip, WirelessChipImpl, WirelessError};
use netsim_model::{
    ChipPatch, ChipRadios, ControllerProperties, InvalidPacket, InvalidPacketReason, Radio,
    RadioPatch, RadioState, RadioStats, StatsKind,
};

/// Reports kept per chip; older reports fall off the ring.
const MAX_INVALID_PACKET_REPORTS: usize = 5;

// Invalid-packet telemetry reported by the engine per chip,
// surfaced through the chip's radio stats.
static BLUETOOTH_INVALID_PACKETS: OnceLock<
    Mutex<BTreeMap<ChipIdentifier, Vec<InvalidPacket>>>,
> = OnceLock::new();

fn invalid_packets_table() -> &'static Mutex<BTreeMap<ChipIdentifier, Vec<InvalidPacket>>> {
    BLUETOOTH_INVALID_PACKETS.get_or_init(|| Mutex::new(BTreeMap::new()))
}

/// Records an invalid or delayed packet for a chip.
pub fn report_invalid_packet(
    chip_id: ChipIdentifier,
    reason: InvalidPacketReason,
    description: String,
    packet: Vec<u8>,
) {
    let mut table = invalid_packets_table().lock().unwrap();
    let reports = table.entry(chip_id).or_default();
    if reports.len() >= MAX_INVALID_PACKET_REPORTS {
        reports.remove(0);
    }
    info!("invalid packet for chip {chip_id}, reason {reason:?}: {description}");
    reports.push(InvalidPacket { reason, description, packet });
}

/// Current telemetry ring for a chip.
pub fn get_invalid_packets(chip_id: ChipIdentifier) -> Vec<InvalidPacket> {
    invalid_packets_table().lock().unwrap().get(&chip_id).cloned().unwrap_or_default()
}

pub struct CreateParams {
    pub address: String,
    pub controller_properties: Option<ControllerProperties>,
    /// Built-in beacon chips report a single BLE-beacon stats record.
    pub beacon: bool,
}

/// One Bluetooth chip as seen by the registry, backed by an engine
/// device.
pub struct Bluetooth {
    engine: RadioEngine,
    rootcanal_id: RootcanalIdentifier,
    chip_id: ChipIdentifier,
    address: String,
    properties: ControllerProperties,
    beacon: bool,
    classic_enabled: AtomicBool,
    low_energy_enabled: AtomicBool,
    classic_stats: PhyStats,
    low_energy_stats: PhyStats,
}

impl Bluetooth {
    fn radio(&self, enabled: &AtomicBool, supported: bool, stats: &PhyStats) -> Radio {
        Radio {
            state: if supported && enabled.load(Ordering::SeqCst) {
                RadioState::On
            } else {
                RadioState::Off
            },
            tx_count: stats.tx_count.load(Ordering::SeqCst),
            rx_count: stats.rx_count.load(Ordering::SeqCst),
        }
    }

    fn patch_radio(
        &self,
        phy: PhyKind,
        enabled: &AtomicBool,
        supported: bool,
        patch: Option<RadioPatch>,
    ) {
        let Some(RadioPatch { state: Some(state) }) = patch else {
            return;
        };
        let on = match state {
            RadioState::On => true,
            RadioState::Off => false,
            RadioState::Unknown => return,
        };
        if !supported {
            warn!("patch: chip {} does not support {phy:?}", self.rootcanal_id);
            return;
        }
        let last = enabled.swap(on, Ordering::SeqCst);
        if last != on {
            if let Err(e) = self.engine.set_radio_state(self.rootcanal_id, phy, state) {
                warn!("patch: set_radio_state failed for chip {}: {e}", self.rootcanal_id);
            }
        }
    }
}

impl WirelessChip for Bluetooth {
    fn handle_request(&self, packet: &Bytes) {
        let Some(packet_type) = packet.first().copied() else {
            warn!("empty hci request for rootcanal_id {}", self.rootcanal_id);
            return;
        };
        if let Err(e) = self.engine.deliver_hci(self.rootcanal_id, packet_type, packet.slice(1..))
        {
            warn!("deliver_hci failed for rootcanal_id {}: {e}", self.rootcanal_id);
        }
    }

    fn reset(&self) {
        if let Err(e) = self.engine.reset(self.rootcanal_id) {
            warn!("reset failed for rootcanal_id {}: {e}", self.rootcanal_id);
        }
        self.classic_enabled.store(self.properties.br_supported, Ordering::SeqCst);
        self.low_energy_enabled.store(self.properties.le_supported, Ordering::SeqCst);
    }

    fn get(&self) -> ChipRadios {
        ChipRadios::Bluetooth {
            low_energy: self.radio(
                &self.low_energy_enabled,
                self.properties.le_supported,
                &self.low_energy_stats,
            ),
            classic: self.radio(
                &self.classic_enabled,
                self.properties.br_supported,
                &self.classic_stats,
            ),
            address: self.address.clone(),
        }
    }

    fn patch(&self, patch: &ChipPatch) {
        let Some(bt) = &patch.bt else {
            return;
        };
        self.patch_radio(
            PhyKind::Le,
            &self.low_energy_enabled,
            self.properties.le_supported,
            bt.low_energy,
        );
        self.patch_radio(
            PhyKind::BrEdr,
            &self.classic_enabled,
            self.properties.br_supported,
            bt.classic,
        );
    }

    fn get_stats(&self, duration_secs: u64) -> Vec<RadioStats> {
        let invalid_packets = get_invalid_packets(self.chip_id);
        let ChipRadios::Bluetooth { low_energy, classic, .. } = self.get() else {
            unreachable!("bluetooth adaptor always reports bluetooth radios");
        };
        if self.beacon {
            return vec![RadioStats {
                kind: StatsKind::BleBeacon,
                duration_secs,
                tx_count: low_energy.tx_count,
                rx_count: low_energy.rx_count,
                invalid_packets,
            }];
        }
        vec![
            RadioStats {
                kind: StatsKind::BluetoothLowEnergy,
                duration_secs,
                tx_count: low_energy.tx_count,
                rx_count: low_energy.rx_count,
                invalid_packets: invalid_packets.clone(),
            },
            RadioStats {
                kind: StatsKind::BluetoothClassic,
                duration_secs,
                tx_count: classic.tx_count,
                rx_count: classic.rx_count,
                invalid_packets,
            },
        ]
    }
}

impl Drop for Bluetooth {
    fn drop(&mut self) {
        let _ = self.engine.detach_chip(self.rootcanal_id);
        invalid_packets_table().lock().unwrap().remove(&self.chip_id);
    }
}

/// Attaches a chip to the radio engine and returns its adaptor.
pub fn add_chip(
    create_params: &CreateParams,
    chip_id: ChipIdentifier,
) -> Result<WirelessChipImpl, WirelessError> {
    let engine = engine::get_engine().ok_or(WirelessError::Engine(EngineError::Closed))?;
    let address = match create_params.address.as_str() {
        "" => None,
        text => Some(
            BluetoothAddress::parse(text).map_err(|e| WirelessError::BadAddress(e.to_string()))?,
        ),
    };
    let properties = create_params.controller_properties.clone().unwrap_or_default();
    let attached =
        engine.attach_chip(chip_id, address, properties.clone(), Box::new(NullController))?;
    info!(
        "bluetooth chip created: rootcanal_id {} chip_id {chip_id}",
        attached.rootcanal_id
    );
    invalid_packets_table().lock().unwrap().insert(chip_id, Vec::new());
    Ok(Box::new(Bluetooth {
        engine,
        rootcanal_id: attached.rootcanal_id,
        chip_id,
        address: attached.address.to_string(),
        properties: properties.clone(),
        beacon: create_params.beacon,
        classic_enabled: AtomicBool::new(properties.br_supported),
        low_energy_enabled: AtomicBool::new(properties.le_supported),
        classic_stats: attached.classic,
        low_energy_stats: attached.low_energy,
    }))
}
