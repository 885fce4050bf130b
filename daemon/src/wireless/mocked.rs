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

//! Mock adaptor for registry tests, standing in for any chip kind
//! without touching a radio backend.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use bytes::Bytes;

use crate::devices::chip::ChipIdentifier;
use crate::wireless::{WirelessChip, WirelessChipImpl};
use netsim_model::{
    ChipKind, ChipPatch, ChipRadios, Radio, RadioPatch, RadioState, RadioStats, StatsKind,
};

pub struct CreateParams {
    pub kind: ChipKind,
}

struct MockRadio {
    enabled: AtomicBool,
    tx_count: AtomicU32,
    rx_count: AtomicU32,
}

impl MockRadio {
    fn new() -> Self {
        MockRadio {
            enabled: AtomicBool::new(true),
            tx_count: AtomicU32::new(0),
            rx_count: AtomicU32::new(0),
        }
    }

    fn get(&self) -> Radio {
        Radio {
            state: if self.enabled.load(Ordering::SeqCst) {
                RadioState::On
            } else {
                RadioState::Off
            },
            tx_count: self.tx_count.load(Ordering::SeqCst),
            rx_count: self.rx_count.load(Ordering::SeqCst),
        }
    }

    fn apply(&self, patch: Option<RadioPatch>) {
        match patch.and_then(|p| p.state) {
            Some(RadioState::On) => self.enabled.store(true, Ordering::SeqCst),
            Some(RadioState::Off) => self.enabled.store(false, Ordering::SeqCst),
            _ => {}
        }
    }

    fn reset(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        self.tx_count.store(0, Ordering::SeqCst);
        self.rx_count.store(0, Ordering::SeqCst);
    }
}

pub struct Mock {
    kind: ChipKind,
    // Primary radio; for Bluetooth this is LE and `secondary` is
    // classic.
    primary: MockRadio,
    secondary: MockRadio,
}

impl WirelessChip for Mock {
    fn handle_request(&self, _packet: &Bytes) {
        self.primary.tx_count.fetch_add(1, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.primary.reset();
        self.secondary.reset();
    }

    fn get(&self) -> ChipRadios {
        match self.kind {
            ChipKind::Bluetooth | ChipKind::BluetoothBeacon => ChipRadios::Bluetooth {
                low_energy: self.primary.get(),
                classic: self.secondary.get(),
                address: String::new(),
            },
            ChipKind::Wifi => ChipRadios::Wifi(self.primary.get()),
            ChipKind::Uwb => ChipRadios::Uwb(self.primary.get()),
        }
    }

    fn patch(&self, patch: &ChipPatch) {
        if let Some(bt) = &patch.bt {
            self.primary.apply(bt.low_energy);
            self.secondary.apply(bt.classic);
        }
        self.primary.apply(patch.wifi);
        self.primary.apply(patch.uwb);
    }

    fn get_stats(&self, duration_secs: u64) -> Vec<RadioStats> {
        let kind = match self.kind {
            ChipKind::Bluetooth => StatsKind::BluetoothLowEnergy,
            ChipKind::BluetoothBeacon => StatsKind::BleBeacon,
            ChipKind::Wifi => StatsKind::Wifi,
            ChipKind::Uwb => StatsKind::Uwb,
        };
        let radio = self.primary.get();
        vec![RadioStats {
            kind,
            duration_secs,
            tx_count: radio.tx_count,
            rx_count: radio.rx_count,
            invalid_packets: Vec::new(),
        }]
    }
}

pub fn add_chip(create_params: &CreateParams, _chip_id: ChipIdentifier) -> WirelessChipImpl {
    Box::new(Mock {
        kind: create_params.kind,
        primary: MockRadio::new(),
        secondary: MockRadio::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsim_model::BluetoothPatch;

    #[test]
    fn test_mock_bt_patches_radios_independently() {
        let mock = add_chip(&CreateParams { kind: ChipKind::Bluetooth }, ChipIdentifier(0));
        mock.patch(&ChipPatch {
            bt: Some(BluetoothPatch {
                low_energy: Some(RadioPatch { state: Some(RadioState::Off) }),
                classic: None,
            }),
            ..Default::default()
        });
        match mock.get() {
            ChipRadios::Bluetooth { low_energy, classic, .. } => {
                assert!(!low_energy.state.is_on());
                assert!(classic.state.is_on());
            }
            radios => panic!("unexpected radios {radios:?}"),
        }
    }

    #[test]
    fn test_mock_counts_requests() {
        let mock = add_chip(&CreateParams { kind: ChipKind::Wifi }, ChipIdentifier(0));
        mock.handle_request(&Bytes::from_static(b"frame"));
        mock.handle_request(&Bytes::from_static(b"frame"));
        let stats = mock.get_stats(0);
        assert_eq!(stats[0].tx_count, 2);
        mock.reset();
        assert_eq!(mock.get_stats(0)[0].tx_count, 0);
    }
}
