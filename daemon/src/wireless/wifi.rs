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

//! Wi-Fi adaptor.
//!
//! The slirp backend is an external collaborator; this adaptor keeps
//! the chip-side radio state and counters at that seam.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use bytes::Bytes;
use log::info;

use crate::devices::chip::ChipIdentifier;
use crate::wireless::{WirelessChip, WirelessChipImpl};
use netsim_model::{ChipPatch, ChipRadios, Radio, RadioState, RadioStats, StatsKind};

pub struct CreateParams {}

pub struct Wifi {
    enabled: AtomicBool,
    tx_count: AtomicU32,
    rx_count: AtomicU32,
}

impl WirelessChip for Wifi {
    fn handle_request(&self, _packet: &Bytes) {
        if self.enabled.load(Ordering::SeqCst) {
            self.tx_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn reset(&self) {
        self.enabled.store(true, Ordering::SeqCst);
        self.tx_count.store(0, Ordering::SeqCst);
        self.rx_count.store(0, Ordering::SeqCst);
    }

    fn get(&self) -> ChipRadios {
        ChipRadios::Wifi(Radio {
            state: if self.enabled.load(Ordering::SeqCst) {
                RadioState::On
            } else {
                RadioState::Off
            },
            tx_count: self.tx_count.load(Ordering::SeqCst),
            rx_count: self.rx_count.load(Ordering::SeqCst),
        })
    }

    fn patch(&self, patch: &ChipPatch) {
        if let Some(wifi) = patch.wifi {
            match wifi.state {
                Some(RadioState::On) => self.enabled.store(true, Ordering::SeqCst),
                Some(RadioState::Off) => self.enabled.store(false, Ordering::SeqCst),
                _ => {}
            }
        }
    }

    fn get_stats(&self, duration_secs: u64) -> Vec<RadioStats> {
        let ChipRadios::Wifi(radio) = self.get() else {
            unreachable!("wifi adaptor always reports a wifi radio");
        };
        vec![RadioStats {
            kind: StatsKind::Wifi,
            duration_secs,
            tx_count: radio.tx_count,
            rx_count: radio.rx_count,
            invalid_packets: Vec::new(),
        }]
    }
}

pub fn add_chip(_create_params: &CreateParams, chip_id: ChipIdentifier) -> WirelessChipImpl {
    info!("wifi chip created: chip_id {chip_id}");
    Box::new(Wifi {
        enabled: AtomicBool::new(true),
        tx_count: AtomicU32::new(0),
        rx_count: AtomicU32::new(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_wifi() -> WirelessChipImpl {
        add_chip(&CreateParams {}, ChipIdentifier(0))
    }

    #[test]
    fn test_requests_count_when_enabled() {
        let wifi = new_wifi();
        wifi.handle_request(&Bytes::from_static(b"frame"));
        let ChipRadios::Wifi(radio) = wifi.get() else { panic!("expected wifi radio") };
        assert_eq!(radio.tx_count, 1);
    }

    #[test]
    fn test_patch_off_stops_counting() {
        let wifi = new_wifi();
        wifi.patch(&ChipPatch {
            wifi: Some(netsim_model::RadioPatch { state: Some(RadioState::Off) }),
            ..Default::default()
        });
        wifi.handle_request(&Bytes::from_static(b"frame"));
        let ChipRadios::Wifi(radio) = wifi.get() else { panic!("expected wifi radio") };
        assert!(!radio.state.is_on());
        assert_eq!(radio.tx_count, 0);
    }

    #[test]
    fn test_reset_restores_enabled_zero_counts() {
        let wifi = new_wifi();
        wifi.handle_request(&Bytes::from_static(b"frame"));
        wifi.reset();
        let ChipRadios::Wifi(radio) = wifi.get() else { panic!("expected wifi radio") };
        assert!(radio.state.is_on());
        assert_eq!(radio.tx_count, 0);
        let stats = wifi.get_stats(3);
        assert_eq!(stats[0].kind, StatsKind::Wifi);
        assert_eq!(stats[0].duration_secs, 3);
    }
}
