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

//! UWB adaptor.
//!
//! The UCI ranging backend is an external collaborator; this adaptor
//! keeps the chip-side radio state and counters at that seam.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use bytes::Bytes;
use log::info;

use crate::devices::chip::ChipIdentifier;
use crate::wireless::{WirelessChip, WirelessChipImpl};
use netsim_model::{ChipPatch, ChipRadios, Radio, RadioState, RadioStats, StatsKind};

pub struct CreateParams {}

pub struct Uwb {
    enabled: AtomicBool,
    tx_count: AtomicU32,
    rx_count: AtomicU32,
}

impl WirelessChip for Uwb {
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
        ChipRadios::Uwb(Radio {
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
        if let Some(uwb) = patch.uwb {
            match uwb.state {
                Some(RadioState::On) => self.enabled.store(true, Ordering::SeqCst),
                Some(RadioState::Off) => self.enabled.store(false, Ordering::SeqCst),
                _ => {}
            }
        }
    }

    fn get_stats(&self, duration_secs: u64) -> Vec<RadioStats> {
        let ChipRadios::Uwb(radio) = self.get() else {
            unreachable!("uwb adaptor always reports a uwb radio");
        };
        vec![RadioStats {
            kind: StatsKind::Uwb,
            duration_secs,
            tx_count: radio.tx_count,
            rx_count: radio.rx_count,
            invalid_packets: Vec::new(),
        }]
    }
}

pub fn add_chip(_create_params: &CreateParams, chip_id: ChipIdentifier) -> WirelessChipImpl {
    info!("uwb chip created: chip_id {chip_id}");
    Box::new(Uwb {
        enabled: AtomicBool::new(true),
        tx_count: AtomicU32::new(0),
        rx_count: AtomicU32::new(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsim_model::RadioPatch;

    #[test]
    fn test_uwb_patch_and_reset() {
        let uwb = add_chip(&CreateParams {}, ChipIdentifier(0));
        uwb.patch(&ChipPatch {
            uwb: Some(RadioPatch { state: Some(RadioState::Off) }),
            ..Default::default()
        });
        let ChipRadios::Uwb(radio) = uwb.get() else { panic!("expected uwb radio") };
        assert!(!radio.state.is_on());
        uwb.reset();
        let ChipRadios::Uwb(radio) = uwb.get() else { panic!("expected uwb radio") };
        assert!(radio.state.is_on());
        assert_eq!(radio.tx_count, 0);
        assert_eq!(radio.rx_count, 0);
    }

    #[test]
    fn test_uwb_stats_kind() {
        let uwb = add_chip(&CreateParams {}, ChipIdentifier(0));
        let stats = uwb.get_stats(0);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].kind, StatsKind::Uwb);
    }
}
