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

use bytes::Bytes;
use netsim_model::{ChipPatch, ChipRadios, RadioStats};

pub type WirelessChipImpl = Box<dyn WirelessChip + Send + Sync>;

/// Interface between the generic chip and a radio-specific backend.
pub trait WirelessChip {
    /// Main entry for host-to-controller packets from the virtual
    /// device. Format depends on the chip kind:
    /// * Bluetooth - H4 HCI (indicator byte first)
    /// * Wi-Fi / UWB - raw payload for the external backend
    fn handle_request(&self, packet: &Bytes);

    /// Returns the radio to its initial state: counters zeroed,
    /// supported radios enabled.
    fn reset(&self);

    /// Radio snapshot for the frontend API.
    fn get(&self) -> ChipRadios;

    /// Applies a chip patch, toggling radio state as requested.
    fn patch(&self, patch: &ChipPatch);

    /// Per-radio usage stats.
    fn get_stats(&self, duration_secs: u64) -> Vec<RadioStats>;
}
