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

/// The radio a stats record describes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatsKind {
    BluetoothLowEnergy,
    BluetoothClassic,
    Wifi,
    Uwb,
    BleBeacon,
}

/// Why a packet was recorded in the invalid-packet telemetry ring.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidPacketReason {
    #[default]
    Unknown,
    ParseError,
    Delayed,
}

/// One invalid or delayed packet report.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct InvalidPacket {
    pub reason: InvalidPacketReason,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub packet: Vec<u8>,
}

/// Per-radio usage counters reported at chip removal and on demand.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RadioStats {
    pub kind: StatsKind,
    #[serde(default)]
    pub duration_secs: u64,
    #[serde(default)]
    pub tx_count: u32,
    #[serde(default)]
    pub rx_count: u32,
    #[serde(default)]
    pub invalid_packets: Vec<InvalidPacket>,
}

impl RadioStats {
    pub fn new(kind: StatsKind, duration_secs: u64) -> RadioStats {
        RadioStats { kind, duration_secs, tx_count: 0, rx_count: 0, invalid_packets: Vec::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_json_kind_names() {
        let stats = RadioStats::new(StatsKind::BluetoothLowEnergy, 5);
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"BLUETOOTH_LOW_ENERGY\""));
    }

    #[test]
    fn test_invalid_packet_default_reason() {
        let packet: InvalidPacket = serde_json::from_str(r#"{"reason":"DELAYED"}"#).unwrap();
        assert_eq!(packet.reason, InvalidPacketReason::Delayed);
        assert_eq!(InvalidPacket::default().reason, InvalidPacketReason::Unknown);
    }
}
