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

//! Wire and API model for the netsim daemon.
//!
//! These types are the serialized surface of the frontend (scene
//! snapshots, device patches) and of the packet-stream handshake
//! (StartInfo).

pub mod chip;
pub mod device;
pub mod position;
pub mod startup;
pub mod stats;

pub use chip::{
    BluetoothPatch, Chip, ChipKind, ChipPatch, ChipRadios, ControllerProperties, Radio,
    RadioPatch, RadioState,
};
pub use device::{Device, PatchDeviceFields, PatchDeviceRequest, Scene};
pub use position::{Orientation, Position};
pub use startup::{ChipInfo, StartInfo};
pub use stats::{InvalidPacket, InvalidPacketReason, RadioStats, StatsKind};
