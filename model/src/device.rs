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
use std::time::Duration;

use crate::chip::{Chip, ChipPatch};
use crate::position::{Orientation, Position};

/// A device snapshot as returned by the frontend list API.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Device {
    pub id: u32,
    pub name: String,
    pub visible: bool,
    pub position: Position,
    pub orientation: Orientation,
    pub chips: Vec<Chip>,
}

/// The full scene: every device, in identifier order.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub devices: Vec<Device>,
    /// Time of the last scene mutation, as a duration since UNIX_EPOCH.
    #[serde(default)]
    pub last_modified: Duration,
}

/// Patchable fields of a device. Absent fields are left unchanged.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PatchDeviceFields {
    /// Device selector when no id is given; exact name match wins over
    /// a unique substring match.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub visible: Option<bool>,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub chips: Vec<ChipPatch>,
}

/// A request to patch one device, selected by id or by name.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PatchDeviceRequest {
    #[serde(default)]
    pub id: Option<u32>,
    pub device: PatchDeviceFields,
}
