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

use crate::chip::{ChipKind, ControllerProperties};

/// Chip description carried in the first message of a packet stream.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChipInfo {
    pub kind: ChipKind,
    /// Caller-supplied chip name, unique within the device for a kind.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub product_name: String,
    /// 48-bit Bluetooth address as `aa:bb:cc:dd:ee:ff`; empty lets the
    /// radio engine allocate one.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub controller_properties: Option<ControllerProperties>,
}

/// First client message on a packet stream, identifying the device and
/// the chip the stream will drive.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StartInfo {
    /// Human-readable device name.
    pub name: String,
    /// Device identity across streams; defaults to `name` so chips
    /// arriving on separate streams land on the same device.
    #[serde(default)]
    pub guid: Option<String>,
    pub chip: ChipInfo,
}

impl StartInfo {
    pub fn device_guid(&self) -> &str {
        self.guid.as_deref().unwrap_or(&self.name)
    }
}
