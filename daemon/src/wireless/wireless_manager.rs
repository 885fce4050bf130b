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

use crate::devices::chip::ChipIdentifier;
use crate::wireless::{bluetooth, mocked, uwb, wifi, WirelessChipImpl, WirelessError};

/// Parameter for each constructor of wireless chips.
#[allow(clippy::large_enum_variant)]
pub enum CreateParam {
    Bluetooth(bluetooth::CreateParams),
    Wifi(wifi::CreateParams),
    Uwb(uwb::CreateParams),
    Mock(mocked::CreateParams),
}

/// Constructs the wireless chip for a new packet-stream connection.
pub fn add_chip(
    create_param: &CreateParam,
    chip_id: ChipIdentifier,
) -> Result<WirelessChipImpl, WirelessError> {
    match create_param {
        CreateParam::Bluetooth(params) => bluetooth::add_chip(params, chip_id),
        CreateParam::Wifi(params) => Ok(wifi::add_chip(params, chip_id)),
        CreateParam::Uwb(params) => Ok(uwb::add_chip(params, chip_id)),
        CreateParam::Mock(params) => Ok(mocked::add_chip(params, chip_id)),
    }
}
