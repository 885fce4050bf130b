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

//! Radio adaptors bridging the generic chip to the radio backends.

pub mod bluetooth;
pub mod mocked;
pub mod uwb;
pub mod wifi;
pub mod wireless_chip;
pub mod wireless_manager;

use thiserror::Error;

pub use crate::wireless::wireless_chip::{WirelessChip, WirelessChipImpl};
pub use crate::wireless::wireless_manager::{add_chip, CreateParam};

#[derive(Debug, Error)]
pub enum WirelessError {
    #[error(transparent)]
    Engine(#[from] crate::bluetooth::engine::EngineError),
    #[error("bad address: {0}")]
    BadAddress(String),
}
