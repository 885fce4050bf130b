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

//! The device registry: devices, their chips, and the frontend
//! operations over them.

pub mod chip;
pub mod device;
pub mod devices_handler;
pub mod id_factory;

use thiserror::Error;

/// Error surface of the registry, mapped by callers onto the wire or
/// the frontend API.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("multiple ambiguous matches were found with substring {0}")]
    Ambiguous(String),
    #[error("duplicate chip {chip} on device {device}")]
    DuplicateChip { device: String, chip: String },
    #[error("closed: {0}")]
    Closed(String),
}
