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

//! Wireless network simulator for emulated devices.
//!
//! Virtual devices open a packet stream, identify a chip, and exchange
//! framed radio packets with the simulated medium.

pub mod args;
pub mod bluetooth;
pub mod config;
pub mod devices;
pub mod events;
pub mod ranging;
pub mod service;
pub mod transport;
pub mod version;
pub mod wireless;
