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

//! Free-space ranging model.

use glam::Vec3;
use netsim_model::Position;

/// Path-loss exponent for free space.
const PATH_LOSS_EXPONENT: f32 = 2.0;

/// Reference distance in meters below which no further gain is
/// modeled.
const REFERENCE_DISTANCE_M: f32 = 1.0;

const RSSI_FLOOR: f32 = -127.0;
const RSSI_CEILING: f32 = 20.0;

fn to_vec3(position: &Position) -> Vec3 {
    Vec3::new(position.x, position.y, position.z)
}

/// Euclidean distance between two positions, in meters.
pub fn distance(a: &Position, b: &Position) -> f32 {
    to_vec3(a).distance(to_vec3(b))
}

/// Path loss in dB over `distance` meters of free space.
///
/// `10 · n · log10(d)` with the distance clamped to the reference
/// distance, so the loss is never negative.
pub fn path_loss(distance: f32) -> f32 {
    let d = distance.max(REFERENCE_DISTANCE_M);
    (10.0 * PATH_LOSS_EXPONENT * d.log10()).max(0.0)
}

/// RSSI measured at `distance` meters from a transmitter at
/// `tx_power` dBm, clamped to [-127, 20].
pub fn distance_to_rssi(tx_power: i8, distance: f32) -> i8 {
    (tx_power as f32 - path_loss(distance)).clamp(RSSI_FLOOR, RSSI_CEILING) as i8
}
