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

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use netsim_model::{ChipPatch, Orientation, PatchDeviceFields, Position, RadioStats};

use crate::devices::chip::{Chip, ChipIdentifier, CreateParams};
use crate::devices::DeviceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceIdentifier(pub u32);

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct AddChipResult {
    pub device_id: DeviceIdentifier,
    pub chip_id: ChipIdentifier,
}

/// A logical host owning one or more chips.
///
/// Fields are individually locked so reads and patches work through a
/// shared reference while the registry map holds the device.
pub struct Device {
    pub id: DeviceIdentifier,
    pub guid: String,
    pub name: String,
    pub builtin: bool,
    pub visible: AtomicBool,
    pub position: RwLock<Position>,
    pub orientation: RwLock<Orientation>,
    pub chips: RwLock<BTreeMap<ChipIdentifier, Arc<Chip>>>,
}

impl Device {
    pub fn new(id: DeviceIdentifier, guid: &str, name: &str, builtin: bool) -> Self {
        Device {
            id,
            guid: guid.to_string(),
            name: name.to_string(),
            builtin,
            visible: AtomicBool::new(true),
            position: RwLock::new(Position::default()),
            orientation: RwLock::new(Orientation::default()),
            chips: RwLock::new(BTreeMap::new()),
        }
    }

    /// Snapshot for the frontend list API.
    pub fn get(&self) -> netsim_model::Device {
        netsim_model::Device {
            id: self.id.0,
            name: self.name.clone(),
            visible: self.visible.load(Ordering::SeqCst),
            position: *self.position.read().unwrap(),
            orientation: *self.orientation.read().unwrap(),
            chips: self.chips.read().unwrap().values().map(|chip| chip.get()).collect(),
        }
    }

    /// True when a chip with the same kind, name, and address already
    /// exists on this device.
    pub fn has_chip_conflict(&self, create_params: &CreateParams) -> bool {
        self.chips.read().unwrap().values().any(|chip| {
            chip.kind == create_params.kind
                && create_params.name.as_deref() == Some(&chip.name)
                && chip.address == create_params.address
        })
    }

    /// Inserts a chip, failing on a duplicate `(kind, name, address)`.
    pub fn add_chip(&self, chip: Arc<Chip>) -> Result<(), DeviceError> {
        let mut chips = self.chips.write().unwrap();
        let conflict = chips.values().any(|existing| {
            existing.kind == chip.kind
                && existing.name == chip.name
                && existing.address == chip.address
        });
        if conflict {
            return Err(DeviceError::DuplicateChip {
                device: self.name.clone(),
                chip: chip.name.clone(),
            });
        }
        chips.insert(chip.id, chip);
        Ok(())
    }

    /// Removes a chip and returns its final radio stats.
    pub fn remove_chip(&self, chip_id: &ChipIdentifier) -> Result<Vec<RadioStats>, DeviceError> {
        let mut chips = self.chips.write().unwrap();
        let chip = chips
            .remove(chip_id)
            .ok_or(DeviceError::NotFound(format!("chip {chip_id} on device {}", self.name)))?;
        Ok(chip.get_stats())
    }

    /// Checks a patch without mutating anything, so a failed call
    /// leaves no partial state behind.
    pub fn validate_patch(&self, patch: &PatchDeviceFields) -> Result<(), DeviceError> {
        if let Some(position) = &patch.position {
            if !position.is_finite() {
                return Err(DeviceError::BadRequest(format!(
                    "position {position} is not finite"
                )));
            }
        }
        if let Some(orientation) = &patch.orientation {
            if !orientation.is_finite() {
                return Err(DeviceError::BadRequest(format!(
                    "orientation {orientation} is not finite"
                )));
            }
        }
        for chip_patch in &patch.chips {
            self.match_target_chip(chip_patch)?;
        }
        Ok(())
    }

    /// Applies a patch previously accepted by `validate_patch`.
    pub fn apply_patch(&self, patch: &PatchDeviceFields, world_radius: f32) {
        if let Some(visible) = patch.visible {
            self.visible.store(visible, Ordering::SeqCst);
        }
        if let Some(position) = &patch.position {
            *self.position.write().unwrap() = position.clamped(world_radius);
        }
        if let Some(orientation) = &patch.orientation {
            *self.orientation.write().unwrap() = *orientation;
        }
        for chip_patch in &patch.chips {
            // Validated above; a concurrent removal loses the patch.
            if let Ok(chip) = self.match_target_chip(chip_patch) {
                chip.patch(chip_patch);
            }
        }
    }

    /// Resolves the chip a patch addresses: an exact name match wins
    /// over a unique substring match.
    fn match_target_chip(&self, chip_patch: &ChipPatch) -> Result<Arc<Chip>, DeviceError> {
        let Some(kind) = chip_patch.target_kind() else {
            return Err(DeviceError::BadRequest(format!(
                "chip patch for device {} names no chip kind",
                self.name
            )));
        };
        let chips = self.chips.read().unwrap();
        let mut target: Option<&Arc<Chip>> = None;
        let mut multiple_matches = false;
        for chip in chips.values() {
            if chip.kind != kind || !chip.name.contains(&chip_patch.name) {
                continue;
            }
            if chip.name == chip_patch.name {
                return Ok(Arc::clone(chip));
            }
            if target.is_none() {
                target = Some(chip);
            } else if chip_patch.name.is_empty() {
                return Err(DeviceError::BadRequest(format!(
                    "no chip name supplied but multiple {kind} chips exist on device {}",
                    self.name
                )));
            } else {
                multiple_matches = true;
            }
        }
        if multiple_matches {
            return Err(DeviceError::Ambiguous(chip_patch.name.clone()));
        }
        target.cloned().ok_or(DeviceError::NotFound(format!(
            "chip {} not found in device {}",
            chip_patch.name, self.name
        )))
    }

    /// Returns the device to defaults and resets every chip radio.
    pub fn reset(&self) {
        self.visible.store(true, Ordering::SeqCst);
        *self.position.write().unwrap() = Position::default();
        *self.orientation.write().unwrap() = Orientation::default();
        for chip in self.chips.read().unwrap().values() {
            chip.reset();
        }
    }
}
