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
use std::fmt;

/// A 3-D position in meters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32, z: f32) -> Position {
        Position { x, y, z }
    }

    /// All coordinates are finite (no NaN, no infinities).
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Component-wise clamp to `[-radius, radius]`.
    pub fn clamped(&self, radius: f32) -> Position {
        Position {
            x: self.x.clamp(-radius, radius),
            y: self.y.clamp(-radius, radius),
            z: self.z.clamp(-radius, radius),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Orientation as yaw/pitch/roll in degrees.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Orientation {
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub pitch: f32,
    #[serde(default)]
    pub roll: f32,
}

impl Orientation {
    pub fn new(yaw: f32, pitch: f32, roll: f32) -> Orientation {
        Orientation { yaw, pitch, roll }
    }

    pub fn is_finite(&self) -> bool {
        self.yaw.is_finite() && self.pitch.is_finite() && self.roll.is_finite()
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(yaw: {}, pitch: {}, roll: {})", self.yaw, self.pitch, self.roll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_origin() {
        assert_eq!(Position::default(), Position::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_clamped() {
        let p = Position::new(1500.0, -1500.0, 2.0).clamped(1000.0);
        assert_eq!(p, Position::new(1000.0, -1000.0, 2.0));
    }

    #[test]
    fn test_is_finite() {
        assert!(Position::new(1.0, 2.0, 3.0).is_finite());
        assert!(!Position::new(f32::NAN, 0.0, 0.0).is_finite());
        assert!(!Position::new(0.0, f32::INFINITY, 0.0).is_finite());
        assert!(!Orientation::new(0.0, f32::NEG_INFINITY, 0.0).is_finite());
    }

    #[test]
    fn test_position_json() {
        let json = serde_json::to_string(&Position::new(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(json, r#"{"x":1.0,"y":2.0,"z":3.0}"#);
        let partial: Position = serde_json::from_str(r#"{"x":5.0}"#).unwrap();
        assert_eq!(partial, Position::new(5.0, 0.0, 0.0));
    }
}
