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

//! Process-wide configuration.
//!
//! Loaded once at startup from an optional JSON file plus command-line
//! overrides; read-only afterwards.

use std::fs;
use std::sync::OnceLock;

use anyhow::Context;
use serde::Deserialize;

static CONFIG: OnceLock<Config> = OnceLock::new();

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Never hand out a freed Bluetooth address again.
    #[serde(default)]
    pub disable_address_reuse: bool,
    /// Coordinate clamp radius in meters.
    #[serde(default = "default_world_radius_m")]
    pub world_radius_m: f32,
    /// Idle grace period before the daemon exits.
    #[serde(default = "default_inactivity_shutdown_seconds")]
    pub inactivity_shutdown_seconds: u64,
    /// Deadline for the StartInfo message on a new stream.
    #[serde(default = "default_attach_timeout_ms")]
    pub attach_timeout_ms: u64,
    /// Poll interval of the idle-shutdown controller.
    #[serde(default = "default_inactivity_check_interval_ms")]
    pub inactivity_check_interval_ms: u64,
    /// Development mode: create built-in test beacons at startup.
    #[serde(default)]
    pub dev: bool,
}

fn default_world_radius_m() -> f32 {
    1000.0
}

fn default_inactivity_shutdown_seconds() -> u64 {
    300
}

fn default_attach_timeout_ms() -> u64 {
    5000
}

fn default_inactivity_check_interval_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            disable_address_reuse: false,
            world_radius_m: default_world_radius_m(),
            inactivity_shutdown_seconds: default_inactivity_shutdown_seconds(),
            attach_timeout_ms: default_attach_timeout_ms(),
            inactivity_check_interval_ms: default_inactivity_check_interval_ms(),
            dev: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Config> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading config file {path}"))?;
        serde_json::from_str(&contents).with_context(|| format!("parsing config file {path}"))
    }
}

/// Installs the configuration. Only the first call takes effect.
pub fn set_config(config: Config) {
    let _ = CONFIG.set(config);
}

/// The process configuration, defaulted when `set_config` never ran.
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.disable_address_reuse);
        assert_eq!(config.world_radius_m, 1000.0);
        assert_eq!(config.inactivity_shutdown_seconds, 300);
        assert_eq!(config.attach_timeout_ms, 5000);
    }

    #[test]
    fn test_parse_partial_json() {
        let config: Config =
            serde_json::from_str(r#"{"world_radius_m": 50.0, "attach_timeout_ms": 100}"#)
                .unwrap();
        assert_eq!(config.world_radius_m, 50.0);
        assert_eq!(config.attach_timeout_ms, 100);
        assert_eq!(config.inactivity_shutdown_seconds, 300);
    }

    #[test]
    fn test_from_missing_file_fails() {
        assert!(Config::from_file("/nonexistent/netsim.json").is_err());
    }
}
