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

//! Filesystem locations used by the daemon.

use std::env;
use std::path::PathBuf;

/// Directory for netsim runtime artifacts (discovery file, logs).
///
/// Honors ANDROID_TMP when set, like the emulator tools, otherwise
/// the system temp directory.
pub fn netsimd_temp_dir() -> PathBuf {
    match env::var("ANDROID_TMP") {
        Ok(tmp) if !tmp.is_empty() => PathBuf::from(tmp),
        _ => env::temp_dir(),
    }
}

/// Name of the discovery file for an instance. Instance 0 or 1 is the
/// default instance and uses the unnumbered name.
pub fn discovery_file_name(instance: u16) -> String {
    if instance <= 1 {
        "netsim.ini".to_string()
    } else {
        format!("netsim_{instance}.ini")
    }
}

/// Full path of the discovery file for an instance.
pub fn discovery_file_path(instance: u16) -> PathBuf {
    netsimd_temp_dir().join(discovery_file_name(instance))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_file_name() {
        assert_eq!(discovery_file_name(0), "netsim.ini");
        assert_eq!(discovery_file_name(1), "netsim.ini");
        assert_eq!(discovery_file_name(2), "netsim_2.ini");
    }

    #[test]
    fn test_discovery_file_path_is_under_temp_dir() {
        let path = discovery_file_path(1);
        assert!(path.starts_with(netsimd_temp_dir()));
    }
}
