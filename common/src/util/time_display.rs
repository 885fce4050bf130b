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

//! Timestamp rendering for log lines.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Timelike, Utc};

/// Display of a moment in time, split into whole seconds and
/// nanosecond remainder since `UNIX_EPOCH`.
pub struct TimeDisplay {
    secs: i64,
    nsecs: u32,
}

impl TimeDisplay {
    pub fn new(secs: i64, nsecs: u32) -> TimeDisplay {
        TimeDisplay { secs, nsecs }
    }

    /// Renders the time of day in UTC as `HH:MM:SS.mmm`.
    pub fn utc_display_hms(&self) -> String {
        match DateTime::<Utc>::from_timestamp(self.secs, self.nsecs) {
            Some(utc) => format!(
                "{:02}:{:02}:{:02}.{:03}",
                utc.hour(),
                utc.minute(),
                utc.second(),
                self.nsecs / 1_000_000
            ),
            None => "INVALID-TIMESTAMP".to_string(),
        }
    }
}

/// The current time of day, formatted for a log line.
pub fn log_current_time() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    TimeDisplay::new(now.as_secs() as i64, now.subsec_nanos()).utc_display_hms()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch() {
        let display = TimeDisplay::new(0, 0);
        assert_eq!(display.utc_display_hms(), "00:00:00.000");
    }

    #[test]
    fn test_subsecond_millis() {
        let display = TimeDisplay::new(3661, 250_000_000);
        assert_eq!(display.utc_display_hms(), "01:01:01.250");
    }

    #[test]
    fn test_invalid_timestamp() {
        let display = TimeDisplay::new(i64::MAX, 0);
        assert_eq!(display.utc_display_hms(), "INVALID-TIMESTAMP");
    }
}
