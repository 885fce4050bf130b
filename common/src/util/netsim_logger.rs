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

//! Logger for the netsim daemon.
//!
//! Built on the env_logger crate so verbosity stays controllable
//! through the RUST_LOG environment variable.

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;

use env_logger::{Builder, Env};
use log::{Level, Record};

use crate::util::time_display::log_current_time;

/// Initialize logging for the daemon with the given process prefix.
///
/// Format: `prefix LEVEL time file:line - message`.
pub fn init(prefix: &'static str, verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));
    builder.format(move |buf, record| {
        writeln!(
            buf,
            "{} {} {} {}:{} - {}",
            prefix,
            level_to_string(record.level()),
            log_current_time(),
            format_file(record),
            record.line().unwrap_or(0),
            record.args()
        )
    });
    builder.init();
}

/// Initialize logging inside unit tests.
///
/// Safe to call from multiple tests; only the first call installs the
/// logger.
pub fn init_for_test() {
    let mut binding = Builder::from_env(Env::default().default_filter_or("info"));
    let builder = binding.is_test(true);
    builder.format(move |buf, record| {
        writeln!(
            buf,
            "{} {} \t| netsim-test: {}",
            level_to_string(record.level()),
            log_current_time(),
            record.args()
        )
    });
    let _ = builder.try_init();
}

fn format_file<'a>(record: &'a Record<'a>) -> &'a str {
    record
        .file()
        .and_then(|filepath| Path::new(filepath).file_name())
        .unwrap_or(OsStr::new("N/A"))
        .to_str()
        .unwrap_or("N/A")
}

fn level_to_string(level: Level) -> &'static str {
    match level {
        Level::Error => "E",
        Level::Warn => "W",
        Level::Info => "I",
        Level::Debug => "D",
        Level::Trace => "T",
    }
}

#[test]
fn test_init_for_test() {
    init_for_test();
    log::info!("Hello netsim");
}
