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

use clap::Parser;

#[derive(Debug, Parser)]
pub struct NetsimdArgs {
    /// Port for the packet stream server. 0 binds an ephemeral port
    /// published through the discovery file.
    #[arg(short, long, default_value_t = 0)]
    pub port: u16,

    /// Instance number when running multiple simulators on one host.
    #[arg(short, long, default_value_t = 1)]
    pub instance: u16,

    /// Path to a JSON configuration file.
    #[arg(long)]
    pub config: Option<String>,

    /// Keep the daemon alive with no devices attached.
    #[arg(long)]
    pub no_shutdown: bool,

    /// Enable development mode (creates built-in test beacons).
    #[arg(short, long)]
    pub dev: bool,

    /// Raise the default log level to debug.
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the version and exit.
    #[arg(long)]
    pub version: bool,
}
