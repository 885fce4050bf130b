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

//! netsimd: the wireless network simulator daemon.

use clap::Parser;
use log::{error, info};

use netsim_common::util::netsim_logger;
use netsim_daemon::args::NetsimdArgs;
use netsim_daemon::config::{set_config, Config};
use netsim_daemon::events::Events;
use netsim_daemon::service::{Service, ServiceError, ServiceParams};
use netsim_daemon::version::get_version;

fn main() {
    let args = NetsimdArgs::parse();
    if args.version {
        println!("netsimd version: {}", get_version());
        return;
    }
    netsim_logger::init("netsimd", args.verbose);
    info!("{args:#?}");

    let mut config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load configuration: {e:#}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    config.dev = config.dev || args.dev;
    let dev = config.dev;
    set_config(config);

    let events = Events::new();
    let service = Service::new(
        ServiceParams {
            port: args.port,
            instance: args.instance,
            no_shutdown: args.no_shutdown,
            dev,
        },
        events,
    );
    service.set_up();
    match service.run() {
        Ok(()) => std::process::exit(0),
        Err(e @ ServiceError::PortBind(_)) => {
            error!("failed to run netsimd: {e}");
            std::process::exit(2);
        }
    }
}
