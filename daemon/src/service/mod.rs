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

//! Startup, run loop, and shutdown for the netsim daemon.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

use crate::bluetooth::engine;
use crate::config::get_config;
use crate::devices::chip;
use crate::devices::devices_handler::{self, DeviceManager};
use crate::events::{Event, Events};
use crate::transport::dispatcher;
use crate::transport::server::run_stream_server;
use crate::wireless;
use netsim_common::util::ini_file::{create_ini, remove_ini};
use netsim_model::ChipKind;

pub struct ServiceParams {
    pub port: u16,
    pub instance: u16,
    pub no_shutdown: bool,
    pub dev: bool,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unable to bind stream port: {0}")]
    PortBind(std::io::Error),
}

pub struct Service {
    service_params: ServiceParams,
    events: Arc<Events>,
}

impl Service {
    pub fn new(service_params: ServiceParams, events: Arc<Events>) -> Service {
        Service { service_params, events }
    }

    /// Builds the process-wide resources in dependency order: the
    /// registry first, then the radio engine wired to the dispatcher
    /// and the registry's distance function.
    pub fn set_up(&self) {
        DeviceManager::init(self.events.clone());
        engine::init(dispatcher::send_response, devices_handler::get_distance);
    }

    /// Runs the daemon until the idle-shutdown controller or an
    /// external ShutDown event stops it.
    pub fn run(&self) -> Result<(), ServiceError> {
        let port = run_stream_server(self.service_params.port).map_err(ServiceError::PortBind)?;
        if let Err(e) = create_ini(self.service_params.instance, port) {
            warn!("failed to write discovery file: {e:#}");
        }

        if self.service_params.dev {
            new_test_beacon(0);
            new_test_beacon(1);
        }

        let events_rx = self.events.subscribe();
        let tick = Duration::from_millis(get_config().inactivity_check_interval_ms);
        loop {
            std::thread::sleep(tick);
            let mut shutdown_reason = None;
            while let Ok(event) = events_rx.try_recv() {
                if let Event::ShutDown { reason } = event {
                    shutdown_reason = Some(reason);
                }
            }
            if shutdown_reason.is_none()
                && !self.service_params.no_shutdown
                && devices_handler::is_shutdown_time()
            {
                let reason = format!(
                    "no devices attached for {}s",
                    get_config().inactivity_shutdown_seconds
                );
                self.events.publish(Event::ShutDown { reason: reason.clone() });
                shutdown_reason = Some(reason);
            }
            if let Some(reason) = shutdown_reason {
                info!("netsimd shutting down: {reason}");
                break;
            }
        }
        self.shut_down();
        Ok(())
    }

    /// Stops the radio engine and removes the discovery file. Safe to
    /// call more than once.
    pub fn shut_down(&self) {
        if let Some(engine) = engine::get_engine() {
            engine.shutdown();
        }
        if let Err(e) = remove_ini(self.service_params.instance) {
            warn!("failed to remove discovery file: {e:#}");
        }
    }
}

/// Creates a built-in beacon device for development mode.
pub fn new_test_beacon(idx: u32) {
    let device_name = format!("beacon-device-{idx}");
    let chip_create_params = chip::CreateParams {
        kind: ChipKind::BluetoothBeacon,
        address: format!("be:ac:01:be:ef:{idx:02x}"),
        name: Some(format!("beacon-{idx}")),
        manufacturer: "netsim".to_string(),
        product_name: "test beacon".to_string(),
        controller_properties: None,
    };
    let wireless_create_param =
        wireless::CreateParam::Bluetooth(wireless::bluetooth::CreateParams {
            address: chip_create_params.address.clone(),
            controller_properties: None,
            beacon: true,
        });
    if let Err(e) = devices_handler::add_chip(
        "builtin",
        &device_name,
        &device_name,
        &chip_create_params,
        &wireless_create_param,
    ) {
        warn!("failed to create test beacon {idx}: {e}");
    }
}
