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

//! The Bluetooth radio engine.
//!
//! A single executor thread owns every engine-side chip record and
//! linearizes all mutations through its inbox. Two phy layers exist
//! for the lifetime of the engine, BR/EDR first and LE second; phy
//! membership is what radio on/off means. Link-layer sends fan out to
//! the members of one phy with a per-recipient RSSI derived from the
//! registry's distance function.
//!
//! The controller behavior library is an external collaborator; it
//! plugs in behind the `Controller` trait and runs on the executor.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{info, warn};
use thiserror::Error;

use crate::bluetooth::address::{AddressAllocator, BluetoothAddress};
use crate::config::get_config;
use crate::devices::chip::ChipIdentifier;
use crate::devices::id_factory::IdFactory;
use crate::ranging;
use crate::wireless::bluetooth::report_invalid_packet;
use netsim_model::{ControllerProperties, InvalidPacketReason, Radio, RadioState};

pub type RootcanalIdentifier = u32;

/// Soft deadline from enqueue to dispatch for HCI packets.
const HCI_DELIVERY_DEADLINE: Duration = Duration::from_millis(100);

/// The two phy layers, in creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhyKind {
    BrEdr,
    Le,
}

impl PhyKind {
    pub const ALL: [PhyKind; 2] = [PhyKind::BrEdr, PhyKind::Le];

    pub fn index(&self) -> usize {
        match self {
            PhyKind::BrEdr => 0,
            PhyKind::Le => 1,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("unknown chip {0}")]
    UnknownChip(RootcanalIdentifier),
    #[error("radio engine is closed")]
    Closed,
    #[error("bad packet: {0}")]
    BadPacket(String),
}

/// Per-phy counters shared between the engine and the chip's wireless
/// adaptor, so snapshots never block on the executor.
#[derive(Clone, Default)]
#[derive(Debug)]
pub struct PhyStats {
    pub tx_count: Arc<AtomicU32>,
    pub rx_count: Arc<AtomicU32>,
}

impl PhyStats {
    fn reset(&self) {
        self.tx_count.store(0, Ordering::SeqCst);
        self.rx_count.store(0, Ordering::SeqCst);
    }
}

/// What `attach_chip` hands back to the wireless adaptor.
#[derive(Debug)]
pub struct AttachedChip {
    pub rootcanal_id: RootcanalIdentifier,
    pub address: BluetoothAddress,
    pub classic: PhyStats,
    pub low_energy: PhyStats,
}

/// Engine-side view of one chip, used by tests and diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub struct ChipSnapshot {
    pub address: String,
    pub classic: Radio,
    pub low_energy: Radio,
    pub properties: ControllerProperties,
}

/// Link-layer operations a controller may perform while running on
/// the executor.
pub struct LinkOps<'a> {
    state: &'a mut EngineState,
    id: RootcanalIdentifier,
}

impl LinkOps<'_> {
    /// Emits an HCI packet toward the chip's host.
    pub fn send_response(&mut self, packet: Bytes, packet_type: u8) {
        if let Some(device) = self.state.devices.get(&self.id) {
            (self.state.response_callback)(device.chip_id, packet, packet_type);
        }
    }

    /// Transmits a link-layer frame on one phy.
    pub fn send_link_layer(&mut self, phy: PhyKind, packet: &Bytes, tx_power: i8) {
        self.state.send_link_layer(self.id, phy, packet, tx_power);
    }
}

/// Controller behavior seam. Implementations run on the engine
/// executor and therefore need no internal locking.
pub trait Controller: Send {
    /// A validated host-to-controller HCI packet.
    fn handle_hci(&mut self, ops: &mut LinkOps, packet_type: u8, packet: &Bytes);

    /// A link-layer frame received from another chip on `phy`.
    fn receive_link_layer(&mut self, ops: &mut LinkOps, phy: PhyKind, packet: &Bytes, rssi: i8);
}

/// Stand-in controller while the behavior library is external.
pub struct NullController;

impl Controller for NullController {
    fn handle_hci(&mut self, _ops: &mut LinkOps, _packet_type: u8, _packet: &Bytes) {}
    fn receive_link_layer(
        &mut self,
        _ops: &mut LinkOps,
        _phy: PhyKind,
        _packet: &Bytes,
        _rssi: i8,
    ) {
    }
}

/// Delivers controller-to-host packets; wired to the chip transport.
pub type ResponseCallback = fn(ChipIdentifier, Bytes, u8);

/// Distance between the devices owning two chips; wired to the
/// registry.
pub type DistanceCallback = fn(&ChipIdentifier, &ChipIdentifier) -> f32;

enum EngineCommand {
    AttachChip {
        chip_id: ChipIdentifier,
        address: Option<BluetoothAddress>,
        properties: ControllerProperties,
        controller: Box<dyn Controller>,
        reply: Sender<AttachedChip>,
    },
    DetachChip {
        id: RootcanalIdentifier,
    },
    SetRadioState {
        id: RootcanalIdentifier,
        phy: PhyKind,
        state: RadioState,
    },
    DeliverHci {
        id: RootcanalIdentifier,
        packet_type: u8,
        packet: Bytes,
        enqueued: Instant,
    },
    SendLinkLayer {
        id: RootcanalIdentifier,
        phy: PhyKind,
        packet: Bytes,
        tx_power: i8,
    },
    SnapshotChip {
        id: RootcanalIdentifier,
        reply: Sender<Result<ChipSnapshot, EngineError>>,
    },
    Reset {
        id: RootcanalIdentifier,
    },
    Shutdown,
}

/// Handle to the engine executor. Cheap to clone; all operations are
/// messages on the executor's inbox.
#[derive(Clone)]
pub struct RadioEngine {
    tx: Sender<EngineCommand>,
    closed: Arc<AtomicBool>,
}

impl RadioEngine {
    /// Spawns the executor thread.
    pub fn start(
        response_callback: ResponseCallback,
        distance_callback: DistanceCallback,
    ) -> RadioEngine {
        let (tx, rx) = channel::<EngineCommand>();
        let _ = thread::Builder::new().name("radio_engine".to_string()).spawn(move || {
            let mut state = EngineState {
                devices: BTreeMap::new(),
                phys: [BTreeSet::new(), BTreeSet::new()],
                ids: IdFactory::new(1, 1),
                addresses: AddressAllocator::new(get_config().disable_address_reuse),
                response_callback,
                distance_callback,
            };
            while let Ok(command) = rx.recv() {
                if !state.handle_command(command) {
                    break;
                }
            }
            info!("radio engine executor finished");
        });
        RadioEngine { tx, closed: Arc::new(AtomicBool::new(false)) }
    }

    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }
        self.tx.send(command).map_err(|_| EngineError::Closed)
    }

    /// Creates an engine device wired to `chip_id`'s transport. Both
    /// supported radios start ON.
    pub fn attach_chip(
        &self,
        chip_id: ChipIdentifier,
        address: Option<BluetoothAddress>,
        properties: ControllerProperties,
        controller: Box<dyn Controller>,
    ) -> Result<AttachedChip, EngineError> {
        let (reply, reply_rx) = channel();
        self.send(EngineCommand::AttachChip { chip_id, address, properties, controller, reply })?;
        reply_rx.recv().map_err(|_| EngineError::Closed)
    }

    pub fn detach_chip(&self, id: RootcanalIdentifier) -> Result<(), EngineError> {
        self.send(EngineCommand::DetachChip { id })
    }

    pub fn set_radio_state(
        &self,
        id: RootcanalIdentifier,
        phy: PhyKind,
        state: RadioState,
    ) -> Result<(), EngineError> {
        self.send(EngineCommand::SetRadioState { id, phy, state })
    }

    /// Queues a host-to-controller HCI packet for dispatch on the
    /// executor.
    pub fn deliver_hci(
        &self,
        id: RootcanalIdentifier,
        packet_type: u8,
        packet: Bytes,
    ) -> Result<(), EngineError> {
        self.deliver_hci_enqueued(id, packet_type, packet, Instant::now())
    }

    pub(crate) fn deliver_hci_enqueued(
        &self,
        id: RootcanalIdentifier,
        packet_type: u8,
        packet: Bytes,
        enqueued: Instant,
    ) -> Result<(), EngineError> {
        self.send(EngineCommand::DeliverHci { id, packet_type, packet, enqueued })
    }

    /// Transmits a link-layer frame on one phy on behalf of a chip.
    pub fn send_link_layer(
        &self,
        id: RootcanalIdentifier,
        phy: PhyKind,
        packet: Bytes,
        tx_power: i8,
    ) -> Result<(), EngineError> {
        self.send(EngineCommand::SendLinkLayer { id, phy, packet, tx_power })
    }

    /// Blocking snapshot, also usable as a barrier: every command
    /// sent before it has been processed once it returns.
    pub fn snapshot_chip(&self, id: RootcanalIdentifier) -> Result<ChipSnapshot, EngineError> {
        let (reply, reply_rx) = channel();
        self.send(EngineCommand::SnapshotChip { id, reply })?;
        reply_rx.recv().map_err(|_| EngineError::Closed)?
    }

    /// Zeroes counters and turns the supported radios back ON.
    pub fn reset(&self, id: RootcanalIdentifier) -> Result<(), EngineError> {
        self.send(EngineCommand::Reset { id })
    }

    /// Stops the executor. Every subsequent operation returns
    /// `Closed`.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self.tx.send(EngineCommand::Shutdown);
    }
}

struct EngineDevice {
    chip_id: ChipIdentifier,
    address: BluetoothAddress,
    allocated_address: bool,
    properties: ControllerProperties,
    controller: Box<dyn Controller>,
    // Index matches PhyKind::index().
    phy_stats: [PhyStats; 2],
}

impl EngineDevice {
    fn supports(&self, phy: PhyKind) -> bool {
        match phy {
            PhyKind::BrEdr => self.properties.br_supported,
            PhyKind::Le => self.properties.le_supported,
        }
    }
}

struct EngineState {
    devices: BTreeMap<RootcanalIdentifier, EngineDevice>,
    // Membership per phy; index matches PhyKind::index().
    phys: [BTreeSet<RootcanalIdentifier>; 2],
    ids: IdFactory<RootcanalIdentifier>,
    addresses: AddressAllocator,
    response_callback: ResponseCallback,
    distance_callback: DistanceCallback,
}

impl EngineState {
    /// Returns false when the executor should stop.
    fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::AttachChip { chip_id, address, properties, controller, reply } => {
                let _ = reply.send(self.attach(chip_id, address, properties, controller));
            }
            EngineCommand::DetachChip { id } => self.detach(id),
            EngineCommand::SetRadioState { id, phy, state } => {
                self.set_radio_state(id, phy, state)
            }
            EngineCommand::DeliverHci { id, packet_type, packet, enqueued } => {
                self.deliver_hci(id, packet_type, &packet, enqueued)
            }
            EngineCommand::SendLinkLayer { id, phy, packet, tx_power } => {
                self.send_link_layer(id, phy, &packet, tx_power)
            }
            EngineCommand::SnapshotChip { id, reply } => {
                let _ = reply.send(self.snapshot(id));
            }
            EngineCommand::Reset { id } => self.reset(id),
            EngineCommand::Shutdown => return false,
        }
        true
    }

    fn attach(
        &mut self,
        chip_id: ChipIdentifier,
        address: Option<BluetoothAddress>,
        properties: ControllerProperties,
        controller: Box<dyn Controller>,
    ) -> AttachedChip {
        let id = self.ids.next_id();
        let (address, allocated_address) = match address {
            Some(address) => (address, false),
            None => (self.addresses.allocate(), true),
        };
        let phy_stats = [PhyStats::default(), PhyStats::default()];
        let device = EngineDevice {
            chip_id,
            address,
            allocated_address,
            properties,
            controller,
            phy_stats: phy_stats.clone(),
        };
        for phy in PhyKind::ALL {
            if device.supports(phy) {
                self.phys[phy.index()].insert(id);
            }
        }
        self.devices.insert(id, device);
        info!("bluetooth chip attached: rootcanal_id {id} chip_id {chip_id} address {address}");
        AttachedChip {
            rootcanal_id: id,
            address,
            classic: phy_stats[PhyKind::BrEdr.index()].clone(),
            low_energy: phy_stats[PhyKind::Le.index()].clone(),
        }
    }

    fn detach(&mut self, id: RootcanalIdentifier) {
        for phy in &mut self.phys {
            phy.remove(&id);
        }
        match self.devices.remove(&id) {
            Some(device) => {
                if device.allocated_address {
                    self.addresses.release(device.address);
                }
                info!("bluetooth chip detached: rootcanal_id {id}");
            }
            None => warn!("detach: {}", EngineError::UnknownChip(id)),
        }
    }

    fn set_radio_state(&mut self, id: RootcanalIdentifier, phy: PhyKind, state: RadioState) {
        let Some(device) = self.devices.get(&id) else {
            warn!("set_radio_state: {}", EngineError::UnknownChip(id));
            return;
        };
        match state {
            RadioState::On => {
                if device.supports(phy) {
                    self.phys[phy.index()].insert(id);
                } else {
                    warn!("set_radio_state: chip {id} does not support {phy:?}");
                }
            }
            RadioState::Off => {
                self.phys[phy.index()].remove(&id);
            }
            RadioState::Unknown => {}
        }
    }

    fn deliver_hci(
        &mut self,
        id: RootcanalIdentifier,
        packet_type: u8,
        packet: &Bytes,
        enqueued: Instant,
    ) {
        let Some(device) = self.devices.get(&id) else {
            warn!("deliver_hci: {}", EngineError::UnknownChip(id));
            return;
        };
        let chip_id = device.chip_id;
        let queued = enqueued.elapsed();
        if queued > HCI_DELIVERY_DEADLINE {
            warn!("DELAYED hci packet for chip {chip_id}: queued {} ms", queued.as_millis());
            report_invalid_packet(
                chip_id,
                InvalidPacketReason::Delayed,
                format!("hci packet queued {} ms", queued.as_millis()),
                packet.to_vec(),
            );
        }
        if let Err(e) = crate::transport::h4::validate_hci_buffer(packet_type, packet) {
            let bad_packet = EngineError::BadPacket(e.to_string());
            warn!("deliver_hci: {bad_packet} for chip {chip_id}");
            report_invalid_packet(
                chip_id,
                InvalidPacketReason::ParseError,
                bad_packet.to_string(),
                packet.to_vec(),
            );
            return;
        }
        self.with_controller(id, |controller, ops| {
            controller.handle_hci(ops, packet_type, packet)
        });
    }

    fn send_link_layer(
        &mut self,
        sender: RootcanalIdentifier,
        phy: PhyKind,
        packet: &Bytes,
        tx_power: i8,
    ) {
        let Some(device) = self.devices.get(&sender) else {
            warn!("send_link_layer: {}", EngineError::UnknownChip(sender));
            return;
        };
        // A chip whose radio is OFF is not a member of the phy and
        // must not transmit on it.
        if !self.phys[phy.index()].contains(&sender) {
            return;
        }
        device.phy_stats[phy.index()].tx_count.fetch_add(1, Ordering::SeqCst);
        let sender_chip_id = device.chip_id;

        // Recipient set is fixed at entry.
        let recipients: Vec<RootcanalIdentifier> =
            self.phys[phy.index()].iter().copied().filter(|id| *id != sender).collect();
        for recipient_id in recipients {
            let Some(recipient) = self.devices.get(&recipient_id) else {
                continue;
            };
            let distance = (self.distance_callback)(&sender_chip_id, &recipient.chip_id);
            let rssi = ranging::distance_to_rssi(tx_power, distance);
            recipient.phy_stats[phy.index()].rx_count.fetch_add(1, Ordering::SeqCst);
            self.with_controller(recipient_id, |controller, ops| {
                controller.receive_link_layer(ops, phy, packet, rssi)
            });
        }
    }

    fn snapshot(&self, id: RootcanalIdentifier) -> Result<ChipSnapshot, EngineError> {
        let device = self.devices.get(&id).ok_or(EngineError::UnknownChip(id))?;
        let radio = |phy: PhyKind| Radio {
            state: if self.phys[phy.index()].contains(&id) {
                RadioState::On
            } else {
                RadioState::Off
            },
            tx_count: device.phy_stats[phy.index()].tx_count.load(Ordering::SeqCst),
            rx_count: device.phy_stats[phy.index()].rx_count.load(Ordering::SeqCst),
        };
        Ok(ChipSnapshot {
            address: device.address.to_string(),
            classic: radio(PhyKind::BrEdr),
            low_energy: radio(PhyKind::Le),
            properties: device.properties.clone(),
        })
    }

    fn reset(&mut self, id: RootcanalIdentifier) {
        let Some(device) = self.devices.get(&id) else {
            warn!("reset: {}", EngineError::UnknownChip(id));
            return;
        };
        for phy in PhyKind::ALL {
            device.phy_stats[phy.index()].reset();
        }
        let supported: Vec<PhyKind> =
            PhyKind::ALL.into_iter().filter(|phy| device.supports(*phy)).collect();
        for phy in supported {
            self.phys[phy.index()].insert(id);
        }
    }

    /// Runs a closure against a chip's controller with the controller
    /// temporarily lifted out of the device table, so it can call
    /// back into the engine through `LinkOps`.
    fn with_controller(
        &mut self,
        id: RootcanalIdentifier,
        f: impl FnOnce(&mut dyn Controller, &mut LinkOps),
    ) {
        let Some(mut controller) = self
            .devices
            .get_mut(&id)
            .map(|device| std::mem::replace(&mut device.controller, Box::new(NullController)))
        else {
            return;
        };
        {
            let mut ops = LinkOps { state: self, id };
            f(controller.as_mut(), &mut ops);
        }
        if let Some(device) = self.devices.get_mut(&id) {
            device.controller = controller;
        }
    }
}

static RADIO_ENGINE: OnceLock<RadioEngine> = OnceLock::new();

/// Starts the process-wide engine on first call and returns its
/// handle.
pub fn init(
    response_callback: ResponseCallback,
    distance_callback: DistanceCallback,
) -> RadioEngine {
    RADIO_ENGINE.get_or_init(|| RadioEngine::start(response_callback, distance_callback)).clone()
}

pub fn get_engine() -> Option<RadioEngine> {
    RADIO_ENGINE.get().cloned()
}
