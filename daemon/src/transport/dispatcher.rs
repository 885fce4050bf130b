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

//! Per-chip packet plumbing between the gateway and the radio
//! backends.
//!
//! Outgoing traffic for a stream goes through one queue drained by a
//! single writer thread, so the peer sees responses in push order and
//! no two threads ever write the stream concurrently. Requests from
//! the peer fan in to the chip's wireless adaptor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use log::{info, warn};

use crate::devices::chip::{self, ChipIdentifier};
use crate::transport::h4::PACKET_TYPE_UNSPECIFIED;
use crate::transport::queue::BlockingQueue;
use crate::wireless::WirelessChip;

/// A transport registers a responder for its stream; the writer
/// thread calls it for every outgoing packet.
pub trait Response {
    fn response(&mut self, packet: Bytes, packet_type: u8);
}

struct ResponsePacket {
    packet: Bytes,
    packet_type: u8,
}

struct Transport {
    queue: Arc<BlockingQueue<ResponsePacket>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

struct PacketDispatcher {
    transports: RwLock<HashMap<ChipIdentifier, Arc<Transport>>>,
}

static DISPATCHER: OnceLock<PacketDispatcher> = OnceLock::new();

fn get_dispatcher() -> &'static PacketDispatcher {
    DISPATCHER.get_or_init(|| PacketDispatcher { transports: RwLock::new(HashMap::new()) })
}

/// Installs the responder for a stream and starts its writer thread.
pub fn register_transport(chip_id: ChipIdentifier, mut responder: Box<dyn Response + Send>) {
    let queue = Arc::new(BlockingQueue::new());
    let writer_queue = Arc::clone(&queue);
    let writer = thread::Builder::new()
        .name(format!("transport_writer_{chip_id}"))
        .spawn(move || {
            info!("transport writer started for chip {chip_id}");
            while let Some(ResponsePacket { packet, packet_type }) = writer_queue.wait_and_pop() {
                responder.response(packet, packet_type);
            }
            info!("transport writer finished for chip {chip_id}");
        })
        .ok();
    let transport = Arc::new(Transport { queue, writer: Mutex::new(writer) });
    if get_dispatcher().transports.write().unwrap().insert(chip_id, transport).is_some() {
        warn!("register_transport: replacing transport for chip {chip_id}");
    }
}

/// Cancels the writer and waits for it to exit, so the caller may
/// safely write the stream afterwards. Idempotent.
pub fn unregister_transport(chip_id: ChipIdentifier) {
    let transport = get_dispatcher().transports.write().unwrap().remove(&chip_id);
    if let Some(transport) = transport {
        transport.queue.stop();
        if let Some(writer) = transport.writer.lock().unwrap().take() {
            let _ = writer.join();
        }
    }
}

/// Queues an outgoing packet for the chip's stream. Responses for a
/// chip reach the peer in the order they were pushed.
pub fn send_response(chip_id: ChipIdentifier, packet: Bytes, packet_type: u8) {
    match get_dispatcher().transports.read().unwrap().get(&chip_id) {
        Some(transport) => transport.queue.push(ResponsePacket { packet, packet_type }),
        None => warn!("send_response: no transport for chip {chip_id}"),
    }
}

/// Routes an inbound packet from the peer to the chip's radio.
///
/// For HCI packets the H4 indicator is prepended so the radio sees
/// the full UART framing.
pub fn handle_request(chip_id: ChipIdentifier, packet: &Bytes, packet_type: u8) {
    let request = if packet_type == PACKET_TYPE_UNSPECIFIED {
        packet.clone()
    } else {
        let mut buffer = Vec::with_capacity(1 + packet.len());
        buffer.push(packet_type);
        buffer.extend_from_slice(packet);
        Bytes::from(buffer)
    };
    match chip::get_chip(&chip_id) {
        Some(chip) => chip.wireless_chip.handle_request(&request),
        None => warn!("handle_request: chip {chip_id} not found"),
    }
}
