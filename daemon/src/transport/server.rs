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

//! The packet-stream gateway.
//!
//! Each connection on the stream port must open with a StartInfo
//! frame, which binds the stream to one chip for its lifetime. One
//! reader thread per stream pulls frames and hands them to the chip's
//! radio; one writer thread per stream (owned by the dispatcher)
//! carries responses back. Teardown runs exactly once per stream,
//! whichever side closes first.

use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use log::{error, info, warn};

use crate::config::get_config;
use crate::devices::chip::{self, ChipIdentifier};
use crate::devices::device::AddChipResult;
use crate::devices::devices_handler::{add_chip, remove_chip};
use crate::devices::DeviceError;
use crate::transport::codec::{self, CodecError, StreamFrame};
use crate::transport::dispatcher::{
    handle_request, register_transport, unregister_transport, Response,
};
use crate::transport::h4::{is_hci_packet_type, PACKET_TYPE_UNSPECIFIED};
use crate::wireless;
use netsim_model::{ChipKind, StartInfo};

// Inbound HCI frames dropped for a missing or unknown packet type.
static MALFORMED_FRAMES: AtomicU32 = AtomicU32::new(0);

pub fn malformed_frame_count() -> u32 {
    MALFORMED_FRAMES.load(Ordering::SeqCst)
}

struct StreamResponder {
    stream: TcpStream,
}

impl Response for StreamResponder {
    fn response(&mut self, packet: Bytes, packet_type: u8) {
        let frame = if packet_type == PACKET_TYPE_UNSPECIFIED {
            StreamFrame::Packet(packet)
        } else {
            StreamFrame::HciPacket { packet_type, packet }
        };
        if let Err(e) = codec::write_frame(&mut self.stream, &frame) {
            error!("stream write failed: {e}");
        }
    }
}

/// Binds the stream port and starts the accept loop. Returns the
/// bound port (useful with port 0).
pub fn run_stream_server(port: u16) -> std::io::Result<u16> {
    let listener = TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))?;
    let bound_port = listener.local_addr()?.port();
    info!("packet stream server listening on port {bound_port}");
    thread::Builder::new().name("stream_server".to_string()).spawn(move || {
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let attach_timeout = Duration::from_millis(get_config().attach_timeout_ms);
                    let _ = thread::Builder::new()
                        .name("stream_reader".to_string())
                        .spawn(move || handle_stream(stream, attach_timeout));
                }
                Err(e) => warn!("failed to accept stream: {e}"),
            }
        }
    })?;
    Ok(bound_port)
}

/// Builds registry and radio parameters from a StartInfo and attaches
/// the chip.
fn add_chip_from_start_info(
    peer: &str,
    start_info: &StartInfo,
) -> Result<AddChipResult, DeviceError> {
    let chip_info = &start_info.chip;
    let wireless_create_param = match chip_info.kind {
        ChipKind::Bluetooth | ChipKind::BluetoothBeacon => {
            wireless::CreateParam::Bluetooth(wireless::bluetooth::CreateParams {
                address: chip_info.address.clone(),
                controller_properties: chip_info.controller_properties.clone(),
                beacon: chip_info.kind == ChipKind::BluetoothBeacon,
            })
        }
        ChipKind::Wifi => wireless::CreateParam::Wifi(wireless::wifi::CreateParams {}),
        ChipKind::Uwb => wireless::CreateParam::Uwb(wireless::uwb::CreateParams {}),
    };
    let chip_create_params = chip::CreateParams {
        kind: chip_info.kind,
        address: chip_info.address.clone(),
        name: (!chip_info.id.is_empty()).then(|| chip_info.id.clone()),
        manufacturer: chip_info.manufacturer.clone(),
        product_name: chip_info.product_name.clone(),
        controller_properties: chip_info.controller_properties.clone(),
    };
    add_chip(
        peer,
        start_info.device_guid(),
        &start_info.name,
        &chip_create_params,
        &wireless_create_param,
    )
}

fn read_start_info(
    stream: &mut TcpStream,
    attach_timeout: Duration,
) -> Result<StartInfo, String> {
    stream.set_read_timeout(Some(attach_timeout)).map_err(|e| e.to_string())?;
    let frame = codec::read_frame(stream).map_err(|e| match e {
        CodecError::Io(e)
            if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
        {
            "timed out waiting for start info".to_string()
        }
        e => e.to_string(),
    })?;
    stream.set_read_timeout(None).map_err(|e| e.to_string())?;
    match frame {
        StreamFrame::StartInfo(start_info) => Ok(start_info),
        _ => Err("first frame must be start info".to_string()),
    }
}

/// Runs the reader side of one stream from StartInfo to teardown.
pub(crate) fn handle_stream(mut stream: TcpStream, attach_timeout: Duration) {
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or("unknown".to_string());
    info!("new packet stream for peer {peer}");

    // START: the peer has until the attach deadline to identify a
    // chip; anything else rejects the stream.
    let start_info = match read_start_info(&mut stream, attach_timeout) {
        Ok(start_info) => start_info,
        Err(message) => {
            warn!("rejecting stream from {peer}: {message}");
            let _ = codec::write_frame(&mut stream, &StreamFrame::Error(message));
            return;
        }
    };
    let chip_kind = start_info.chip.kind;
    let result = match add_chip_from_start_info(&peer, &start_info) {
        Ok(result) => result,
        Err(e) => {
            warn!("rejecting stream from {peer}: {e}");
            let _ = codec::write_frame(&mut stream, &StreamFrame::Error(e.to_string()));
            return;
        }
    };

    // ATTACHED: responses flow through the dispatcher's writer
    // thread, requests through this reader.
    let error_message = match stream.try_clone() {
        Ok(writer_stream) => {
            register_transport(result.chip_id, Box::new(StreamResponder { stream: writer_stream }));
            let error_message = reader_loop(&mut stream, result.chip_id, chip_kind);
            // CLOSING: joins the writer first so the trailing error
            // frame below cannot interleave with a response.
            unregister_transport(result.chip_id);
            error_message
        }
        Err(e) => Some(format!("failed to clone stream: {e}")),
    };
    if let Some(message) = error_message {
        let _ = codec::write_frame(&mut stream, &StreamFrame::Error(message));
    }
    if let Err(e) = remove_chip(result.device_id, result.chip_id) {
        warn!("failed to remove chip: {e}");
    }
    info!("closed packet stream for peer {peer}");
}

/// Reads frames until the stream ends. Returns the fatal error to
/// report to the peer, if any.
fn reader_loop(
    stream: &mut TcpStream,
    chip_id: ChipIdentifier,
    chip_kind: ChipKind,
) -> Option<String> {
    loop {
        match codec::read_frame(stream) {
            Ok(StreamFrame::HciPacket { packet_type, packet })
                if matches!(chip_kind, ChipKind::Bluetooth | ChipKind::BluetoothBeacon) =>
            {
                if !is_hci_packet_type(packet_type) {
                    MALFORMED_FRAMES.fetch_add(1, Ordering::SeqCst);
                    warn!("dropping hci frame with packet type {packet_type} for chip {chip_id}");
                    continue;
                }
                handle_request(chip_id, &packet, packet_type);
            }
            Ok(StreamFrame::Packet(packet))
                if matches!(chip_kind, ChipKind::Wifi | ChipKind::Uwb) =>
            {
                handle_request(chip_id, &packet, PACKET_TYPE_UNSPECIFIED);
            }
            Ok(frame) => {
                let message =
                    format!("bad request: unexpected frame for {chip_kind} chip {chip_id}");
                warn!("{message}: {frame:?}");
                return Some(message);
            }
            Err(CodecError::Malformed(message)) => {
                warn!("bad request on stream for chip {chip_id}: {message}");
                return Some(format!("bad request: {message}"));
            }
            Err(CodecError::Io(e)) => {
                if e.kind() == ErrorKind::UnexpectedEof {
                    info!("peer closed stream for chip {chip_id}");
                } else {
                    warn!("stream read failed for chip {chip_id}: {e}");
                }
                return None;
            }
        }
    }
}
