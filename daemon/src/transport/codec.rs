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

//! Wire framing for packet streams.
//!
//! Every frame is `tag (1 byte) | length (u32 BE) | payload`. The
//! payload of an HCI frame starts with the H4 packet indicator.

use std::io::{Read, Write};

use bytes::Bytes;
use netsim_model::StartInfo;
use thiserror::Error;

const TAG_START_INFO: u8 = 1;
const TAG_HCI_PACKET: u8 = 2;
const TAG_PACKET: u8 = 3;
const TAG_ERROR: u8 = 4;

/// Upper bound on a frame payload. Anything larger is treated as a
/// framing error rather than an allocation request.
const MAX_FRAME_LEN: usize = 1 << 20;

/// One message on a packet stream, either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// First client message identifying device and chip.
    StartInfo(StartInfo),
    /// A Bluetooth HCI packet with its H4 indicator.
    HciPacket { packet_type: u8, packet: Bytes },
    /// A raw payload for WiFi / UWB chips.
    Packet(Bytes),
    /// Server-to-client fatal error.
    Error(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Reads one frame. An I/O error (including EOF) is returned as
/// `CodecError::Io`; anything that parses wrong as `Malformed`.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<StreamFrame, CodecError> {
    let mut header = [0u8; 5];
    reader.read_exact(&mut header)?;
    let tag = header[0];
    let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]) as usize;
    if length > MAX_FRAME_LEN {
        return Err(CodecError::Malformed(format!("frame length {length} exceeds maximum")));
    }
    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;

    match tag {
        TAG_START_INFO => {
            let start_info = serde_json::from_slice::<StartInfo>(&payload)
                .map_err(|e| CodecError::Malformed(format!("start info: {e}")))?;
            Ok(StreamFrame::StartInfo(start_info))
        }
        TAG_HCI_PACKET => {
            let Some((&packet_type, packet)) = payload.split_first() else {
                return Err(CodecError::Malformed("empty hci frame".to_string()));
            };
            Ok(StreamFrame::HciPacket { packet_type, packet: Bytes::copy_from_slice(packet) })
        }
        TAG_PACKET => Ok(StreamFrame::Packet(Bytes::from(payload))),
        TAG_ERROR => {
            let message = String::from_utf8(payload)
                .map_err(|e| CodecError::Malformed(format!("error frame: {e}")))?;
            Ok(StreamFrame::Error(message))
        }
        _ => Err(CodecError::Malformed(format!("unknown frame tag {tag}"))),
    }
}

/// Writes one frame and flushes the writer.
pub fn write_frame<W: Write>(writer: &mut W, frame: &StreamFrame) -> Result<(), CodecError> {
    let (tag, payload): (u8, Vec<u8>) = match frame {
        StreamFrame::StartInfo(start_info) => (
            TAG_START_INFO,
            serde_json::to_vec(start_info)
                .map_err(|e| CodecError::Malformed(format!("start info: {e}")))?,
        ),
        StreamFrame::HciPacket { packet_type, packet } => {
            let mut buffer = Vec::with_capacity(1 + packet.len());
            buffer.push(*packet_type);
            buffer.extend_from_slice(packet);
            (TAG_HCI_PACKET, buffer)
        }
        StreamFrame::Packet(packet) => (TAG_PACKET, packet.to_vec()),
        StreamFrame::Error(message) => (TAG_ERROR, message.clone().into_bytes()),
    };
    if payload.len() > MAX_FRAME_LEN {
        return Err(CodecError::Malformed(format!(
            "frame length {} exceeds maximum",
            payload.len()
        )));
    }
    writer.write_all(&[tag])?;
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsim_model::{ChipInfo, ChipKind};
    use std::io::Cursor;

    fn start_info() -> StartInfo {
        StartInfo {
            name: "emulator-5554".to_string(),
            guid: None,
            chip: ChipInfo {
                kind: ChipKind::Bluetooth,
                id: "bt".to_string(),
                manufacturer: "netsim".to_string(),
                product_name: "emulated bt".to_string(),
                address: String::new(),
                controller_properties: None,
            },
        }
    }

    fn roundtrip(frame: StreamFrame) -> StreamFrame {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &frame).unwrap();
        read_frame(&mut Cursor::new(buffer)).unwrap()
    }

    #[test]
    fn test_start_info_frame() {
        let frame = StreamFrame::StartInfo(start_info());
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn test_hci_frame_keeps_indicator() {
        let frame = StreamFrame::HciPacket {
            packet_type: 1,
            packet: Bytes::from_static(&[0x03, 0x0c, 0x00]),
        };
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn test_raw_and_error_frames() {
        let frame = StreamFrame::Packet(Bytes::from_static(b"radiotap"));
        assert_eq!(roundtrip(frame.clone()), frame);
        let frame = StreamFrame::Error("duplicate chip".to_string());
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn test_unknown_tag_is_malformed() {
        let result = read_frame(&mut Cursor::new(vec![9, 0, 0, 0, 0]));
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_empty_hci_frame_is_malformed() {
        let result = read_frame(&mut Cursor::new(vec![TAG_HCI_PACKET, 0, 0, 0, 0]));
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_oversized_length_is_malformed() {
        let mut buffer = vec![TAG_PACKET];
        buffer.extend_from_slice(&u32::MAX.to_be_bytes());
        let result = read_frame(&mut Cursor::new(buffer));
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_bad_start_info_json_is_malformed() {
        let mut buffer = vec![TAG_START_INFO];
        let payload = b"{\"name\":";
        buffer.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        buffer.extend_from_slice(payload);
        let result = read_frame(&mut Cursor::new(buffer));
        assert!(matches!(result, Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_truncated_frame_is_io_error() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, &StreamFrame::Packet(Bytes::from_static(b"abcdef"))).unwrap();
        buffer.truncate(buffer.len() - 2);
        let result = read_frame(&mut Cursor::new(buffer));
        assert!(matches!(result, Err(CodecError::Io(_))));
    }
}
