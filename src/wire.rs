//! Binary wire format for the chunk transfer protocol.
//!
//! Everything the radio carries is defined here: the fixed 244-byte data
//! packet (device → host), the 13-byte chunk metadata payload, the control
//! commands (host → device), and the length-prefixed frame framing shared
//! by chunk files and reassembled payloads.
//!
//! All multi-byte fields are little-endian. Encoding and decoding are
//! explicit byte-level functions so the layout never depends on compiler
//! struct layout; a golden-layout test pins every field offset.

use crate::error::{PendantError, Result};

/// Total size of one data packet on the wire.
pub const PACKET_SIZE: usize = 244;
/// Bytes of packet framing before the payload.
pub const PACKET_HEADER_SIZE: usize = 15;
/// Payload capacity of one packet.
pub const PAYLOAD_SIZE: usize = PACKET_SIZE - PACKET_HEADER_SIZE;
/// Encoded size of [`ChunkMeta`].
pub const CHUNK_META_SIZE: usize = 13;

/// Packet types carried in the first byte of every data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Chunk metadata; always seq 0 of a chunk.
    ChunkHeader,
    /// Raw chunk payload bytes.
    ChunkData,
    /// Session terminator; no payload.
    UploadDone,
}

impl PacketType {
    fn to_byte(self) -> u8 {
        match self {
            PacketType::ChunkHeader => 0x01,
            PacketType::ChunkData => 0x02,
            PacketType::UploadDone => 0x03,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0x01 => Ok(PacketType::ChunkHeader),
            0x02 => Ok(PacketType::ChunkData),
            0x03 => Ok(PacketType::UploadDone),
            other => Err(PendantError::Protocol {
                message: format!("unknown packet type {:#04x}", other),
            }),
        }
    }
}

/// One fixed-size data packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    /// Timestamp identifying the chunk this packet belongs to.
    pub chunk_ts: u32,
    /// 0-based chunk index within the upload batch.
    pub chunk_idx: u16,
    /// Total chunks announced for the batch.
    pub total_chunks: u16,
    /// 0-based packet sequence within the chunk; the header is seq 0.
    pub seq: u16,
    /// Total packets for the chunk, header included.
    pub total_seqs: u16,
    /// Payload bytes; at most [`PAYLOAD_SIZE`].
    pub payload: Vec<u8>,
}

impl Packet {
    /// Builds a session terminator packet.
    pub fn done() -> Self {
        Self {
            packet_type: PacketType::UploadDone,
            chunk_ts: 0,
            chunk_idx: 0,
            total_chunks: 0,
            seq: 0,
            total_seqs: 0,
            payload: Vec::new(),
        }
    }

    /// Encodes the packet into its fixed 244-byte wire form.
    pub fn encode(&self) -> Result<[u8; PACKET_SIZE]> {
        if self.payload.len() > PAYLOAD_SIZE {
            return Err(PendantError::Protocol {
                message: format!(
                    "payload of {} bytes exceeds capacity of {}",
                    self.payload.len(),
                    PAYLOAD_SIZE
                ),
            });
        }

        let mut buf = [0u8; PACKET_SIZE];
        buf[0] = self.packet_type.to_byte();
        buf[1..5].copy_from_slice(&self.chunk_ts.to_le_bytes());
        buf[5..7].copy_from_slice(&self.chunk_idx.to_le_bytes());
        buf[7..9].copy_from_slice(&self.total_chunks.to_le_bytes());
        buf[9..11].copy_from_slice(&self.seq.to_le_bytes());
        buf[11..13].copy_from_slice(&self.total_seqs.to_le_bytes());
        buf[13..15].copy_from_slice(&(self.payload.len() as u16).to_le_bytes());
        buf[PACKET_HEADER_SIZE..PACKET_HEADER_SIZE + self.payload.len()]
            .copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes a packet from its wire form.
    ///
    /// The slice must be exactly [`PACKET_SIZE`] bytes; anything else is a
    /// protocol error the caller drops and logs.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PACKET_SIZE {
            return Err(PendantError::Protocol {
                message: format!("packet of {} bytes, expected {}", bytes.len(), PACKET_SIZE),
            });
        }

        let packet_type = PacketType::from_byte(bytes[0])?;
        let chunk_ts = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let chunk_idx = u16::from_le_bytes([bytes[5], bytes[6]]);
        let total_chunks = u16::from_le_bytes([bytes[7], bytes[8]]);
        let seq = u16::from_le_bytes([bytes[9], bytes[10]]);
        let total_seqs = u16::from_le_bytes([bytes[11], bytes[12]]);
        let payload_len = u16::from_le_bytes([bytes[13], bytes[14]]) as usize;

        if payload_len > PAYLOAD_SIZE {
            return Err(PendantError::Protocol {
                message: format!("payload_len {} exceeds capacity {}", payload_len, PAYLOAD_SIZE),
            });
        }

        Ok(Self {
            packet_type,
            chunk_ts,
            chunk_idx,
            total_chunks,
            seq,
            total_seqs,
            payload: bytes[PACKET_HEADER_SIZE..PACKET_HEADER_SIZE + payload_len].to_vec(),
        })
    }
}

/// Metadata payload of a chunk header packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkMeta {
    /// Total payload bytes for the chunk.
    pub data_size: u32,
    /// Codec that produced the frames.
    pub codec_id: u8,
    /// Sample rate of the encoded audio in Hz.
    pub sample_rate: u32,
    /// CRC-32/ISO-HDLC over the chunk payload bytes.
    pub checksum: u32,
}

impl ChunkMeta {
    /// Number of data packets needed to carry `data_size` payload bytes.
    pub fn data_packets(&self) -> u16 {
        self.data_size.div_ceil(PAYLOAD_SIZE as u32) as u16
    }

    /// Total packet count for the chunk: header plus data packets.
    pub fn total_seqs(&self) -> u16 {
        1 + self.data_packets()
    }

    /// Encodes the metadata into its 13-byte payload form.
    pub fn encode(&self) -> [u8; CHUNK_META_SIZE] {
        let mut buf = [0u8; CHUNK_META_SIZE];
        buf[0..4].copy_from_slice(&self.data_size.to_le_bytes());
        buf[4] = self.codec_id;
        buf[5..9].copy_from_slice(&self.sample_rate.to_le_bytes());
        buf[9..13].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Decodes metadata from a header packet payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CHUNK_META_SIZE {
            return Err(PendantError::Protocol {
                message: format!(
                    "chunk meta of {} bytes, expected {}",
                    bytes.len(),
                    CHUNK_META_SIZE
                ),
            });
        }
        Ok(Self {
            data_size: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            codec_id: bytes[4],
            sample_rate: u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
            checksum: u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]),
        })
    }
}

/// Control commands written by the host to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    /// Start an upload pass over all stored chunks.
    RequestUpload,
    /// Acknowledge durable receipt of the chunk with this timestamp,
    /// authorizing its deletion on the device.
    AckChunk(u32),
    /// Halt the upload loop at the next packet boundary.
    Abort,
}

impl ControlCommand {
    /// Encodes the command into its wire form (1 or 5 bytes).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            ControlCommand::RequestUpload => vec![0x01],
            ControlCommand::AckChunk(ts) => {
                let mut buf = vec![0x02];
                buf.extend_from_slice(&ts.to_le_bytes());
                buf
            }
            ControlCommand::Abort => vec![0x03],
        }
    }

    /// Decodes a command from a control write.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes.first() {
            Some(0x01) => Ok(ControlCommand::RequestUpload),
            Some(0x02) => {
                if bytes.len() < 5 {
                    return Err(PendantError::Protocol {
                        message: format!("ack command of {} bytes, expected 5", bytes.len()),
                    });
                }
                Ok(ControlCommand::AckChunk(u32::from_le_bytes([
                    bytes[1], bytes[2], bytes[3], bytes[4],
                ])))
            }
            Some(0x03) => Ok(ControlCommand::Abort),
            Some(other) => Err(PendantError::Protocol {
                message: format!("unknown control command {:#04x}", other),
            }),
            None => Err(PendantError::Protocol {
                message: "empty control write".to_string(),
            }),
        }
    }
}

/// Appends one codec frame to a buffer with its 2-byte length prefix.
///
/// Returns false without touching the buffer when the frame length does not
/// fit in the u16 prefix.
pub fn append_frame(buf: &mut Vec<u8>, frame: &[u8]) -> bool {
    if frame.is_empty() || frame.len() > u16::MAX as usize {
        return false;
    }
    buf.extend_from_slice(&(frame.len() as u16).to_le_bytes());
    buf.extend_from_slice(frame);
    true
}

/// Iterator over length-prefixed frames in a chunk payload.
///
/// Yields one `Err` and stops if the payload ends mid-prefix or mid-frame,
/// so a truncated tail loses only itself.
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        if self.pos + 2 > self.data.len() {
            self.failed = true;
            return Some(Err(PendantError::Protocol {
                message: format!("truncated frame length prefix at offset {}", self.pos),
            }));
        }
        let len = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]) as usize;
        let start = self.pos + 2;
        if start + len > self.data.len() {
            self.failed = true;
            return Some(Err(PendantError::Protocol {
                message: format!(
                    "frame of {} bytes at offset {} overruns payload of {}",
                    len,
                    self.pos,
                    self.data.len()
                ),
            }));
        }
        self.pos = start + len;
        Some(Ok(&self.data[start..start + len]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_packet() -> Packet {
        Packet {
            packet_type: PacketType::ChunkData,
            chunk_ts: 0x6554_3322,
            chunk_idx: 3,
            total_chunks: 7,
            seq: 2,
            total_seqs: 5,
            payload: vec![0xAA, 0xBB, 0xCC],
        }
    }

    #[test]
    fn test_packet_roundtrip() {
        let pkt = sample_packet();
        let wire = pkt.encode().unwrap();
        assert_eq!(wire.len(), PACKET_SIZE);
        let decoded = Packet::decode(&wire).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn test_packet_golden_layout() {
        // Pins every field offset; any layout drift breaks wire compat.
        let wire = sample_packet().encode().unwrap();

        assert_eq!(wire[0], 0x02); // type
        assert_eq!(&wire[1..5], &[0x22, 0x33, 0x54, 0x65]); // chunk_ts LE
        assert_eq!(&wire[5..7], &[0x03, 0x00]); // chunk_idx
        assert_eq!(&wire[7..9], &[0x07, 0x00]); // total_chunks
        assert_eq!(&wire[9..11], &[0x02, 0x00]); // seq
        assert_eq!(&wire[11..13], &[0x05, 0x00]); // total_seqs
        assert_eq!(&wire[13..15], &[0x03, 0x00]); // payload_len
        assert_eq!(&wire[15..18], &[0xAA, 0xBB, 0xCC]); // payload
        assert!(wire[18..].iter().all(|&b| b == 0)); // zero padding
    }

    #[test]
    fn test_chunk_meta_golden_layout() {
        let meta = ChunkMeta {
            data_size: 900,
            codec_id: 20,
            sample_rate: 16_000,
            checksum: 0xDEAD_BEEF,
        };
        let buf = meta.encode();
        assert_eq!(&buf[0..4], &[0x84, 0x03, 0x00, 0x00]); // 900 LE
        assert_eq!(buf[4], 20);
        assert_eq!(&buf[5..9], &[0x80, 0x3E, 0x00, 0x00]); // 16000 LE
        assert_eq!(&buf[9..13], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(ChunkMeta::decode(&buf).unwrap(), meta);
    }

    #[test]
    fn test_chunk_meta_packet_counts() {
        // 900 bytes at 229/packet: 229*3 + 213 = four data packets.
        let meta = ChunkMeta {
            data_size: 900,
            codec_id: 1,
            sample_rate: 16_000,
            checksum: 0,
        };
        assert_eq!(meta.data_packets(), 4);
        assert_eq!(meta.total_seqs(), 5);

        let empty = ChunkMeta { data_size: 0, ..meta };
        assert_eq!(empty.data_packets(), 0);
        assert_eq!(empty.total_seqs(), 1);

        let exact = ChunkMeta {
            data_size: PAYLOAD_SIZE as u32 * 2,
            ..meta
        };
        assert_eq!(exact.data_packets(), 2);
    }

    #[test]
    fn test_packet_rejects_wrong_size() {
        assert!(Packet::decode(&[0u8; 100]).is_err());
        assert!(Packet::decode(&[0u8; PACKET_SIZE + 1]).is_err());
        assert!(Packet::decode(&[]).is_err());
    }

    #[test]
    fn test_packet_rejects_unknown_type() {
        let mut wire = sample_packet().encode().unwrap();
        wire[0] = 0x7F;
        assert!(Packet::decode(&wire).is_err());
    }

    #[test]
    fn test_packet_rejects_oversized_payload_len() {
        let mut wire = sample_packet().encode().unwrap();
        wire[13..15].copy_from_slice(&((PAYLOAD_SIZE as u16) + 1).to_le_bytes());
        assert!(Packet::decode(&wire).is_err());
    }

    #[test]
    fn test_packet_rejects_oversized_payload_on_encode() {
        let mut pkt = sample_packet();
        pkt.payload = vec![0; PAYLOAD_SIZE + 1];
        assert!(pkt.encode().is_err());
    }

    #[test]
    fn test_done_packet() {
        let wire = Packet::done().encode().unwrap();
        assert_eq!(wire[0], 0x03);
        assert!(wire[1..].iter().all(|&b| b == 0));
        let decoded = Packet::decode(&wire).unwrap();
        assert_eq!(decoded.packet_type, PacketType::UploadDone);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_control_command_encoding() {
        assert_eq!(ControlCommand::RequestUpload.encode(), vec![0x01]);
        assert_eq!(
            ControlCommand::AckChunk(0x0403_0201).encode(),
            vec![0x02, 0x01, 0x02, 0x03, 0x04]
        );
        assert_eq!(ControlCommand::Abort.encode(), vec![0x03]);
    }

    #[test]
    fn test_control_command_roundtrip() {
        for cmd in [
            ControlCommand::RequestUpload,
            ControlCommand::AckChunk(1_700_000_000),
            ControlCommand::Abort,
        ] {
            let decoded = ControlCommand::decode(&cmd.encode()).unwrap();
            assert_eq!(decoded, cmd);
        }
    }

    #[test]
    fn test_control_command_rejects_bad_input() {
        assert!(ControlCommand::decode(&[]).is_err());
        assert!(ControlCommand::decode(&[0x99]).is_err());
        // ACK needs its 4 timestamp bytes
        assert!(ControlCommand::decode(&[0x02, 0x01, 0x02]).is_err());
    }

    #[test]
    fn test_frame_framing_roundtrip() {
        let mut buf = Vec::new();
        assert!(append_frame(&mut buf, &[1, 2, 3]));
        assert!(append_frame(&mut buf, &[4]));
        assert!(append_frame(&mut buf, &[5, 6]));

        let frames: Vec<_> = FrameReader::new(&buf).collect::<Result<_>>().unwrap();
        assert_eq!(frames, vec![&[1u8, 2, 3][..], &[4][..], &[5, 6][..]]);
    }

    #[test]
    fn test_append_frame_rejects_empty() {
        let mut buf = Vec::new();
        assert!(!append_frame(&mut buf, &[]));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_frame_reader_truncated_body() {
        // Prefix claims 10 bytes but only 2 follow.
        let buf = vec![10, 0, 0xAA, 0xBB];
        let mut reader = FrameReader::new(&buf);
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_frame_reader_truncated_prefix() {
        let mut buf = Vec::new();
        append_frame(&mut buf, &[1, 2]);
        buf.push(0x05); // lone prefix byte
        let mut reader = FrameReader::new(&buf);
        assert_eq!(reader.next().unwrap().unwrap(), &[1, 2]);
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_frame_reader_empty_payload() {
        let mut reader = FrameReader::new(&[]);
        assert!(reader.next().is_none());
    }
}
