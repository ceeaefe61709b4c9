//! Transport seams between the device and the host.
//!
//! The real link is a BLE GATT service with a notify characteristic
//! (device → host, data packets) and a write characteristic (host → device,
//! control commands). That radio lives outside this crate; the traits here
//! are the only surface the protocol engines touch. [`loopback`] wires the
//! two sides together in memory for tests and development.

use crate::error::{PendantError, Result};
use crate::wire::{ControlCommand, Packet};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Device-side outbound data channel (notify-style stream).
#[async_trait]
pub trait PacketSink: Send + Sync {
    /// Sends one fixed-size data packet to the host.
    ///
    /// An error means the link is down; the upload loop treats it as a
    /// disconnection and unwinds at the current packet boundary.
    async fn send_packet(&self, packet: &Packet) -> Result<()>;
}

/// Host-side outbound control channel (write-style endpoint).
#[async_trait]
pub trait ControlSink: Send + Sync {
    /// Writes one control command to the device.
    async fn send_control(&self, command: ControlCommand) -> Result<()>;
}

/// Sending half of the device end; cheap to clone into the upload task.
#[derive(Clone)]
pub struct LoopbackPacketTx {
    tx: mpsc::Sender<Vec<u8>>,
}

/// Sending half of the host end; cheap to clone into the session task.
#[derive(Clone)]
pub struct LoopbackControlTx {
    tx: mpsc::Sender<Vec<u8>>,
}

/// Device end of an in-memory link.
pub struct LoopbackDevice {
    pub tx: LoopbackPacketTx,
    /// Raw control writes arriving from the host.
    pub control_rx: mpsc::Receiver<Vec<u8>>,
}

/// Host end of an in-memory link.
pub struct LoopbackHost {
    pub tx: LoopbackControlTx,
    /// Raw data packets arriving from the device.
    pub packet_rx: mpsc::Receiver<Vec<u8>>,
}

/// Creates an in-memory bidirectional link carrying encoded bytes, the same
/// unit the radio carries. Dropping either end makes the peer's sends fail,
/// which models disconnection.
pub fn loopback(capacity: usize) -> (LoopbackDevice, LoopbackHost) {
    let (packet_tx, packet_rx) = mpsc::channel(capacity);
    let (control_tx, control_rx) = mpsc::channel(capacity);
    (
        LoopbackDevice {
            tx: LoopbackPacketTx { tx: packet_tx },
            control_rx,
        },
        LoopbackHost {
            tx: LoopbackControlTx { tx: control_tx },
            packet_rx,
        },
    )
}

#[async_trait]
impl PacketSink for LoopbackPacketTx {
    async fn send_packet(&self, packet: &Packet) -> Result<()> {
        let wire = packet.encode()?;
        self.tx
            .send(wire.to_vec())
            .await
            .map_err(|_| PendantError::Transport {
                message: "host disconnected".to_string(),
            })
    }
}

#[async_trait]
impl PacketSink for LoopbackDevice {
    async fn send_packet(&self, packet: &Packet) -> Result<()> {
        self.tx.send_packet(packet).await
    }
}

#[async_trait]
impl ControlSink for LoopbackControlTx {
    async fn send_control(&self, command: ControlCommand) -> Result<()> {
        self.tx
            .send(command.encode())
            .await
            .map_err(|_| PendantError::Transport {
                message: "device disconnected".to_string(),
            })
    }
}

#[async_trait]
impl ControlSink for LoopbackHost {
    async fn send_control(&self, command: ControlCommand) -> Result<()> {
        self.tx.send_control(command).await
    }
}
