//! UDP broadcast helpers

use embassy_net::udp::{PacketMetadata, SendError, UdpSocket};
use embassy_net::{IpAddress, IpEndpoint, Stack};

use smbwatch_core::led::LedEvent;

use crate::channels::notify_led;

/// Socket storage owned by one task
pub struct SocketBuffers<const RX: usize, const TX: usize> {
    rx_meta: [PacketMetadata; 4],
    rx: [u8; RX],
    tx_meta: [PacketMetadata; 4],
    tx: [u8; TX],
}

impl<const RX: usize, const TX: usize> SocketBuffers<RX, TX> {
    pub const fn new() -> Self {
        Self {
            rx_meta: [PacketMetadata::EMPTY; 4],
            rx: [0; RX],
            tx_meta: [PacketMetadata::EMPTY; 4],
            tx: [0; TX],
        }
    }

    /// Socket bound to `port`, or an ephemeral port for 0
    pub fn bind(&mut self, stack: Stack<'static>, port: u16) -> Option<UdpSocket<'_>> {
        let mut socket = UdpSocket::new(stack, &mut self.rx_meta, &mut self.rx, &mut self.tx_meta, &mut self.tx);
        socket.bind(port).ok()?;
        Some(socket)
    }
}

/// Limited broadcast to `port`, flashing the status LED when it goes out
pub async fn broadcast(socket: &UdpSocket<'_>, port: u16, payload: &[u8]) -> Result<(), SendError> {
    let to = IpEndpoint::new(IpAddress::v4(255, 255, 255, 255), port);
    socket.send_to(payload, to).await?;
    notify_led(LedEvent::Transmit);
    Ok(())
}
