//! Host packet driver over a Linux TAP device.

use std::io;

use micronode_network::device::{RxError, TxError};
use micronode_network::NetworkDriver;
use smoltcp::phy::{Device, Medium, RxToken, TunTapInterface, TxToken};
use smoltcp::time::Instant;

use crate::config::format_mac;

/// Ethernet frames in and out of a TAP interface.
///
/// The interface must already exist and be up, e.g.
/// `ip tuntap add tap0 mode tap user $USER && ip link set tap0 up`.
pub struct TapDriver {
    iface: TunTapInterface,
    mac: [u8; 6],
}

impl TapDriver {
    pub fn open(name: &str, mac: [u8; 6]) -> io::Result<Self> {
        let iface = TunTapInterface::new(name, Medium::Ethernet)?;
        log::info!("[TAP] Opened {} ({})", name, format_mac(&mac));
        Ok(Self { iface, mac })
    }
}

impl NetworkDriver for TapDriver {
    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn can_transmit(&self) -> bool {
        true
    }

    fn can_receive(&self) -> bool {
        true
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), TxError> {
        let token = self.iface.transmit(Instant::now()).ok_or(TxError::DeviceNotReady)?;
        token.consume(frame.len(), |buf| buf.copy_from_slice(frame));
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, RxError> {
        let Some((rx, _tx)) = self.iface.receive(Instant::now()) else {
            return Ok(None);
        };
        rx.consume(|frame: &mut [u8]| {
            if frame.len() > buffer.len() {
                return Err(RxError::BufferTooSmall { needed: frame.len() });
            }
            buffer[..frame.len()].copy_from_slice(frame);
            Ok(Some(frame.len()))
        })
    }
}
