//! smoltcp integration layer.
//!
//! # Components
//!
//! - [`DeviceAdapter`] - Adapts a [`NetworkDriver`] to smoltcp's `Device`
//!   trait, staging every frame in a [`PacketPool`] slot
//! - [`NetworkStack`] - IP instance with DHCP, DNS and UDP sockets

mod interface;
mod protocols;

pub use interface::{NetworkStack, StackConfig, StackError, ARP_ENTRY_SIZE};
pub(crate) use interface::{from_wire, mask_from_prefix};
pub use protocols::{Protocol, ProtocolSet};

use alloc::sync::Arc;

use packet_pool::{PacketBuf, PacketPool};
use smoltcp::phy::{Device, DeviceCapabilities, Medium, RxToken, TxToken};
use smoltcp::time::Instant;

use crate::device::NetworkDriver;

/// Largest Ethernet frame without FCS.
pub const MAX_FRAME: usize = 1514;

/// Frame counters kept by the adapter.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AdapterStats {
    pub rx_frames: u32,
    pub tx_frames: u32,
    pub rx_dropped: u32,
    pub tx_dropped: u32,
    pub tx_errors: u32,
}

/// Exposes a [`NetworkDriver`] to smoltcp, buffering frames in pool slots.
pub struct DeviceAdapter<D: NetworkDriver> {
    driver: D,
    pool: Arc<PacketPool<'static>>,
    stats: AdapterStats,
}

impl<D: NetworkDriver> DeviceAdapter<D> {
    pub fn new(driver: D, pool: Arc<PacketPool<'static>>) -> Self {
        Self { driver, pool, stats: AdapterStats::default() }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn stats(&self) -> AdapterStats {
        self.stats
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn mtu(&self) -> usize {
        self.pool.slot_size().min(MAX_FRAME)
    }
}

impl<D: NetworkDriver> Device for DeviceAdapter<D> {
    type RxToken<'a> = AdapterRxToken<'a> where Self: 'a;
    type TxToken<'a> = AdapterTxToken<'a, D> where Self: 'a;

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.max_transmission_unit = self.mtu();
        caps.medium = Medium::Ethernet;
        caps
    }

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        let Self { driver, pool, stats } = self;
        let pool: &PacketPool<'static> = pool;

        let mut buf = match pool.allocate() {
            Ok(buf) => buf,
            Err(_) => {
                // No slot to stage into: drain one frame so the driver doesn't stall.
                let mut scratch = [0u8; MAX_FRAME];
                if let Ok(Some(_)) = driver.receive(&mut scratch) {
                    stats.rx_dropped += 1;
                    log::trace!("[NET] RX dropped, pool exhausted");
                }
                return None;
            }
        };

        match driver.receive(buf.payload_mut()) {
            Ok(Some(len)) if len > 0 => {
                if buf.set_len(len).is_err() {
                    stats.rx_dropped += 1;
                    return None;
                }
                stats.rx_frames += 1;
                Some((AdapterRxToken { buf }, AdapterTxToken { driver, pool, stats }))
            }
            Ok(_) => None,
            Err(e) => {
                stats.rx_dropped += 1;
                log::debug!("[NET] RX error: {:?}", e);
                None
            }
        }
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        if !self.driver.can_transmit() {
            return None;
        }
        let Self { driver, pool, stats } = self;
        Some(AdapterTxToken { driver, pool, stats })
    }
}

pub struct AdapterRxToken<'a> {
    buf: PacketBuf<'a>,
}

impl RxToken for AdapterRxToken<'_> {
    fn consume<R, F>(mut self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let len = self.buf.len();
        f(&mut self.buf.payload_mut()[..len])
    }
}

pub struct AdapterTxToken<'a, D: NetworkDriver> {
    driver: &'a mut D,
    pool: &'a PacketPool<'static>,
    stats: &'a mut AdapterStats,
}

impl<D: NetworkDriver> TxToken for AdapterTxToken<'_, D> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut buf = match self.pool.allocate() {
            Ok(buf) if len <= buf.capacity() => buf,
            _ => {
                // smoltcp still expects the closure to run.
                let mut scratch = [0u8; MAX_FRAME];
                let result = f(&mut scratch[..len.min(MAX_FRAME)]);
                self.stats.tx_dropped += 1;
                log::trace!("[NET] TX dropped, no packet for {} bytes", len);
                return result;
            }
        };

        let result = f(&mut buf.payload_mut()[..len]);
        if buf.set_len(len).is_ok() {
            match self.driver.transmit(buf.as_slice()) {
                Ok(()) => self.stats.tx_frames += 1,
                Err(e) => {
                    self.stats.tx_errors += 1;
                    log::debug!("[NET] TX error: {:?}", e);
                }
            }
        }
        result
    }
}
