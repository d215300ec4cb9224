//! Pluggable byte transport between the node and its agent.

mod udp;

pub use udp::{StackUdpTransport, DEFAULT_LOCAL_PORT};

use std::net::{Ipv4Addr, SocketAddrV4};

use crate::error::TransportError;

/// Where the agent listens. Set once before the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    pub agent: SocketAddrV4,
}

impl TransportConfig {
    pub const fn new(agent: SocketAddrV4) -> Self {
        Self { agent }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 8888))
    }
}

/// Datagram-style transport. One frame per `write`; one frame per `read`.
///
/// Used from a single thread only.
pub trait Transport {
    fn open(&mut self, config: &TransportConfig) -> Result<(), TransportError>;

    fn close(&mut self) -> Result<(), TransportError>;

    /// Send `buf`, waiting at most `timeout_ms` for room.
    fn write(&mut self, buf: &[u8], timeout_ms: u64) -> Result<usize, TransportError>;

    /// Receive one frame into `buf`. `Ok(0)` means nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, config: &TransportConfig) -> Result<(), TransportError> {
        (**self).open(config)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn write(&mut self, buf: &[u8], timeout_ms: u64) -> Result<usize, TransportError> {
        (**self).write(buf, timeout_ms)
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        (**self).read(buf, timeout_ms)
    }
}
