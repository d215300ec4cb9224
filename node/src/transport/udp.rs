//! UDP transport over the bring-up stack.

use std::net::SocketAddrV4;

use micronode_network::stack::StackError;
use micronode_network::{AddressLease, Clock, NetworkDriver, Ready, SmoltcpBackend};
use smoltcp::iface::SocketHandle;

use super::{Transport, TransportConfig};
use crate::error::TransportError;

pub const DEFAULT_LOCAL_PORT: u16 = 8888;

/// Longest single sleep while waiting on the stack.
const WAIT_SLICE_MS: u64 = 10;

/// Speaks UDP to the agent through a ready network stack.
///
/// The interface is polled while a call waits, so the stack keeps servicing
/// ARP and DHCP renewals between frames.
pub struct StackUdpTransport<D: NetworkDriver, C: Clock> {
    ready: Ready<SmoltcpBackend<D>>,
    clock: C,
    local_port: u16,
    socket: Option<SocketHandle>,
    agent: Option<SocketAddrV4>,
}

impl<D: NetworkDriver, C: Clock> StackUdpTransport<D, C> {
    pub fn new(ready: Ready<SmoltcpBackend<D>>, clock: C, local_port: u16) -> Self {
        Self { ready, clock, local_port, socket: None, agent: None }
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// The lease currently held; follows DHCP renewals.
    pub fn lease(&self) -> &AddressLease {
        self.ready.lease()
    }

    fn endpoint(&self) -> Result<(SocketHandle, SocketAddrV4), TransportError> {
        match (self.socket, self.agent) {
            (Some(socket), Some(agent)) => Ok((socket, agent)),
            _ => Err(TransportError::NotOpen),
        }
    }

    fn pump(&mut self) {
        let now = self.clock.now_ms();
        self.ready.service(now);
    }

    fn pause(&mut self, deadline: u64) {
        let now = self.clock.now_ms();
        let delay = self
            .ready
            .stack_mut()
            .poll_delay(now)
            .unwrap_or(WAIT_SLICE_MS)
            .min(WAIT_SLICE_MS)
            .min(deadline.saturating_sub(now))
            .max(1);
        self.clock.sleep_ms(delay);
    }
}

impl<D: NetworkDriver, C: Clock> Transport for StackUdpTransport<D, C> {
    fn open(&mut self, config: &TransportConfig) -> Result<(), TransportError> {
        if self.socket.is_some() {
            return Err(TransportError::AlreadyOpen);
        }
        let socket = self.ready.stack_mut().udp_open(self.local_port)?;
        self.socket = Some(socket);
        self.agent = Some(config.agent);
        log::info!("[UDP] :{} -> agent {}", self.local_port, config.agent);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let socket = self.socket.take().ok_or(TransportError::NotOpen)?;
        self.agent = None;
        self.ready.stack_mut().udp_close(socket);
        log::info!("[UDP] Socket closed");
        Ok(())
    }

    fn write(&mut self, buf: &[u8], timeout_ms: u64) -> Result<usize, TransportError> {
        let (socket, agent) = self.endpoint()?;
        let deadline = self.clock.now_ms().saturating_add(timeout_ms);

        loop {
            match self.ready.stack_mut().udp_send(socket, buf, agent) {
                Ok(()) => {
                    self.pump();
                    return Ok(buf.len());
                }
                Err(StackError::Send) if self.clock.now_ms() < deadline => {
                    self.pump();
                    self.pause(deadline);
                }
                Err(StackError::Send) => return Err(TransportError::Timeout(timeout_ms)),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u64) -> Result<usize, TransportError> {
        let (socket, agent) = self.endpoint()?;
        let deadline = self.clock.now_ms().saturating_add(timeout_ms);

        loop {
            self.pump();
            loop {
                match self.ready.stack_mut().udp_recv(socket, buf) {
                    Ok(Some((len, from))) if from == agent => return Ok(len),
                    Ok(Some((len, from))) => {
                        log::debug!("[UDP] Dropped {} bytes from {}", len, from);
                    }
                    Ok(None) => break,
                    Err(StackError::Truncated | StackError::Receive) => {
                        log::warn!("[UDP] Dropped datagram larger than {} bytes", buf.len());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            if self.clock.now_ms() >= deadline {
                return Ok(0);
            }
            self.pause(deadline);
        }
    }
}
