//! Resolver client handle.

use alloc::vec::Vec;
use core::net::Ipv4Addr;

use smoltcp::iface::SocketHandle;

use crate::stack::StackError;

/// A DNS socket plus its server list. Earlier servers are preferred.
#[derive(Debug)]
pub struct ResolverClient {
    handle: SocketHandle,
    servers: Vec<Ipv4Addr>,
}

impl ResolverClient {
    pub(crate) fn new(handle: SocketHandle) -> Self {
        Self { handle, servers: Vec::new() }
    }

    pub(crate) fn handle(&self) -> SocketHandle {
        self.handle
    }

    pub fn servers(&self) -> &[Ipv4Addr] {
        &self.servers
    }

    pub(crate) fn push_server(&mut self, server: Ipv4Addr) -> Result<(), StackError> {
        if self.servers.contains(&server) {
            return Err(StackError::DuplicateServer(server));
        }
        self.servers.push(server);
        Ok(())
    }
}
