//! Resource backends for bring-up.
//!
//! Bring-up never touches the stack directly: every resource is created and
//! deleted through a [`NetBackend`], so the same sequence runs on smoltcp or
//! against a fake that records resource lifetimes.

mod smoltcp_backend;

pub use smoltcp_backend::SmoltcpBackend;

use core::net::Ipv4Addr;

use crate::device::Credentials;
use crate::dhcp::AddressLease;
use crate::error::BackendError;
use crate::stack::{Protocol, StackConfig};

/// Packet pool geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub name: &'static str,
    pub slot_size: usize,
    pub slot_count: usize,
}

impl PoolConfig {
    pub const fn new(name: &'static str) -> Self {
        Self { name, slot_size: 1536, slot_count: 20 }
    }

    /// Backing region size this geometry needs.
    pub const fn region_size(&self) -> usize {
        packet_pool::PacketPool::required_region(self.slot_size, self.slot_count)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new("net-pool")
    }
}

/// Creates and releases the networking resources used by bring-up.
///
/// Every `create_*` has a matching `delete_*`. Deletes take the resource by
/// value, so a resource can't be released twice.
pub trait NetBackend {
    type Pool;
    type Stack;
    type Dhcp;
    type Resolver;

    fn create_pool(&mut self, config: &PoolConfig) -> Result<Self::Pool, BackendError>;
    fn delete_pool(&mut self, pool: Self::Pool) -> Result<(), BackendError>;

    fn create_stack(
        &mut self,
        pool: &Self::Pool,
        config: &StackConfig,
    ) -> Result<Self::Stack, BackendError>;
    fn delete_stack(&mut self, stack: Self::Stack) -> Result<(), BackendError>;

    fn enable_protocol(
        &mut self,
        stack: &mut Self::Stack,
        protocol: Protocol,
    ) -> Result<(), BackendError>;

    fn create_dhcp(&mut self, stack: &mut Self::Stack) -> Result<Self::Dhcp, BackendError>;

    /// Join the link (when credentials are given) and begin discovery.
    fn start_dhcp(
        &mut self,
        stack: &mut Self::Stack,
        dhcp: &mut Self::Dhcp,
        credentials: Option<&Credentials>,
    ) -> Result<(), BackendError>;

    /// Drive the client. Returns the lease once an address is bound.
    fn poll_lease(
        &mut self,
        stack: &mut Self::Stack,
        dhcp: &mut Self::Dhcp,
        now_ms: u64,
    ) -> Option<AddressLease>;

    fn delete_dhcp(&mut self, stack: &mut Self::Stack, dhcp: Self::Dhcp)
        -> Result<(), BackendError>;

    fn create_resolver(&mut self, stack: &mut Self::Stack) -> Result<Self::Resolver, BackendError>;

    fn add_dns_server(
        &mut self,
        stack: &mut Self::Stack,
        resolver: &mut Self::Resolver,
        server: Ipv4Addr,
    ) -> Result<(), BackendError>;

    fn delete_resolver(
        &mut self,
        stack: &mut Self::Stack,
        resolver: Self::Resolver,
    ) -> Result<(), BackendError>;
}
