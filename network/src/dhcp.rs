//! DHCP lease model and client handle.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::net::Ipv4Addr;

use smoltcp::iface::SocketHandle;
use smoltcp::socket::dhcpv4;

use crate::stack::{from_wire, mask_from_prefix};

/// Option code: subnet mask.
pub const OPTION_SUBNET_MASK: u8 = 1;
/// Option code: default routers.
pub const OPTION_ROUTER: u8 = 3;
/// Option code: DNS servers.
pub const OPTION_DNS_SERVER: u8 = 6;

/// Handle to a DHCP client socket on a [`NetworkStack`](crate::stack::NetworkStack).
#[derive(Debug)]
pub struct DhcpClient {
    pub(crate) handle: SocketHandle,
}

/// An assigned address plus the options that came with it.
///
/// Options hold raw option bytes keyed by code; address lists are packed
/// 4 bytes per address, as on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressLease {
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    options: BTreeMap<u8, Vec<u8>>,
}

impl AddressLease {
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Self {
        Self { address, prefix_len, options: BTreeMap::new() }
    }

    pub fn with_option(mut self, code: u8, value: &[u8]) -> Self {
        self.options.insert(code, value.to_vec());
        self
    }

    /// Record a list of addresses under `code`. Empty lists are not recorded.
    pub fn with_addresses(self, code: u8, addrs: &[Ipv4Addr]) -> Self {
        if addrs.is_empty() {
            return self;
        }
        let packed: Vec<u8> = addrs.iter().flat_map(|a| a.octets()).collect();
        self.with_option(code, &packed)
    }

    pub(crate) fn from_config(config: &dhcpv4::Config<'_>) -> Self {
        let prefix_len = config.address.prefix_len();
        let dns: Vec<Ipv4Addr> = config.dns_servers.iter().map(|a| from_wire(*a)).collect();
        let routers: Vec<Ipv4Addr> = config.router.map(from_wire).into_iter().collect();

        Self::new(from_wire(config.address.address()), prefix_len)
            .with_option(OPTION_SUBNET_MASK, &mask_from_prefix(prefix_len).octets())
            .with_addresses(OPTION_ROUTER, &routers)
            .with_addresses(OPTION_DNS_SERVER, &dns)
    }

    /// Raw bytes of option `code`.
    pub fn option(&self, code: u8) -> Option<&[u8]> {
        self.options.get(&code).map(Vec::as_slice)
    }

    /// Addresses packed in option `code`, in lease order.
    pub fn addresses(&self, code: u8) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.option(code)
            .unwrap_or(&[])
            .chunks_exact(4)
            .map(|c| Ipv4Addr::new(c[0], c[1], c[2], c[3]))
    }

    /// First DNS server offered.
    pub fn dns_server(&self) -> Option<Ipv4Addr> {
        self.addresses(OPTION_DNS_SERVER).next()
    }

    pub fn router(&self) -> Option<Ipv4Addr> {
        self.addresses(OPTION_ROUTER).next()
    }

    pub fn netmask(&self) -> Ipv4Addr {
        mask_from_prefix(self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dns_option() {
        let lease = AddressLease::new(Ipv4Addr::new(192, 168, 1, 20), 24);
        assert_eq!(lease.dns_server(), None);
        assert_eq!(lease.option(OPTION_DNS_SERVER), None);
    }

    #[test]
    fn test_first_dns_server_wins() {
        let lease = AddressLease::new(Ipv4Addr::new(192, 168, 1, 20), 24).with_addresses(
            OPTION_DNS_SERVER,
            &[Ipv4Addr::new(192, 168, 1, 1), Ipv4Addr::new(8, 8, 8, 8)],
        );
        assert_eq!(lease.dns_server(), Some(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(lease.addresses(OPTION_DNS_SERVER).count(), 2);
        assert_eq!(lease.option(OPTION_DNS_SERVER).map(<[u8]>::len), Some(8));
    }

    #[test]
    fn test_truncated_option_ignores_tail() {
        let lease = AddressLease::new(Ipv4Addr::new(10, 0, 0, 2), 8)
            .with_option(OPTION_DNS_SERVER, &[10, 0, 0, 1, 10, 0]);
        assert_eq!(lease.addresses(OPTION_DNS_SERVER).count(), 1);
    }

    #[test]
    fn test_netmask() {
        let lease = AddressLease::new(Ipv4Addr::new(10, 0, 0, 2), 20);
        assert_eq!(lease.netmask(), Ipv4Addr::new(255, 255, 240, 0));
        assert_eq!(AddressLease::new(Ipv4Addr::UNSPECIFIED, 0).netmask(), Ipv4Addr::UNSPECIFIED);
    }
}
