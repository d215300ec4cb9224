//! IP stack instance built on smoltcp.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use core::net::{Ipv4Addr, SocketAddrV4};

use packet_pool::PacketPool;
use smoltcp::iface::{Config, Interface, SocketHandle, SocketSet};
use smoltcp::socket::dhcpv4::{Event as DhcpEvent, Socket as DhcpSocket};
use smoltcp::config::DNS_MAX_SERVER_COUNT;
use smoltcp::socket::dns::{self, Socket as DnsSocket};
use smoltcp::socket::udp::{self, Socket as UdpSocket};
use smoltcp::time::Instant;
use smoltcp::wire::{
    EthernetAddress, HardwareAddress, IpAddress, IpCidr, IpEndpoint, Ipv4Address,
    Ipv4Cidr,
};

use super::{DeviceAdapter, Protocol, ProtocolSet};
use crate::device::NetworkDriver;
use crate::dhcp::{AddressLease, DhcpClient};
use crate::dns::ResolverClient;

/// Bytes of ARP cache consumed per neighbor entry.
pub const ARP_ENTRY_SIZE: usize = 52;

const UDP_PACKET_SLOTS: usize = 8;
const UDP_BUFFER_BYTES: usize = 4096;

/// Stack-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StackError {
    #[error("{0} not enabled")]
    ProtocolNotEnabled(Protocol),
    #[error("{0} already enabled")]
    AlreadyEnabled(Protocol),
    #[error("ARP cache of {bytes} bytes holds no entries (need {min})")]
    ArpCacheTooSmall { bytes: usize, min: usize },
    #[error("netmask {0} is not contiguous")]
    InvalidNetmask(Ipv4Addr),
    #[error("DNS server {0} already registered")]
    DuplicateServer(Ipv4Addr),
    #[error("datagram larger than the receive buffer")]
    Truncated,
    #[error("UDP port {0} unavailable")]
    Bind(u16),
    #[error("UDP send failed")]
    Send,
    #[error("UDP receive failed")]
    Receive,
}

/// IP instance configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub name: &'static str,
    /// Initial address; unspecified until DHCP assigns one.
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    /// Bytes reserved for the neighbor cache.
    pub arp_cache_bytes: usize,
    /// Override the driver's MAC address.
    pub mac: Option<[u8; 6]>,
}

impl StackConfig {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            address: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::BROADCAST,
            arp_cache_bytes: 512,
            mac: None,
        }
    }

    /// Prefix length of `netmask`, or `None` when it isn't contiguous.
    pub fn prefix_len(&self) -> Option<u8> {
        let mask = u32::from(self.netmask);
        let ones = mask.leading_ones();
        if mask.checked_shl(ones).unwrap_or(0) == 0 {
            Some(ones as u8)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<(), StackError> {
        self.prefix_len().map(|_| ()).ok_or(StackError::InvalidNetmask(self.netmask))
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self::new("ip-0")
    }
}

pub(crate) fn to_wire(addr: Ipv4Addr) -> Ipv4Address {
    Ipv4Address::from_bytes(&addr.octets())
}

pub(crate) fn from_wire(addr: Ipv4Address) -> Ipv4Addr {
    Ipv4Addr::from(addr.0)
}

pub(crate) fn mask_from_prefix(prefix_len: u8) -> Ipv4Addr {
    match prefix_len {
        0 => Ipv4Addr::UNSPECIFIED,
        n => Ipv4Addr::from(u32::MAX << (32 - u32::from(n.min(32)))),
    }
}

/// An IP instance: interface, sockets and device adapter over a shared pool.
pub struct NetworkStack<D: NetworkDriver> {
    name: &'static str,
    iface: Interface,
    sockets: SocketSet<'static>,
    device: DeviceAdapter<D>,
    protocols: ProtocolSet,
    arp_cache_bytes: usize,
}

impl<D: NetworkDriver> NetworkStack<D> {
    /// Create the instance. No protocol is enabled yet.
    pub fn new(driver: D, pool: Arc<PacketPool<'static>>, config: &StackConfig) -> Self {
        let mac = config.mac.unwrap_or_else(|| driver.mac_address());
        let mut device = DeviceAdapter::new(driver, pool);

        let iface_config = Config::new(HardwareAddress::Ethernet(EthernetAddress(mac)));
        let mut iface = Interface::new(iface_config, &mut device, Instant::ZERO);

        if !config.address.is_unspecified() {
            let prefix = config.prefix_len().unwrap_or(32);
            let cidr = Ipv4Cidr::new(to_wire(config.address), prefix);
            iface.update_ip_addrs(|addrs| {
                addrs.push(IpCidr::Ipv4(cidr)).ok();
            });
        }

        log::debug!(
            "[STACK] {}: MAC {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            config.name,
            mac[0],
            mac[1],
            mac[2],
            mac[3],
            mac[4],
            mac[5]
        );

        Self {
            name: config.name,
            iface,
            sockets: SocketSet::new(vec![]),
            device,
            protocols: ProtocolSet::empty(),
            arp_cache_bytes: config.arp_cache_bytes,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn protocols(&self) -> ProtocolSet {
        self.protocols
    }

    pub fn enable(&mut self, protocol: Protocol) -> Result<(), StackError> {
        if self.protocols.contains(protocol.flag()) {
            return Err(StackError::AlreadyEnabled(protocol));
        }
        if protocol == Protocol::AddressResolution && self.arp_cache_bytes < ARP_ENTRY_SIZE {
            return Err(StackError::ArpCacheTooSmall {
                bytes: self.arp_cache_bytes,
                min: ARP_ENTRY_SIZE,
            });
        }
        self.protocols |= protocol.flag();
        Ok(())
    }

    fn require(&self, protocol: Protocol) -> Result<(), StackError> {
        if self.protocols.contains(protocol.flag()) {
            Ok(())
        } else {
            Err(StackError::ProtocolNotEnabled(protocol))
        }
    }

    /// Run the interface once. Returns whether anything changed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let now = Instant::from_millis(now_ms as i64);
        self.iface.poll(now, &mut self.device, &mut self.sockets)
    }

    /// Milliseconds until the interface next wants a poll.
    pub fn poll_delay(&mut self, now_ms: u64) -> Option<u64> {
        let now = Instant::from_millis(now_ms as i64);
        self.iface
            .poll_delay(now, &self.sockets)
            .map(|d| d.total_millis())
    }

    pub fn ipv4_addr(&self) -> Option<Ipv4Addr> {
        self.iface.ipv4_addr().map(from_wire)
    }

    pub fn driver(&self) -> &D {
        self.device.driver()
    }

    pub fn driver_mut(&mut self) -> &mut D {
        self.device.driver_mut()
    }

    /// Tear down the instance and hand the driver back.
    pub fn into_driver(self) -> D {
        self.device.into_driver()
    }

    // ------------------------------------------------------------------
    // DHCP
    // ------------------------------------------------------------------

    pub fn dhcp_create(&mut self) -> Result<DhcpClient, StackError> {
        self.require(Protocol::Datagram)?;
        let handle = self.sockets.add(DhcpSocket::new());
        Ok(DhcpClient { handle })
    }

    /// Restart discovery from scratch.
    pub fn dhcp_start(&mut self, client: &DhcpClient) {
        self.sockets.get_mut::<DhcpSocket>(client.handle).reset();
    }

    /// Apply the latest DHCP event. Returns a lease when one was just granted.
    pub fn dhcp_poll(&mut self, client: &DhcpClient) -> Option<AddressLease> {
        let socket = self.sockets.get_mut::<DhcpSocket>(client.handle);
        match socket.poll()? {
            DhcpEvent::Configured(config) => {
                let lease = AddressLease::from_config(&config);
                self.apply_lease(&lease);
                Some(lease)
            }
            DhcpEvent::Deconfigured => {
                log::info!("[DHCP] Deconfigured");
                self.iface.update_ip_addrs(|addrs| addrs.clear());
                self.iface.routes_mut().remove_default_ipv4_route();
                None
            }
        }
    }

    /// Set the interface address and default route from `lease`.
    pub fn apply_lease(&mut self, lease: &AddressLease) {
        let cidr = Ipv4Cidr::new(to_wire(lease.address), lease.prefix_len);
        self.iface.update_ip_addrs(|addrs| {
            addrs.clear();
            addrs.push(IpCidr::Ipv4(cidr)).ok();
        });
        match lease.router() {
            Some(router) => {
                self.iface.routes_mut().add_default_ipv4_route(to_wire(router)).ok();
            }
            None => {
                self.iface.routes_mut().remove_default_ipv4_route();
            }
        }
    }

    pub fn dhcp_remove(&mut self, client: DhcpClient) {
        self.sockets.remove(client.handle);
    }

    // ------------------------------------------------------------------
    // DNS
    // ------------------------------------------------------------------

    pub fn dns_create(&mut self) -> Result<ResolverClient, StackError> {
        self.require(Protocol::Datagram)?;
        let queries: Vec<Option<dns::DnsQuery>> = Vec::new();
        let handle = self.sockets.add(DnsSocket::new(&[], queries));
        Ok(ResolverClient::new(handle))
    }

    /// Append `server` to the resolver's preference list.
    ///
    /// The socket only has room for `DNS_MAX_SERVER_COUNT` servers and is given
    /// the head of the list; the resolver keeps all of them.
    pub fn dns_add_server(
        &mut self,
        resolver: &mut ResolverClient,
        server: Ipv4Addr,
    ) -> Result<(), StackError> {
        resolver.push_server(server)?;
        let servers: Vec<IpAddress> = resolver
            .servers()
            .iter()
            .take(DNS_MAX_SERVER_COUNT)
            .map(|s| IpAddress::Ipv4(to_wire(*s)))
            .collect();
        self.sockets
            .get_mut::<DnsSocket>(resolver.handle())
            .update_servers(&servers);
        Ok(())
    }

    pub fn dns_remove(&mut self, resolver: ResolverClient) {
        self.sockets.remove(resolver.handle());
    }

    // ------------------------------------------------------------------
    // UDP
    // ------------------------------------------------------------------

    pub fn udp_open(&mut self, port: u16) -> Result<SocketHandle, StackError> {
        self.require(Protocol::Datagram)?;
        let rx = udp::PacketBuffer::new(
            vec![udp::PacketMetadata::EMPTY; UDP_PACKET_SLOTS],
            vec![0u8; UDP_BUFFER_BYTES],
        );
        let tx = udp::PacketBuffer::new(
            vec![udp::PacketMetadata::EMPTY; UDP_PACKET_SLOTS],
            vec![0u8; UDP_BUFFER_BYTES],
        );
        let mut socket = UdpSocket::new(rx, tx);
        socket.bind(port).map_err(|_| StackError::Bind(port))?;
        Ok(self.sockets.add(socket))
    }

    pub fn udp_send(
        &mut self,
        handle: SocketHandle,
        data: &[u8],
        to: SocketAddrV4,
    ) -> Result<(), StackError> {
        let endpoint = IpEndpoint::new(IpAddress::Ipv4(to_wire(*to.ip())), to.port());
        self.sockets
            .get_mut::<UdpSocket>(handle)
            .send_slice(data, endpoint)
            .map_err(|_| StackError::Send)
    }

    /// Next queued datagram, if any.
    ///
    /// A datagram that doesn't fit `buf` is discarded and reported as
    /// [`StackError::Truncated`].
    pub fn udp_recv(
        &mut self,
        handle: SocketHandle,
        buf: &mut [u8],
    ) -> Result<Option<(usize, SocketAddrV4)>, StackError> {
        let socket = self.sockets.get_mut::<UdpSocket>(handle);
        if !socket.can_recv() {
            return Ok(None);
        }
        let (len, meta) = socket.recv_slice(buf).map_err(|e| match e {
            udp::RecvError::Truncated => StackError::Truncated,
            udp::RecvError::Exhausted => StackError::Receive,
        })?;
        let from = match meta.endpoint.addr {
            IpAddress::Ipv4(v4) => SocketAddrV4::new(from_wire(v4), meta.endpoint.port),
            #[allow(unreachable_patterns)]
            _ => return Ok(None),
        };
        Ok(Some((len, from)))
    }

    pub fn udp_close(&mut self, handle: SocketHandle) {
        self.sockets.remove(handle);
    }
}
