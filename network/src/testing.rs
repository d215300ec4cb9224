//! Test doubles: a resource-tracking backend, a manual clock and a scripted
//! Ethernet link.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::net::{Ipv4Addr, SocketAddrV4};
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use crate::backend::{NetBackend, PoolConfig, SmoltcpBackend};
use crate::bringup::Ready;
use crate::device::{Credentials, NetworkDriver, RxError, TxError};
use crate::dhcp::{AddressLease, OPTION_DNS_SERVER, OPTION_ROUTER};
use crate::error::BackendError;
use crate::stack::{Protocol, ProtocolSet, StackConfig};
use crate::time::Clock;

/// Clock that only moves when slept on or advanced.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

/// Resource kinds tracked by [`FakeBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Pool,
    Stack,
    Dhcp,
    Resolver,
}

/// One tracked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resource {
    pub kind: Kind,
    pub id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Created(Resource),
    Released(Resource),
}

/// Operation to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    CreatePool,
    CreateStack,
    EnableProtocol(Protocol),
    CreateDhcp,
    StartDhcp,
    CreateResolver,
    AddDnsServer,
    ReleaseStack,
}

/// Everything the fake backend observed.
#[derive(Debug, Default)]
pub struct Ledger {
    pub events: Vec<Event>,
    pub alive: Vec<Resource>,
    pub double_releases: u32,
    pub enabled: Vec<Protocol>,
    pub dhcp_polls: u32,
    pub joined: Vec<Credentials>,
    pub dns_servers: Vec<Ipv4Addr>,
}

impl Ledger {
    /// Release events, in order.
    pub fn released(&self) -> Vec<Resource> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Released(r) => Some(*r),
                Event::Created(_) => None,
            })
            .collect()
    }

    /// Creation events, in order.
    pub fn created(&self) -> Vec<Resource> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Created(r) => Some(*r),
                Event::Released(_) => None,
            })
            .collect()
    }
}

pub struct FakeStack {
    id: u32,
    protocols: ProtocolSet,
}

impl FakeStack {
    pub fn protocols(&self) -> ProtocolSet {
        self.protocols
    }
}

pub struct FakeDhcp {
    id: u32,
    polls: u32,
}

pub struct FakeResolver {
    id: u32,
    servers: Vec<Ipv4Addr>,
}

impl FakeResolver {
    pub fn servers(&self) -> &[Ipv4Addr] {
        &self.servers
    }
}

#[derive(Clone)]
struct Script {
    fault: Option<Fault>,
    lease: Option<AddressLease>,
    lease_after_polls: u32,
}

/// Backend that hands out numbered tokens and records their lifetimes.
///
/// Clones share the same ledger.
#[derive(Clone)]
pub struct FakeBackend {
    ledger: Arc<Mutex<Ledger>>,
    script: Script,
    next_id: Arc<Mutex<u32>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// Every operation succeeds; the first poll yields [`FakeBackend::default_lease`].
    pub fn new() -> Self {
        Self {
            ledger: Arc::new(Mutex::new(Ledger::default())),
            script: Script { fault: None, lease: Some(Self::default_lease()), lease_after_polls: 0 },
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// 192.168.1.20/24 via 192.168.1.1, DNS 192.168.1.1.
    pub fn default_lease() -> AddressLease {
        let gw = Ipv4Addr::new(192, 168, 1, 1);
        AddressLease::new(Ipv4Addr::new(192, 168, 1, 20), 24)
            .with_addresses(OPTION_ROUTER, &[gw])
            .with_addresses(OPTION_DNS_SERVER, &[gw])
    }

    pub fn failing(mut self, fault: Fault) -> Self {
        self.script.fault = Some(fault);
        self
    }

    /// Lease to grant; `None` never grants one.
    pub fn with_lease(mut self, lease: Option<AddressLease>) -> Self {
        self.script.lease = lease;
        self
    }

    /// Grant the lease only after `polls` empty polls.
    pub fn lease_after(mut self, polls: u32) -> Self {
        self.script.lease_after_polls = polls;
        self
    }

    /// Clear the injected fault; the ledger is kept.
    pub fn heal(&mut self) {
        self.script.fault = None;
    }

    pub fn ledger(&self) -> spin::MutexGuard<'_, Ledger> {
        self.ledger.lock()
    }

    fn check(&self, fault: Fault) -> Result<(), BackendError> {
        if self.script.fault == Some(fault) {
            Err(BackendError::Fault("injected"))
        } else {
            Ok(())
        }
    }

    fn create(&self, kind: Kind) -> u32 {
        let id = {
            let mut next = self.next_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        let res = Resource { kind, id };
        let mut ledger = self.ledger.lock();
        ledger.events.push(Event::Created(res));
        ledger.alive.push(res);
        id
    }

    fn release(&self, kind: Kind, id: u32) {
        let res = Resource { kind, id };
        let mut ledger = self.ledger.lock();
        ledger.events.push(Event::Released(res));
        match ledger.alive.iter().position(|r| *r == res) {
            Some(idx) => {
                ledger.alive.remove(idx);
            }
            None => ledger.double_releases += 1,
        }
    }
}

impl NetBackend for FakeBackend {
    type Pool = u32;
    type Stack = FakeStack;
    type Dhcp = FakeDhcp;
    type Resolver = FakeResolver;

    fn create_pool(&mut self, _config: &PoolConfig) -> Result<u32, BackendError> {
        self.check(Fault::CreatePool)?;
        Ok(self.create(Kind::Pool))
    }

    fn delete_pool(&mut self, pool: u32) -> Result<(), BackendError> {
        self.release(Kind::Pool, pool);
        Ok(())
    }

    fn create_stack(&mut self, _pool: &u32, _config: &StackConfig) -> Result<FakeStack, BackendError> {
        self.check(Fault::CreateStack)?;
        Ok(FakeStack { id: self.create(Kind::Stack), protocols: ProtocolSet::empty() })
    }

    fn delete_stack(&mut self, stack: FakeStack) -> Result<(), BackendError> {
        self.release(Kind::Stack, stack.id);
        self.check(Fault::ReleaseStack)
    }

    fn enable_protocol(&mut self, stack: &mut FakeStack, protocol: Protocol) -> Result<(), BackendError> {
        self.check(Fault::EnableProtocol(protocol))?;
        stack.protocols |= protocol.flag();
        self.ledger.lock().enabled.push(protocol);
        Ok(())
    }

    fn create_dhcp(&mut self, stack: &mut FakeStack) -> Result<FakeDhcp, BackendError> {
        self.check(Fault::CreateDhcp)?;
        if !stack.protocols.contains(ProtocolSet::DATAGRAM) {
            return Err(BackendError::Fault("UDP disabled"));
        }
        Ok(FakeDhcp { id: self.create(Kind::Dhcp), polls: 0 })
    }

    fn start_dhcp(
        &mut self,
        _stack: &mut FakeStack,
        _dhcp: &mut FakeDhcp,
        credentials: Option<&Credentials>,
    ) -> Result<(), BackendError> {
        if let Some(credentials) = credentials {
            self.ledger.lock().joined.push(credentials.clone());
        }
        self.check(Fault::StartDhcp)
    }

    fn poll_lease(&mut self, _stack: &mut FakeStack, dhcp: &mut FakeDhcp, _now_ms: u64) -> Option<AddressLease> {
        self.ledger.lock().dhcp_polls += 1;
        let ready = dhcp.polls >= self.script.lease_after_polls;
        dhcp.polls += 1;
        if ready {
            self.script.lease.clone()
        } else {
            None
        }
    }

    fn delete_dhcp(&mut self, _stack: &mut FakeStack, dhcp: FakeDhcp) -> Result<(), BackendError> {
        self.release(Kind::Dhcp, dhcp.id);
        Ok(())
    }

    fn create_resolver(&mut self, _stack: &mut FakeStack) -> Result<FakeResolver, BackendError> {
        self.check(Fault::CreateResolver)?;
        Ok(FakeResolver { id: self.create(Kind::Resolver), servers: Vec::new() })
    }

    fn add_dns_server(
        &mut self,
        _stack: &mut FakeStack,
        resolver: &mut FakeResolver,
        server: Ipv4Addr,
    ) -> Result<(), BackendError> {
        self.check(Fault::AddDnsServer)?;
        resolver.servers.push(server);
        self.ledger.lock().dns_servers.push(server);
        Ok(())
    }

    fn delete_resolver(&mut self, _stack: &mut FakeStack, resolver: FakeResolver) -> Result<(), BackendError> {
        self.release(Kind::Resolver, resolver.id);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Scripted link
// ----------------------------------------------------------------------------

/// MAC used as the source of injected frames.
pub const PEER_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0xfe];

#[derive(Default)]
struct Wire {
    inbox: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
}

/// Ethernet driver fed from an inbox. Clones share the same wire, so a test
/// keeps one clone after handing the other to a stack.
#[derive(Clone)]
pub struct ScriptedLink {
    mac: [u8; 6],
    wire: Arc<Mutex<Wire>>,
}

impl ScriptedLink {
    pub fn new(mac: [u8; 6]) -> Self {
        Self { mac, wire: Arc::default() }
    }

    pub fn inject(&self, frame: Vec<u8>) {
        self.wire.lock().inbox.push_back(frame);
    }

    /// Frames the stack transmitted, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.wire.lock().sent.clone()
    }
}

impl NetworkDriver for ScriptedLink {
    fn mac_address(&self) -> [u8; 6] {
        self.mac
    }

    fn can_transmit(&self) -> bool {
        true
    }

    fn can_receive(&self) -> bool {
        !self.wire.lock().inbox.is_empty()
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), TxError> {
        self.wire.lock().sent.push(frame.to_vec());
        Ok(())
    }

    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, RxError> {
        let mut wire = self.wire.lock();
        let Some(frame) = wire.inbox.pop_front() else {
            return Ok(None);
        };
        if frame.len() > buffer.len() {
            return Err(RxError::BufferTooSmall { needed: frame.len() });
        }
        buffer[..frame.len()].copy_from_slice(&frame);
        Ok(Some(frame.len()))
    }
}

/// Ethernet/IPv4/UDP frame from `from` (at [`PEER_MAC`]) to `to` at `dst_mac`.
///
/// The UDP checksum is left at zero, which IPv4 receivers accept.
pub fn udp_frame(dst_mac: [u8; 6], from: SocketAddrV4, to: SocketAddrV4, payload: &[u8]) -> Vec<u8> {
    let udp_len = 8 + payload.len();
    let ip_len = 20 + udp_len;
    let mut frame = Vec::with_capacity(14 + ip_len);

    frame.extend_from_slice(&dst_mac);
    frame.extend_from_slice(&PEER_MAC);
    frame.extend_from_slice(&0x0800u16.to_be_bytes());

    let ip_start = frame.len();
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&(ip_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00, 0x40, 0x00, 64, 17, 0x00, 0x00]);
    frame.extend_from_slice(&from.ip().octets());
    frame.extend_from_slice(&to.ip().octets());
    let checksum = ipv4_checksum(&frame[ip_start..]);
    frame[ip_start + 10..ip_start + 12].copy_from_slice(&checksum.to_be_bytes());

    frame.extend_from_slice(&from.port().to_be_bytes());
    frame.extend_from_slice(&to.port().to_be_bytes());
    frame.extend_from_slice(&(udp_len as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(payload);
    frame
}

fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|pair| u32::from(u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)])))
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// A [`Ready`] on `backend` configured from `lease` directly, without DHCP.
///
/// All protocols are enabled and the lease's DNS server, if any, is
/// registered. The DHCP client exists but never binds.
pub fn static_ready<D: NetworkDriver>(
    backend: &mut SmoltcpBackend<D>,
    lease: AddressLease,
) -> Result<Ready<SmoltcpBackend<D>>, BackendError> {
    let pool = backend.create_pool(&PoolConfig::default())?;
    let mut stack = backend.create_stack(&pool, &StackConfig::default())?;
    for protocol in Protocol::ALL {
        backend.enable_protocol(&mut stack, protocol)?;
    }
    let dhcp = backend.create_dhcp(&mut stack)?;
    // a fresh client reports "deconfigured" once; take it before the address goes in
    stack.dhcp_poll(&dhcp);
    stack.apply_lease(&lease);

    let mut resolver = backend.create_resolver(&mut stack)?;
    if let Some(server) = lease.dns_server() {
        backend.add_dns_server(&mut stack, &mut resolver, server)?;
    }
    Ok(Ready { resolver, dhcp, stack, pool, lease })
}
