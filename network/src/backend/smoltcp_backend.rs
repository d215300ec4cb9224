//! smoltcp-backed resources.

use alloc::sync::Arc;
use core::net::Ipv4Addr;

use packet_pool::PacketPool;

use super::{NetBackend, PoolConfig};
use crate::bringup::Ready;
use crate::device::{Credentials, NetworkDriver};
use crate::dhcp::{AddressLease, DhcpClient};
use crate::dns::ResolverClient;
use crate::error::BackendError;
use crate::stack::{NetworkStack, Protocol, StackConfig};

/// Backend owning one driver and one packet region.
///
/// The driver moves into the stack on `create_stack` and comes back on
/// `delete_stack`; the region does the same through the pool. A backend can
/// therefore run bring-up again after a failure.
pub struct SmoltcpBackend<D: NetworkDriver> {
    driver: Option<D>,
    region: Option<&'static mut [u8]>,
}

impl<D: NetworkDriver> SmoltcpBackend<D> {
    pub fn new(driver: D, region: &'static mut [u8]) -> Self {
        Self { driver: Some(driver), region: Some(region) }
    }

    /// The driver, while no stack holds it.
    pub fn driver(&self) -> Option<&D> {
        self.driver.as_ref()
    }

    pub fn has_region(&self) -> bool {
        self.region.is_some()
    }
}

impl<D: NetworkDriver> Ready<SmoltcpBackend<D>> {
    /// Run the interface once and follow DHCP renewals.
    ///
    /// A new lease replaces [`Ready::lease`]; losing the lease clears the
    /// interface address until the client binds again.
    pub fn service(&mut self, now_ms: u64) -> bool {
        let changed = self.stack.poll(now_ms);
        if let Some(lease) = self.stack.dhcp_poll(&self.dhcp) {
            if lease.address != self.lease.address {
                log::info!("[DHCP] New address: {}/{}", lease.address, lease.prefix_len);
            }
            self.lease = lease;
        }
        changed
    }
}

impl<D: NetworkDriver> NetBackend for SmoltcpBackend<D> {
    type Pool = Arc<PacketPool<'static>>;
    type Stack = NetworkStack<D>;
    type Dhcp = DhcpClient;
    type Resolver = ResolverClient;

    fn create_pool(&mut self, config: &PoolConfig) -> Result<Self::Pool, BackendError> {
        let len = self
            .region
            .as_ref()
            .map(|r| r.len())
            .ok_or(BackendError::Unavailable("packet region"))?;
        PacketPool::check_layout(config.slot_size, config.slot_count, len)?;

        let region = self.region.take().ok_or(BackendError::Unavailable("packet region"))?;
        let pool = PacketPool::create(config.name, config.slot_size, config.slot_count, region)?;
        Ok(Arc::new(pool))
    }

    fn delete_pool(&mut self, pool: Self::Pool) -> Result<(), BackendError> {
        match Arc::try_unwrap(pool) {
            Ok(pool) => {
                self.region = Some(pool.into_region());
                Ok(())
            }
            Err(_) => Err(BackendError::Unavailable("packet pool still shared")),
        }
    }

    fn create_stack(
        &mut self,
        pool: &Self::Pool,
        config: &StackConfig,
    ) -> Result<Self::Stack, BackendError> {
        config.validate()?;
        let driver = self.driver.take().ok_or(BackendError::Unavailable("network driver"))?;
        Ok(NetworkStack::new(driver, pool.clone(), config))
    }

    fn delete_stack(&mut self, stack: Self::Stack) -> Result<(), BackendError> {
        self.driver = Some(stack.into_driver());
        Ok(())
    }

    fn enable_protocol(
        &mut self,
        stack: &mut Self::Stack,
        protocol: Protocol,
    ) -> Result<(), BackendError> {
        Ok(stack.enable(protocol)?)
    }

    fn create_dhcp(&mut self, stack: &mut Self::Stack) -> Result<Self::Dhcp, BackendError> {
        Ok(stack.dhcp_create()?)
    }

    fn start_dhcp(
        &mut self,
        stack: &mut Self::Stack,
        dhcp: &mut Self::Dhcp,
        credentials: Option<&Credentials>,
    ) -> Result<(), BackendError> {
        if let Some(credentials) = credentials {
            log::info!("[LINK] Joining '{}'", credentials.ssid);
            stack.driver_mut().connect(credentials)?;
        }
        stack.dhcp_start(dhcp);
        Ok(())
    }

    fn poll_lease(
        &mut self,
        stack: &mut Self::Stack,
        dhcp: &mut Self::Dhcp,
        now_ms: u64,
    ) -> Option<AddressLease> {
        stack.poll(now_ms);
        stack.dhcp_poll(dhcp)
    }

    fn delete_dhcp(
        &mut self,
        stack: &mut Self::Stack,
        dhcp: Self::Dhcp,
    ) -> Result<(), BackendError> {
        stack.dhcp_remove(dhcp);
        Ok(())
    }

    fn create_resolver(&mut self, stack: &mut Self::Stack) -> Result<Self::Resolver, BackendError> {
        Ok(stack.dns_create()?)
    }

    fn add_dns_server(
        &mut self,
        stack: &mut Self::Stack,
        resolver: &mut Self::Resolver,
        server: Ipv4Addr,
    ) -> Result<(), BackendError> {
        Ok(stack.dns_add_server(resolver, server)?)
    }

    fn delete_resolver(
        &mut self,
        stack: &mut Self::Stack,
        resolver: Self::Resolver,
    ) -> Result<(), BackendError> {
        stack.dns_remove(resolver);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bringup::{bring_up, BringUpConfig, Timeouts};
    use crate::device::{RxError, TxError};
    use crate::error::{BringUpError, Stage};
    use crate::testing::{static_ready, udp_frame, FakeBackend, ManualClock, ScriptedLink};
    use alloc::vec::Vec;
    use core::net::SocketAddrV4;

    #[derive(Default)]
    struct SilentLink {
        sent: Vec<Vec<u8>>,
    }

    impl SilentLink {
        fn dhcp_requests(&self) -> usize {
            self.sent
                .iter()
                .filter(|f| {
                    f.len() >= 42
                        && u16::from_be_bytes([f[12], f[13]]) == 0x0800
                        && f[23] == 17
                        && u16::from_be_bytes([f[36], f[37]]) == 67
                })
                .count()
        }
    }

    impl NetworkDriver for SilentLink {
        fn mac_address(&self) -> [u8; 6] {
            [0x02, 0x00, 0x00, 0x12, 0x34, 0x56]
        }
        fn can_transmit(&self) -> bool {
            true
        }
        fn can_receive(&self) -> bool {
            false
        }
        fn transmit(&mut self, frame: &[u8]) -> Result<(), TxError> {
            self.sent.push(frame.to_vec());
            Ok(())
        }
        fn receive(&mut self, _buffer: &mut [u8]) -> Result<Option<usize>, RxError> {
            Ok(None)
        }
    }

    fn region(slots: usize) -> &'static mut [u8] {
        Vec::leak(alloc::vec![0u8; PacketPool::required_region(1536, slots)])
    }

    fn backend(slots: usize) -> SmoltcpBackend<SilentLink> {
        SmoltcpBackend::new(SilentLink::default(), region(slots))
    }

    #[test]
    fn test_region_too_small_keeps_region() {
        let mut backend = backend(2);
        let err = backend.create_pool(&PoolConfig::default()).unwrap_err();
        assert!(matches!(err, BackendError::Pool(_)));
        assert!(backend.has_region());
    }

    #[test]
    fn test_pool_region_round_trip() {
        let mut backend = backend(20);
        let pool = backend.create_pool(&PoolConfig::default()).unwrap();
        assert!(!backend.has_region());
        assert!(backend.create_pool(&PoolConfig::default()).is_err());

        let stack = backend.create_stack(&pool, &StackConfig::default()).unwrap();
        assert!(backend.driver().is_none());
        // the stack still shares the pool
        let shared = pool.clone();
        assert!(backend.delete_pool(shared).is_err());

        backend.delete_stack(stack).unwrap();
        backend.delete_pool(pool).unwrap();
        assert!(backend.has_region());
        assert!(backend.driver().is_some());
    }

    #[test]
    fn test_silent_network_times_out_and_releases_everything() {
        let mut backend = backend(20);
        let clock = ManualClock::new();
        let config = BringUpConfig {
            timeouts: Timeouts { dhcp_ms: Some(5_000), dhcp_poll_interval_ms: 100 },
            ..BringUpConfig::default()
        };

        let err = bring_up(&mut backend, config, &clock).unwrap_err();
        assert_eq!(err, BringUpError::AddressTimeout { waited_ms: 5_000 });
        assert_eq!(err.stage(), Stage::AddressAcquisition);

        assert!(backend.has_region());
        let driver = backend.driver().unwrap();
        assert!(driver.dhcp_requests() >= 1);
    }

    #[test]
    fn test_static_ready_receives_on_its_address() {
        let link = ScriptedLink::new([0x02, 0, 0, 0, 0, 0x20]);
        let mut backend = SmoltcpBackend::new(link.clone(), region(20));
        let mut ready = static_ready(&mut backend, FakeBackend::default_lease()).unwrap();
        assert_eq!(ready.stack().ipv4_addr(), Some(Ipv4Addr::new(192, 168, 1, 20)));

        let here = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 20), 8888);
        let agent = SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 1), 8888);
        let socket = ready.stack_mut().udp_open(8888).unwrap();
        link.inject(udp_frame([0x02, 0, 0, 0, 0, 0x20], agent, here, b"hello"));
        ready.service(0);

        let mut buf = [0u8; 16];
        assert_eq!(ready.stack_mut().udp_recv(socket, &mut buf), Ok(Some((5, agent))));
        assert_eq!(&buf[..5], b"hello");

        ready.stack_mut().udp_close(socket);
        ready.release(&mut backend).unwrap();
        assert!(backend.has_region());
    }

    #[test]
    fn test_service_follows_dhcp_after_bring_up() {
        let mut backend = backend(20);
        let pool = backend.create_pool(&PoolConfig::default()).unwrap();
        let config = StackConfig {
            address: Ipv4Addr::new(192, 168, 1, 20),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            ..StackConfig::default()
        };
        let mut stack = backend.create_stack(&pool, &config).unwrap();
        backend.enable_protocol(&mut stack, Protocol::Datagram).unwrap();
        let dhcp = backend.create_dhcp(&mut stack).unwrap();
        let resolver = backend.create_resolver(&mut stack).unwrap();
        let mut ready: Ready<SmoltcpBackend<SilentLink>> = Ready {
            resolver,
            dhcp,
            stack,
            pool,
            lease: AddressLease::new(config.address, 24),
        };
        assert!(ready.stack().ipv4_addr().is_some());

        // the unbound client reports "deconfigured", which drops the address
        ready.service(0);
        assert_eq!(ready.stack().ipv4_addr(), None);
        ready.release(&mut backend).unwrap();
    }

    #[test]
    fn test_bring_up_can_run_again() {
        let mut backend = backend(20);
        let clock = ManualClock::new();
        let config = BringUpConfig {
            timeouts: Timeouts { dhcp_ms: Some(300), dhcp_poll_interval_ms: 100 },
            ..BringUpConfig::default()
        };

        for _ in 0..2 {
            let err = bring_up(&mut backend, config.clone(), &clock).unwrap_err();
            assert!(matches!(err, BringUpError::AddressTimeout { .. }));
        }
        assert!(backend.has_region());
        assert!(backend.driver().is_some());
    }
}
