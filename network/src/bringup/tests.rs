use core::cell::Cell;
use core::net::Ipv4Addr;

use super::*;
use crate::dhcp::AddressLease;
use crate::error::{BringUpError, Stage};
use crate::stack::Protocol;
use crate::testing::{FakeBackend, Fault, Kind, ManualClock};
use crate::time::{CancelToken, Clock};
use crate::tls::{SecurityError, TransportSecurity};

fn forever() -> BringUpConfig {
    BringUpConfig {
        timeouts: Timeouts { dhcp_ms: None, dhcp_poll_interval_ms: 100 },
        ..BringUpConfig::default()
    }
}

fn assert_fully_unwound(backend: &FakeBackend) {
    let ledger = backend.ledger();
    assert!(ledger.alive.is_empty(), "leaked: {:?}", ledger.alive);
    assert_eq!(ledger.double_releases, 0);
    let mut created = ledger.created();
    created.reverse();
    assert_eq!(ledger.released(), created);
}

struct CountingSecurity {
    calls: Cell<u32>,
    fail: bool,
}

impl TransportSecurity for CountingSecurity {
    fn initialize(&self) -> Result<(), SecurityError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            Err(SecurityError("no crypto provider".into()))
        } else {
            Ok(())
        }
    }
}

/// Cancels its token once time reaches `at_ms`.
struct CancellingClock {
    inner: ManualClock,
    token: CancelToken,
    at_ms: u64,
}

impl Clock for CancellingClock {
    fn now_ms(&self) -> u64 {
        self.inner.now_ms()
    }

    fn sleep_ms(&self, ms: u64) {
        self.inner.sleep_ms(ms);
        if self.inner.now_ms() >= self.at_ms {
            self.token.cancel();
        }
    }
}

#[test]
fn test_success_creates_in_order() {
    let mut backend = FakeBackend::new();
    let ready = bring_up(&mut backend, forever(), &ManualClock::new()).unwrap();

    assert_eq!(ready.lease().address, Ipv4Addr::new(192, 168, 1, 20));
    assert_eq!(ready.resolver().servers(), &[Ipv4Addr::new(192, 168, 1, 1)]);
    {
        let ledger = backend.ledger();
        let kinds: Vec<Kind> = ledger.created().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, [Kind::Pool, Kind::Stack, Kind::Dhcp, Kind::Resolver]);
        assert_eq!(ledger.enabled, Protocol::ALL);
        assert_eq!(ledger.alive.len(), 4);
    }

    ready.release(&mut backend).unwrap();
    assert_fully_unwound(&backend);
}

#[test]
fn test_every_fault_unwinds_everything() {
    let cases = [
        (Fault::CreatePool, Stage::PacketPool),
        (Fault::CreateStack, Stage::NetworkStack),
        (Fault::EnableProtocol(Protocol::AddressResolution), Stage::Protocols),
        (Fault::EnableProtocol(Protocol::ControlMessages), Stage::Protocols),
        (Fault::EnableProtocol(Protocol::Stream), Stage::Protocols),
        (Fault::EnableProtocol(Protocol::Datagram), Stage::Protocols),
        (Fault::CreateDhcp, Stage::AddressAcquisition),
        (Fault::StartDhcp, Stage::AddressAcquisition),
        (Fault::CreateResolver, Stage::NameResolution),
        (Fault::AddDnsServer, Stage::NameResolution),
    ];

    for (fault, stage) in cases {
        let mut backend = FakeBackend::new().failing(fault);
        let err = bring_up(&mut backend, forever(), &ManualClock::new()).unwrap_err();
        assert_eq!(err.stage(), stage, "{:?}", fault);
        assert_fully_unwound(&backend);
    }
}

#[test]
fn test_protocol_failure_names_protocol() {
    let mut backend = FakeBackend::new().failing(Fault::EnableProtocol(Protocol::Stream));
    let err = bring_up(&mut backend, forever(), &ManualClock::new()).unwrap_err();
    assert!(matches!(err, BringUpError::ProtocolEnable { protocol: Protocol::Stream, .. }));
    // ARP and ICMP went through before TCP failed
    assert_eq!(
        backend.ledger().enabled,
        [Protocol::AddressResolution, Protocol::ControlMessages]
    );
}

#[test]
fn test_rerun_after_failure() {
    let mut backend = FakeBackend::new().failing(Fault::CreateResolver);
    let clock = ManualClock::new();
    assert!(bring_up(&mut backend, forever(), &clock).is_err());
    assert_fully_unwound(&backend);

    backend.heal();
    let ready = bring_up(&mut backend, forever(), &clock).unwrap();
    assert_eq!(backend.ledger().alive.len(), 4);
    ready.release(&mut backend).unwrap();
    assert!(backend.ledger().alive.is_empty());
}

#[test]
fn test_lease_without_dns_option() {
    let lease = AddressLease::new(Ipv4Addr::new(192, 168, 1, 20), 24);
    let mut backend = FakeBackend::new().with_lease(Some(lease));
    let err = bring_up(&mut backend, forever(), &ManualClock::new()).unwrap_err();

    assert_eq!(err, BringUpError::LeaseOptionMissing { option: 6 });
    let released: Vec<Kind> = backend.ledger().released().iter().map(|r| r.kind).collect();
    assert_eq!(released, [Kind::Resolver, Kind::Dhcp, Kind::Stack, Kind::Pool]);
    assert_fully_unwound(&backend);
}

#[test]
fn test_dhcp_timeout() {
    let mut backend = FakeBackend::new().with_lease(None);
    let config = BringUpConfig {
        timeouts: Timeouts { dhcp_ms: Some(1_000), dhcp_poll_interval_ms: 100 },
        ..BringUpConfig::default()
    };
    let err = bring_up(&mut backend, config, &ManualClock::new()).unwrap_err();

    assert_eq!(err, BringUpError::AddressTimeout { waited_ms: 1_000 });
    assert_eq!(backend.ledger().dhcp_polls, 11);
    assert_fully_unwound(&backend);
}

#[test]
fn test_dhcp_waits_until_lease_arrives() {
    let mut backend = FakeBackend::new().lease_after(5);
    let clock = ManualClock::new();
    let ready = bring_up(&mut backend, forever(), &clock).unwrap();

    assert_eq!(clock.now_ms(), 500);
    assert_eq!(backend.ledger().dhcp_polls, 6);
    ready.release(&mut backend).unwrap();
}

#[test]
fn test_cancel_during_dhcp_wait() {
    let mut backend = FakeBackend::new().with_lease(None);
    let token = CancelToken::new();
    let clock = CancellingClock { inner: ManualClock::new(), token: token.clone(), at_ms: 300 };

    let err = BringUp::new(&mut backend, forever())
        .with_cancel(token)
        .run(&clock)
        .unwrap_err();

    assert_eq!(err, BringUpError::Cancelled(Stage::AddressAcquisition));
    assert_fully_unwound(&backend);
}

#[test]
fn test_security_initialized_once() {
    let security = CountingSecurity { calls: Cell::new(0), fail: false };
    let mut backend = FakeBackend::new();
    let ready = BringUp::new(&mut backend, forever())
        .with_security(&security)
        .run(&ManualClock::new())
        .unwrap();
    assert_eq!(security.calls.get(), 1);
    ready.release(&mut backend).unwrap();
}

#[test]
fn test_security_failure_unwinds_stack_and_pool() {
    let security = CountingSecurity { calls: Cell::new(0), fail: true };
    let mut backend = FakeBackend::new();
    let err = BringUp::new(&mut backend, forever())
        .with_security(&security)
        .run(&ManualClock::new())
        .unwrap_err();

    assert!(matches!(err, BringUpError::TlsInit(_)));
    let released: Vec<Kind> = backend.ledger().released().iter().map(|r| r.kind).collect();
    assert_eq!(released, [Kind::Stack, Kind::Pool]);
    assert_fully_unwound(&backend);
}

#[test]
fn test_release_failure_does_not_stop_unwind() {
    let mut backend = FakeBackend::new()
        .with_lease(Some(AddressLease::new(Ipv4Addr::new(10, 0, 0, 2), 8)))
        .failing(Fault::ReleaseStack);
    let err = bring_up(&mut backend, forever(), &ManualClock::new()).unwrap_err();
    assert_eq!(err.stage(), Stage::NameResolution);
    assert!(backend.ledger().alive.is_empty());
}

#[test]
fn test_credentials_reach_link_join() {
    use crate::device::{Credentials, SecurityMode};

    let mut backend = FakeBackend::new();
    let config = BringUpConfig {
        credentials: Some(Credentials {
            ssid: "lab".into(),
            psk: "secret".into(),
            security: SecurityMode::Wpa2PskAes,
        }),
        ..forever()
    };
    let ready = bring_up(&mut backend, config, &ManualClock::new()).unwrap();
    assert_eq!(backend.ledger().joined[0].ssid, "lab");
    ready.release(&mut backend).unwrap();
}
