//! Network bring-up for micronode.
//!
//! Brings a node from a bare packet-forwarding driver to a configured IPv4
//! stack with a resolver, in strict order:
//!
//! 1. packet pool
//! 2. IP stack bound to the pool
//! 3. protocols (ARP, ICMP, TCP, UDP)
//! 4. transport security (optional)
//! 5. DHCP address acquisition
//! 6. DNS resolver configured from the lease
//!
//! The first failure unwinds everything created so far, in reverse order.
//!
//! # Usage
//!
//! ```ignore
//! use micronode_network::backend::SmoltcpBackend;
//! use micronode_network::bringup::{bring_up, BringUpConfig};
//!
//! let mut backend = SmoltcpBackend::new(driver, region);
//! let ready = bring_up(&mut backend, BringUpConfig::default(), &clock)?;
//! log::info!("address {}", ready.lease().address);
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod backend;
pub mod bringup;
pub mod device;
pub mod dhcp;
pub mod dns;
pub mod error;
pub mod stack;
pub mod time;
pub mod tls;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{NetBackend, PoolConfig, SmoltcpBackend};
pub use bringup::{bring_up, BringUp, BringUpConfig, Ready, Timeouts};
pub use device::{Credentials, NetworkDriver, SecurityMode};
pub use dhcp::AddressLease;
pub use error::{BackendError, BringUpError, Stage};
pub use stack::{NetworkStack, Protocol, ProtocolSet, StackConfig};
pub use time::{CancelToken, Clock};
pub use tls::{SecurityError, TransportSecurity};
