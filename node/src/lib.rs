//! micronode: a small pub/sub node on top of an embedded-style network
//! bring-up.
//!
//! The worker thread brings the network up (see [`micronode_network`]),
//! opens a UDP transport to the agent and runs a fixed-tick executor with
//! one timer-driven `Int32` publisher and one `Int32` subscriber that drives
//! an output pin.
//!
//! ```text
//! main ── Board::init ── app::define ──► worker thread
//!                                         │ bring-up (pool, stack, protocols, TLS, DHCP, DNS)
//!                                         │ StackUdpTransport
//!                                         └ run_session: spin_some(100 ms); sleep(100 ms); ...
//! ```

pub mod app;
pub mod board;
pub mod config;
pub mod error;
pub mod messaging;
pub mod msg;
pub mod secrets;
pub mod session;
pub mod transport;
pub mod wire;

#[cfg(feature = "tls")]
pub mod security;

#[cfg(target_os = "linux")]
pub mod tap;

#[cfg(test)]
pub(crate) mod testing;


pub use board::{Board, OutputPin, OutputState, SimBoard};
pub use config::{Cli, NodeConfig};
pub use error::{MessagingError, NodeError, PublishError, TransportError, WireError};
pub use msg::{Int32, Message};
pub use session::{run_session, SessionConfig, SessionSummary};
pub use transport::{StackUdpTransport, Transport, TransportConfig};
