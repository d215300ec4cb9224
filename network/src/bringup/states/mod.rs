//! Bring-up states.

mod dhcp;
mod dns;
mod pool;
mod protocols;
mod stack;
mod terminal;
mod tls;

pub use dhcp::DhcpState;
pub use dns::DnsState;
pub use pool::PoolState;
pub use protocols::ProtocolsState;
pub use stack::StackState;
pub use terminal::{DoneState, FailedState};
pub use tls::TlsState;

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::error::BringUpError;

use super::state::{State, StepResult};

/// Jump to [`FailedState`] with `err`.
fn fail<B: NetBackend>(err: BringUpError) -> (Box<dyn State<B>>, StepResult) {
    log::error!("[NET] ERROR: {}", err);
    (Box::new(FailedState::new(err.stage())), StepResult::Failed(err))
}
