//! Network bring-up state machine.
//!
//! ```text
//! Pool -> Stack -> Protocols -> Tls -> Dhcp -> Dns -> Done
//!   \________\_________\_________\______\______\____-> Failed (unwind)
//! ```

mod context;
mod orchestrator;
mod state;
mod states;

pub use context::{BringUpConfig, Context, Timeouts};
pub use orchestrator::{bring_up, BringUp, Ready};
pub use state::{State, StepResult};

#[cfg(test)]
mod tests;
