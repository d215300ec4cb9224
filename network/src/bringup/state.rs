//! State trait for the bring-up state machine.

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::error::BringUpError;

use super::context::Context;

/// Result of a single state step.
#[derive(Debug)]
pub enum StepResult {
    /// Stay in this state; poll again after the poll interval.
    Continue,
    /// Moved to the next state.
    Transition,
    /// Every stage finished.
    Done,
    /// Stop and unwind.
    Failed(BringUpError),
}

/// One bring-up stage.
pub trait State<B: NetBackend> {
    /// Advance the stage. Returns the state to run next.
    fn step(
        self: Box<Self>,
        ctx: &mut Context<'_, B>,
        now_ms: u64,
    ) -> (Box<dyn State<B>>, StepResult);

    fn name(&self) -> &'static str;
}
