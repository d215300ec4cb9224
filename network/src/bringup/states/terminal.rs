//! Terminal states.

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::bringup::context::Context;
use crate::bringup::state::{State, StepResult};
use crate::error::Stage;

/// Every stage finished.
pub struct DoneState;

impl<B: NetBackend> State<B> for DoneState {
    fn step(self: Box<Self>, _ctx: &mut Context<'_, B>, _now_ms: u64) -> (Box<dyn State<B>>, StepResult) {
        (self, StepResult::Done)
    }

    fn name(&self) -> &'static str {
        "Done"
    }
}

/// Bring-up stopped at `stage`.
pub struct FailedState {
    stage: Stage,
}

impl FailedState {
    pub fn new(stage: Stage) -> Self {
        Self { stage }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl<B: NetBackend> State<B> for FailedState {
    fn step(self: Box<Self>, _ctx: &mut Context<'_, B>, _now_ms: u64) -> (Box<dyn State<B>>, StepResult) {
        (self, StepResult::Continue)
    }

    fn name(&self) -> &'static str {
        "Failed"
    }
}
