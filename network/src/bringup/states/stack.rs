//! Stack state: creates the IP instance over the pool.

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::bringup::context::Context;
use crate::bringup::state::{State, StepResult};
use crate::error::{BringUpError, Stage};

use super::{fail, ProtocolsState};

pub struct StackState;

impl<B: NetBackend> State<B> for StackState {
    fn step(self: Box<Self>, ctx: &mut Context<'_, B>, _now_ms: u64) -> (Box<dyn State<B>>, StepResult) {
        let Some(pool) = ctx.pool.as_ref() else {
            return fail(BringUpError::Incomplete(Stage::PacketPool));
        };

        match ctx.backend.create_stack(pool, &ctx.config.stack) {
            Ok(stack) => {
                log::info!("[STACK] Created '{}'", ctx.config.stack.name);
                ctx.stack = Some(stack);
                (Box::new(ProtocolsState), StepResult::Transition)
            }
            Err(source) => fail(BringUpError::ResourceCreation { stage: Stage::NetworkStack, source }),
        }
    }

    fn name(&self) -> &'static str {
        "Stack"
    }
}
