//! Pool state: carves the packet pool.

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::bringup::context::Context;
use crate::bringup::state::{State, StepResult};
use crate::error::{BringUpError, Stage};

use super::{fail, StackState};

pub struct PoolState;

impl<B: NetBackend> State<B> for PoolState {
    fn step(self: Box<Self>, ctx: &mut Context<'_, B>, _now_ms: u64) -> (Box<dyn State<B>>, StepResult) {
        let cfg = &ctx.config.pool;
        match ctx.backend.create_pool(cfg) {
            Ok(pool) => {
                log::info!(
                    "[POOL] Created '{}': {} x {} bytes",
                    cfg.name,
                    cfg.slot_count,
                    cfg.slot_size
                );
                ctx.pool = Some(pool);
                (Box::new(StackState), StepResult::Transition)
            }
            Err(source) => fail(BringUpError::ResourceCreation { stage: Stage::PacketPool, source }),
        }
    }

    fn name(&self) -> &'static str {
        "Pool"
    }
}
