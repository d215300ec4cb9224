//! TLS state: one-shot transport security init.

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::bringup::context::Context;
use crate::bringup::state::{State, StepResult};
use crate::error::BringUpError;

use super::{fail, DhcpState};

pub struct TlsState;

impl<B: NetBackend> State<B> for TlsState {
    fn step(self: Box<Self>, ctx: &mut Context<'_, B>, _now_ms: u64) -> (Box<dyn State<B>>, StepResult) {
        match ctx.security {
            Some(security) => {
                if let Err(e) = security.initialize() {
                    return fail(BringUpError::TlsInit(e));
                }
                log::info!("[TLS] Initialized");
            }
            None => log::debug!("[TLS] Not configured, skipping"),
        }
        (Box::new(DhcpState::new()), StepResult::Transition)
    }

    fn name(&self) -> &'static str {
        "TLS"
    }
}
