//! Protocols state: enables ARP, ICMP, TCP and UDP as one step.

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::bringup::context::Context;
use crate::bringup::state::{State, StepResult};
use crate::error::{BringUpError, Stage};
use crate::stack::Protocol;

use super::{fail, TlsState};

pub struct ProtocolsState;

impl<B: NetBackend> State<B> for ProtocolsState {
    fn step(self: Box<Self>, ctx: &mut Context<'_, B>, _now_ms: u64) -> (Box<dyn State<B>>, StepResult) {
        let Some(stack) = ctx.stack.as_mut() else {
            return fail(BringUpError::Incomplete(Stage::NetworkStack));
        };

        // Any single failure fails the whole step.
        for protocol in Protocol::ALL {
            if let Err(source) = ctx.backend.enable_protocol(stack, protocol) {
                return fail(BringUpError::ProtocolEnable { protocol, source });
            }
        }

        log::info!("[STACK] Enabled ARP, ICMP, TCP, UDP");
        (Box::new(TlsState), StepResult::Transition)
    }

    fn name(&self) -> &'static str {
        "Protocols"
    }
}
