//! DHCP state: acquires an IPv4 address.

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::bringup::context::Context;
use crate::bringup::state::{State, StepResult};
use crate::error::{BringUpError, Stage};

use super::{fail, DnsState};

/// DHCP acquisition state.
pub struct DhcpState {
    started_ms: Option<u64>,
}

impl DhcpState {
    pub fn new() -> Self {
        Self { started_ms: None }
    }
}

impl Default for DhcpState {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: NetBackend> State<B> for DhcpState {
    fn step(
        mut self: Box<Self>,
        ctx: &mut Context<'_, B>,
        now_ms: u64,
    ) -> (Box<dyn State<B>>, StepResult) {
        if ctx.cancelled() {
            log::warn!("[DHCP] Cancelled");
            return fail(BringUpError::Cancelled(Stage::AddressAcquisition));
        }

        let Some(stack) = ctx.stack.as_mut() else {
            return fail(BringUpError::Incomplete(Stage::NetworkStack));
        };

        let started = match self.started_ms {
            Some(started) => started,
            None => {
                let mut dhcp = match ctx.backend.create_dhcp(stack) {
                    Ok(dhcp) => dhcp,
                    Err(source) => {
                        return fail(BringUpError::ResourceCreation {
                            stage: Stage::AddressAcquisition,
                            source,
                        })
                    }
                };
                let started = ctx
                    .backend
                    .start_dhcp(stack, &mut dhcp, ctx.config.credentials.as_ref());
                // Record the client first so a failed start still releases it.
                ctx.dhcp = Some(dhcp);
                if let Err(source) = started {
                    return fail(BringUpError::ResourceCreation {
                        stage: Stage::AddressAcquisition,
                        source,
                    });
                }
                log::info!("[DHCP] Starting DHCP discovery...");
                self.started_ms = Some(now_ms);
                now_ms
            }
        };

        let Some(dhcp) = ctx.dhcp.as_mut() else {
            return fail(BringUpError::Incomplete(Stage::AddressAcquisition));
        };

        if let Some(lease) = ctx.backend.poll_lease(stack, dhcp, now_ms) {
            log::info!("[DHCP] Got IP: {}/{}", lease.address, lease.prefix_len);
            if let Some(router) = lease.router() {
                log::info!("[DHCP] Gateway: {}", router);
            }
            for (i, dns) in lease.addresses(crate::dhcp::OPTION_DNS_SERVER).enumerate() {
                log::info!("[DHCP] DNS {}: {}", i, dns);
            }
            ctx.lease = Some(lease);
            return (Box::new(DnsState), StepResult::Transition);
        }

        let waited_ms = now_ms.saturating_sub(started);
        match ctx.config.timeouts.dhcp_ms {
            Some(limit) if waited_ms >= limit => {
                fail(BringUpError::AddressTimeout { waited_ms })
            }
            _ => (self, StepResult::Continue),
        }
    }

    fn name(&self) -> &'static str {
        "DHCP"
    }
}
