//! DNS state: points the resolver at the lease's DNS server.

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::bringup::context::Context;
use crate::bringup::state::{State, StepResult};
use crate::dhcp::OPTION_DNS_SERVER;
use crate::error::{BringUpError, Stage};

use super::{fail, DoneState};

pub struct DnsState;

impl<B: NetBackend> State<B> for DnsState {
    fn step(self: Box<Self>, ctx: &mut Context<'_, B>, _now_ms: u64) -> (Box<dyn State<B>>, StepResult) {
        let Some(stack) = ctx.stack.as_mut() else {
            return fail(BringUpError::Incomplete(Stage::NetworkStack));
        };

        let resolver = match ctx.backend.create_resolver(stack) {
            Ok(resolver) => ctx.resolver.insert(resolver),
            Err(source) => {
                return fail(BringUpError::ResourceCreation {
                    stage: Stage::NameResolution,
                    source,
                })
            }
        };

        let server = match ctx.lease.as_ref().and_then(|lease| lease.dns_server()) {
            Some(server) => server,
            None => {
                log::error!("[DNS] Lease carries no DNS server");
                return fail(BringUpError::LeaseOptionMissing { option: OPTION_DNS_SERVER });
            }
        };

        if let Err(e) = ctx.backend.add_dns_server(stack, resolver, server) {
            return fail(BringUpError::DnsServer(e));
        }

        log::info!("[DNS] Server {}", server);
        (Box::new(DoneState), StepResult::Done)
    }

    fn name(&self) -> &'static str {
        "DNS"
    }
}
