//! Orchestrator: runs the bring-up states to completion.

use alloc::boxed::Box;

use crate::backend::NetBackend;
use crate::dhcp::AddressLease;
use crate::error::{BackendError, BringUpError};
use crate::time::{CancelToken, Clock};
use crate::tls::TransportSecurity;

use super::context::{BringUpConfig, Context};
use super::state::{State, StepResult};
use super::states::PoolState;

/// A node whose network is up: pool, stack, DHCP client and resolver.
///
/// The resources stay alive until [`Ready::release`].
pub struct Ready<B: NetBackend> {
    pub(crate) resolver: B::Resolver,
    pub(crate) dhcp: B::Dhcp,
    pub(crate) stack: B::Stack,
    pub(crate) pool: B::Pool,
    pub(crate) lease: AddressLease,
}

impl<B: NetBackend> Ready<B> {
    pub fn stack(&self) -> &B::Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut B::Stack {
        &mut self.stack
    }

    pub fn resolver(&self) -> &B::Resolver {
        &self.resolver
    }

    pub fn lease(&self) -> &AddressLease {
        &self.lease
    }

    /// Tear everything down, newest first. Reports the first failure after
    /// attempting every release.
    pub fn release(self, backend: &mut B) -> Result<(), BackendError> {
        let Ready { resolver, dhcp, mut stack, pool, .. } = self;

        let results = [
            backend.delete_resolver(&mut stack, resolver),
            backend.delete_dhcp(&mut stack, dhcp),
            backend.delete_stack(stack),
            backend.delete_pool(pool),
        ];
        log::info!("[NET] Network released");
        results.into_iter().collect()
    }
}

impl<B: NetBackend> core::fmt::Debug for Ready<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ready").field("lease", &self.lease).finish_non_exhaustive()
    }
}

/// Bring-up builder.
pub struct BringUp<'a, B: NetBackend> {
    backend: &'a mut B,
    config: BringUpConfig,
    security: Option<&'a dyn TransportSecurity>,
    cancel: Option<CancelToken>,
}

impl<'a, B: NetBackend> BringUp<'a, B> {
    pub fn new(backend: &'a mut B, config: BringUpConfig) -> Self {
        Self { backend, config, security: None, cancel: None }
    }

    /// Initialize transport security between protocol enable and DHCP.
    pub fn with_security(mut self, security: &'a dyn TransportSecurity) -> Self {
        self.security = Some(security);
        self
    }

    /// Abort the address wait when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run every stage in order. On failure, everything created is released
    /// before the error is returned.
    pub fn run(self, clock: &dyn Clock) -> Result<Ready<B>, BringUpError> {
        let mut ctx = Context::new(self.backend, self.config);
        ctx.security = self.security;
        ctx.cancel = self.cancel;

        let poll_interval = ctx.config.timeouts.dhcp_poll_interval_ms;
        let mut current: Box<dyn State<B>> = Box::new(PoolState);
        log::debug!("[NET] State: {}", current.name());

        loop {
            let now_ms = clock.now_ms();
            let (next, result) = current.step(&mut ctx, now_ms);
            current = next;

            match result {
                StepResult::Continue => clock.sleep_ms(poll_interval),
                StepResult::Transition => log::debug!("[NET] State: {}", current.name()),
                StepResult::Done => {
                    log::info!("[NET] Network ready");
                    return ctx.into_ready();
                }
                StepResult::Failed(err) => {
                    log::warn!("[NET] Bring-up failed at {}, releasing resources", err.stage());
                    ctx.unwind();
                    return Err(err);
                }
            }
        }
    }
}

/// Bring the network up without transport security or cancellation.
pub fn bring_up<B: NetBackend>(
    backend: &mut B,
    config: BringUpConfig,
    clock: &dyn Clock,
) -> Result<Ready<B>, BringUpError> {
    BringUp::new(backend, config).run(clock)
}
