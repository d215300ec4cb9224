//! Shared context for the bring-up state machine.

use crate::backend::{NetBackend, PoolConfig};
use crate::device::Credentials;
use crate::dhcp::AddressLease;
use crate::error::{BringUpError, Stage};
use crate::stack::StackConfig;
use crate::time::CancelToken;
use crate::tls::TransportSecurity;

use super::Ready;

/// Timeout configuration for bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// How long to wait for a DHCP lease. `None` waits forever.
    pub dhcp_ms: Option<u64>,
    /// Sleep between DHCP polls.
    pub dhcp_poll_interval_ms: u64,
}

impl Timeouts {
    /// Wait for an address indefinitely.
    pub const fn forever() -> Self {
        Self { dhcp_ms: None, dhcp_poll_interval_ms: 50 }
    }

    pub const fn dhcp_within(ms: u64) -> Self {
        Self { dhcp_ms: Some(ms), dhcp_poll_interval_ms: 50 }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::forever()
    }
}

/// Full bring-up configuration.
#[derive(Debug, Clone, Default)]
pub struct BringUpConfig {
    pub pool: PoolConfig,
    pub stack: StackConfig,
    /// Link credentials, for drivers that must join a network first.
    pub credentials: Option<Credentials>,
    pub timeouts: Timeouts,
}

/// Context passed between states. Holds every resource created so far.
pub struct Context<'a, B: NetBackend> {
    pub backend: &'a mut B,
    pub config: BringUpConfig,
    pub security: Option<&'a dyn TransportSecurity>,
    pub cancel: Option<CancelToken>,
    pub pool: Option<B::Pool>,
    pub stack: Option<B::Stack>,
    pub dhcp: Option<B::Dhcp>,
    pub resolver: Option<B::Resolver>,
    pub lease: Option<AddressLease>,
}

impl<'a, B: NetBackend> Context<'a, B> {
    pub fn new(backend: &'a mut B, config: BringUpConfig) -> Self {
        Self {
            backend,
            config,
            security: None,
            cancel: None,
            pool: None,
            stack: None,
            dhcp: None,
            resolver: None,
            lease: None,
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Release everything created so far, newest first.
    ///
    /// Release failures are logged and skipped; the remaining resources are
    /// still released.
    pub fn unwind(&mut self) {
        self.lease = None;

        if let Some(resolver) = self.resolver.take() {
            match self.stack.as_mut() {
                Some(stack) => {
                    if let Err(e) = self.backend.delete_resolver(stack, resolver) {
                        log::warn!("[NET] Releasing resolver failed: {}", e);
                    }
                }
                None => log::warn!("[NET] Resolver outlived its stack"),
            }
        }

        if let Some(dhcp) = self.dhcp.take() {
            match self.stack.as_mut() {
                Some(stack) => {
                    if let Err(e) = self.backend.delete_dhcp(stack, dhcp) {
                        log::warn!("[NET] Releasing DHCP client failed: {}", e);
                    }
                }
                None => log::warn!("[NET] DHCP client outlived its stack"),
            }
        }

        if let Some(stack) = self.stack.take() {
            if let Err(e) = self.backend.delete_stack(stack) {
                log::warn!("[NET] Releasing IP stack failed: {}", e);
            }
        }

        if let Some(pool) = self.pool.take() {
            if let Err(e) = self.backend.delete_pool(pool) {
                log::warn!("[NET] Releasing packet pool failed: {}", e);
            }
        }
    }

    /// Move the finished resources out. Fails if any stage left a gap.
    pub fn into_ready(mut self) -> Result<Ready<B>, BringUpError> {
        let missing = if self.pool.is_none() {
            Some(Stage::PacketPool)
        } else if self.stack.is_none() {
            Some(Stage::NetworkStack)
        } else if self.dhcp.is_none() || self.lease.is_none() {
            Some(Stage::AddressAcquisition)
        } else if self.resolver.is_none() {
            Some(Stage::NameResolution)
        } else {
            None
        };

        if let Some(stage) = missing {
            self.unwind();
            return Err(BringUpError::Incomplete(stage));
        }

        match (self.pool, self.stack, self.dhcp, self.resolver, self.lease) {
            (Some(pool), Some(stack), Some(dhcp), Some(resolver), Some(lease)) => {
                Ok(Ready { resolver, dhcp, stack, pool, lease })
            }
            _ => Err(BringUpError::Incomplete(Stage::PacketPool)),
        }
    }
}
