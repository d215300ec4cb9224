//! Transport security hook.
//!
//! TLS itself lives above the network layer; bring-up only needs the global
//! subsystem initialized once before any secure session is opened.

use alloc::string::String;

/// Transport security initialization failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct SecurityError(pub String);

/// One-shot global TLS initialization. Must be idempotent.
pub trait TransportSecurity {
    fn initialize(&self) -> Result<(), SecurityError>;
}
