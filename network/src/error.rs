//! Network error types

use core::fmt;

use packet_pool::PoolError;

use crate::device::LinkError;
use crate::stack::{Protocol, StackError};
use crate::tls::SecurityError;

/// Bring-up stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    PacketPool,
    NetworkStack,
    Protocols,
    TransportSecurity,
    AddressAcquisition,
    NameResolution,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::PacketPool,
        Stage::NetworkStack,
        Stage::Protocols,
        Stage::TransportSecurity,
        Stage::AddressAcquisition,
        Stage::NameResolution,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PacketPool => "packet pool",
            Self::NetworkStack => "network stack",
            Self::Protocols => "protocols",
            Self::TransportSecurity => "transport security",
            Self::AddressAcquisition => "address acquisition",
            Self::NameResolution => "name resolution",
        };
        f.write_str(name)
    }
}

/// Failure reported by a [`NetBackend`](crate::backend::NetBackend) operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("packet pool: {0}")]
    Pool(#[from] PoolError),
    #[error("stack: {0}")]
    Stack(#[from] StackError),
    #[error("link: {0}")]
    Link(#[from] LinkError),
    #[error("{0} unavailable")]
    Unavailable(&'static str),
    #[error("fault: {0}")]
    Fault(&'static str),
}

/// Bring-up failure. Every variant maps to the stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BringUpError {
    #[error("{stage}: resource creation failed: {source}")]
    ResourceCreation {
        stage: Stage,
        #[source]
        source: BackendError,
    },
    #[error("enabling {protocol} failed: {source}")]
    ProtocolEnable {
        protocol: Protocol,
        #[source]
        source: BackendError,
    },
    #[error("transport security init failed: {0}")]
    TlsInit(#[source] SecurityError),
    #[error("lease has no option {option}")]
    LeaseOptionMissing { option: u8 },
    #[error("resolver rejected server: {0}")]
    DnsServer(#[source] BackendError),
    #[error("no address after {waited_ms} ms")]
    AddressTimeout { waited_ms: u64 },
    #[error("cancelled during {0}")]
    Cancelled(Stage),
    #[error("{0} finished without its resource")]
    Incomplete(Stage),
}

impl BringUpError {
    /// Stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            Self::ResourceCreation { stage, .. } => *stage,
            Self::ProtocolEnable { .. } => Stage::Protocols,
            Self::TlsInit(_) => Stage::TransportSecurity,
            Self::LeaseOptionMissing { .. } | Self::DnsServer(_) => Stage::NameResolution,
            Self::AddressTimeout { .. } => Stage::AddressAcquisition,
            Self::Cancelled(stage) | Self::Incomplete(stage) => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        let err = BringUpError::ProtocolEnable {
            protocol: Protocol::Datagram,
            source: BackendError::Fault("udp"),
        };
        assert_eq!(err.stage(), Stage::Protocols);
        assert_eq!(
            BringUpError::LeaseOptionMissing { option: 6 }.stage(),
            Stage::NameResolution
        );
        assert_eq!(
            BringUpError::AddressTimeout { waited_ms: 10 }.stage(),
            Stage::AddressAcquisition
        );
    }

    #[test]
    fn test_display() {
        let err = BringUpError::ResourceCreation {
            stage: Stage::PacketPool,
            source: BackendError::Pool(PoolError::ZeroSlots),
        };
        assert_eq!(
            err.to_string(),
            "packet pool: resource creation failed: packet pool: slot count must be non-zero"
        );
        assert_eq!(
            BringUpError::ProtocolEnable {
                protocol: Protocol::AddressResolution,
                source: BackendError::Fault("arp"),
            }
            .to_string(),
            "enabling ARP failed: fault: arp"
        );
    }

    #[test]
    fn test_stages_ordered() {
        assert!(Stage::ALL.windows(2).all(|w| w[0] < w[1]));
    }
}
