//! Protocol selection for an IP stack.

use core::fmt;

bitflags::bitflags! {
    /// Protocols enabled on a stack.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ProtocolSet: u8 {
        const ADDRESS_RESOLUTION = 1 << 0;
        const CONTROL_MESSAGES = 1 << 1;
        const STREAM = 1 << 2;
        const DATAGRAM = 1 << 3;
    }
}

/// A single protocol, as enabled during bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// ARP.
    AddressResolution,
    /// ICMP.
    ControlMessages,
    /// TCP.
    Stream,
    /// UDP.
    Datagram,
}

impl Protocol {
    /// Enable order.
    pub const ALL: [Protocol; 4] = [
        Protocol::AddressResolution,
        Protocol::ControlMessages,
        Protocol::Stream,
        Protocol::Datagram,
    ];

    pub const fn flag(self) -> ProtocolSet {
        match self {
            Self::AddressResolution => ProtocolSet::ADDRESS_RESOLUTION,
            Self::ControlMessages => ProtocolSet::CONTROL_MESSAGES,
            Self::Stream => ProtocolSet::STREAM,
            Self::Datagram => ProtocolSet::DATAGRAM,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AddressResolution => "ARP",
            Self::ControlMessages => "ICMP",
            Self::Stream => "TCP",
            Self::Datagram => "UDP",
        })
    }
}
