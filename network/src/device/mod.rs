//! Packet-forwarding driver interface.
//!
//! The IP stack is generic over the driver that moves Ethernet frames on and
//! off the wire (radio, TAP device, capture interface). Drivers that need to
//! join a network before frames flow (Wi-Fi) do so in [`NetworkDriver::connect`].

use alloc::string::String;
use core::fmt;

/// TX error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxError {
    /// TX queue is full, try again later.
    QueueFull,
    /// Device not ready.
    DeviceNotReady,
    /// Frame too large.
    FrameTooLarge,
}

/// RX error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxError {
    /// Provided buffer too small for frame.
    BufferTooSmall {
        /// Required buffer size.
        needed: usize,
    },
    /// Device error.
    DeviceError,
}

/// Failure to join the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("network not found")]
    NotFound,
    #[error("authentication rejected")]
    AuthRejected,
    #[error("security mode not supported by driver")]
    Unsupported,
}

/// Link-layer security used when joining a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityMode {
    Open,
    #[default]
    Wpa2PskAes,
    Wpa3Sae,
}

impl SecurityMode {
    /// Parse the names used in build-time configuration.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "open" | "OPEN" => Some(Self::Open),
            "wpa2" | "WPA2_PSK_AES" => Some(Self::Wpa2PskAes),
            "wpa3" | "WPA3_SAE" => Some(Self::Wpa3Sae),
            _ => None,
        }
    }
}

/// Network join credentials. The passphrase is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub psk: String,
    pub security: SecurityMode,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .field("psk", &"<redacted>")
            .field("security", &self.security)
            .finish()
    }
}

/// Core network device interface.
///
/// Higher layers (smoltcp adapter, bring-up) use only this interface.
pub trait NetworkDriver {
    /// Get MAC address.
    fn mac_address(&self) -> [u8; 6];

    /// Check if device can accept a TX frame.
    fn can_transmit(&self) -> bool;

    /// Check if device has a received frame ready.
    fn can_receive(&self) -> bool;

    /// Transmit an Ethernet frame.
    ///
    /// # Contract
    /// - MUST return immediately (no completion wait)
    fn transmit(&mut self, frame: &[u8]) -> Result<(), TxError>;

    /// Receive an Ethernet frame.
    ///
    /// # Returns
    /// - `Ok(Some(len))`: Frame received, `len` bytes copied
    /// - `Ok(None)`: No frame available (normal)
    /// - `Err(RxError)`: Receive error
    ///
    /// # Contract
    /// - MUST return immediately (no blocking)
    fn receive(&mut self, buffer: &mut [u8]) -> Result<Option<usize>, RxError>;

    /// Get link status.
    fn link_up(&self) -> bool {
        true
    }

    /// Join the network described by `credentials`. Wired drivers ignore it.
    fn connect(&mut self, credentials: &Credentials) -> Result<(), LinkError> {
        let _ = credentials;
        Ok(())
    }
}

/// Placeholder NIC that does nothing. Useful for early bring-up.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDevice;

impl NetworkDriver for NullDevice {
    fn mac_address(&self) -> [u8; 6] {
        [0x02, 0, 0, 0, 0, 0x01]
    }

    fn can_transmit(&self) -> bool {
        true
    }

    fn can_receive(&self) -> bool {
        false
    }

    fn transmit(&mut self, _frame: &[u8]) -> Result<(), TxError> {
        Ok(())
    }

    fn receive(&mut self, _buffer: &mut [u8]) -> Result<Option<usize>, RxError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_mode_names() {
        assert_eq!(SecurityMode::from_name("WPA2_PSK_AES"), Some(SecurityMode::Wpa2PskAes));
        assert_eq!(SecurityMode::from_name("open"), Some(SecurityMode::Open));
        assert_eq!(SecurityMode::from_name("wep"), None);
    }

    #[test]
    fn test_credentials_debug_hides_psk() {
        let creds = Credentials {
            ssid: "lab".into(),
            psk: "hunter22".into(),
            security: SecurityMode::Wpa2PskAes,
        };
        let shown = format!("{:?}", creds);
        assert!(shown.contains("lab"));
        assert!(!shown.contains("hunter22"));
    }

    #[test]
    fn test_default_connect_is_noop() {
        let mut dev = NullDevice;
        let creds = Credentials {
            ssid: "x".into(),
            psk: String::new(),
            security: SecurityMode::Open,
        };
        assert_eq!(dev.connect(&creds), Ok(()));
        assert!(dev.link_up());
    }
}
