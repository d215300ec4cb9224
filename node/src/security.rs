//! Transport security backed by rustls.

use micronode_network::{SecurityError, TransportSecurity};
use rustls::crypto::CryptoProvider;

/// Makes ring the process-wide rustls crypto provider.
///
/// Safe to run more than once: a provider installed earlier is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustlsSecurity;

impl TransportSecurity for RustlsSecurity {
    fn initialize(&self) -> Result<(), SecurityError> {
        if rustls::crypto::ring::default_provider().install_default().is_ok() {
            log::info!("[TLS] ring provider installed");
        } else {
            log::debug!("[TLS] Crypto provider already installed");
        }

        CryptoProvider::get_default()
            .map(|_| ())
            .ok_or_else(|| SecurityError("no rustls crypto provider".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let security = RustlsSecurity;
        security.initialize().unwrap();
        security.initialize().unwrap();
        assert!(CryptoProvider::get_default().is_some());
    }
}
