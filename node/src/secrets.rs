//! Link credentials baked in at build time.
//!
//! Set `MICRONODE_WIFI_SSID`, `MICRONODE_WIFI_PSK` and optionally
//! `MICRONODE_WIFI_SECURITY` (`open`, `wpa2`, `wpa3`) when building. Without
//! an SSID the node assumes a wired link and joins nothing.

use micronode_network::{Credentials, SecurityMode};

const WIFI_SSID: Option<&str> = option_env!("MICRONODE_WIFI_SSID");
const WIFI_PSK: Option<&str> = option_env!("MICRONODE_WIFI_PSK");
const WIFI_SECURITY: Option<&str> = option_env!("MICRONODE_WIFI_SECURITY");

/// Credentials compiled into this binary, if any.
pub fn credentials() -> Option<Credentials> {
    credentials_from(WIFI_SSID, WIFI_PSK, WIFI_SECURITY)
}

/// An empty PSK implies an open network unless a mode is named.
pub fn credentials_from(
    ssid: Option<&str>,
    psk: Option<&str>,
    security: Option<&str>,
) -> Option<Credentials> {
    let ssid = ssid.filter(|s| !s.is_empty())?;
    let psk = psk.unwrap_or_default();
    let security = match security.and_then(SecurityMode::from_name) {
        Some(mode) => mode,
        None if psk.is_empty() => SecurityMode::Open,
        None => SecurityMode::default(),
    };
    Some(Credentials { ssid: ssid.into(), psk: psk.into(), security })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_ssid_means_wired() {
        assert!(credentials_from(None, Some("secret"), None).is_none());
        assert!(credentials_from(Some(""), None, None).is_none());
    }

    #[test]
    fn test_security_defaults() {
        let open = credentials_from(Some("lab"), None, None).unwrap();
        assert_eq!(open.security, SecurityMode::Open);

        let wpa2 = credentials_from(Some("lab"), Some("secret"), None).unwrap();
        assert_eq!(wpa2.security, SecurityMode::Wpa2PskAes);
        assert_eq!(wpa2.psk, "secret");
    }
}
