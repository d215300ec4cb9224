//! Node configuration and its command-line overrides.

use std::net::SocketAddrV4;

use clap::Parser;
use micronode_network::{BringUpConfig, Timeouts};

use crate::secrets;
use crate::session::SessionConfig;
use crate::transport::{TransportConfig, DEFAULT_LOCAL_PORT};

/// Locally administered default MAC.
pub const DEFAULT_MAC: [u8; 6] = [0x02, 0x00, 0x4d, 0x4e, 0x00, 0x01];

/// Name of the messaging worker thread.
pub const THREAD_NAME: &str = "micro-ROS thread";

/// Worker stack. Bring-up and the smoltcp interface live on it.
pub const THREAD_STACK_SIZE: usize = 64 * 1024;

/// Pause after a failed worker spawn.
pub const SPAWN_FAILURE_DELAY_MS: u64 = 50;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bring_up: BringUpConfig,
    pub transport: TransportConfig,
    pub session: SessionConfig,
    pub tap: String,
    pub mac: [u8; 6],
    pub local_port: u16,
    pub tls: bool,
    pub thread_name: String,
    pub thread_stack_size: usize,
    pub spawn_failure_delay_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bring_up: BringUpConfig {
                credentials: secrets::credentials(),
                ..BringUpConfig::default()
            },
            transport: TransportConfig::default(),
            session: SessionConfig::default(),
            tap: "tap0".into(),
            mac: DEFAULT_MAC,
            local_port: DEFAULT_LOCAL_PORT,
            tls: cfg!(feature = "tls"),
            thread_name: THREAD_NAME.into(),
            thread_stack_size: THREAD_STACK_SIZE,
            spawn_failure_delay_ms: SPAWN_FAILURE_DELAY_MS,
        }
    }
}

impl NodeConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut config = Self::default();
        config.transport = TransportConfig::new(cli.agent);
        config.tap = cli.tap.clone();
        config.mac = cli.mac;
        if let Some(ms) = cli.dhcp_timeout_ms {
            config.bring_up.timeouts = Timeouts::dhcp_within(ms);
        }
        config.session.timer_period_ms = cli.period_ms;
        config.tls &= !cli.no_tls;
        config
    }
}

/// micronode: bring the network up, then publish an Int32 counter and drive
/// an LED from incoming Int32 messages.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Agent address
    #[arg(long, default_value = "192.168.1.1:8888")]
    pub agent: SocketAddrV4,

    /// TAP interface carrying the node's frames
    #[arg(long, default_value = "tap0")]
    pub tap: String,

    /// Node MAC address
    #[arg(long, default_value = "02:00:4d:4e:00:01", value_parser = parse_mac)]
    pub mac: [u8; 6],

    /// Give up on DHCP after this many milliseconds (default: wait forever)
    #[arg(long)]
    pub dhcp_timeout_ms: Option<u64>,

    /// Publish period
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub period_ms: u64,

    /// Skip transport security initialization
    #[arg(long)]
    pub no_tls: bool,
}

pub fn format_mac(mac: &[u8; 6]) -> String {
    mac.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(":")
}

/// Parse `aa:bb:cc:dd:ee:ff`.
pub fn parse_mac(text: &str) -> Result<[u8; 6], String> {
    let mut mac = [0u8; 6];
    let mut parts = text.split(':');
    for byte in mac.iter_mut() {
        let part = parts.next().ok_or_else(|| format!("'{}': expected 6 octets", text))?;
        *byte = u8::from_str_radix(part, 16)
            .map_err(|_| format!("'{}': bad octet '{}'", text, part))?;
    }
    if parts.next().is_some() {
        return Err(format!("'{}': expected 6 octets", text));
    }
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert_eq!(config.transport.agent.to_string(), "192.168.1.1:8888");
        assert_eq!(config.thread_name, "micro-ROS thread");
        assert_eq!(config.session.timer_period_ms, 1000);
        assert_eq!(config.bring_up.timeouts.dhcp_ms, None);
        assert_eq!(config.mac, DEFAULT_MAC);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::try_parse_from([
            "micronode",
            "--agent",
            "10.0.0.2:9999",
            "--mac",
            "02:aa:bb:cc:dd:ee",
            "--dhcp-timeout-ms",
            "5000",
            "--period-ms",
            "250",
            "--no-tls",
        ])
        .unwrap();
        let config = NodeConfig::from_cli(&cli);

        assert_eq!(config.transport.agent.to_string(), "10.0.0.2:9999");
        assert_eq!(config.mac, [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);
        assert_eq!(config.bring_up.timeouts.dhcp_ms, Some(5000));
        assert_eq!(config.session.timer_period_ms, 250);
        assert!(!config.tls);
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["micronode", "--period-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["micronode", "--mac", "02:00"]).is_err());
    }

    #[test]
    fn test_mac_text() {
        let mac = parse_mac("02:00:4d:4E:00:01").unwrap();
        assert_eq!(mac, DEFAULT_MAC);
        assert_eq!(format_mac(&mac), "02:00:4d:4e:00:01");

        assert!(parse_mac("02:00:4d").is_err());
        assert!(parse_mac("02:00:4d:4e:00:01:ff").is_err());
        assert!(parse_mac("02:00:4d:4e:00:zz").is_err());
    }
}
