use std::time::Duration;

use anyhow::bail;
use clap::Parser;

pub const DEFAULT_PORT: u16 = 7777;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(4);

#[derive(Debug, Parser)]
#[command(
    name = "aisle",
    author,
    version,
    about = "Browse an Aisle product catalog from the terminal"
)]
pub struct Cli {
    /// Catalog server host.
    #[arg(long, env = "AISLE_HOST", default_value = "localhost")]
    pub host: String,

    /// Catalog server port.
    #[arg(long, env = "AISLE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Give up on a response after this many seconds without data.
    #[arg(long, env = "AISLE_READ_TIMEOUT_SECS", default_value_t = 3)]
    pub read_timeout_secs: u64,

    /// Give up dialing the server after this many seconds.
    #[arg(long, env = "AISLE_CONNECT_TIMEOUT_SECS", default_value_t = 4)]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl ClientConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_frame_bytes: aisle_core::DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl TryFrom<Cli> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.read_timeout_secs == 0 {
            bail!("read timeout must be at least one second");
        }
        if cli.connect_timeout_secs == 0 {
            bail!("connect timeout must be at least one second");
        }
        Ok(Self {
            host: cli.host,
            port: cli.port,
            read_timeout: Duration::from_secs(cli.read_timeout_secs),
            connect_timeout: Duration::from_secs(cli.connect_timeout_secs),
            ..Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn defaults_match_protocol_timeouts() {
        let cli = Cli::try_parse_from(["aisle"]).unwrap();
        let config = ClientConfig::try_from(cli).unwrap();
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test_timeout::timeout]
    fn zero_read_timeout_is_rejected() {
        let cli = Cli::try_parse_from(["aisle", "--read-timeout-secs", "0"]).unwrap();
        assert!(ClientConfig::try_from(cli).is_err());
    }

    #[test_timeout::timeout]
    fn addr_joins_host_and_port() {
        let config = ClientConfig {
            host: "catalog.internal".into(),
            port: 9000,
            ..ClientConfig::default()
        };
        assert_eq!(config.addr(), "catalog.internal:9000");
    }
}
