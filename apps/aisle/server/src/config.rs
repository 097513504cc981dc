use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{bail, Context};
use clap::Parser;

use crate::session::SessionConfig;

#[derive(Debug, Parser)]
#[command(
    name = "aisle-server",
    author,
    version,
    about = "Serves a hierarchical product catalog over a framed JSON TCP protocol"
)]
pub struct Cli {
    /// Address to bind the catalog listener to.
    #[arg(long, env = "AISLE_LISTEN_ADDR", default_value = "127.0.0.1:7777")]
    pub listen_addr: String,

    /// Catalog to serve: a `.json` fixture or an SQLite database file.
    #[arg(long, env = "AISLE_CATALOG")]
    pub catalog: PathBuf,

    /// Close sessions that send nothing for this long (0 disables).
    #[arg(long, env = "AISLE_IDLE_TIMEOUT_SECS", default_value_t = 300)]
    pub idle_timeout_secs: u64,

    /// Largest request a session will buffer while waiting for a terminator.
    #[arg(long, env = "AISLE_MAX_FRAME_BYTES", default_value_t = aisle_core::DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,

    /// Grace period applied during shutdown.
    #[arg(long, env = "AISLE_SHUTDOWN_GRACE_SECS", default_value_t = 2)]
    pub shutdown_grace_secs: u64,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "AISLE_METRICS_ADDR")]
    pub metrics_addr: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Fixture,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub catalog: PathBuf,
    pub catalog_kind: CatalogKind,
    pub session: SessionConfig,
    pub shutdown_grace: Duration,
    pub metrics_addr: Option<SocketAddr>,
}

impl TryFrom<Cli> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let listen_addr: SocketAddr = cli
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address: {}", cli.listen_addr))?;
        let metrics_addr = cli
            .metrics_addr
            .as_deref()
            .map(|addr| {
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("invalid metrics address: {addr}"))
            })
            .transpose()?;
        if cli.max_frame_bytes == 0 {
            bail!("max frame size must be greater than zero");
        }
        let catalog_kind = match cli.catalog.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => CatalogKind::Fixture,
            _ => CatalogKind::Sqlite,
        };
        let idle_timeout =
            (cli.idle_timeout_secs > 0).then(|| Duration::from_secs(cli.idle_timeout_secs));

        Ok(ServerConfig {
            listen_addr,
            catalog: cli.catalog,
            catalog_kind,
            session: SessionConfig {
                idle_timeout,
                max_frame_bytes: cli.max_frame_bytes,
            },
            shutdown_grace: Duration::from_secs(cli.shutdown_grace_secs),
            metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let mut argv = vec!["aisle-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_from(Cli::try_parse_from(argv)?)
    }

    #[test_timeout::timeout]
    fn json_catalog_selects_fixture_backend() {
        let config = parse(&["--catalog", "demo/catalog.json"]).unwrap();
        assert_eq!(config.catalog_kind, CatalogKind::Fixture);
        assert_eq!(config.listen_addr, "127.0.0.1:7777".parse().unwrap());
        assert_eq!(config.session.idle_timeout, Some(Duration::from_secs(300)));
    }

    #[test_timeout::timeout]
    fn other_paths_select_sqlite() {
        let config = parse(&["--catalog", "/var/lib/aisle/catalog.db"]).unwrap();
        assert_eq!(config.catalog_kind, CatalogKind::Sqlite);
    }

    #[test_timeout::timeout]
    fn zero_idle_timeout_disables_it() {
        let config = parse(&["--catalog", "c.json", "--idle-timeout-secs", "0"]).unwrap();
        assert_eq!(config.session.idle_timeout, None);
    }

    #[test_timeout::timeout]
    fn bad_listen_address_is_rejected() {
        let err = parse(&["--catalog", "c.json", "--listen-addr", "nowhere"]).unwrap_err();
        assert!(err.to_string().contains("invalid listen address"));
    }
}
