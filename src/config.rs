//! TOML configuration.
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 5000
//! log  = "sprig=debug,info"
//!
//! [database]
//! host     = "localhost"
//! user     = "root"
//! password = "admin"
//! database = "testdb"
//! ssl-mode = "disabled"     # extra keys go to the driver
//! ```

use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::db::DatabaseConfig;
use crate::error::Error;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// A `tracing-subscriber` filter directive. sprig only carries it; the
    /// binary installs the subscriber.
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    3000
}

impl Default for Config {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), log: None, database: None }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    /// `host:port` as a socket address. `host` must be an IP literal.
    pub fn socket_addr(&self) -> Result<SocketAddr, Error> {
        let ip = self.host.parse().map_err(|_| Error::Config(format!("host `{}` is not an IP address", self.host)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
