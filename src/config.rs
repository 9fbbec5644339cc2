//! Service configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::feed::FeedOptions;
use crate::location::LocationTable;
use crate::network::NetworkIndex;
use crate::resolver::Resolver;
use crate::server::ServerTimeouts;
use crate::{Error, Result};

/// Default path of the network feed.
pub const DEFAULT_NETWORKS: &str = "ipv4.csv";
/// Default path of the location feed.
pub const DEFAULT_LOCATIONS: &str = "locations.csv";
/// Default listen address of the HTTP server.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Configuration for loading the feeds and serving lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Network feed: `<cidr>,<location id>` rows
    pub networks: PathBuf,
    /// Location feed: `<id>,<country>,<subdivision1>,<subdivision2>,<city>` rows
    pub locations: PathBuf,
    /// HTTP listen address
    pub listen: SocketAddr,
    /// Options applied to both feeds
    pub feed: FeedOptions,
    /// Request and shutdown deadlines of the HTTP server
    pub timeouts: ServerTimeouts,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            networks: PathBuf::from(DEFAULT_NETWORKS),
            locations: PathBuf::from(DEFAULT_LOCATIONS),
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            feed: FeedOptions::default(),
            timeouts: ServerTimeouts::default(),
        }
    }
}

impl Config {
    /// Create a config for the given feeds with default serving options.
    pub fn new(networks: impl Into<PathBuf>, locations: impl Into<PathBuf>) -> Self {
        Self {
            networks: networks.into(),
            locations: locations.into(),
            ..Self::default()
        }
    }

    /// Set the listen address from its textual form.
    pub fn with_listen(mut self, listen: &str) -> Result<Self> {
        self.listen = listen
            .parse()
            .map_err(|_| Error::Config(format!("invalid listen address: {}", listen)))?;
        Ok(self)
    }

    /// Set whether the feeds start with a header row.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.feed.has_header = has_header;
        self
    }

    /// Check that both feed files exist.
    pub fn validate(&self) -> Result<()> {
        for (name, path) in [("networks", &self.networks), ("locations", &self.locations)] {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "{} feed not found: {}",
                    name,
                    path.display()
                )));
            }
        }
        Ok(())
    }

    /// Build the resolver from the configured feeds.
    ///
    /// The location feed is loaded first since any invalid row in it aborts
    /// startup.
    pub fn load(&self) -> Result<Resolver> {
        self.validate()?;
        let locations = LocationTable::from_path(&self.locations, self.feed)?;
        let networks = NetworkIndex::from_path(&self.networks, self.feed)?;
        Ok(Resolver::new(networks, locations))
    }
}
