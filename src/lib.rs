//! ipgeo - IPv4 geolocation backed by a longest-prefix network index.
//!
//! An address is resolved in two steps: the [`NetworkIndex`] finds the most
//! specific CIDR block containing it, and the [`LocationTable`] maps that
//! block's location id to a [`Location`] (country, two subdivision levels,
//! city). The [`Resolver`] chains both and keeps "no coverage" apart from
//! "the two feeds disagree".
//!
//! # Features
//!
//! - **Longest-prefix match**: arena-backed binary trie, at most 32 steps per lookup
//! - **Interchangeable storage**: [`NetworkStore`] with a linear reference
//!   implementation for differential testing
//! - **Feed loading**: comma-delimited network and location feeds, plain or gzipped
//! - **Read-only after build**: every structure is `Send + Sync` and lock-free to query
//! - **HTTP front end**: `GET /ip/{addr}` via [`server`]
//!
//! # Quick Start
//!
//! ```ignore
//! use ipgeo::Config;
//!
//! let resolver = Config::new("ipv4.csv", "locations.csv").load()?;
//! let location = resolver.resolve("1.0.0.5".parse()?)?;
//! println!("{}", location.country);
//! ```
//!
//! # Failure semantics
//!
//! - A malformed network row is skipped with a warning.
//! - A malformed or duplicate location row fails the whole build.
//! - [`ResolveError::UnknownLocation`]: no indexed network contains the address.
//! - [`ResolveError::DataInconsistency`]: the matching network references a
//!   location id that is not in the location feed.

mod config;
mod error;
mod location;
mod resolver;

pub mod feed;
pub mod network;
pub mod server;

// Re-export core types
pub use error::{Error, NoMatch, NotFound, ResolveError, Result, ValidationError};
pub use location::{Location, LocationEntry, LocationId, LocationTable};
pub use network::{NetworkEntry, NetworkIndex, NetworkList, NetworkStore, NetworkTrie};
pub use resolver::Resolver;

// Re-export configuration
pub use config::{Config, DEFAULT_LISTEN, DEFAULT_LOCATIONS, DEFAULT_NETWORKS};
pub use feed::{FeedOptions, FeedStats};
