//! Error types for ipgeo.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use thiserror::Error;

use crate::LocationId;

/// Error type for ipgeo operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// IO error while opening or reading a feed
    #[error("{path}: {source}")]
    FeedIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid row in a feed, with the 1-based line it was read from
    #[error("{path}: line {line}: {source}")]
    Feed {
        path: PathBuf,
        line: usize,
        #[source]
        source: ValidationError,
    },

    /// Invalid data that is not attached to a feed line
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for ipgeo operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error raised while validating network or location rows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Row bytes are not valid UTF-8
    #[error("invalid UTF-8 after byte {0}")]
    InvalidEncoding(usize),

    /// CIDR column missing or not an IPv4 network
    #[error("invalid CIDR network: {0:?}")]
    InvalidNetwork(String),

    /// Location identifier column is empty
    #[error("missing location id")]
    MissingLocationId,

    /// Location identifier is not a non-negative integer
    #[error("invalid location id: {0:?}")]
    InvalidLocationId(String),

    /// Location row without a country
    #[error("missing required country for location {0}")]
    MissingCountry(LocationId),

    /// Location identifier seen twice
    #[error("duplicate location id: {0}")]
    DuplicateLocation(LocationId),
}

/// No indexed network contains the address.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no network for: {0}")]
pub struct NoMatch(pub Ipv4Addr);

/// The location table has no entry for the identifier.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("location not found: {0}")]
pub struct NotFound(pub LocationId);

/// Error returned by [`Resolver::resolve`](crate::Resolver::resolve).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// No coverage for this address
    #[error("unknown location for {0}")]
    UnknownLocation(Ipv4Addr),

    /// A network pointed at a location id missing from the location feed
    #[error("data inconsistency: {addr} maps to location {location_id} which does not exist")]
    DataInconsistency {
        addr: Ipv4Addr,
        location_id: LocationId,
    },
}

impl ResolveError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::UnknownLocation(_) => "unknown_location",
            ResolveError::DataInconsistency { .. } => "data_inconsistency",
        }
    }
}
