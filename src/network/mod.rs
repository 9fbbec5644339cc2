//! Network index: CIDR blocks → location identifier, longest prefix wins.

mod list;
mod trie;

pub use list::NetworkList;
pub use trie::NetworkTrie;

use ipnet::Ipv4Net;
use std::io::Read;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::{Error, NoMatch, Result, ValidationError};
use crate::feed::{self, FeedOptions, FeedStats, Record};
use crate::location::{parse_location_id, LocationId};

/// A row of the network feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkEntry {
    /// Network block with host bits cleared
    pub network: Ipv4Net,
    pub location_id: LocationId,
}

impl NetworkEntry {
    /// Create a new entry. Host bits of `network` are cleared.
    pub fn new(network: Ipv4Net, location_id: LocationId) -> Self {
        Self {
            network: network.trunc(),
            location_id,
        }
    }

    /// Validate a feed row of the form `<cidr>,<location id>[,...]`.
    pub fn from_record(record: &Record) -> std::result::Result<Self, ValidationError> {
        let raw = record.get(0);
        let network = raw
            .parse::<Ipv4Net>()
            .map_err(|_| ValidationError::InvalidNetwork(raw.to_string()))?;
        let location_id = parse_location_id(record.get(1))?;
        Ok(Self::new(network, location_id))
    }

    /// Prefix length of the block.
    pub fn prefix_len(&self) -> u8 {
        self.network.prefix_len()
    }

    /// Check if the block contains the address.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.network.contains(&addr)
    }
}

/// Storage capability behind the network index.
///
/// `containing` must return every inserted entry whose block contains the
/// address. Entries inserted for the same block keep their insertion order.
pub trait NetworkStore: Default + Send + Sync {
    /// Add an entry.
    fn insert(&mut self, entry: NetworkEntry);

    /// All entries whose block contains `addr`.
    fn containing(&self, addr: Ipv4Addr) -> Vec<&NetworkEntry>;

    /// Number of entries stored.
    fn len(&self) -> usize;

    /// Check if nothing has been stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, in insertion order.
    fn entries(&self) -> &[NetworkEntry];
}

/// Pick the most specific entry.
///
/// Longest prefix wins. Two distinct blocks with the same prefix length
/// cannot both contain one address, so equal lengths only occur for the
/// same block inserted more than once: the entry met first wins, which is
/// the first inserted for both stores.
pub fn longest_prefix<'a, I>(candidates: I) -> Option<&'a NetworkEntry>
where
    I: IntoIterator<Item = &'a NetworkEntry>,
{
    let mut best: Option<&NetworkEntry> = None;
    for entry in candidates {
        match best {
            Some(current) if current.prefix_len() >= entry.prefix_len() => {}
            _ => best = Some(entry),
        }
    }
    best
}

/// Read-only longest-prefix index over IPv4 network blocks.
///
/// Generic over its storage so the linear [`NetworkList`] can be checked
/// against the production [`NetworkTrie`].
#[derive(Debug, Clone, Default)]
pub struct NetworkIndex<S: NetworkStore = NetworkTrie> {
    store: S,
    stats: FeedStats,
}

impl<S: NetworkStore> NetworkIndex<S> {
    /// Build an index from validated entries.
    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = NetworkEntry>,
    {
        let mut store = S::default();
        for entry in entries {
            store.insert(entry);
        }
        let stats = FeedStats {
            accepted: store.len(),
            skipped: 0,
        };
        Self { store, stats }
    }

    /// Build an index from a network feed.
    ///
    /// Only I/O errors are fatal; malformed rows, including rows that are
    /// not valid UTF-8, are logged and skipped. `source_name` labels errors
    /// and warnings.
    pub fn from_reader<R: Read>(
        reader: R,
        source_name: &Path,
        options: FeedOptions,
    ) -> Result<Self> {
        let mut index = Self::default();
        for row in feed::records(reader, options) {
            let (line, row) = row.map_err(|source| Error::FeedIo {
                path: source_name.to_path_buf(),
                source,
            })?;
            match row.and_then(|record| NetworkEntry::from_record(&record)) {
                Ok(entry) => {
                    index.store.insert(entry);
                    index.stats.accepted += 1;
                }
                Err(e) => {
                    log::warn!("{}: line {}: skipping row: {}", source_name.display(), line, e);
                    index.stats.skipped += 1;
                }
            }
        }
        Ok(index)
    }

    /// Build an index from a network feed file (optionally gzipped).
    pub fn from_path(path: &Path, options: FeedOptions) -> Result<Self> {
        let index = Self::from_reader(feed::open_feed(path)?, path, options)?;
        log::info!(
            "loaded {} networks from {} ({} malformed rows skipped)",
            index.stats.accepted,
            path.display(),
            index.stats.skipped
        );
        Ok(index)
    }

    /// Every indexed entry whose block contains the address.
    pub fn containing(&self, addr: Ipv4Addr) -> Vec<&NetworkEntry> {
        self.store.containing(addr)
    }

    /// The most specific entry containing the address.
    pub fn match_entry(&self, addr: Ipv4Addr) -> std::result::Result<&NetworkEntry, NoMatch> {
        longest_prefix(self.store.containing(addr)).ok_or(NoMatch(addr))
    }

    /// Location identifier of the most specific block containing the address.
    pub fn match_addr(&self, addr: Ipv4Addr) -> std::result::Result<LocationId, NoMatch> {
        self.match_entry(addr).map(|entry| entry.location_id)
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> &[NetworkEntry] {
        self.store.entries()
    }

    /// Row counters from the build.
    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    /// Number of usable entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
