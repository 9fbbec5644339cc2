//! Linear-scan network store.

use std::net::Ipv4Addr;

use super::{NetworkEntry, NetworkStore};

/// NetworkList keeps entries in a plain vector and scans all of them on
/// every lookup.
///
/// O(n) per query: easy to verify, used as the reference the trie is
/// tested against.
#[derive(Debug, Clone, Default)]
pub struct NetworkList {
    entries: Vec<NetworkEntry>,
}

impl NetworkList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }
}

impl NetworkStore for NetworkList {
    fn insert(&mut self, entry: NetworkEntry) {
        self.entries.push(entry);
    }

    fn containing(&self, addr: Ipv4Addr) -> Vec<&NetworkEntry> {
        self.entries.iter().filter(|e| e.contains(addr)).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> &[NetworkEntry] {
        &self.entries
    }
}
