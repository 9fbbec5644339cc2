//! Binary prefix trie stored in an arena.
//!
//! Each level consumes one address bit, most significant first. A node at
//! depth `d` stands for every block whose first `d` bits match the path to
//! it, so a lookup walks at most 32 levels and collects the entries hanging
//! off every node it passes.

use std::net::Ipv4Addr;

use super::{NetworkEntry, NetworkStore};

/// Marks an absent child or the end of an entry chain.
const NIL: u32 = u32::MAX;

/// Arena node. Children are indices into `NetworkTrie::nodes`, entries are
/// a chain through `NetworkTrie::next` from `head` to `tail`.
#[derive(Debug, Clone, Copy)]
struct Node {
    children: [u32; 2],
    head: u32,
    tail: u32,
}

impl Node {
    const fn empty() -> Self {
        Self {
            children: [NIL, NIL],
            head: NIL,
            tail: NIL,
        }
    }
}

/// NetworkTrie answers containment queries in time bounded by the address
/// width, independent of the number of stored blocks.
///
/// # Examples
/// ```
/// use ipgeo::network::{NetworkEntry, NetworkStore, NetworkTrie};
/// use std::net::Ipv4Addr;
///
/// let mut trie = NetworkTrie::new();
/// trie.insert(NetworkEntry::new("10.0.0.0/8".parse().unwrap(), 1));
/// trie.insert(NetworkEntry::new("10.1.0.0/16".parse().unwrap(), 2));
///
/// let hits = trie.containing(Ipv4Addr::new(10, 1, 2, 3));
/// assert_eq!(hits.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct NetworkTrie {
    nodes: Vec<Node>,
    entries: Vec<NetworkEntry>,
    /// Next entry in the same node's chain
    next: Vec<u32>,
}

impl Default for NetworkTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkTrie {
    /// Create an empty trie holding only the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::empty()],
            entries: Vec::new(),
            next: Vec::new(),
        }
    }

    /// Number of arena nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Walk (creating as needed) to the node of a block.
    fn node_for(&mut self, bits: u32, prefix_len: u8) -> usize {
        let mut node = 0usize;
        for depth in 0..prefix_len {
            let bit = bit_at(bits, depth);
            let child = self.nodes[node].children[bit];
            node = if child == NIL {
                let created = self.nodes.len();
                self.nodes.push(Node::empty());
                self.nodes[node].children[bit] = created as u32;
                created
            } else {
                child as usize
            };
        }
        node
    }

    /// Push every entry chained on `node` into `out`, oldest first.
    fn collect<'a>(&'a self, node: usize, out: &mut Vec<&'a NetworkEntry>) {
        let mut cursor = self.nodes[node].head;
        while cursor != NIL {
            out.push(&self.entries[cursor as usize]);
            cursor = self.next[cursor as usize];
        }
    }
}

/// Bit `depth` of `bits`, counting from the most significant.
#[inline]
fn bit_at(bits: u32, depth: u8) -> usize {
    ((bits >> (31 - u32::from(depth))) & 1) as usize
}

impl NetworkStore for NetworkTrie {
    fn insert(&mut self, entry: NetworkEntry) {
        let bits = u32::from(entry.network.network());
        let node = self.node_for(bits, entry.prefix_len());

        let idx = self.entries.len() as u32;
        self.entries.push(entry);
        self.next.push(NIL);

        let tail = self.nodes[node].tail;
        if tail == NIL {
            self.nodes[node].head = idx;
        } else {
            self.next[tail as usize] = idx;
        }
        self.nodes[node].tail = idx;
    }

    /// Entries come back ordered from the shortest prefix to the longest.
    fn containing(&self, addr: Ipv4Addr) -> Vec<&NetworkEntry> {
        let bits = u32::from(addr);
        let mut out = Vec::new();
        let mut node = 0usize;
        self.collect(node, &mut out);
        for depth in 0..32u8 {
            let child = self.nodes[node].children[bit_at(bits, depth)];
            if child == NIL {
                break;
            }
            node = child as usize;
            self.collect(node, &mut out);
        }
        out
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> &[NetworkEntry] {
        &self.entries
    }
}
