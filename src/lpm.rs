//! Longest-prefix-match tree over IPv4 addresses.
//!
//! Generalizes the linear allow/deny-list scan in `ip_filter.rs`-style
//! filters into a binary trie keyed on address bits, so containment checks
//! cost O(prefix length) rather than O(rule count).

use ipnet::Ipv4Net;
use std::net::Ipv4Addr;

#[derive(Debug, Default, Clone)]
struct Node {
    children: [Option<Box<Node>>; 2],
    /// Set once a network whose prefix ends at this node has been inserted.
    terminal: bool,
}

/// A set of IPv4 networks, queried by longest-prefix-match containment.
#[derive(Debug, Default, Clone)]
pub struct Ipv4Lpm {
    root: Node,
    /// True once any network has been inserted; `0.0.0.0/0` sets this and
    /// short-circuits every future `contains` call to `true`.
    covers_all: bool,
    len: usize,
}

impl Ipv4Lpm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Insert a network. Idempotent: inserting the same network twice, or a
    /// network already covered by a broader inserted prefix, is a no-op as
    /// far as `contains` is concerned.
    pub fn insert(&mut self, net: Ipv4Net) {
        self.len += 1;
        if net.prefix_len() == 0 {
            self.covers_all = true;
        }
        let bits = u32::from(net.network());
        let prefix_len = net.prefix_len();
        let mut node = &mut self.root;
        for i in 0..prefix_len {
            let bit = ((bits >> (31 - i)) & 1) as usize;
            node = node.children[bit].get_or_insert_with(|| Box::new(Node::default()));
        }
        node.terminal = true;
    }

    /// True if any inserted network covers `addr`.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        if self.covers_all {
            return true;
        }
        let bits = u32::from(addr);
        let mut node = &self.root;
        if node.terminal {
            return true;
        }
        for i in 0..32u32 {
            let bit = ((bits >> (31 - i)) & 1) as usize;
            match &node.children[bit] {
                Some(child) => {
                    node = child;
                    if node.terminal {
                        return true;
                    }
                }
                None => return false,
            }
        }
        false
    }
}
