use std::collections::HashSet;

use crate::network::types::PeerAddress;

/// Set of addresses refused at admission
#[derive(Debug, Default, Clone)]
pub struct BanSet {
    banned: HashSet<PeerAddress>,
}

impl BanSet {
    /// Create an empty ban set
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if an address is banned
    pub fn is_banned(&self, addr: &PeerAddress) -> bool {
        self.banned.contains(addr)
    }

    /// Ban an address. Returns true if it was not already banned.
    pub fn ban(&mut self, addr: PeerAddress) -> bool {
        self.banned.insert(addr)
    }

    /// Lift a ban. Returns true if the address was banned.
    pub fn unban(&mut self, addr: &PeerAddress) -> bool {
        self.banned.remove(addr)
    }

    /// Banned addresses, sorted
    pub fn addresses(&self) -> Vec<PeerAddress> {
        let mut addrs: Vec<PeerAddress> = self.banned.iter().copied().collect();
        addrs.sort();
        addrs
    }
}
