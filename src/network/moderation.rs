// Operator moderation: kick, ban, unban

use log::info;

use crate::network::hub::RelayHub;
use crate::network::peer::state::CloseReason;
use crate::network::types::PeerAddress;

impl RelayHub {
    /// Disconnect a peer. Returns false if it was not connected.
    pub fn kick(&self, addr: &PeerAddress) -> bool {
        let handle = self.peers().connections.unregister(addr);

        match handle {
            Some(handle) => {
                handle.close(CloseReason::Kicked);
                info!("Kicked client {}", addr);
                true
            }
            None => false,
        }
    }

    /// Ban an address, disconnecting it first if connected.
    ///
    /// Returns true if a live connection was closed.
    pub fn ban(&self, addr: &PeerAddress) -> bool {
        let kicked = {
            let mut peers = self.peers();
            let handle = peers.connections.unregister(addr);
            peers.bans.ban(*addr);
            handle
        };

        if let Some(handle) = &kicked {
            handle.close(CloseReason::Banned);
            info!("Kicked client {}", addr);
        }
        info!("Banned client {}", addr);

        kicked.is_some()
    }

    /// Lift a ban. Live connections are not affected.
    ///
    /// Returns false if the address was not banned.
    pub fn unban(&self, addr: &PeerAddress) -> bool {
        let unbanned = self.peers().bans.unban(addr);
        if unbanned {
            info!("Unbanned client {}", addr);
        }
        unbanned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::RelayConfig;

    fn addr(port: u16) -> PeerAddress {
        PeerAddress::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_kick_connected_peer() {
        let hub = RelayHub::new(&RelayConfig::default());
        let (handle, _rx) = hub.admit(addr(1)).unwrap();

        assert!(hub.kick(&addr(1)));
        assert!(!hub.is_connected(&addr(1)));
        assert_eq!(handle.close_reason(), Some(CloseReason::Kicked));
        assert!(!hub.is_banned(&addr(1)));
    }

    #[test]
    fn test_kick_unknown_peer_is_noop() {
        let hub = RelayHub::new(&RelayConfig::default());
        let (other, _rx) = hub.admit(addr(2)).unwrap();

        assert!(!hub.kick(&addr(1)));
        assert!(!other.is_closed());
        assert_eq!(hub.peer_count(), 1);
    }

    #[test]
    fn test_ban_connected_peer() {
        let hub = RelayHub::new(&RelayConfig::default());
        let (handle, _rx) = hub.admit(addr(1)).unwrap();

        assert!(hub.ban(&addr(1)));
        assert!(!hub.is_connected(&addr(1)));
        assert!(hub.is_banned(&addr(1)));
        assert_eq!(handle.close_reason(), Some(CloseReason::Banned));
        assert!(hub.admit(addr(1)).is_err());
    }

    #[test]
    fn test_ban_offline_address() {
        let hub = RelayHub::new(&RelayConfig::default());

        assert!(!hub.ban(&addr(1)));
        assert!(!hub.ban(&addr(1)));
        assert_eq!(hub.banned_peers(), vec![addr(1)]);
    }

    #[test]
    fn test_unban_leaves_live_connections_alone() {
        let hub = RelayHub::new(&RelayConfig::default());
        let (other, _rx) = hub.admit(addr(2)).unwrap();
        hub.ban(&addr(1));

        assert!(hub.unban(&addr(1)));
        assert!(!hub.unban(&addr(1)));
        assert!(!hub.is_banned(&addr(1)));
        assert!(!hub.is_connected(&addr(1)));
        assert!(!other.is_closed());

        let (readmitted, _rx) = hub.admit(addr(1)).unwrap();
        assert!(!readmitted.is_closed());
    }
}
