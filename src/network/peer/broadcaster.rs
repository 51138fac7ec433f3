use log::{debug, trace, warn};

use crate::network::error::RelayError;
use crate::network::peer::registry::PeerHandle;
use crate::network::types::{Payload, PeerAddress};

/// Outcome of one fan-out
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients the payload was queued for
    pub delivered: usize,

    /// Recipients whose delivery failed
    pub failed: Vec<PeerAddress>,
}

impl BroadcastReport {
    /// Total recipients attempted
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }
}

/// Send a payload to every recipient except `origin`.
///
/// Each recipient gets at most one attempt. A failed recipient is logged and
/// skipped. One whose queue overflowed is also closed, and its own connection
/// task deregisters it.
pub fn broadcast(
    recipients: &[(PeerAddress, PeerHandle)],
    payload: &Payload,
    origin: PeerAddress,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();

    for (addr, handle) in recipients {
        if *addr == origin {
            continue;
        }

        match handle.try_send(payload.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!("Error broadcasting data to {}: {}", addr, e);
                report.failed.push(*addr);
            }
        }
    }

    if report.attempted() == 0 {
        trace!("No other peers to relay {} bytes from {}", payload.len(), origin);
    } else {
        debug!(
            "Relayed {} bytes from {} to {}/{} peers",
            payload.len(),
            origin,
            report.delivered,
            report.attempted()
        );
    }

    report
}

/// Send a payload to one connection
pub fn unicast(handle: &PeerHandle, payload: Payload) -> Result<(), RelayError> {
    let len = payload.len();
    handle.try_send(payload)?;
    trace!("Queued {} bytes for {}", len, handle.addr());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::network::peer::state::CloseReason;

    fn addr(port: u16) -> PeerAddress {
        PeerAddress::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_broadcast_skips_origin() {
        let (a, mut rx_a) = PeerHandle::new(addr(1), 4);
        let (b, mut rx_b) = PeerHandle::new(addr(2), 4);
        let (c, mut rx_c) = PeerHandle::new(addr(3), 4);
        let recipients = vec![(addr(1), a), (addr(2), b), (addr(3), c)];

        let payload = Bytes::from_static(b"hello");
        let report = broadcast(&recipients, &payload, addr(1));

        assert_eq!(report.delivered, 2);
        assert!(report.failed.is_empty());
        assert_eq!(rx_b.try_recv().unwrap(), payload);
        assert_eq!(rx_c.try_recv().unwrap(), payload);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_isolates_failed_recipient() {
        let (a, _rx_a) = PeerHandle::new(addr(1), 4);
        let (b, rx_b) = PeerHandle::new(addr(2), 4);
        let (c, mut rx_c) = PeerHandle::new(addr(3), 4);
        drop(rx_b);
        let recipients = vec![(addr(1), a), (addr(2), b), (addr(3), c)];

        let payload = Bytes::from_static(b"state");
        let report = broadcast(&recipients, &payload, addr(1));

        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, vec![addr(2)]);
        assert_eq!(rx_c.try_recv().unwrap(), payload);
    }

    #[test]
    fn test_broadcast_closes_overflowing_recipient() {
        let (a, _rx_a) = PeerHandle::new(addr(1), 4);
        let (b, _rx_b) = PeerHandle::new(addr(2), 1);
        let (c, mut rx_c) = PeerHandle::new(addr(3), 4);
        let recipients = vec![(addr(1), a), (addr(2), b.clone()), (addr(3), c)];

        broadcast(&recipients, &Bytes::from_static(b"first"), addr(1));
        let report = broadcast(&recipients, &Bytes::from_static(b"second"), addr(1));

        assert_eq!(report.failed, vec![addr(2)]);
        assert_eq!(b.close_reason(), Some(CloseReason::Overflow));
        assert_eq!(rx_c.try_recv().unwrap(), Bytes::from_static(b"first"));
        assert_eq!(rx_c.try_recv().unwrap(), Bytes::from_static(b"second"));
    }

    #[test]
    fn test_broadcast_with_only_origin() {
        let (a, mut rx_a) = PeerHandle::new(addr(1), 4);
        let report = broadcast(&[(addr(1), a)], &Bytes::from_static(b"x"), addr(1));

        assert_eq!(report.attempted(), 0);
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_unicast_reports_failure() {
        let (a, mut rx_a) = PeerHandle::new(addr(1), 4);
        unicast(&a, Bytes::from_static(b"reply")).unwrap();
        assert_eq!(rx_a.try_recv().unwrap(), Bytes::from_static(b"reply"));

        drop(rx_a);
        assert!(unicast(&a, Bytes::from_static(b"again")).is_err());
    }
}
