use std::sync::atomic::{AtomicU64, Ordering};
use log::debug;

use crate::network::handlers::payload_handler::{HandlerError, PayloadHandler};
use crate::network::types::{Payload, PeerAddress};

/// Logs every relayed payload and keeps running totals
#[derive(Debug, Default)]
pub struct TrafficLogger {
    payloads: AtomicU64,
    bytes: AtomicU64,
}

impl TrafficLogger {
    /// Create a new traffic logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads seen so far
    pub fn payload_count(&self) -> u64 {
        self.payloads.load(Ordering::Relaxed)
    }

    /// Bytes seen so far
    pub fn byte_count(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl PayloadHandler for TrafficLogger {
    async fn handle(&self, payload: &Payload, origin: PeerAddress) -> Result<(), HandlerError> {
        let count = self.payloads.fetch_add(1, Ordering::Relaxed) + 1;
        self.bytes.fetch_add(payload.len() as u64, Ordering::Relaxed);
        debug!("Payload {} from {}: {} bytes", count, origin, payload.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_traffic_totals() {
        let logger = TrafficLogger::new();
        let origin: PeerAddress = "127.0.0.1:9000".parse().unwrap();

        logger.handle(&Bytes::from_static(b"abc"), origin).await.unwrap();
        logger.handle(&Bytes::from_static(b"defgh"), origin).await.unwrap();

        assert_eq!(logger.payload_count(), 2);
        assert_eq!(logger.byte_count(), 8);
    }
}
