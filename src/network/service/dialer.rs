// Outbound connections to a relay

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use backoff::ExponentialBackoffBuilder;
use log::{debug, warn};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Open one connection to a relay, giving up after `connect_timeout`
pub async fn connect_to_relay(addr: SocketAddr, connect_timeout: Duration) -> io::Result<TcpStream> {
    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no answer from {} within {:?}", addr, connect_timeout),
            )
        })??;

    // relayed traffic is small interactive writes
    stream.set_nodelay(true)?;

    debug!("Connected to relay {} from {}", addr, stream.local_addr()?);
    Ok(stream)
}

/// Connect to a relay, retrying with exponential backoff until `max_elapsed`.
///
/// Refused, reset and timed out attempts are retried; anything else (a bad
/// address, missing permissions) fails straight away.
pub async fn connect_with_backoff(
    addr: SocketAddr,
    connect_timeout: Duration,
    max_elapsed: Duration,
) -> io::Result<TcpStream> {
    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(50))
        .with_max_interval(Duration::from_secs(2))
        .with_max_elapsed_time(Some(max_elapsed))
        .build();

    backoff::future::retry(policy, || async move {
        connect_to_relay(addr, connect_timeout).await.map_err(|e| {
            if is_transient(&e) {
                warn!("Relay {} not reachable yet: {}", addr, e);
                backoff::Error::transient(e)
            } else {
                backoff::Error::permanent(e)
            }
        })
    })
    .await
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    // bind then drop to get a port nobody listens on
    async fn unused_addr() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    #[tokio::test]
    async fn test_connect_to_listening_relay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = connect_to_relay(addr, Duration::from_secs(5)).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
        assert!(stream.nodelay().unwrap());
    }

    #[tokio::test]
    async fn test_refused_is_transient() {
        let err = connect_to_relay(unused_addr().await, Duration::from_secs(1)).await.unwrap_err();
        assert!(is_transient(&err));
        assert!(!is_transient(&io::Error::new(io::ErrorKind::PermissionDenied, "no")));
    }

    #[tokio::test]
    async fn test_backoff_gives_up() {
        let addr = unused_addr().await;

        let result = connect_with_backoff(addr, Duration::from_secs(1), Duration::from_millis(300)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_backoff_succeeds_once_relay_appears() {
        let addr = unused_addr().await;

        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let listener = TcpListener::bind(addr).await.unwrap();
            let _ = listener.accept().await;
        });

        let stream = connect_with_backoff(addr, Duration::from_secs(1), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
        server.await.unwrap();
    }
}
