// Relay client
//
// A thin peer for talking to a relay: writes go straight to the socket, and a
// background task forwards whatever the relay sends over a channel.

use std::net::SocketAddr;
use std::time::Duration;
use bytes::{Bytes, BytesMut};
use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::network::error::RelayError;
use crate::network::service::dialer::{connect_to_relay, connect_with_backoff};

/// Size of each socket read in the reader task
const READ_CHUNK_SIZE: usize = 4096;

/// Chunks buffered between the reader task and `recv`
const INCOMING_CHANNEL_SIZE: usize = 64;

/// Per-attempt limit for `connect_with_retry`
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected relay peer
pub struct RelayClient {
    /// Write side of the socket
    writer: OwnedWriteHalf,

    /// Chunks read by the background task
    incoming: mpsc::Receiver<Bytes>,

    /// Bytes received but not yet handed out by `recv_exact`
    pending: BytesMut,

    local_addr: SocketAddr,
    relay_addr: SocketAddr,

    reader_task: JoinHandle<()>,
}

impl RelayClient {
    /// Connect to a relay, giving up after `connect_timeout`
    pub async fn connect(addr: SocketAddr, connect_timeout: Duration) -> Result<Self, RelayError> {
        let stream = connect_to_relay(addr, connect_timeout).await?;
        Self::from_stream(stream)
    }

    /// Connect to a relay, retrying with backoff for up to `max_elapsed`
    pub async fn connect_with_retry(addr: SocketAddr, max_elapsed: Duration) -> Result<Self, RelayError> {
        let stream = connect_with_backoff(addr, ATTEMPT_TIMEOUT, max_elapsed).await?;
        Self::from_stream(stream)
    }

    /// Wrap an already connected stream
    pub fn from_stream(stream: TcpStream) -> Result<Self, RelayError> {
        let local_addr = stream.local_addr()?;
        let relay_addr = stream.peer_addr()?;
        let (reader, writer) = stream.into_split();

        let (tx, incoming) = mpsc::channel(INCOMING_CHANNEL_SIZE);
        let reader_task = tokio::spawn(read_loop(reader, tx, relay_addr));

        info!("Connected to relay {} from {}", relay_addr, local_addr);

        Ok(Self {
            writer,
            incoming,
            pending: BytesMut::new(),
            local_addr,
            relay_addr,
            reader_task,
        })
    }

    /// Local address, which is how the relay identifies this client
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address of the relay
    pub fn relay_addr(&self) -> SocketAddr {
        self.relay_addr
    }

    /// Send raw bytes to the relay
    pub async fn send(&mut self, data: &[u8]) -> Result<(), RelayError> {
        self.writer.write_all(data).await?;
        Ok(())
    }

    /// Next chunk received from the relay.
    ///
    /// Returns `None` once the relay has closed the connection and everything
    /// received before that has been handed out. Chunk boundaries follow the
    /// socket reads, not the sender's writes.
    pub async fn recv(&mut self) -> Option<Bytes> {
        if !self.pending.is_empty() {
            return Some(self.pending.split().freeze());
        }
        self.incoming.recv().await
    }

    /// Wait until exactly `len` bytes have arrived
    pub async fn recv_exact(&mut self, len: usize) -> Result<Bytes, RelayError> {
        while self.pending.len() < len {
            match self.incoming.recv().await {
                Some(chunk) => self.pending.extend_from_slice(&chunk),
                None => return Err(RelayError::ConnectionClosed(self.relay_addr)),
            }
        }
        Ok(self.pending.split_to(len).freeze())
    }

    /// Close the write side and stop reading
    pub async fn disconnect(mut self) -> Result<(), RelayError> {
        debug!("Disconnecting from relay {}", self.relay_addr);
        self.writer.shutdown().await?;
        self.reader_task.abort();
        Ok(())
    }
}

impl Drop for RelayClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn read_loop(mut reader: OwnedReadHalf, tx: mpsc::Sender<Bytes>, relay_addr: SocketAddr) {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("Relay {} closed the connection", relay_addr);
                break;
            }
            Ok(n) => {
                if tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Error reading from relay {}: {}", relay_addr, e);
                break;
            }
        }
    }
}
