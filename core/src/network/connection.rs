//! Network connection handling
//!
//! Length-prefixed framing over TCP: u32 big-endian length, then a JSON
//! body, capped at `MAX_MESSAGE_SIZE`.

use crate::error::{BridgeError, BridgeResult};
use crate::network::protocol::{ClientMessage, MAX_MESSAGE_SIZE, ServerMessage};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// One framed TCP connection, usable from either side of the protocol.
///
/// The server side reads without a timeout and handles idleness in its
/// connection loop; clients bound their waits with [`with_read_timeout`]
/// so a dead server cannot stall them forever.
///
/// [`with_read_timeout`]: NetworkConnection::with_read_timeout
pub struct NetworkConnection {
    stream: TcpStream,
    read_buffer: Vec<u8>,
    read_timeout: Option<Duration>,
    last_activity: Instant,
}

impl NetworkConnection {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buffer: vec![0; 8192],
            read_timeout: None,
            last_activity: Instant::now(),
        }
    }

    pub fn with_read_timeout(stream: TcpStream, timeout: Duration) -> Self {
        Self {
            read_timeout: Some(timeout),
            ..Self::new(stream)
        }
    }

    /// Read a command batch from a client. `None` means the peer closed the
    /// connection cleanly.
    pub async fn read_message(&mut self) -> BridgeResult<Option<ClientMessage>> {
        match self.read_frame().await? {
            Some(len) => {
                let message = ClientMessage::from_bytes(&self.read_buffer[..len])
                    .map_err(BridgeError::Protocol)?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    /// Send a response to a client.
    pub async fn send_response(&mut self, response: ServerMessage) -> BridgeResult<()> {
        let bytes = response.to_bytes().map_err(BridgeError::Protocol)?;
        self.write_frame(&bytes).await
    }

    /// Send a message to the server (client side).
    pub async fn send_message(&mut self, message: ClientMessage) -> BridgeResult<()> {
        let bytes = message.to_bytes().map_err(BridgeError::Protocol)?;
        self.write_frame(&bytes).await
    }

    /// Read a server response (client side).
    pub async fn read_response(&mut self) -> BridgeResult<Option<ServerMessage>> {
        match self.read_frame().await? {
            Some(len) => {
                let response = ServerMessage::from_bytes(&self.read_buffer[..len])
                    .map_err(BridgeError::Protocol)?;
                Ok(Some(response))
            }
            None => Ok(None),
        }
    }

    /// Read one frame into the buffer, returning its length, or `None` on a
    /// clean close before the length prefix.
    async fn read_frame(&mut self) -> BridgeResult<Option<usize>> {
        let mut len_bytes = [0u8; 4];
        let read = self.stream.read_exact(&mut len_bytes);
        let result = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| BridgeError::Timeout)?,
            None => read.await,
        };
        match result {
            Ok(_) => {
                self.last_activity = Instant::now();
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None); // Connection closed
            }
            Err(e) => return Err(BridgeError::Io(e)),
        }

        let message_len = u32::from_be_bytes(len_bytes) as usize;
        if message_len > MAX_MESSAGE_SIZE {
            return Err(BridgeError::Protocol(format!(
                "Message too large: {} bytes",
                message_len
            )));
        }

        if self.read_buffer.len() < message_len {
            self.read_buffer.resize(message_len, 0);
        }

        self.stream
            .read_exact(&mut self.read_buffer[..message_len])
            .await
            .map_err(BridgeError::Io)?;

        self.last_activity = Instant::now();
        Ok(Some(message_len))
    }

    async fn write_frame(&mut self, bytes: &[u8]) -> BridgeResult<()> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(BridgeError::Protocol(format!(
                "Message too large: {} bytes",
                bytes.len()
            )));
        }

        let len = bytes.len() as u32;
        self.stream
            .write_all(&len.to_be_bytes())
            .await
            .map_err(BridgeError::Io)?;
        self.stream.write_all(bytes).await.map_err(BridgeError::Io)?;
        self.stream.flush().await.map_err(BridgeError::Io)?;

        self.last_activity = Instant::now();
        Ok(())
    }

    /// Check if the connection has been idle for too long
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }

    /// Close the connection gracefully
    pub async fn close(&mut self) -> BridgeResult<()> {
        self.stream.shutdown().await.map_err(BridgeError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_client_read_times_out_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            // Hold the socket open without ever writing a frame
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = NetworkConnection::with_read_timeout(stream, Duration::from_millis(50));
        match conn.read_response().await {
            Err(BridgeError::Timeout) => {}
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
        peer.abort();
    }

    #[tokio::test]
    async fn test_clean_close_reads_none() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = NetworkConnection::new(stream);
        assert!(conn.read_response().await.unwrap().is_none());
    }
}
