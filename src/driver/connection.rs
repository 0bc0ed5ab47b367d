//! Server connection.
//!
//! A [`Connection`] owns one TCP channel and matches replies to requests by
//! correlation id. Requests may be pipelined: replies arriving for other
//! correlation ids are stashed until their waiter asks for them.

use std::collections::HashMap;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Decoder, Encoder};

use crate::document::Document;
use crate::wire::{Frame, FrameCodec, Reply, OP_REPLY};

use super::error::{DriverError, DriverResult};

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Usable for requests
    Open,
    /// Failed mid-operation; must be discarded
    Broken,
    /// Closed
    Closed,
}

/// A single logical channel to the server.
pub struct Connection {
    /// TCP stream
    stream: TcpStream,
    /// Frame codec
    codec: FrameCodec,
    /// Read buffer
    read_buffer: BytesMut,
    /// Write buffer
    write_buffer: BytesMut,
    /// Next correlation id; ids strictly increment and are never reused
    next_correlation_id: u32,
    /// Replies received for correlation ids nobody has asked for yet
    stashed: HashMap<u32, Reply>,
    /// Connection state
    state: ConnectionState,
    /// Server address
    address: String,
}

impl Connection {
    /// Connect to the server.
    ///
    /// Fails with [`DriverError::Connect`] when the server is unreachable,
    /// refuses the connection, or the deadline passes.
    pub async fn connect(address: &str, timeout: Duration) -> DriverResult<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                DriverError::connect(format!("connect to {} timed out", address))
            })?
            .map_err(|e| DriverError::connect(format!("failed to connect to {}: {}", address, e)))?;

        // Lower latency for small command frames.
        stream.set_nodelay(true).ok();

        tracing::debug!(address, "connection established");

        Ok(Self {
            stream,
            codec: FrameCodec::new(),
            read_buffer: BytesMut::with_capacity(8192),
            write_buffer: BytesMut::with_capacity(8192),
            next_correlation_id: 1,
            stashed: HashMap::new(),
            state: ConnectionState::Open,
            address: address.to_string(),
        })
    }

    /// Send a command, returning its correlation id.
    pub async fn send(&mut self, command: Document) -> DriverResult<u32> {
        if self.state != ConnectionState::Open {
            return Err(DriverError::protocol(format!(
                "cannot send in state {:?}",
                self.state
            )));
        }

        let correlation_id = self.next_correlation_id;
        self.next_correlation_id = self.next_correlation_id.wrapping_add(1);

        self.write_buffer.clear();
        self.codec
            .encode(Frame::command(correlation_id, command), &mut self.write_buffer)
            .map_err(DriverError::from)?;

        if let Err(e) = self.stream.write_all(&self.write_buffer).await {
            self.state = ConnectionState::Broken;
            return Err(DriverError::Io(e));
        }
        if let Err(e) = self.stream.flush().await {
            self.state = ConnectionState::Broken;
            return Err(DriverError::Io(e));
        }

        Ok(correlation_id)
    }

    /// Receive the reply for a correlation id.
    ///
    /// Replies for other correlation ids are stashed so pipelined requests
    /// can complete out of order. On deadline the connection is marked
    /// broken and the correlation id is abandoned, never reused.
    pub async fn receive(&mut self, correlation_id: u32, timeout: Duration) -> DriverResult<Reply> {
        if self.state == ConnectionState::Closed {
            return Err(DriverError::ConnectionClosed);
        }
        if self.state == ConnectionState::Broken {
            return Err(DriverError::protocol("cannot receive on broken connection"));
        }

        if let Some(reply) = self.stashed.remove(&correlation_id) {
            return Ok(reply);
        }

        match tokio::time::timeout(timeout, self.receive_inner(correlation_id)).await {
            Ok(result) => result,
            Err(_) => {
                self.state = ConnectionState::Broken;
                Err(DriverError::timeout(format!(
                    "no reply for request {} within {:?}",
                    correlation_id, timeout
                )))
            }
        }
    }

    async fn receive_inner(&mut self, correlation_id: u32) -> DriverResult<Reply> {
        loop {
            // Drain every complete frame already buffered.
            loop {
                let frame = match self.codec.decode(&mut self.read_buffer) {
                    Ok(Some(frame)) => frame,
                    Ok(None) => break,
                    Err(e) => {
                        self.state = ConnectionState::Broken;
                        return Err(e.into());
                    }
                };

                if frame.opcode != OP_REPLY {
                    self.state = ConnectionState::Broken;
                    return Err(DriverError::protocol(format!(
                        "unexpected opcode 0x{:02X} from server",
                        frame.opcode
                    )));
                }

                let reply = match Reply::from_document(frame.body) {
                    Ok(reply) => reply,
                    Err(e) => {
                        self.state = ConnectionState::Broken;
                        return Err(e.into());
                    }
                };

                if frame.correlation_id == correlation_id {
                    return Ok(reply);
                }
                self.stashed.insert(frame.correlation_id, reply);
            }

            // Need more data.
            let n = match self.stream.read_buf(&mut self.read_buffer).await {
                Ok(n) => n,
                Err(e) => {
                    self.state = ConnectionState::Broken;
                    return Err(DriverError::Io(e));
                }
            };

            if n == 0 {
                self.state = ConnectionState::Closed;
                return Err(DriverError::ConnectionClosed);
            }
        }
    }

    /// Send a command and wait for its reply.
    pub async fn roundtrip(&mut self, command: Document, timeout: Duration) -> DriverResult<Reply> {
        let correlation_id = self.send(command).await?;
        self.receive(correlation_id, timeout).await
    }

    /// Close the connection. Idempotent.
    pub async fn close(&mut self) {
        if self.state != ConnectionState::Closed {
            self.state = ConnectionState::Closed;
            let _ = self.stream.shutdown().await;
            tracing::debug!(address = %self.address, "connection closed");
        }
    }

    /// Mark the connection unusable.
    pub fn mark_broken(&mut self) {
        if self.state == ConnectionState::Open {
            self.state = ConnectionState::Broken;
        }
    }

    /// Get the connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if the connection can carry requests.
    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Check if the connection failed and must be discarded.
    pub fn is_broken(&self) -> bool {
        self.state == ConnectionState::Broken
    }

    /// Get the server address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("next_correlation_id", &self.next_correlation_id)
            .finish()
    }
}
