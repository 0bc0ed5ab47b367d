//! Frame codec for tokio_util.
//!
//! Each frame is a 4-byte little-endian length prefix (counting the rest of
//! the frame), a 4-byte correlation id, a 4-byte opcode, and one encoded
//! document.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::document::Document;

use super::{decode_document, encode_document, WireError};

/// Command frame opcode (client to server).
pub const OP_COMMAND: u32 = 0x01;

/// Reply frame opcode (server to client).
pub const OP_REPLY: u32 = 0x02;

/// Frame header size: correlation id + opcode.
pub const HEADER_SIZE: usize = 8;

/// Default maximum frame size (16MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// A single wire frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Correlation id matching replies to requests
    pub correlation_id: u32,
    /// Frame opcode
    pub opcode: u32,
    /// Frame payload
    pub body: Document,
}

impl Frame {
    /// Create a command frame.
    pub fn command(correlation_id: u32, body: Document) -> Self {
        Self {
            correlation_id,
            opcode: OP_COMMAND,
            body,
        }
    }

    /// Create a reply frame answering the given correlation id.
    pub fn reply(correlation_id: u32, body: Document) -> Self {
        Self {
            correlation_id,
            opcode: OP_REPLY,
            body,
        }
    }
}

/// Frame codec for async framing.
#[derive(Debug)]
pub struct FrameCodec {
    /// Maximum accepted frame size
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new codec with the default size limit.
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with a custom size limit.
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Need the length prefix first.
        if src.len() < 4 {
            return Ok(None);
        }

        let declared = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if declared > self.max_frame_size {
            return Err(WireError::FrameTooLarge {
                size: declared,
                max: self.max_frame_size,
            });
        }
        if declared < HEADER_SIZE {
            return Err(WireError::InvalidReply(format!(
                "frame length {} shorter than header",
                declared
            )));
        }

        // Wait for the whole frame.
        if src.len() < 4 + declared {
            return Ok(None);
        }

        src.advance(4);
        let correlation_id = src.get_u32_le();
        let opcode = src.get_u32_le();

        if opcode != OP_COMMAND && opcode != OP_REPLY {
            return Err(WireError::UnknownOpcode(opcode));
        }

        let body_len = declared - HEADER_SIZE;
        let body_bytes = src.split_to(body_len);
        let body = decode_document(&body_bytes)?;

        Ok(Some(Frame {
            correlation_id,
            opcode,
            body,
        }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = WireError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = encode_document(&item.body)?;
        let declared = HEADER_SIZE + body.len();

        if declared > self.max_frame_size {
            return Err(WireError::FrameTooLarge {
                size: declared,
                max: self.max_frame_size,
            });
        }

        dst.reserve(4 + declared);
        dst.put_u32_le(declared as u32);
        dst.put_u32_le(item.correlation_id);
        dst.put_u32_le(item.opcode);
        dst.put_slice(&body);
        Ok(())
    }
}
